// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the playbook bounded context
//! Published on every curation so observers can audit how the knowledge base evolves

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::curation::RunStatus;
use super::delta::FeedbackTag;
use super::playbook::BulletId;

/// Cortex domain events
/// These events are published to the EventBus for observability and integration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CortexEvent {
    /// A new bullet was appended to a playbook
    BulletAdded {
        namespace: String,
        bullet_id: BulletId,
        section: String,
        timestamp: DateTime<Utc>,
    },

    /// A bullet's text was rewritten in place
    BulletUpdated {
        namespace: String,
        bullet_id: BulletId,
        timestamp: DateTime<Utc>,
    },

    BulletDeleted {
        namespace: String,
        bullet_id: BulletId,
        /// Confidence at the moment of removal
        final_confidence: f64,
        timestamp: DateTime<Utc>,
    },

    /// A helpful/harmful judgment was counted against a bullet
    FeedbackRecorded {
        namespace: String,
        bullet_id: BulletId,
        tag: FeedbackTag,
        old_confidence: f64,
        new_confidence: f64,
        timestamp: DateTime<Utc>,
    },

    /// A curation run finished (successfully or not)
    CurationCompleted {
        namespace: String,
        status: RunStatus,
        added: usize,
        updated: usize,
        deleted: usize,
        bullets_after: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Sink for domain events. Publishing never fails from the caller's point of
/// view; an implementation with no listeners simply drops the event.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: CortexEvent);
}

impl CortexEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CortexEvent::BulletAdded { timestamp, .. } => *timestamp,
            CortexEvent::BulletUpdated { timestamp, .. } => *timestamp,
            CortexEvent::BulletDeleted { timestamp, .. } => *timestamp,
            CortexEvent::FeedbackRecorded { timestamp, .. } => *timestamp,
            CortexEvent::CurationCompleted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            CortexEvent::BulletAdded { .. } => "bullet_added",
            CortexEvent::BulletUpdated { .. } => "bullet_updated",
            CortexEvent::BulletDeleted { .. } => "bullet_deleted",
            CortexEvent::FeedbackRecorded { .. } => "feedback_recorded",
            CortexEvent::CurationCompleted { .. } => "curation_completed",
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            CortexEvent::BulletAdded { namespace, .. }
            | CortexEvent::BulletUpdated { namespace, .. }
            | CortexEvent::BulletDeleted { namespace, .. }
            | CortexEvent::FeedbackRecorded { namespace, .. }
            | CortexEvent::CurationCompleted { namespace, .. } => namespace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = CortexEvent::BulletAdded {
            namespace: "math".to_string(),
            bullet_id: BulletId::generate(),
            section: "strategies".to_string(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"bullet_added""#));
        let deserialized: CortexEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.event_type(), deserialized.event_type());
        assert_eq!(deserialized.namespace(), "math");
    }

    #[test]
    fn test_feedback_event_type() {
        let event = CortexEvent::FeedbackRecorded {
            namespace: "math".to_string(),
            bullet_id: BulletId::from("u1"),
            tag: FeedbackTag::Helpful,
            old_confidence: 0.5,
            new_confidence: 1.0,
            timestamp: Utc::now(),
        };

        assert_eq!(event.event_type(), "feedback_recorded");
    }
}

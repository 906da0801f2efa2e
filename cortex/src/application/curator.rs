// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # CuratorService: feedback and delta merge
//!
//! Folds one reflection into a namespace's playbook:
//!
//! 1. **Feedback pass**: every `helpful`/`harmful` judgment increments the
//!    matching counter of the judged bullet; `neutral` leaves it alone.
//! 2. **Delta pass**: insights are turned into ADD/UPDATE/DELETE operations by
//!    the [`JudgmentEngine`] and applied in order.
//! 3. **Persist** the playbook, refreshing `updated_at`.
//!
//! References to unknown bullet ids are warnings, never errors: the operation
//! is skipped and recorded in the summary.
//!
//! Curation never returns an error. A failed delta proposal still persists the
//! feedback pass (`Degraded`); a failed load or save leaves the stored
//! playbook untouched (`Failed`).
//!
//! Runs against the same namespace are serialized through [`NamespaceLocks`];
//! different namespaces proceed in parallel.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::domain::{
    Bullet, BulletId, CortexEvent, CurationResult, CurationSummary, DeltaKind, DeltaOperation,
    EventPublisher, FeedbackTag, JudgmentEngine, Playbook, PlaybookRepository, ReflectionResult,
    RunStatus, SectionCatalog, SectionDefinition, SectionPolicy, UsageFeedback,
};

/// Per-namespace async mutexes, created on first use.
#[derive(Default)]
pub struct NamespaceLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl NamespaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a namespace. Access ends when the guard drops.
    pub async fn lock(&self, namespace: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        // The map shard guard is released before awaiting
        mutex.lock_owned().await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedFeedback {
    pub bullet_id: BulletId,
    pub tag: FeedbackTag,
    pub old_confidence: f64,
    pub new_confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackReport {
    /// Helpful/harmful judgments that changed a counter
    pub applied: Vec<AppliedFeedback>,
    /// Judgments naming an unknown bullet
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Apply usage judgments to a playbook's counters.
pub fn apply_feedback(playbook: &mut Playbook, feedback: &[UsageFeedback]) -> FeedbackReport {
    let index = playbook.index();
    let mut report = FeedbackReport::default();

    for item in feedback {
        let Some(&position) = index.get(&item.bullet_id) else {
            let warning = format!("feedback for unknown bullet '{}' skipped", item.bullet_id);
            warn!(bullet_id = %item.bullet_id, tag = %item.tag, "Feedback references unknown bullet, skipping");
            report.warnings.push(warning);
            report.skipped += 1;
            continue;
        };

        let bullet = &mut playbook.bullets[position];
        let old_confidence = bullet.confidence_score();
        match item.tag {
            FeedbackTag::Helpful => bullet.helpful = bullet.helpful.saturating_add(1),
            FeedbackTag::Harmful => bullet.harmful = bullet.harmful.saturating_add(1),
            FeedbackTag::Neutral => continue,
        }
        report.applied.push(AppliedFeedback {
            bullet_id: item.bullet_id.clone(),
            tag: item.tag,
            old_confidence,
            new_confidence: bullet.confidence_score(),
        });
    }

    report
}

/// Observable effect of one applied delta.
#[derive(Debug, Clone, PartialEq)]
pub enum BulletChange {
    Added { bullet_id: BulletId, section: String },
    Updated { bullet_id: BulletId },
    Deleted { bullet_id: BulletId, final_confidence: f64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Operations that took effect, in application order
    pub applied: Vec<DeltaOperation>,
    pub changes: Vec<BulletChange>,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

impl MergeReport {
    pub fn count(&self, kind: DeltaKind) -> usize {
        self.applied.iter().filter(|d| d.kind() == kind).count()
    }

    fn skip(&mut self, warning: String) {
        self.warnings.push(warning);
        self.skipped += 1;
    }
}

/// Apply delta operations in order.
///
/// `sections` is the catalog consulted by `policy` for ADDs.
pub fn merge_deltas(
    playbook: &mut Playbook,
    deltas: &[DeltaOperation],
    sections: &[SectionDefinition],
    policy: SectionPolicy,
) -> MergeReport {
    let mut report = MergeReport::default();

    for delta in deltas {
        match delta {
            DeltaOperation::Add { section, content, .. } => {
                if !policy.allows(section, sections) {
                    warn!(section = %section, "ADD targets a section outside the catalog, skipping");
                    report.skip(format!("ADD to unknown section '{}' rejected", section));
                    continue;
                }
                let mut bullet = Bullet::new(section.clone(), content.clone());
                // Fresh v4 ids do not collide in practice; regenerate anyway if one does
                while playbook.contains(&bullet.id) {
                    bullet.id = BulletId::generate();
                }
                debug!(bullet_id = %bullet.id, section = %section, "Adding bullet");
                report.changes.push(BulletChange::Added {
                    bullet_id: bullet.id.clone(),
                    section: section.clone(),
                });
                playbook.push(bullet);
            }
            DeltaOperation::Update { bullet_id, content, .. } => {
                let Some(bullet) = playbook.get_mut(bullet_id) else {
                    warn!(bullet_id = %bullet_id, "UPDATE references unknown bullet, skipping");
                    report.skip(format!("UPDATE of unknown bullet '{}' skipped", bullet_id));
                    continue;
                };
                bullet.rewrite(content);
                report.changes.push(BulletChange::Updated {
                    bullet_id: bullet_id.clone(),
                });
            }
            DeltaOperation::Delete { bullet_id, .. } => {
                let Some(removed) = playbook.remove(bullet_id) else {
                    warn!(bullet_id = %bullet_id, "DELETE references unknown bullet, skipping");
                    report.skip(format!("DELETE of unknown bullet '{}' skipped", bullet_id));
                    continue;
                };
                report.changes.push(BulletChange::Deleted {
                    bullet_id: bullet_id.clone(),
                    final_confidence: removed.confidence_score(),
                });
            }
        }
        report.applied.push(delta.clone());
    }

    report
}

/// Application service owning the curation write path.
pub struct CuratorService {
    repository: Arc<dyn PlaybookRepository>,
    judgment: Arc<dyn JudgmentEngine>,
    sections: Arc<dyn SectionCatalog>,
    events: Arc<dyn EventPublisher>,
    policy: SectionPolicy,
    locks: NamespaceLocks,
}

impl CuratorService {
    pub fn new(
        repository: Arc<dyn PlaybookRepository>,
        judgment: Arc<dyn JudgmentEngine>,
        sections: Arc<dyn SectionCatalog>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repository,
            judgment,
            sections,
            events,
            policy: SectionPolicy::default(),
            locks: NamespaceLocks::new(),
        }
    }

    pub fn with_section_policy(mut self, policy: SectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn curate(&self, reflection: &ReflectionResult, namespace: &str) -> CurationResult {
        let started = Instant::now();
        let _guard = self.locks.lock(namespace).await;

        let result = self.curate_locked(reflection, namespace).await;

        metrics::counter!("playbook_curation_runs_total", "status" => result.status.as_str())
            .increment(1);
        self.events.publish(CortexEvent::CurationCompleted {
            namespace: namespace.to_string(),
            status: result.status,
            added: result.summary.added,
            updated: result.summary.updated,
            deleted: result.summary.deleted,
            bullets_after: result.summary.bullets_after,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
        info!(
            namespace,
            status = %result.status,
            summary = %result.summary,
            before = result.summary.bullets_before,
            after = result.summary.bullets_after,
            "Curation finished"
        );
        result
    }

    async fn curate_locked(&self, reflection: &ReflectionResult, namespace: &str) -> CurationResult {
        let mut playbook = match self.repository.load(namespace).await {
            Ok(playbook) => playbook,
            Err(e) => {
                error!(namespace, error = %e, "Failed to load playbook, curation aborted");
                return CurationResult {
                    status: RunStatus::Failed,
                    deltas: Vec::new(),
                    summary: CurationSummary::unchanged(0, format!("load failed: {}", e)),
                };
            }
        };
        let bullets_before = playbook.len();

        let feedback = apply_feedback(&mut playbook, &reflection.bullet_evaluations);

        let mut status = RunStatus::Success;
        let mut note = String::new();
        let catalog = self.sections.sections(namespace);
        let proposed = if reflection.insights.is_empty() {
            debug!(namespace, "No insights to curate");
            Vec::new()
        } else {
            match self
                .judgment
                .propose_deltas(&reflection.insights, &playbook.bullets, &catalog, namespace)
                .await
            {
                Ok(deltas) => deltas,
                Err(e) => {
                    warn!(namespace, error = %e, "Delta proposal failed, persisting feedback only");
                    status = RunStatus::Degraded;
                    note = format!("delta proposal failed: {}", e);
                    Vec::new()
                }
            }
        };

        let merge = merge_deltas(&mut playbook, &proposed, &catalog, self.policy);

        let mut warnings = feedback.warnings.clone();
        warnings.extend(merge.warnings.iter().cloned());

        if let Err(e) = self.repository.save(namespace, &mut playbook).await {
            error!(namespace, error = %e, "Failed to persist playbook");
            let mut summary = CurationSummary::unchanged(bullets_before, format!("save failed: {}", e));
            summary.warnings = warnings;
            return CurationResult {
                status: RunStatus::Failed,
                deltas: Vec::new(),
                summary,
            };
        }

        self.publish_changes(namespace, &feedback, &merge);

        let summary = CurationSummary {
            added: merge.count(DeltaKind::Add),
            updated: merge.count(DeltaKind::Update),
            deleted: merge.count(DeltaKind::Delete),
            skipped: merge.skipped,
            feedback_applied: feedback.applied.len(),
            feedback_skipped: feedback.skipped,
            bullets_before,
            bullets_after: playbook.len(),
            warnings,
            note,
        };

        CurationResult {
            status,
            deltas: merge.applied,
            summary,
        }
    }

    fn publish_changes(&self, namespace: &str, feedback: &FeedbackReport, merge: &MergeReport) {
        let timestamp = Utc::now();

        for item in &feedback.applied {
            metrics::counter!("playbook_feedback_applied_total", "tag" => item.tag.as_str()).increment(1);
            self.events.publish(CortexEvent::FeedbackRecorded {
                namespace: namespace.to_string(),
                bullet_id: item.bullet_id.clone(),
                tag: item.tag,
                old_confidence: item.old_confidence,
                new_confidence: item.new_confidence,
                timestamp,
            });
        }

        for delta in &merge.applied {
            metrics::counter!("playbook_deltas_applied_total", "op" => delta.kind().as_str()).increment(1);
        }

        for change in &merge.changes {
            let event = match change {
                BulletChange::Added { bullet_id, section } => CortexEvent::BulletAdded {
                    namespace: namespace.to_string(),
                    bullet_id: bullet_id.clone(),
                    section: section.clone(),
                    timestamp,
                },
                BulletChange::Updated { bullet_id } => CortexEvent::BulletUpdated {
                    namespace: namespace.to_string(),
                    bullet_id: bullet_id.clone(),
                    timestamp,
                },
                BulletChange::Deleted {
                    bullet_id,
                    final_confidence,
                } => CortexEvent::BulletDeleted {
                    namespace: namespace.to_string(),
                    bullet_id: bullet_id.clone(),
                    final_confidence: *final_confidence,
                    timestamp,
                },
            };
            self.events.publish(event);
        }
    }
}

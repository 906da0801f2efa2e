// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Application layer for the playbook bounded context

pub mod scoring;
pub mod lexical;
pub mod hybrid_search;
pub mod curator;
pub mod reflector;
pub mod generator;
pub mod feedback_loop;

pub use hybrid_search::{HybridSearch, SearchError, SearchQuery, SearchResult};
pub use curator::{apply_feedback, merge_deltas, CuratorService, FeedbackReport, MergeReport, NamespaceLocks};
pub use reflector::ReflectorService;
pub use generator::GeneratorService;
pub use feedback_loop::{
    build_test_report, judge_answer, Accuracy, FeedbackLoop, InferRecord, LoopMode, LoopOutcome,
    ReflectRecord, TaskRecord,
};

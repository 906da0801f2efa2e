// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Playbook Cortex
//!
//! Retrieval-augmented, self-curating knowledge base ("playbook") for an
//! LLM-driven problem solver.
//!
//! # Architecture
//!
//! - **Layer:** Learning & Memory Layer
//! - **Purpose:** Hybrid retrieval over playbook bullets and feedback-driven
//!   curation of those bullets
//!
//! The closed loop is: [`application::GeneratorService`] retrieves bullets and
//! answers a query, [`application::ReflectorService`] judges the trajectory,
//! and [`application::CuratorService`] folds the judgments back into the
//! playbook. [`application::FeedbackLoop`] sequences the three.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;

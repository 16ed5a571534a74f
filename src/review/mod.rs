// SPDX-License-Identifier: MIT
//! The incremental diff-and-review pipeline.
//!
//! Change detection → range chunking → suggestion generation →
//! deduplication → persisted-state update, per document.

pub mod chunker;
pub mod dedupe;
pub mod diff;
pub mod model;
pub mod pipeline;

pub use model::{ReviewItem, Severity};
pub use pipeline::ReviewPipeline;

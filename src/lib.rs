// SPDX-License-Identifier: MIT
//! Redline — always-on background reviewer for shared documents.
//!
//! The core is the incremental diff-and-review pipeline: detect which
//! paragraphs changed since a document's last reviewed revision, send only
//! those to the rate-limited suggestion service, deduplicate the feedback
//! against a persisted hash ledger, and publish it as anchored comments.

pub mod backoff;
pub mod config;
pub mod docs;
pub mod emit;
pub mod rate_limit;
pub mod review;
pub mod service;
pub mod suggest;

pub use config::ReviewerConfig;
pub use service::ReviewService;

// SPDX-License-Identifier: MIT
//! Data models for the review pipeline.

use serde::{Deserialize, Serialize};

/// Severity attached to a review item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

/// One unit of reviewer feedback, anchored to a span of the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    /// Short issue label; may be empty when the model returns free-form text.
    pub issue: String,
    /// The suggestion text produced by the remote service.
    pub suggestion: String,
    pub severity: Severity,
    /// The exact document text this item refers to (one emitted chunk).
    pub quote: String,
    /// Character offset of the quote in the reconstructed document.
    pub start_offset: usize,
    /// Offset one past the last char of the quote (exclusive).
    pub end_offset: usize,
    /// Short content hash; attached during deduplication.
    pub hash: Option<String>,
}

impl ReviewItem {
    /// A raw item as produced by the generate step, before deduplication.
    pub fn raw(suggestion: String, quote: String, start_offset: usize, end_offset: usize) -> Self {
        Self {
            issue: String::new(),
            suggestion,
            severity: Severity::Info,
            quote,
            start_offset,
            end_offset,
            hash: None,
        }
    }
}

// SPDX-License-Identifier: MIT
//! Publishes accepted review items as anchored comments.
//!
//! Comment bodies are capped at 4096 bytes; oversized content is split into a
//! primary anchored comment plus threaded replies, trimming only on char
//! boundaries so no multi-byte character straddles a part.

use anyhow::{Context as _, Result};
use tracing::{debug, info};

use crate::docs::CommentTransport;
use crate::review::model::ReviewItem;

/// Maximum UTF-8 encoded size of one comment part.
pub const MAX_COMMENT_BYTES: usize = 4096;

pub struct CommentEmitter<'a> {
    transport: &'a dyn CommentTransport,
}

impl<'a> CommentEmitter<'a> {
    pub fn new(transport: &'a dyn CommentTransport) -> Self {
        Self { transport }
    }

    /// Post one review item: the first part as a comment anchored to the
    /// item's offsets (carrying the quote for highlight support), every
    /// subsequent part as a reply to it, in order.
    pub async fn post(&self, doc_id: &str, item: &ReviewItem) -> Result<()> {
        let content = build_content(item);
        let parts = split_content(&content, MAX_COMMENT_BYTES);
        debug!(doc_id, parts = parts.len(), "posting review comment");

        let mut parts = parts.into_iter();
        let Some(first) = parts.next() else {
            return Ok(());
        };
        let comment_id = self
            .transport
            .create_comment(
                doc_id,
                &first,
                item.start_offset,
                item.end_offset,
                Some(&item.quote),
            )
            .await
            .context("creating anchored comment")?;

        for part in parts {
            self.transport
                .create_reply(doc_id, &comment_id, &part)
                .await
                .context("posting overflow reply")?;
        }
        info!(doc_id, comment_id, "review comment posted");
        Ok(())
    }
}

/// Combine issue (when present) and suggestion, tagged with the short hash
/// for traceability.
pub fn build_content(item: &ReviewItem) -> String {
    let tag = item.hash.as_deref().unwrap_or("--------");
    if item.issue.is_empty() {
        format!("[{tag}] {}", item.suggestion)
    } else {
        format!("[{tag}] {}\n\n{}", item.issue, item.suggestion)
    }
}

/// Split `content` into consecutive parts whose UTF-8 encoding does not
/// exceed `max_bytes`, never splitting inside a character.
pub fn split_content(content: &str, max_bytes: usize) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut current = String::new();
    for ch in content.chars() {
        if current.len() + ch.len_utf8() > max_bytes {
            parts.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

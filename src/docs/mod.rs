// SPDX-License-Identifier: MIT
//! External collaborator contracts: the document store and comment transport.
//!
//! The review pipeline only ever talks to these traits; the concrete REST
//! adapter lives in [`drive`]. Persisted per-document state (revision pointer
//! and hash ledger) is owned by the store and mutated through explicit
//! read-modify-write calls.

pub mod drive;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Metadata key holding the last reviewed revision id.
pub const REVISION_KEY: &str = "lastReviewedRevisionId";

/// A document surfaced by a poll cycle.
#[derive(Debug, Clone)]
pub struct DocHandle {
    pub id: String,
    pub name: String,
    pub modified_time: Option<DateTime<Utc>>,
    pub shared_time: Option<DateTime<Utc>>,
}

/// Errors from the document store and comment transport.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Metadata write contention — surfaced to the caller, never merged.
    #[error("metadata write conflict on {doc_id}")]
    Conflict { doc_id: String },

    /// Revision content unreadable or undecodable. The pipeline treats this
    /// as an empty prior state with a logged warning.
    #[error("revision {revision_id} unreadable: {reason}")]
    MalformedRevision { revision_id: String, reason: String },

    /// Non-2xx API response other than a write conflict.
    #[error("store API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure.
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Read side of the store plus the single metadata write the pipeline issues.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents modified or newly shared after `since`.
    async fn list_recent(&self, since: DateTime<Utc>) -> Result<Vec<DocHandle>, StoreError>;

    /// The current paragraph sequence of the document.
    async fn current_paragraphs(&self, doc_id: &str) -> Result<Vec<String>, StoreError>;

    /// Plain text of a prior revision.
    async fn revision_text(&self, doc_id: &str, revision_id: &str) -> Result<String, StoreError>;

    /// Flat string metadata map and the current head revision id.
    async fn metadata(&self, doc_id: &str)
        -> Result<(HashMap<String, String>, String), StoreError>;

    /// Replace the document's metadata map in one atomic write.
    async fn set_metadata(
        &self,
        doc_id: &str,
        properties: HashMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Reviewer context for the document (e.g. its share description).
    async fn context(&self, doc_id: &str) -> Result<String, StoreError>;
}

/// Posting side: anchored comments and threaded replies.
#[async_trait]
pub trait CommentTransport: Send + Sync {
    /// Create a comment anchored to `[start_offset, end_offset)`, optionally
    /// carrying the quoted document text. Returns the new comment's id.
    async fn create_comment(
        &self,
        doc_id: &str,
        content: &str,
        start_offset: usize,
        end_offset: usize,
        quoted_text: Option<&str>,
    ) -> Result<String, StoreError>;

    /// Append a reply to an existing comment thread.
    async fn create_reply(
        &self,
        doc_id: &str,
        comment_id: &str,
        content: &str,
    ) -> Result<(), StoreError>;
}

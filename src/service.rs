// SPDX-License-Identifier: MIT
//! Poll-cycle driver.
//!
//! Each cycle lists documents modified since the previous watermark, runs the
//! review pipeline on each, and posts the accepted items as comments.
//! Documents are independent units of work: one failure is logged and the
//! document stays inside the next cycle's query window, while the rest of the
//! cycle proceeds.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{error, info};

use crate::docs::{CommentTransport, DocHandle, DocumentStore};
use crate::emit::CommentEmitter;
use crate::review::ReviewPipeline;
use crate::suggest::SuggestionClient;

pub struct ReviewService {
    store: Arc<dyn DocumentStore>,
    transport: Arc<dyn CommentTransport>,
    suggester: Arc<SuggestionClient>,
    chunk_size: usize,
}

impl ReviewService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        transport: Arc<dyn CommentTransport>,
        suggester: Arc<SuggestionClient>,
        chunk_size: usize,
    ) -> Self {
        Self {
            store,
            transport,
            suggester,
            chunk_size,
        }
    }

    /// Process documents changed since `since`; returns the next watermark.
    ///
    /// The watermark normally advances to max(latest document time, now). A
    /// failed document holds it back to just before that document's modified
    /// time so the document is picked up again on the next cycle.
    pub async fn run_cycle(&self, since: DateTime<Utc>) -> DateTime<Utc> {
        info!(%since, "starting review cycle");

        let docs = match self.store.list_recent(since).await {
            Ok(docs) => docs,
            Err(e) => {
                error!(err = %e, "failed to list recent documents");
                return since;
            }
        };
        info!(count = docs.len(), "documents to process");

        let mut latest = since;
        let mut failed_floor: Option<DateTime<Utc>> = None;
        let mut processed = 0usize;

        for doc in &docs {
            if let Some(t) = doc_time(doc) {
                latest = latest.max(t);
            }
            match self.review_one(doc).await {
                Ok(posted) => {
                    info!(doc_id = %doc.id, name = %doc.name, posted, "document reviewed");
                    processed += 1;
                }
                Err(e) => {
                    error!(doc_id = %doc.id, name = %doc.name, err = %format!("{e:#}"), "document review failed");
                    if let Some(t) = doc_time(doc) {
                        failed_floor = Some(failed_floor.map_or(t, |f| f.min(t)));
                    } else {
                        failed_floor = Some(failed_floor.map_or(since, |f| f.min(since)));
                    }
                }
            }
        }

        info!(processed, total = docs.len(), "review cycle complete");

        let mut next = latest.max(Utc::now());
        if let Some(floor) = failed_floor {
            next = next.min(floor - ChronoDuration::seconds(1));
        }
        next.max(since)
    }

    /// Review one document and post its accepted items. Returns the number
    /// of comments posted.
    async fn review_one(&self, doc: &DocHandle) -> Result<usize> {
        let pipeline = ReviewPipeline::new(self.store.as_ref(), &self.suggester, self.chunk_size);
        let items = pipeline.review_document(&doc.id).await?;

        let emitter = CommentEmitter::new(self.transport.as_ref());
        for item in &items {
            emitter.post(&doc.id, item).await?;
        }
        Ok(items.len())
    }
}

fn doc_time(doc: &DocHandle) -> Option<DateTime<Utc>> {
    match (doc.modified_time, doc.shared_time) {
        (Some(m), Some(s)) => Some(m.max(s)),
        (m, s) => m.or(s),
    }
}

// SPDX-License-Identifier: MIT
//! Per-document review pipeline.
//!
//! Runs fetch-state → diff → generate → deduplicate → persist for one
//! document and returns the accepted review items for comment emission.
//! Persistence happens once, at the end — a failure in any step leaves the
//! stored revision pointer and ledger untouched, so the document is simply
//! re-reviewed on the next poll cycle.

use anyhow::{Context as _, Result};
use tracing::{debug, info, warn};

use crate::docs::{DocumentStore, StoreError, REVISION_KEY};
use crate::review::chunker::chunk_range;
use crate::review::dedupe::{
    decode_ledger, deduplicate, ledger_value_budget, prune_ledger, LEDGER_KEY,
};
use crate::review::diff::detect_changed_ranges;
use crate::review::model::ReviewItem;
use crate::suggest::SuggestionClient;

pub struct ReviewPipeline<'a> {
    store: &'a dyn DocumentStore,
    suggester: &'a SuggestionClient,
    /// Char budget per chunk sent to the suggestion service.
    chunk_size: usize,
}

impl<'a> ReviewPipeline<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        suggester: &'a SuggestionClient,
        chunk_size: usize,
    ) -> Self {
        Self {
            store,
            suggester,
            chunk_size,
        }
    }

    /// Review one document end to end.
    ///
    /// On success the revision pointer always advances to the current head,
    /// even when no review items were produced.
    pub async fn review_document(&self, doc_id: &str) -> Result<Vec<ReviewItem>> {
        // 1. Fetch persisted state: metadata, ledger, context, both
        //    paragraph sequences.
        let (mut properties, head_revision) = self
            .store
            .metadata(doc_id)
            .await
            .context("fetching document metadata")?;
        let mut ledger = decode_ledger(properties.get(LEDGER_KEY).map_or("", |s| s.as_str()));
        // An empty pointer means no prior review; never request revision "".
        let prior_revision = properties
            .get(REVISION_KEY)
            .filter(|r| !r.is_empty())
            .cloned();
        let context = self
            .store
            .context(doc_id)
            .await
            .context("fetching reviewer context")?;

        let new_paragraphs = self
            .store
            .current_paragraphs(doc_id)
            .await
            .context("fetching current paragraphs")?;
        let old_paragraphs = self
            .fetch_prior_paragraphs(doc_id, prior_revision.as_deref())
            .await?;

        // 2. Diff the paragraph sequences.
        let ranges = detect_changed_ranges(&old_paragraphs, &new_paragraphs);
        debug!(
            doc_id,
            changed_ranges = ranges.len(),
            old = old_paragraphs.len(),
            new = new_paragraphs.len(),
            "change detection complete"
        );

        // 3. Generate one raw item per budgeted sub-chunk. A chunk-level
        //    failure aborts the whole document rather than silently skipping
        //    the change.
        let mut raw_items: Vec<ReviewItem> = Vec::new();
        for (start, end) in ranges {
            for chunk in chunk_range(&new_paragraphs, start, end, self.chunk_size) {
                if chunk.text.is_empty() {
                    continue;
                }
                let suggestion = self
                    .suggester
                    .suggest(&chunk.text, &context)
                    .await
                    .with_context(|| format!("suggesting for range ({start}, {end})"))?;
                raw_items.push(ReviewItem::raw(
                    suggestion.combined(),
                    chunk.text,
                    chunk.start_offset,
                    chunk.end_offset,
                ));
            }
        }

        // 4. Deduplicate against the persisted ledger.
        let accepted = deduplicate(raw_items, &mut ledger);

        // 5. Persist: append accepted hashes, prune to budget, advance the
        //    revision pointer — one atomic metadata write. A store that
        //    reports no head revision id gets no pointer, so the next cycle
        //    reviews from scratch instead of requesting revision "".
        if !head_revision.is_empty() {
            properties.insert(REVISION_KEY.to_string(), head_revision.clone());
        }
        properties.insert(
            LEDGER_KEY.to_string(),
            prune_ledger(&ledger, ledger_value_budget()),
        );
        self.store
            .set_metadata(doc_id, properties)
            .await
            .context("persisting review state")?;

        info!(
            doc_id,
            accepted = accepted.len(),
            head_revision,
            "review complete"
        );
        Ok(accepted)
    }

    /// Paragraphs of the last reviewed revision; empty on first review or
    /// when the revision text is unreadable.
    async fn fetch_prior_paragraphs(
        &self,
        doc_id: &str,
        prior_revision: Option<&str>,
    ) -> Result<Vec<String>> {
        let Some(revision_id) = prior_revision else {
            return Ok(Vec::new());
        };
        match self.store.revision_text(doc_id, revision_id).await {
            Ok(text) => Ok(text.lines().map(str::to_string).collect()),
            Err(StoreError::MalformedRevision { revision_id, reason }) => {
                warn!(
                    doc_id,
                    revision_id, reason, "prior revision unreadable — treating as empty"
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e).context("fetching prior revision text"),
        }
    }
}

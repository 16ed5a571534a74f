// SPDX-License-Identifier: MIT
//! Content-addressed suggestion deduplication.
//!
//! Each emitted suggestion is identified by a short hash of
//! `(suggestion, quote)`. Hashes of previously posted suggestions live in a
//! ledger persisted as document metadata under a tight byte budget; when the
//! ledger outgrows the budget the oldest hashes are evicted first.

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::review::model::ReviewItem;

/// Metadata key holding the comma-joined hash ledger.
pub const LEDGER_KEY: &str = "reviewedHashes";

/// Combined byte budget for the ledger key plus its value.
pub const LEDGER_BUDGET_BYTES: usize = 124;

/// Width of a content hash in hex characters.
const HASH_WIDTH: usize = 8;

/// Deterministic short digest of a `(suggestion, quote)` pair.
///
/// Stable across runs for identical input; 8 hex chars keep collision odds
/// negligible at the ledger's size of a few dozen entries while conserving
/// ledger bytes.
pub fn content_hash(suggestion: &str, quote: &str) -> String {
    let digest = Sha256::digest(format!("{suggestion}|{quote}").as_bytes());
    hex::encode(digest)[..HASH_WIDTH].to_string()
}

/// Filter `items` against `existing_hashes`, attaching hashes to survivors.
///
/// Items with an empty suggestion are dropped. Items whose hash is already in
/// the ledger are dropped. Each survivor's hash is appended to
/// `existing_hashes`, so a duplicate later in the same batch is dropped too.
/// Order is preserved among survivors.
pub fn deduplicate(items: Vec<ReviewItem>, existing_hashes: &mut Vec<String>) -> Vec<ReviewItem> {
    let mut unique = Vec::new();
    for mut item in items {
        if item.suggestion.is_empty() {
            continue;
        }
        let h = content_hash(&item.suggestion, &item.quote);
        if existing_hashes.iter().any(|e| *e == h) {
            continue;
        }
        existing_hashes.push(h.clone());
        item.hash = Some(h);
        unique.push(item);
    }
    unique
}

/// Decode a persisted ledger value into an ordered hash list.
///
/// Tolerates empty segments and repeated hashes in a corrupted value — the
/// result never contains duplicates.
pub fn decode_ledger(raw: &str) -> Vec<String> {
    let mut hashes: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() || hashes.iter().any(|h| h == part) {
            continue;
        }
        hashes.push(part.to_string());
    }
    hashes
}

/// Join `hashes` with commas, evicting from the front (oldest first) until
/// the encoding fits in `max_bytes`.
///
/// Eviction is not an error, but it is logged so operators can detect ledger
/// churn.
pub fn prune_ledger(hashes: &[String], max_bytes: usize) -> String {
    let mut kept: &[String] = hashes;
    let mut encoded = kept.join(",");
    while encoded.len() > max_bytes && !kept.is_empty() {
        kept = &kept[1..];
        encoded = kept.join(",");
    }
    let evicted = hashes.len() - kept.len();
    if evicted > 0 {
        warn!(evicted, max_bytes, "ledger over byte budget — evicted oldest hashes");
    }
    encoded
}

/// Byte budget available for the ledger value once the key name is counted.
pub fn ledger_value_budget() -> usize {
    LEDGER_BUDGET_BYTES - LEDGER_KEY.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(suggestion: &str, quote: &str) -> ReviewItem {
        ReviewItem::raw(suggestion.to_string(), quote.to_string(), 0, 0)
    }

    #[test]
    fn hash_is_stable_and_short() {
        let a = content_hash("Fix typo", "teh");
        let b = content_hash("Fix typo", "teh");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_ne!(a, content_hash("Fix typo", "the"));
    }

    #[test]
    fn duplicates_within_a_batch_are_dropped() {
        let mut existing = Vec::new();
        let items = vec![
            item("Fix typo", "teh"),
            item("Fix typo", "teh"),
            item("Capitalize", "word"),
        ];
        let unique = deduplicate(items, &mut existing);
        assert_eq!(unique.len(), 2);
        assert!(unique.iter().all(|i| i.hash.is_some()));
        assert_eq!(existing.len(), 2);
    }

    #[test]
    fn second_run_with_same_item_is_empty() {
        let mut existing = Vec::new();
        deduplicate(vec![item("Fix typo", "teh")], &mut existing);
        let again = deduplicate(vec![item("Fix typo", "teh")], &mut existing);
        assert!(again.is_empty());
    }

    #[test]
    fn empty_suggestions_are_dropped() {
        let mut existing = Vec::new();
        let unique = deduplicate(vec![item("", "some quote")], &mut existing);
        assert!(unique.is_empty());
        assert!(existing.is_empty());
    }

    #[test]
    fn prune_evicts_oldest_first() {
        let hashes: Vec<String> = (0..5).map(|i| format!("hash000{i}")).collect();
        // 3 hashes of 8 chars + 2 commas = 26 bytes.
        let pruned = prune_ledger(&hashes, 26);
        assert_eq!(pruned, "hash0002,hash0003,hash0004");
    }

    #[test]
    fn decode_roundtrips_and_strips_duplicates() {
        let decoded = decode_ledger("aa,bb,,aa,cc");
        assert_eq!(decoded, vec!["aa", "bb", "cc"]);
        assert_eq!(decode_ledger(""), Vec::<String>::new());
    }

    proptest! {
        #[test]
        fn pruned_ledger_fits_budget(hashes in prop::collection::vec("[0-9a-f]{8}", 0..40)) {
            let hashes: Vec<String> = hashes;
            let budget = ledger_value_budget();
            let encoded = prune_ledger(&hashes, budget);
            prop_assert!(encoded.len() <= budget);
            prop_assert!(LEDGER_KEY.len() + encoded.len() <= LEDGER_BUDGET_BYTES);
            // Every surviving hash is a suffix of the input order.
            let survivors: Vec<&str> =
                encoded.split(',').filter(|s| !s.is_empty()).collect();
            let tail: Vec<&str> = hashes[hashes.len() - survivors.len()..]
                .iter()
                .map(|s| s.as_str())
                .collect();
            prop_assert_eq!(survivors, tail);
        }
    }
}

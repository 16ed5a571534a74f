// SPDX-License-Identifier: MIT
//! Change detection between two revisions of a document.
//!
//! Paragraphs are compared as atomic tokens under LCS-style sequence
//! alignment; every non-equal opcode surfaces as one inclusive index range
//! into the new paragraph sequence.

use similar::{capture_diff_slices, Algorithm, DiffOp};

/// Return index ranges for paragraphs changed between revisions.
///
/// Ranges are inclusive `(start, end)` pairs into `new`, disjoint and in
/// ascending order. An empty `old` yields a single range covering all of
/// `new`. Opcodes whose destination span in `new` is empty (pure deletions)
/// produce no range — there is no new text to review.
pub fn detect_changed_ranges(old: &[String], new: &[String]) -> Vec<(usize, usize)> {
    if new.is_empty() {
        return Vec::new();
    }
    if old.is_empty() {
        return vec![(0, new.len() - 1)];
    }

    let ops = capture_diff_slices(Algorithm::Myers, old, new);
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for op in ops {
        let (start, len) = match op {
            DiffOp::Equal { .. } => continue,
            DiffOp::Delete { .. } => continue,
            DiffOp::Insert {
                new_index, new_len, ..
            }
            | DiffOp::Replace {
                new_index, new_len, ..
            } => (new_index, new_len),
        };
        if len == 0 {
            continue;
        }
        let end = start + len - 1;
        // Fold spans that touch the previous one into a single maximal range.
        match ranges.last_mut() {
            Some((_, prev_end)) if start <= *prev_end + 1 => {
                *prev_end = (*prev_end).max(end);
            }
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paras(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_sequences_have_no_changes() {
        let old = paras(&["A", "B", "C"]);
        assert!(detect_changed_ranges(&old, &old.clone()).is_empty());
    }

    #[test]
    fn empty_old_marks_everything_changed() {
        let new = paras(&["A", "B", "C"]);
        assert_eq!(detect_changed_ranges(&[], &new), vec![(0, 2)]);
    }

    #[test]
    fn empty_new_has_no_ranges() {
        let old = paras(&["A"]);
        assert!(detect_changed_ranges(&old, &[]).is_empty());
    }

    #[test]
    fn replacement_and_insertion_yield_separate_ranges() {
        let old = paras(&["A", "B", "C"]);
        let new = paras(&["A", "B changed", "C", "D"]);
        assert_eq!(detect_changed_ranges(&old, &new), vec![(1, 1), (3, 3)]);
    }

    #[test]
    fn pure_deletion_yields_no_range() {
        let old = paras(&["A", "B", "C"]);
        let new = paras(&["A", "C"]);
        assert!(detect_changed_ranges(&old, &new).is_empty());
    }

    #[test]
    fn ranges_are_ascending_and_disjoint() {
        let old = paras(&["a", "b", "c", "d", "e", "f"]);
        let new = paras(&["a", "B", "c", "d", "E", "f", "g"]);
        let ranges = detect_changed_ranges(&old, &new);
        for pair in ranges.windows(2) {
            assert!(pair[0].1 < pair[1].0, "ranges overlap: {ranges:?}");
        }
        assert_eq!(ranges, vec![(1, 1), (4, 4), (6, 6)]);
    }
}

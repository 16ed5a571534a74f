// SPDX-License-Identifier: MIT
//! Splits a changed paragraph range into char-budgeted chunks.
//!
//! Chunks carry absolute character offsets into the reconstructed document
//! text (paragraphs joined by single newlines, offsets counting the
//! separators). These offsets anchor the eventual comments, so they must
//! match the reconstruction exactly.

/// One budgeted sub-span of a changed range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Paragraphs of this chunk joined with `\n`, exactly as they appear in
    /// the reconstructed document.
    pub text: String,
    /// Character offset of the first char of `text` in the reconstruction.
    pub start_offset: usize,
    /// Offset one past the last char of `text` (exclusive).
    pub end_offset: usize,
}

/// Greedily group `paragraphs[start..=end]` into chunks whose size (paragraph
/// chars plus one separator char between paragraphs in the same chunk) does
/// not exceed `char_budget`.
///
/// A single paragraph larger than the budget is still emitted alone — the
/// budget is a soft target, never a truncation.
pub fn chunk_range(
    paragraphs: &[String],
    start: usize,
    end: usize,
    char_budget: usize,
) -> Vec<Chunk> {
    if start > end || end >= paragraphs.len() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;
    let mut current_start: usize = paragraphs[..start]
        .iter()
        .map(|p| p.chars().count() + 1)
        .sum();

    for para in &paragraphs[start..=end] {
        let para_chars = para.chars().count();
        let added = para_chars + usize::from(!current.is_empty());
        if current_len + added > char_budget && !current.is_empty() {
            chunks.push(Chunk {
                text: current.join("\n"),
                start_offset: current_start,
                end_offset: current_start + current_len,
            });
            // One separator char sits between this chunk and the next.
            current_start += current_len + 1;
            current = vec![para];
            current_len = para_chars;
        } else {
            current.push(para);
            current_len += added;
        }
    }
    if !current.is_empty() {
        chunks.push(Chunk {
            text: current.join("\n"),
            start_offset: current_start,
            end_offset: current_start + current_len,
        });
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paras(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn whole_range_fits_in_one_chunk() {
        let p = paras(&["one", "two", "three"]);
        let chunks = chunk_range(&p, 0, 2, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "one\ntwo\nthree");
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, 13);
    }

    #[test]
    fn budget_splits_groups() {
        let p = paras(&["aaaa", "bbbb", "cccc"]);
        // "aaaa\nbbbb" is 9 chars — over an 8-char budget, so groups split.
        let chunks = chunk_range(&p, 0, 2, 8);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "aaaa");
        assert_eq!(chunks[1].text, "bbbb");
        assert_eq!(chunks[2].text, "cccc");
    }

    #[test]
    fn oversized_paragraph_is_emitted_alone() {
        let p = paras(&["short", "xxxxxxxxxxxxxxxxxxxx", "tail"]);
        let chunks = chunk_range(&p, 0, 2, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].text, "xxxxxxxxxxxxxxxxxxxx");
    }

    #[test]
    fn offsets_match_document_reconstruction() {
        let p = paras(&["alpha", "beta", "gamma", "delta", "epsilon"]);
        let doc: String = p.join("\n");
        let chunks = chunk_range(&p, 1, 3, 11);
        assert!(!chunks.is_empty());
        let doc_chars: Vec<char> = doc.chars().collect();
        for chunk in &chunks {
            let slice: String = doc_chars[chunk.start_offset..chunk.end_offset]
                .iter()
                .collect();
            assert_eq!(slice, chunk.text);
        }
        // Concatenating chunk texts with single separators reconstructs the
        // range exactly.
        let joined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(joined, p[1..=3].join("\n"));
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let p = paras(&["héllo", "wörld"]);
        let chunks = chunk_range(&p, 1, 1, 100);
        assert_eq!(chunks[0].start_offset, 6);
        assert_eq!(chunks[0].end_offset, 11);
    }

    #[test]
    fn out_of_bounds_range_is_empty() {
        let p = paras(&["a"]);
        assert!(chunk_range(&p, 2, 3, 10).is_empty());
        assert!(chunk_range(&p, 1, 0, 10).is_empty());
    }
}

//! Sliding-window text chunker.
//!
//! Splits each document's content into windows of at most `size` characters.
//! Consecutive windows start `size - overlap` characters apart, so adjacent
//! chunks share exactly `overlap` characters. Windows never cross document
//! boundaries, and every chunk carries a verbatim copy of its document's
//! metadata.
//!
//! Lengths are counted in `char`s, so a window never splits a UTF-8 sequence.
//!
//! # Algorithm
//!
//! 1. Reject `size == 0` and `overlap >= size`.
//! 2. For each document, start a window at character 0.
//! 3. Emit `content[start .. min(start + size, len)]`.
//! 4. Stop once a window reaches the end of the content; otherwise advance
//!    `start` by `size - overlap` and repeat.
//!
//! Empty documents produce no chunks.
//!
//! # Example
//!
//! ```rust
//! use notequery_core::chunk::split_text;
//!
//! let windows = split_text("abcdefghij", 4, 2).unwrap();
//! assert_eq!(windows, vec!["abcd", "cdef", "efgh", "ghij"]);
//! ```

use crate::error::RagError;
use crate::models::{Chunk, Document};

/// Split every document into chunks, in document order.
///
/// # Errors
///
/// Returns [`RagError::Configuration`] when `size` is zero or `overlap` is
/// not smaller than `size`.
pub fn split(documents: &[Document], size: usize, overlap: usize) -> Result<Vec<Chunk>, RagError> {
    validate(size, overlap)?;

    let mut chunks = Vec::new();
    for doc in documents {
        for window in windows(&doc.content, size, overlap) {
            chunks.push(Chunk::new(window, doc.metadata.clone()));
        }
    }
    Ok(chunks)
}

/// Split a single string into overlapping windows.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, RagError> {
    validate(size, overlap)?;
    Ok(windows(text, size, overlap))
}

fn validate(size: usize, overlap: usize) -> Result<(), RagError> {
    if size == 0 {
        return Err(RagError::Configuration(
            "chunk size must be greater than 0".to_string(),
        ));
    }
    if overlap >= size {
        return Err(RagError::Configuration(format!(
            "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
        )));
    }
    Ok(())
}

fn windows(text: &str, size: usize, overlap: usize) -> Vec<String> {
    // Byte offset of every char, plus the end of the string, so windows can
    // be sliced without re-walking the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;
    let step = size - overlap;

    let mut out = Vec::new();
    let mut start = 0;
    while start < char_count {
        let end = (start + size).min(char_count);
        out.push(text[bounds[start]..bounds[end]].to_string());
        if end == char_count {
            break;
        }
        start += step;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn doc(content: &str, page: &str) -> Document {
        let mut d = Document::new(content, format!("r/S section/{page} page/x.md"));
        d.metadata.insert("page".to_string(), page.to_string());
        d
    }

    #[test]
    fn test_short_text_single_chunk() {
        let w = split_text("hello", 10, 3).unwrap();
        assert_eq!(w, vec!["hello"]);
    }

    #[test]
    fn test_exact_size_single_chunk() {
        let w = split_text("abcd", 4, 1).unwrap();
        assert_eq!(w, vec!["abcd"]);
    }

    #[test]
    fn test_last_window_may_be_short() {
        let w = split_text("abcdefg", 4, 1).unwrap();
        assert_eq!(w, vec!["abcd", "defg"]);
        let w = split_text("abcdefgh", 4, 1).unwrap();
        assert_eq!(w, vec!["abcd", "defg", "gh"]);
    }

    #[test]
    fn test_zero_overlap() {
        let w = split_text("abcdefgh", 3, 0).unwrap();
        assert_eq!(w, vec!["abc", "def", "gh"]);
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(split_text("", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            split_text("abc", 0, 0),
            Err(RagError::Configuration(_))
        ));
        assert!(matches!(
            split_text("abc", 4, 4),
            Err(RagError::Configuration(_))
        ));
        assert!(split(&[], 4, 5).is_err());
    }

    #[test]
    fn test_overlap_and_length_invariants() {
        let text: String = (0..997).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let (size, overlap) = (100, 30);
        let w = split_text(&text, size, overlap).unwrap();

        for piece in &w {
            assert!(piece.chars().count() <= size);
        }
        for pair in w.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let next: Vec<char> = pair[1].chars().collect();
            let tail: String = prev[prev.len() - overlap..].iter().collect();
            let head: String = next[..overlap.min(next.len())].iter().collect();
            assert_eq!(tail, head);
        }
        let rebuilt: String = w
            .iter()
            .enumerate()
            .map(|(i, p)| {
                if i == 0 {
                    p.clone()
                } else {
                    p.chars().skip(overlap).collect()
                }
            })
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_multibyte_chars_not_split() {
        let text = "日本語のノートです。旅行の計画。";
        let w = split_text(text, 5, 2).unwrap();
        for piece in &w {
            assert!(piece.chars().count() <= 5);
        }
        assert_eq!(w[0], "日本語のノ");
        assert_eq!(w[1], "のノートで");
    }

    #[test]
    fn test_no_cross_document_windows() {
        let docs = vec![doc("aaaaaa", "One"), doc("bbbbbb", "Two")];
        let chunks = split(&docs, 4, 1).unwrap();
        assert_eq!(chunks.len(), 4);
        for c in &chunks[..2] {
            assert!(c.text.chars().all(|ch| ch == 'a'));
            assert_eq!(c.meta("page"), Some("One"));
        }
        for c in &chunks[2..] {
            assert!(c.text.chars().all(|ch| ch == 'b'));
            assert_eq!(c.meta("page"), Some("Two"));
        }
    }

    #[test]
    fn test_metadata_inherited_verbatim() {
        let d = doc("some content here", "Trip");
        let chunks = split(std::slice::from_ref(&d), 5, 1).unwrap();
        for c in &chunks {
            assert_eq!(c.metadata, d.metadata);
        }
        let empty: Metadata = Metadata::new();
        assert_ne!(chunks[0].metadata, empty);
    }

    #[test]
    fn test_deterministic() {
        let docs = vec![doc("Alpha beta gamma delta epsilon", "P")];
        let a = split(&docs, 7, 3).unwrap();
        let b = split(&docs, 7, 3).unwrap();
        assert_eq!(a, b);
    }
}

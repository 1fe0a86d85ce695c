//! Data types that flow through the build and query phases.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Per-document (and per-chunk) metadata. Ordered so that equality,
/// hashing, and serialization are deterministic.
pub type Metadata = BTreeMap<String, String>;

/// Metadata key for the original source path (used as the source link).
pub const META_SOURCE: &str = "source";
/// Metadata key for the section directory name, suffix stripped.
pub const META_SECTION: &str = "section";
/// Metadata key for the page directory name, suffix stripped.
pub const META_PAGE: &str = "page";
/// Metadata key for the ISO `YYYY-MM-DD` date, or empty.
pub const META_DATE: &str = "date";
/// Metadata key for the human-readable paragraph label.
pub const META_PARAGRAPH: &str = "paragraph";

/// One ingested note file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    /// Hierarchical storage path; only read by the enricher.
    pub source_path: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_path: source_path.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// A bounded slice of a document's content plus a copy of its metadata.
///
/// Two chunks are the same chunk when both text and metadata are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// SHA-256 over the text and the sorted metadata pairs.
    ///
    /// Fields are length-prefixed so that moving bytes between the text and
    /// a metadata value cannot produce the same digest.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.text.len() as u64).to_le_bytes());
        hasher.update(self.text.as_bytes());
        for (k, v) in &self.metadata {
            hasher.update((k.len() as u64).to_le_bytes());
            hasher.update(k.as_bytes());
            hasher.update((v.len() as u64).to_le_bytes());
            hasher.update(v.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// A chunk together with its embedding, as persisted by a vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A search hit: the stored chunk and its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Paraphrases of one question. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExpansionSet {
    queries: Vec<String>,
}

impl QueryExpansionSet {
    /// Build a set from generated lines. Lines are trimmed and blank lines
    /// dropped; if nothing remains, the set holds only `question`.
    pub fn from_lines<I, S>(question: &str, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let queries: Vec<String> = lines
            .into_iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();

        if queries.is_empty() {
            Self::fallback(question)
        } else {
            Self { queries }
        }
    }

    /// The one-element set used when expansion produced nothing usable.
    pub fn fallback(question: &str) -> Self {
        Self {
            queries: vec![question.trim().to_string()],
        }
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// True when this set is exactly the fallback for `question`.
    pub fn is_fallback_for(&self, question: &str) -> bool {
        self.queries.len() == 1 && self.queries[0] == question.trim()
    }
}

/// Deduplicated chunks gathered from every search issued for one question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedContext {
    chunks: Vec<Chunk>,
    /// Number of searches issued.
    pub searches: usize,
    /// Number of searches that failed and contributed nothing.
    pub failed_searches: usize,
}

impl RetrievedContext {
    pub fn new(chunks: Vec<Chunk>, searches: usize, failed_searches: usize) -> Self {
        Self {
            chunks,
            searches,
            failed_searches,
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

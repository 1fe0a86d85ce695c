//! Storage abstraction for the persisted vector index.
//!
//! The [`VectorStore`] trait is the only thing the index needs from a
//! storage backend: describe what is stored, wipe and recreate, append
//! entries, and rank entries against a query vector.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{IndexedEntry, ScoredChunk};

/// Summary of a persisted index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    /// Embedding model the index was built with.
    pub model: String,
    /// Dimensionality of every stored embedding.
    pub dims: usize,
    /// Number of stored entries.
    pub entries: usize,
}

/// Abstract persisted storage for indexed entries.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`location`](VectorStore::location) | Human-readable storage location |
/// | [`info`](VectorStore::info) | Describe the stored index, `None` if there is none |
/// | [`reset`](VectorStore::reset) | Discard any existing index and create an empty one |
/// | [`insert`](VectorStore::insert) | Append entries, preserving order |
/// | [`search`](VectorStore::search) | Rank entries by cosine similarity |
///
/// A single process owns a location at a time; concurrent `reset` and
/// `search` on the same location is not supported.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Where the index lives (a file path, `"memory"`, ...).
    fn location(&self) -> &str;

    /// Describe the stored index. Must not create anything.
    async fn info(&self) -> Result<Option<IndexInfo>>;

    /// Delete any existing index, then create an empty one for `model`/`dims`.
    async fn reset(&self, model: &str, dims: usize) -> Result<()>;

    /// Append entries after any already stored.
    async fn insert(&self, entries: &[IndexedEntry]) -> Result<()>;

    /// Return up to `k` entries ordered by descending cosine similarity to
    /// `query_vec`. Entries with equal similarity keep insertion order.
    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;
}

/// Sort scored candidates (given in insertion order) by descending score and
/// keep the first `k`. Store implementations share this so ties break the
/// same way everywhere.
pub fn top_k(mut scored: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    // Stable sort: equal scores stay in insertion order.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

//! In-memory [`VectorStore`] implementation for tests and short-lived runs.
//!
//! Holds the whole index behind a `std::sync::RwLock`. Search is brute-force
//! cosine similarity over every stored vector.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{IndexedEntry, ScoredChunk};

use super::{top_k, IndexInfo, VectorStore};

struct StoredIndex {
    model: String,
    dims: usize,
    entries: Vec<IndexedEntry>,
}

/// Volatile vector store. Starts empty, with no index.
pub struct InMemoryStore {
    index: RwLock<Option<StoredIndex>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(None),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn location(&self) -> &str {
        "memory"
    }

    async fn info(&self) -> Result<Option<IndexInfo>> {
        let guard = self.index.read().map_err(poisoned)?;
        Ok(guard.as_ref().map(|idx| IndexInfo {
            model: idx.model.clone(),
            dims: idx.dims,
            entries: idx.entries.len(),
        }))
    }

    async fn reset(&self, model: &str, dims: usize) -> Result<()> {
        let mut guard = self.index.write().map_err(poisoned)?;
        *guard = Some(StoredIndex {
            model: model.to_string(),
            dims,
            entries: Vec::new(),
        });
        Ok(())
    }

    async fn insert(&self, entries: &[IndexedEntry]) -> Result<()> {
        let mut guard = self.index.write().map_err(poisoned)?;
        let Some(idx) = guard.as_mut() else {
            bail!("cannot insert into a store with no index; reset it first");
        };
        for entry in entries {
            if entry.embedding.len() != idx.dims {
                bail!(
                    "embedding has {} dimensions, index expects {}",
                    entry.embedding.len(),
                    idx.dims
                );
            }
        }
        idx.entries.extend_from_slice(entries);
        Ok(())
    }

    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let guard = self.index.read().map_err(poisoned)?;
        let Some(idx) = guard.as_ref() else {
            bail!("no index in memory");
        };
        let scored = idx
            .entries
            .iter()
            .map(|e| ScoredChunk {
                chunk: e.chunk.clone(),
                score: cosine_similarity(query_vec, &e.embedding),
            })
            .collect();
        Ok(top_k(scored, k))
    }
}

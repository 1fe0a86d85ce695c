//! Vector index orchestration: full rebuild, attach, and similarity search.
//!
//! The index pairs a [`VectorStore`] with the [`EmbeddingBackend`] that
//! produced its vectors. Both build and query must use the same model and
//! dimensionality; a mismatch is a configuration error.
//!
//! # Rebuild
//!
//! ```text
//! reset(model, dims) ─▶ for each batch: embed_many ─▶ check dims ─▶ insert
//! ```
//!
//! Rebuild is delete-old-then-write-new. A failure partway through leaves an
//! empty or partial index; running rebuild again recovers.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::call::bounded;
use crate::embedding::EmbeddingBackend;
use crate::error::RagError;
use crate::models::{Chunk, IndexedEntry, ScoredChunk, META_DATE, META_PARAGRAPH};
use crate::store::{IndexInfo, VectorStore};

/// Knobs for [`rebuild`].
#[derive(Debug, Clone)]
pub struct RebuildOptions {
    /// Chunks per `embed_many` call.
    pub batch_size: usize,
    /// Limit on each embedding call. `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self {
            batch_size: 64,
            call_timeout: None,
        }
    }
}

/// An attached, searchable index.
#[derive(Clone)]
pub struct IndexHandle {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingBackend>,
}

/// Discard any index in `store` and rebuild it from `chunks`.
pub async fn rebuild(
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingBackend>,
    chunks: &[Chunk],
    options: RebuildOptions,
) -> Result<IndexHandle, RagError> {
    let model = embedder.model_name().to_string();
    let dims = embedder.dims();
    if dims == 0 {
        return Err(RagError::Configuration(format!(
            "embedding model '{model}' reports 0 dimensions"
        )));
    }

    store.reset(&model, dims).await.map_err(RagError::storage)?;

    let batch_size = options.batch_size.max(1);
    let mut inserted = 0usize;
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = bounded(
            options.call_timeout,
            "embedding batch",
            embedder.embed_many(&texts),
        )
        .await
        .map_err(RagError::embedding)?;

        if vectors.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "backend returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }

        let mut entries = Vec::with_capacity(batch.len());
        for (chunk, embedding) in batch.iter().zip(vectors) {
            check_dims(&model, dims, embedding.len())?;
            entries.push(IndexedEntry {
                chunk: chunk.clone(),
                embedding,
            });
        }
        store.insert(&entries).await.map_err(RagError::storage)?;
        inserted += entries.len();
        tracing::debug!(inserted, total = chunks.len(), "embedded batch");
    }

    let dates: BTreeSet<&str> = chunks.iter().filter_map(|c| c.meta(META_DATE)).collect();
    let paragraphs: BTreeSet<&str> = chunks
        .iter()
        .filter_map(|c| c.meta(META_PARAGRAPH))
        .collect();
    tracing::info!(
        location = store.location(),
        entries = inserted,
        model = %model,
        "index rebuilt"
    );
    tracing::debug!(
        dims,
        distinct_dates = dates.len(),
        distinct_paragraphs = paragraphs.len(),
        "index contents"
    );

    Ok(IndexHandle { store, embedder })
}

/// Attach to the index already in `store` without modifying it.
///
/// # Errors
///
/// [`RagError::IndexNotFound`] when the store holds no index, and
/// [`RagError::Configuration`] when it was built with a different model or
/// dimensionality than `embedder`.
pub async fn open(
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingBackend>,
) -> Result<IndexHandle, RagError> {
    let info = store
        .info()
        .await
        .map_err(RagError::storage)?
        .ok_or_else(|| RagError::IndexNotFound(store.location().to_string()))?;

    if info.model != embedder.model_name() {
        return Err(RagError::Configuration(format!(
            "index at {} was built with embedding model '{}', but '{}' is configured; rebuild the index",
            store.location(),
            info.model,
            embedder.model_name()
        )));
    }
    if info.dims != embedder.dims() {
        return Err(RagError::Configuration(format!(
            "index at {} stores {}-dimensional vectors, but '{}' produces {}; rebuild the index",
            store.location(),
            info.dims,
            embedder.model_name(),
            embedder.dims()
        )));
    }

    tracing::debug!(location = store.location(), entries = info.entries, "index opened");
    Ok(IndexHandle { store, embedder })
}

fn check_dims(model: &str, expected: usize, got: usize) -> Result<(), RagError> {
    if got != expected {
        return Err(RagError::Configuration(format!(
            "embedding model '{model}' returned a {got}-dimensional vector, expected {expected}"
        )));
    }
    Ok(())
}

impl IndexHandle {
    /// The `k` chunks most similar to `query`, best first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>, RagError> {
        Ok(self
            .search_scored(query, k)
            .await?
            .into_iter()
            .map(|s| s.chunk)
            .collect())
    }

    /// Like [`search`](Self::search), keeping the similarity of each hit.
    pub async fn search_scored(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, RagError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed_one(query)
            .await
            .map_err(RagError::embedding)?;
        check_dims(self.embedder.model_name(), self.embedder.dims(), query_vec.len())?;
        self.store
            .search(&query_vec, k)
            .await
            .map_err(RagError::storage)
    }

    /// Model, dimensionality, and entry count of the attached index.
    pub async fn info(&self) -> Result<IndexInfo, RagError> {
        self.store
            .info()
            .await
            .map_err(RagError::storage)?
            .ok_or_else(|| RagError::IndexNotFound(self.store.location().to_string()))
    }

    pub fn location(&self) -> &str {
        self.store.location()
    }
}

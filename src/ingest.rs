//! Build-phase orchestration.
//!
//! Loads the note export, enriches and chunks it, then rebuilds the
//! persisted index from scratch:
//!
//! ```text
//! loader → enrich_all → split → rebuild (embed + SQLite)
//! ```

use anyhow::Result;
use std::sync::Arc;

use notequery_core::chunk::split;
use notequery_core::embedding::EmbeddingBackend;
use notequery_core::enrich::enrich_all;
use notequery_core::index::{rebuild, IndexHandle, RebuildOptions};

use crate::config::Config;
use crate::loader::load_documents;
use crate::provider;
use crate::sqlite_store::SqliteVectorStore;

/// Counts reported after a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub documents: usize,
    pub chunks: usize,
    pub entries: usize,
    pub model: String,
    pub dims: usize,
}

/// Rebuild the index at `config.index.path` with `embedder`.
pub async fn build_index(
    config: &Config,
    embedder: Arc<dyn EmbeddingBackend>,
) -> Result<(IndexHandle, BuildSummary)> {
    let docs = load_documents(&config.documents)?;
    let documents = docs.len();

    let docs = enrich_all(docs, &config.documents.path_convention())?;
    let chunks = split(&docs, config.chunking.size, config.chunking.overlap)?;
    tracing::info!(documents, chunks = chunks.len(), "split notes into chunks");

    let store = Arc::new(SqliteVectorStore::new(&config.index.path));
    let options = RebuildOptions {
        batch_size: config.backend.batch_size,
        call_timeout: config.retrieval.call_timeout(),
    };
    let handle = rebuild(store, embedder, &chunks, options).await?;
    let info = handle.info().await?;

    Ok((
        handle,
        BuildSummary {
            documents,
            chunks: chunks.len(),
            entries: info.entries,
            model: info.model,
            dims: info.dims,
        },
    ))
}

/// `nq build`.
pub async fn run_build(config: &Config) -> Result<()> {
    let embedder = provider::create_embedder(&config.backend)?;
    let (_, summary) = build_index(config, embedder).await?;
    print_summary(config, &summary);
    Ok(())
}

pub fn print_summary(config: &Config, summary: &BuildSummary) {
    println!("build {}", config.documents.root.display());
    println!("  documents: {}", summary.documents);
    println!("  chunks: {}", summary.chunks);
    println!("  entries written: {}", summary.entries);
    println!("  model: {} ({} dims)", summary.model, summary.dims);
    println!("  index: {}", config.index.path.display());
    println!("ok");
}

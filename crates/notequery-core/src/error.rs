//! Failure kinds surfaced by the core pipeline.
//!
//! Backend traits return `anyhow::Result`; the core converts those failures
//! into one of these kinds at its boundary so callers can decide whether to
//! rebuild, retry, or show a message. Recoverable conditions (an unparseable
//! paragraph date, a single failed expansion search) never reach this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid backend selection, bad chunking parameters, or an embedding
    /// dimensionality that does not match the index.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A query was attempted against a location that holds no index.
    #[error("no index found at {0}; run a rebuild first")]
    IndexNotFound(String),

    /// Every search issued for one question failed.
    #[error("retrieval unavailable: all {attempts} searches failed (last error: {last_error})")]
    RetrievalUnavailable { attempts: usize, last_error: String },

    /// The chat model errored or produced no usable text.
    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// A note path does not have a section and a page directory above the
    /// paragraph file.
    #[error("malformed note path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("question must not be empty")]
    EmptyQuestion,

    /// The embedding backend failed while building the index or embedding a query.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The persisted index could not be read or written.
    #[error("index storage failed: {0}")]
    Storage(String),
}

impl RagError {
    /// Wrap a storage backend failure, keeping the full context chain.
    pub fn storage(err: anyhow::Error) -> Self {
        RagError::Storage(format!("{err:#}"))
    }

    /// Wrap an embedding backend failure, keeping the full context chain.
    pub fn embedding(err: anyhow::Error) -> Self {
        RagError::Embedding(format!("{err:#}"))
    }

    /// Short machine-readable code, used by the HTTP surface.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::Configuration(_) => "configuration",
            RagError::IndexNotFound(_) => "index_not_found",
            RagError::RetrievalUnavailable { .. } => "retrieval_unavailable",
            RagError::GenerationUnavailable(_) => "generation_unavailable",
            RagError::MalformedPath { .. } => "malformed_path",
            RagError::EmptyQuestion => "bad_request",
            RagError::Embedding(_) => "embedding_failed",
            RagError::Storage(_) => "storage_failed",
        }
    }
}

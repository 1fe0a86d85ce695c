//! # notequery core
//!
//! Pipeline logic for querying an exported notebook: path-based metadata
//! enrichment, sliding-window chunking, the vector index contract, multi-query
//! retrieval, and grounded answer generation.
//!
//! This crate contains no filesystem, database, or HTTP code. Embedding
//! models, chat models, and persisted storage are reached only through the
//! [`embedding::EmbeddingBackend`], [`generate::TextGenerator`], and
//! [`store::VectorStore`] traits, so every stage can be driven by fakes in
//! tests.
//!
//! ```text
//! build:  Document ─▶ enrich ─▶ chunk ─▶ embed ─▶ VectorStore
//! query:  question ─▶ expand ─▶ retrieve (N searches) ─▶ answer
//! ```

pub mod answer;
pub mod call;
pub mod chunk;
pub mod embedding;
pub mod enrich;
pub mod error;
pub mod expand;
pub mod generate;
pub mod index;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod pipeline;
pub mod retrieve;
pub mod store;

pub use error::RagError;

//! # notequery
//!
//! Ask natural-language questions about an exported notebook.
//!
//! A notebook export lays out one directory per section, one per page, and
//! one Markdown file per paragraph. `notequery` turns that layout into
//! metadata, indexes the notes in SQLite, and answers questions with
//! multi-query retrieval-augmented generation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────┐
//! │ Note export │──▶│ Enrich+Chunk+Emb │──▶│  SQLite  │
//! │  (walkdir)  │   │ (notequery-core) │   │  index   │
//! └─────────────┘   └──────────────────┘   └────┬─────┘
//!                                               │
//!                   ┌───────────────────────────┤
//!                   ▼             ▼             ▼
//!              ┌─────────┐   ┌─────────┐   ┌─────────┐
//!              │ nq ask  │   │ nq chat │   │nq serve │
//!              └─────────┘   └─────────┘   └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! nq build                          # index ./export
//! nq status                         # model, dims, entry count
//! nq ask "When did I go to Porto?"  # one answer
//! nq chat --skip-embedding          # interactive, reuse the index
//! nq serve                          # HTTP chat on 127.0.0.1:7860
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`loader`] | Note export walker |
//! | [`sqlite_store`] | SQLite-backed vector store |
//! | [`provider`] | Ollama, OpenAI, OCI, and fastembed backends |
//! | [`ingest`] | Build-phase orchestration |
//! | [`ask`] | Query-phase assembly and one-shot answers |
//! | [`chat`] | Interactive REPL |
//! | [`server`] | HTTP chat surface |
//! | [`stats`] | Index status report |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |

pub mod ask;
pub mod chat;
pub mod config;
pub mod db;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod provider;
pub mod server;
pub mod sqlite_store;
pub mod stats;

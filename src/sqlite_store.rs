//! SQLite-backed [`VectorStore`].
//!
//! One file holds one index:
//!
//! | Table | Contents |
//! |-------|----------|
//! | `index_meta` | single row: embedding model, dims, build timestamp |
//! | `entries` | chunk text, metadata JSON, fingerprint, embedding BLOB |
//!
//! Entries are appended with an increasing rowid, which is the insertion
//! order used to break similarity ties. Search loads every vector and ranks
//! them in Rust. A missing file means "no index" and is never created by
//! [`VectorStore::info`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

use notequery_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use notequery_core::models::{Chunk, IndexedEntry, Metadata, ScoredChunk};
use notequery_core::store::{top_k, IndexInfo, VectorStore};

use crate::db;

pub struct SqliteVectorStore {
    path: PathBuf,
    location: String,
    pool: OnceCell<SqlitePool>,
}

impl SqliteVectorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let location = path.display().to_string();
        Self {
            path,
            location,
            pool: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .get_or_try_init(|| db::connect(&self.path, true))
            .await
            .with_context(|| format!("Failed to open index database {}", self.path.display()))
    }

    /// Pool for read paths; `None` when there is nothing to read yet.
    async fn existing_pool(&self) -> Result<Option<&SqlitePool>> {
        if self.pool.get().is_none() && !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(self.pool().await?))
    }

    /// When the index was last rebuilt.
    pub async fn built_at(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(pool) = self.existing_pool().await? else {
            return Ok(None);
        };
        if !has_index_tables(pool).await? {
            return Ok(None);
        }
        let ts: Option<i64> = sqlx::query_scalar("SELECT built_at FROM index_meta WHERE id = 1")
            .fetch_optional(pool)
            .await?;
        Ok(ts.and_then(|t| DateTime::from_timestamp(t, 0)))
    }
}

async fn has_index_tables(pool: &SqlitePool) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('index_meta', 'entries')",
    )
    .fetch_one(pool)
    .await?;
    Ok(count == 2)
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn location(&self) -> &str {
        &self.location
    }

    async fn info(&self) -> Result<Option<IndexInfo>> {
        let Some(pool) = self.existing_pool().await? else {
            return Ok(None);
        };
        if !has_index_tables(pool).await? {
            return Ok(None);
        }

        let meta = sqlx::query("SELECT model, dims FROM index_meta WHERE id = 1")
            .fetch_optional(pool)
            .await?;
        let Some(meta) = meta else {
            return Ok(None);
        };

        let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(pool)
            .await?;

        Ok(Some(IndexInfo {
            model: meta.get("model"),
            dims: meta.get::<i64, _>("dims") as usize,
            entries: entries as usize,
        }))
    }

    async fn reset(&self, model: &str, dims: usize) -> Result<()> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        sqlx::query("DROP TABLE IF EXISTS entries")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DROP TABLE IF EXISTS index_meta")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE index_meta (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                model TEXT NOT NULL,
                dims INTEGER NOT NULL,
                built_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fingerprint TEXT NOT NULL,
                text TEXT NOT NULL,
                metadata_json TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO index_meta (id, model, dims, built_at) VALUES (1, ?, ?, ?)")
            .bind(model)
            .bind(dims as i64)
            .bind(Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(path = %self.path.display(), model, dims, "index reset");
        Ok(())
    }

    async fn insert(&self, entries: &[IndexedEntry]) -> Result<()> {
        let pool = self.pool().await?;
        let dims: Option<i64> = if has_index_tables(pool).await? {
            sqlx::query_scalar("SELECT dims FROM index_meta WHERE id = 1")
                .fetch_optional(pool)
                .await?
        } else {
            None
        };
        let Some(dims) = dims else {
            bail!("cannot insert into {}: no index; reset it first", self.location);
        };

        let mut tx = pool.begin().await?;
        for entry in entries {
            if entry.embedding.len() as i64 != dims {
                bail!(
                    "embedding has {} dimensions, index expects {}",
                    entry.embedding.len(),
                    dims
                );
            }
            let metadata_json = serde_json::to_string(&entry.chunk.metadata)?;
            sqlx::query(
                "INSERT INTO entries (fingerprint, text, metadata_json, embedding) VALUES (?, ?, ?, ?)",
            )
            .bind(entry.chunk.fingerprint())
            .bind(&entry.chunk.text)
            .bind(metadata_json)
            .bind(vec_to_blob(&entry.embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let Some(pool) = self.existing_pool().await? else {
            bail!("no index at {}", self.location);
        };

        let rows = sqlx::query("SELECT text, metadata_json, embedding FROM entries ORDER BY id")
            .fetch_all(pool)
            .await
            .with_context(|| format!("Failed to read entries from {}", self.location))?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            let metadata: Metadata = serde_json::from_str(&metadata_json)
                .with_context(|| "Corrupt metadata in index entry")?;
            scored.push(ScoredChunk {
                chunk: Chunk::new(row.get::<String, _>("text"), metadata),
                score: cosine_similarity(query_vec, &blob_to_vec(&blob)),
            });
        }

        Ok(top_k(scored, k))
    }
}

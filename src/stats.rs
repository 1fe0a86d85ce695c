//! `nq status`: what the persisted index holds.

use anyhow::Result;

use notequery_core::store::VectorStore;
use notequery_core::RagError;

use crate::config::Config;
use crate::sqlite_store::SqliteVectorStore;

pub async fn run_status(config: &Config) -> Result<()> {
    let store = SqliteVectorStore::new(&config.index.path);
    let info = store
        .info()
        .await?
        .ok_or_else(|| RagError::IndexNotFound(store.location().to_string()))?;

    let size = std::fs::metadata(store.path()).map(|m| m.len()).unwrap_or(0);
    let built = store
        .built_at()
        .await?
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("notequery index");
    println!("===============");
    println!();
    println!("  Location:    {}", store.location());
    println!("  Size:        {}", format_bytes(size));
    println!("  Built:       {}", built);
    println!();
    println!("  Model:       {}", info.model);
    println!("  Dimensions:  {}", info.dims);
    println!("  Entries:     {}", info.entries);

    let configured = config.backend.embedding_model();
    if configured != info.model {
        println!();
        println!(
            "  warning: configured embedding model is '{}'; run `nq build` before querying",
            configured
        );
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

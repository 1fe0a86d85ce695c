//! Note export loader.
//!
//! Walks `documents.root`, applies include/exclude globs, and reads every
//! matching file as a [`Document`]. The path handed to the enricher is the
//! file's path including the root, so `source` links resolve on disk; the
//! enricher strips `documents.root` again before counting section/page levels.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use notequery_core::models::Document;

use crate::config::DocumentsConfig;

pub fn load_documents(config: &DocumentsConfig) -> Result<Vec<Document>> {
    let root = &config.root;
    if !root.is_dir() {
        bail!("Documents root does not exist or is not a directory: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut docs = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable note");
                continue;
            }
        };
        docs.push(Document::new(content, path.to_string_lossy().to_string()));
    }

    // Sort for deterministic builds
    docs.sort_by(|a, b| a.source_path.cmp(&b.source_path));

    tracing::info!(root = %root.display(), documents = docs.len(), "loaded notes");
    Ok(docs)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {pattern}"))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write(root: &Path, rel: &str, body: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, body).unwrap();
    }

    fn config(root: &Path) -> DocumentsConfig {
        DocumentsConfig {
            root: root.to_path_buf(),
            ..DocumentsConfig::default()
        }
    }

    #[test]
    fn test_loads_markdown_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Notes section/Trip page/2021-03-06.md", "b");
        write(dir.path(), "Notes section/Trip page/2021-03-05.md", "a");
        write(dir.path(), "Notes section/Trip page/photo.png", "x");
        write(dir.path(), ".git/Notes section/x page/HEAD.md", "x");

        let docs = load_documents(&config(dir.path())).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "a");
        assert!(docs[0].source_path.ends_with("2021-03-05.md"));
        assert!(docs[0].source_path.contains("Trip page"));
    }

    #[test]
    fn test_exclude_globs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Notes section/Trip page/a.md", "a");
        write(dir.path(), "Archive section/Old page/b.md", "b");
        let mut cfg = config(dir.path());
        cfg.exclude_globs = vec!["Archive section/**".to_string()];
        let docs = load_documents(&cfg).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "a");
    }

    #[test]
    fn test_missing_root() {
        let cfg = config(Path::new("/definitely/not/here"));
        assert!(load_documents(&cfg).is_err());
    }
}

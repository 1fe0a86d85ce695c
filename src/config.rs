//! TOML configuration.
//!
//! [`load_config`] reads, validates, and resolves secrets exactly once; the
//! resulting [`Config`] is passed by reference into every component. Nothing
//! else reads the environment.
//!
//! ```toml
//! [index]
//! path = "vector_db/notes.sqlite"
//!
//! [documents]
//! root = "./export"
//!
//! [chunking]
//! size = 1000
//! overlap = 200
//!
//! [retrieval]
//! expansions = 5
//! k_per_query = 4
//!
//! [backend]
//! provider = "ollama"          # ollama | openai | oci
//!
//! [server]
//! bind = "127.0.0.1:7860"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notequery_core::enrich::PathConvention;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("vector_db/notes.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_section_suffix")]
    pub section_suffix: String,
    #[serde(default = "default_page_suffix")]
    pub page_suffix: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            section_suffix: default_section_suffix(),
            page_suffix: default_page_suffix(),
        }
    }
}

impl DocumentsConfig {
    pub fn path_convention(&self) -> PathConvention {
        PathConvention {
            section_suffix: self.section_suffix.clone(),
            page_suffix: self.page_suffix.clone(),
            root: self.root.to_string_lossy().to_string(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./export")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}
fn default_section_suffix() -> String {
    " section".to_string()
}
fn default_page_suffix() -> String {
    " page".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_expansions")]
    pub expansions: usize,
    #[serde(default = "default_k_per_query")]
    pub k_per_query: usize,
    /// Cap on each expansion, search, and answer call. 0 disables the cap.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            expansions: default_expansions(),
            k_per_query: default_k_per_query(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl RetrievalConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs))
    }
}

fn default_expansions() -> usize {
    5
}
fn default_k_per_query() -> usize {
    4
}
fn default_call_timeout_secs() -> u64 {
    120
}

/// Which model provider to use, and how to reach it.
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Embedding provider when it differs from `provider`.
    #[serde(default)]
    pub embedding_provider: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub chat_model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL (Ollama, OpenAI-compatible) or inference endpoint (OCI).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub compartment_id: Option<String>,
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Resolved from `api_key_env` by [`load_config`].
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Resolved from `auth_token_env` by [`load_config`].
    #[serde(skip)]
    pub auth_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            embedding_provider: None,
            embedding_model: None,
            chat_model: None,
            dims: None,
            url: None,
            api_key_env: default_api_key_env(),
            compartment_id: None,
            auth_token_env: default_auth_token_env(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
            auth_token: None,
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_auth_token_env() -> String {
    "OCI_AUTH_TOKEN".to_string()
}
fn default_temperature() -> f32 {
    0.8
}
fn default_top_p() -> f32 {
    0.9
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

pub const CHAT_PROVIDERS: &[&str] = &["ollama", "openai", "oci"];
pub const EMBEDDING_PROVIDERS: &[&str] = &["ollama", "openai", "oci", "fastembed"];

impl BackendConfig {
    pub fn embedding_provider(&self) -> &str {
        self.embedding_provider.as_deref().unwrap_or(&self.provider)
    }

    pub fn embedding_model(&self) -> String {
        self.embedding_model
            .clone()
            .unwrap_or_else(|| default_embedding_model(self.embedding_provider()).to_string())
    }

    pub fn chat_model(&self) -> String {
        self.chat_model
            .clone()
            .unwrap_or_else(|| default_chat_model(&self.provider).to_string())
    }

    /// Configured dims, else the known size of the embedding model.
    pub fn embedding_dims(&self) -> Option<usize> {
        self.dims.or_else(|| known_dims(&self.embedding_model()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn default_embedding_model(provider: &str) -> &'static str {
    match provider {
        "openai" => "text-embedding-ada-002",
        "oci" => "cohere.embed-english-v3.0",
        "fastembed" => "all-minilm-l6-v2",
        _ => "nomic-embed-text",
    }
}

pub fn default_chat_model(provider: &str) -> &'static str {
    match provider {
        "openai" => "gpt-4o-mini",
        "oci" => "cohere.command-r-08-2024",
        _ => "phi3:3.8b",
    }
}

fn known_dims(model: &str) -> Option<usize> {
    match model {
        "nomic-embed-text" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => Some(768),
        "mxbai-embed-large" => Some(1024),
        "all-minilm" | "all-minilm-l6-v2" | "bge-small-en-v1.5" => Some(384),
        "bge-base-en-v1.5" => Some(768),
        "bge-large-en-v1.5" => Some(1024),
        "text-embedding-ada-002" | "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "cohere.embed-english-v3.0" | "cohere.embed-multilingual-v3.0" => Some(1024),
        "cohere.embed-english-light-v3.0" => Some(384),
        _ => None,
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7860".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content).with_context(|| "Failed to parse config file")?;

    config.backend.api_key = non_empty_env(&config.backend.api_key_env);
    config.backend.auth_token = non_empty_env(&config.backend.auth_token_env);

    Ok(config)
}

/// Parse and validate TOML without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.size == 0 {
        bail!("chunking.size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.size {
        bail!(
            "chunking.overlap ({}) must be smaller than chunking.size ({})",
            config.chunking.overlap,
            config.chunking.size
        );
    }

    // Validate retrieval
    if config.retrieval.expansions == 0 {
        bail!("retrieval.expansions must be >= 1");
    }
    if config.retrieval.k_per_query == 0 {
        bail!("retrieval.k_per_query must be >= 1");
    }

    // Validate backend
    let backend = &config.backend;
    if !CHAT_PROVIDERS.contains(&backend.provider.as_str()) {
        bail!(
            "Unknown backend provider: '{}'. Must be ollama, openai, or oci.",
            backend.provider
        );
    }
    if !EMBEDDING_PROVIDERS.contains(&backend.embedding_provider()) {
        bail!(
            "Unknown embedding provider: '{}'. Must be ollama, openai, oci, or fastembed.",
            backend.embedding_provider()
        );
    }
    if backend.dims == Some(0) {
        bail!("backend.dims must be > 0");
    }
    if backend.batch_size == 0 {
        bail!("backend.batch_size must be > 0");
    }
    if !(0.0..=1.0).contains(&backend.top_p) {
        bail!("backend.top_p must be in [0.0, 1.0]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.index.path, PathBuf::from("vector_db/notes.sqlite"));
        assert_eq!(cfg.chunking.size, 1000);
        assert_eq!(cfg.chunking.overlap, 200);
        assert_eq!(cfg.retrieval.expansions, 5);
        assert_eq!(cfg.retrieval.call_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(cfg.backend.provider, "ollama");
        assert_eq!(cfg.backend.embedding_model(), "nomic-embed-text");
        assert_eq!(cfg.backend.chat_model(), "phi3:3.8b");
        assert_eq!(cfg.backend.embedding_dims(), Some(768));
        assert_eq!(cfg.server.bind, "127.0.0.1:7860");
        let conv = cfg.documents.path_convention();
        assert_eq!(conv.section_suffix, PathConvention::default().section_suffix);
        assert_eq!(conv.page_suffix, PathConvention::default().page_suffix);
        assert_eq!(conv.root, "./export");
    }

    #[test]
    fn test_provider_model_defaults() {
        let cfg = parse_config("[backend]\nprovider = \"oci\"\n").unwrap();
        assert_eq!(cfg.backend.embedding_model(), "cohere.embed-english-v3.0");
        assert_eq!(cfg.backend.chat_model(), "cohere.command-r-08-2024");
        assert_eq!(cfg.backend.embedding_dims(), Some(1024));

        let cfg = parse_config(
            "[backend]\nprovider = \"openai\"\nembedding_provider = \"fastembed\"\n",
        )
        .unwrap();
        assert_eq!(cfg.backend.embedding_provider(), "fastembed");
        assert_eq!(cfg.backend.embedding_model(), "all-minilm-l6-v2");
        assert_eq!(cfg.backend.embedding_dims(), Some(384));
        assert_eq!(cfg.backend.chat_model(), "gpt-4o-mini");
    }

    #[test]
    fn test_unknown_model_needs_dims() {
        let cfg = parse_config("[backend]\nembedding_model = \"custom\"\n").unwrap();
        assert_eq!(cfg.backend.embedding_dims(), None);
        let cfg = parse_config("[backend]\nembedding_model = \"custom\"\ndims = 12\n").unwrap();
        assert_eq!(cfg.backend.embedding_dims(), Some(12));
    }

    #[test]
    fn test_rejects_invalid_values() {
        for bad in [
            "[chunking]\nsize = 0\noverlap = 0\n",
            "[chunking]\nsize = 100\noverlap = 100\n",
            "[retrieval]\nexpansions = 0\n",
            "[retrieval]\nk_per_query = 0\n",
            "[backend]\nprovider = \"gradio\"\n",
            "[backend]\nembedding_provider = \"bogus\"\n",
            "[backend]\ndims = 0\n",
        ] {
            assert!(parse_config(bad).is_err(), "accepted: {bad}");
        }
    }

    #[test]
    fn test_zero_call_timeout_disables_cap() {
        let cfg = parse_config("[retrieval]\ncall_timeout_secs = 0\n").unwrap();
        assert_eq!(cfg.retrieval.call_timeout(), None);
    }

    #[test]
    fn test_load_config_resolves_secret_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nq.toml");
        std::fs::write(
            &path,
            "[backend]\nprovider = \"openai\"\napi_key_env = \"NQ_TEST_KEY_RESOLVE\"\n",
        )
        .unwrap();
        std::env::set_var("NQ_TEST_KEY_RESOLVE", "sk-test");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.backend.api_key.as_deref(), Some("sk-test"));
        std::env::remove_var("NQ_TEST_KEY_RESOLVE");
    }

    #[test]
    fn test_missing_file_error() {
        let err = load_config(Path::new("/nonexistent/nq.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}

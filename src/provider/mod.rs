//! Concrete embedding and chat backends, chosen once at startup.
//!
//! | Provider | Embeddings | Chat |
//! |----------|-----------|------|
//! | `ollama` | [`ollama::OllamaEmbedder`] | [`ollama::OllamaChat`] |
//! | `openai` | [`openai::OpenAiEmbedder`] | [`openai::OpenAiChat`] |
//! | `oci` | [`oci::OciEmbedder`] | [`oci::OciChat`] |
//! | `fastembed` | `local::FastembedEmbedder` (feature `local-embeddings-fastembed`) | n/a |
//!
//! Everything downstream sees only the `EmbeddingBackend` and
//! `TextGenerator` traits.

pub mod http;
#[cfg(feature = "local-embeddings-fastembed")]
pub mod local;
pub mod oci;
pub mod ollama;
pub mod openai;

use anyhow::Result;
use std::sync::Arc;

use notequery_core::embedding::EmbeddingBackend;
use notequery_core::generate::TextGenerator;
use notequery_core::RagError;

use crate::config::BackendConfig;

/// Build the embedding backend selected by `backend.embedding_provider`
/// (falling back to `backend.provider`).
///
/// # Errors
///
/// A [`RagError::Configuration`] when credentials or dimensions are missing
/// or the provider is not compiled in.
pub fn create_embedder(config: &BackendConfig) -> Result<Arc<dyn EmbeddingBackend>> {
    let model = config.embedding_model();
    let dims = config.embedding_dims().ok_or_else(|| {
        RagError::Configuration(format!(
            "backend.dims is required for embedding model '{model}'"
        ))
    })?;

    tracing::debug!(provider = config.embedding_provider(), %model, dims, "creating embedder");
    match config.embedding_provider() {
        "ollama" => Ok(Arc::new(ollama::OllamaEmbedder::new(config, model, dims)?)),
        "openai" => Ok(Arc::new(openai::OpenAiEmbedder::new(config, model, dims)?)),
        "oci" => Ok(Arc::new(oci::OciEmbedder::new(config, model, dims)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "fastembed" => Ok(Arc::new(local::FastembedEmbedder::new(
            model,
            dims,
            config.batch_size,
        )?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "fastembed" => Err(RagError::Configuration(
            "the fastembed provider requires --features local-embeddings-fastembed".into(),
        )
        .into()),
        other => Err(RagError::Configuration(format!("Unknown embedding provider: {other}")).into()),
    }
}

/// Build the chat model selected by `backend.provider`. Query expansion and
/// answering share it.
pub fn create_generator(config: &BackendConfig) -> Result<Arc<dyn TextGenerator>> {
    let model = config.chat_model();
    tracing::debug!(provider = %config.provider, %model, "creating chat model");
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(ollama::OllamaChat::new(config, model)?)),
        "openai" => Ok(Arc::new(openai::OpenAiChat::new(config, model)?)),
        "oci" => Ok(Arc::new(oci::OciChat::new(config, model)?)),
        other => Err(RagError::Configuration(format!("Unknown backend provider: {other}")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_needs_no_credentials() {
        let cfg = BackendConfig::default();
        let e = create_embedder(&cfg).unwrap();
        assert_eq!(e.model_name(), "nomic-embed-text");
        assert_eq!(e.dims(), 768);
        let g = create_generator(&cfg).unwrap();
        assert_eq!(g.model_name(), "phi3:3.8b");
    }

    #[test]
    fn test_unknown_model_without_dims() {
        let cfg = BackendConfig {
            embedding_model: Some("my-embedder".to_string()),
            ..BackendConfig::default()
        };
        let err = create_embedder(&cfg).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_openai_with_key() {
        let cfg = BackendConfig {
            provider: "openai".to_string(),
            api_key: Some("sk-test".to_string()),
            ..BackendConfig::default()
        };
        assert_eq!(create_embedder(&cfg).unwrap().dims(), 1536);
        assert_eq!(create_generator(&cfg).unwrap().model_name(), "gpt-4o-mini");
    }
}

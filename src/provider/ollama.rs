//! Local models served by an Ollama instance.
//!
//! Embeddings go to `POST /api/embed`, chat to `POST /api/chat` with
//! streaming disabled. Requires the models to be pulled first
//! (`ollama pull nomic-embed-text`, `ollama pull phi3:3.8b`).

use anyhow::Result;
use async_trait::async_trait;

use notequery_core::embedding::EmbeddingBackend;
use notequery_core::generate::TextGenerator;

use super::http::{self, JsonPost};
use crate::config::BackendConfig;

pub const DEFAULT_URL: &str = "http://localhost:11434";

fn base_url(config: &BackendConfig) -> String {
    config
        .url
        .as_deref()
        .unwrap_or(DEFAULT_URL)
        .trim_end_matches('/')
        .to_string()
}

pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &BackendConfig, model: String, dims: usize) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout())?,
            url: base_url(config),
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let post = JsonPost::new("Ollama", format!("{}/api/embed", self.url), &body)?;
        let json = http::send_with_retry(&self.client, &post, self.max_retries).await?;
        parse_embed_response(&json)
    }
}

fn parse_embed_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| http::json_vector(e, "Ollama"))
        .collect()
}

pub struct OllamaChat {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl OllamaChat {
    pub fn new(config: &BackendConfig, model: String) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout())?,
            url: base_url(config),
            model,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "top_p": self.top_p,
                "num_predict": self.max_tokens,
            },
        });
        let post = JsonPost::new("Ollama", format!("{}/api/chat", self.url), &body)?;
        let json = http::send_with_retry(&self.client, &post, self.max_retries).await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))
}

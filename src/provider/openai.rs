//! Hosted models behind the OpenAI API (or any compatible server).

use anyhow::Result;
use async_trait::async_trait;

use notequery_core::embedding::EmbeddingBackend;
use notequery_core::generate::TextGenerator;
use notequery_core::RagError;

use super::http::{self, JsonPost};
use crate::config::BackendConfig;

pub const DEFAULT_URL: &str = "https://api.openai.com";

struct Endpoint {
    client: reqwest::Client,
    url: String,
    api_key: String,
    max_retries: u32,
}

impl Endpoint {
    fn new(config: &BackendConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            RagError::Configuration(format!(
                "{} environment variable not set (required by the openai backend)",
                config.api_key_env
            ))
        })?;
        Ok(Self {
            client: http::client(config.timeout())?,
            url: config
                .url
                .as_deref()
                .unwrap_or(DEFAULT_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let post = JsonPost::new("OpenAI", format!("{}{}", self.url, path), body)?.bearer(&self.api_key)?;
        http::send_with_retry(&self.client, &post, self.max_retries).await
    }
}

pub struct OpenAiEmbedder {
    endpoint: Endpoint,
    model: String,
    dims: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &BackendConfig, model: String, dims: usize) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new(config)?,
            model,
            dims,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbedder {
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
        let json = self.endpoint.post("/v1/embeddings", &body).await?;
        parse_embeddings_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, http::json_vector(embedding, "OpenAI")?));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

pub struct OpenAiChat {
    endpoint: Endpoint,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl OpenAiChat {
    pub fn new(config: &BackendConfig, model: String) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new(config)?,
            model,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "top_p": self.top_p,
            "max_tokens": self.max_tokens,
        });
        let json = self.endpoint.post("/v1/chat/completions", &body).await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embeddings_sorted_by_index() {
        let v = parse_embeddings_response(&json!({
            "data": [
                {"index": 1, "embedding": [2.0]},
                {"index": 0, "embedding": [1.0]}
            ]
        }))
        .unwrap();
        assert_eq!(v, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_chat_content() {
        let text = parse_chat_response(&json!({
            "choices": [{"message": {"role": "assistant", "content": "On 2021-03-05."}}]
        }))
        .unwrap();
        assert_eq!(text, "On 2021-03-05.");
        assert!(parse_chat_response(&json!({"choices": []})).is_err());
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let cfg = BackendConfig {
            provider: "openai".to_string(),
            ..BackendConfig::default()
        };
        let err = OpenAiChat::new(&cfg, "gpt-4o-mini".to_string()).err().unwrap();
        let rag = err.downcast_ref::<RagError>().unwrap();
        assert!(matches!(rag, RagError::Configuration(m) if m.contains("OPENAI_API_KEY")));
    }
}

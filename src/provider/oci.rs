//! OCI Generative AI (Cohere models, on-demand serving).
//!
//! Requests are authorized through a [`RequestAuthorizer`]. Obtaining OCI
//! credentials (API-key signing, session tokens, instance principals) happens
//! outside this crate; the shipped [`TokenAuthorizer`] attaches a token
//! that was obtained beforehand and exported via `backend.auth_token_env`.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::sync::Arc;

use notequery_core::embedding::EmbeddingBackend;
use notequery_core::generate::TextGenerator;
use notequery_core::RagError;

use super::http::{self, JsonPost};
use crate::config::BackendConfig;

pub const DEFAULT_ENDPOINT: &str = "https://inference.generativeai.us-chicago-1.oci.oraclecloud.com";
const API_VERSION: &str = "20231130";

/// Adds whatever headers the service needs to accept a request.
pub trait RequestAuthorizer: Send + Sync {
    fn authorize(&self, url: &str, body: &[u8], headers: &mut HeaderMap) -> Result<()>;
}

/// Attaches `Authorization: Bearer <token>`.
pub struct TokenAuthorizer {
    token: String,
}

impl TokenAuthorizer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl RequestAuthorizer for TokenAuthorizer {
    fn authorize(&self, _url: &str, _body: &[u8], headers: &mut HeaderMap) -> Result<()> {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))?,
        );
        Ok(())
    }
}

struct Endpoint {
    client: reqwest::Client,
    endpoint: String,
    compartment_id: String,
    authorizer: Arc<dyn RequestAuthorizer>,
    max_retries: u32,
}

impl Endpoint {
    fn new(config: &BackendConfig) -> Result<Self> {
        let compartment_id = config.compartment_id.clone().ok_or_else(|| {
            RagError::Configuration("backend.compartment_id is required by the oci backend".into())
        })?;
        let token = config.auth_token.clone().ok_or_else(|| {
            RagError::Configuration(format!(
                "{} environment variable not set (required by the oci backend)",
                config.auth_token_env
            ))
        })?;
        Self::with_authorizer(config, compartment_id, Arc::new(TokenAuthorizer::new(token)))
    }

    fn with_authorizer(
        config: &BackendConfig,
        compartment_id: String,
        authorizer: Arc<dyn RequestAuthorizer>,
    ) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout())?,
            endpoint: config
                .url
                .as_deref()
                .unwrap_or(DEFAULT_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
            compartment_id,
            authorizer,
            max_retries: config.max_retries,
        })
    }

    fn serving_mode(model: &str) -> serde_json::Value {
        serde_json::json!({ "servingType": "ON_DEMAND", "modelId": model })
    }

    async fn post(&self, action: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{}/actions/{}", self.endpoint, API_VERSION, action);
        let mut post = JsonPost::new("OCI Generative AI", url, body)?;
        self.authorizer
            .authorize(&post.url, &post.body, &mut post.headers)?;
        http::send_with_retry(&self.client, &post, self.max_retries).await
    }
}

pub struct OciEmbedder {
    endpoint: Endpoint,
    model: String,
    dims: usize,
}

impl OciEmbedder {
    pub fn new(config: &BackendConfig, model: String, dims: usize) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new(config)?,
            model,
            dims,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OciEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "inputs": texts,
            "servingMode": Endpoint::serving_mode(&self.model),
            "compartmentId": self.endpoint.compartment_id,
            "truncate": "END",
        });
        let json = self.endpoint.post("embedText", &body).await?;
        parse_embed_response(&json)
    }
}

fn parse_embed_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OCI response: missing embeddings array"))?
        .iter()
        .map(|e| http::json_vector(e, "OCI"))
        .collect()
}

pub struct OciChat {
    endpoint: Endpoint,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl OciChat {
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
impl TextGenerator for OciChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "compartmentId": self.endpoint.compartment_id,
            "servingMode": Endpoint::serving_mode(&self.model),
            "chatRequest": {
                "apiFormat": "COHERE",
                "message": prompt,
                "maxTokens": self.max_tokens,
                "temperature": self.temperature,
                "topP": self.top_p,
                "isStream": false,
            },
        });
        let json = self.endpoint.post("chat", &body).await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/chatResponse/text")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OCI response: missing chatResponse.text"))
}

//! Deterministic fake backends for tests.
//!
//! Enabled inside this crate's own tests and, for other crates, through the
//! `mock` feature.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::EmbeddingBackend;
use crate::generate::TextGenerator;

/// Hashed bag-of-words embedder.
///
/// Each lowercase alphanumeric word is hashed (FNV-1a) into one of `dims`
/// buckets, so texts sharing words get a high cosine similarity and the
/// same text always maps to the same vector.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub model: String,
    pub dims: usize,
    /// Texts containing any of these substrings make the whole call fail.
    pub fail_on: Vec<String>,
    /// Milliseconds to sleep before answering.
    pub delay_ms: u64,
    /// Length of returned vectors when it should disagree with `dims`.
    pub output_dims: Option<usize>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            model: "mock-embed".into(),
            dims: 64,
            fail_on: Vec::new(),
            delay_ms: 0,
            output_dims: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    #[must_use]
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on.push(needle.to_string());
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Keep reporting `dims` but return vectors of length `len`.
    #[must_use]
    pub fn with_output_dims(mut self, len: usize) -> Self {
        self.output_dims = Some(len);
        self
    }

    /// Number of `embed_many` calls made so far (across clones).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this embedder produces for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        if self.dims == 0 {
            return v;
        }
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = (fnv1a(&word.to_lowercase()) % self.dims as u64) as usize;
            v[bucket] += 1.0;
        }
        v
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in s.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingBackend for MockEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        for text in texts {
            if let Some(needle) = self.fail_on.iter().find(|n| text.contains(n.as_str())) {
                bail!("mock embedding error for text containing '{needle}'");
            }
        }
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = self.vector_for(t);
                if let Some(len) = self.output_dims {
                    v.resize(len, 0.0);
                }
                v
            })
            .collect())
    }
}

/// Scripted text generator.
///
/// Returns queued responses in order, then `default_response` once the
/// queue is empty. Every prompt it receives is recorded.
#[derive(Debug, Clone)]
pub struct MockGenerator {
    responses: Arc<Mutex<VecDeque<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    pub fail: bool,
    /// Milliseconds to sleep before answering.
    pub delay_ms: u64,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            fail: false,
            delay_ms: 0,
        }
    }
}

impl MockGenerator {
    #[must_use]
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Into::into).collect())),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_default(mut self, response: &str) -> Self {
        self.default_response = response.to_string();
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Prompts received so far, oldest first (shared across clones).
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    fn model_name(&self) -> &str {
        "mock-chat"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail {
            bail!("mock generation error");
        }
        let next = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        Ok(next.unwrap_or_else(|| self.default_response.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[tokio::test]
    async fn test_embedder_is_deterministic_and_lexical() {
        let e = MockEmbedder::new(32);
        let a = e.embed_one("Trip to Lisbon").await.unwrap();
        let b = e.embed_one("trip to lisbon").await.unwrap();
        let c = e.embed_one("grocery list").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
        assert_eq!(e.calls(), 3);
    }

    #[tokio::test]
    async fn test_embedder_fail_on() {
        let e = MockEmbedder::new(8).failing_on("boom");
        assert!(e.embed_one("all fine").await.is_ok());
        assert!(e.embed_one("this goes boom").await.is_err());
    }

    #[tokio::test]
    async fn test_generator_script_then_default() {
        let g = MockGenerator::with_responses(["first"]).with_default("after");
        assert_eq!(g.generate("p1").await.unwrap(), "first");
        assert_eq!(g.generate("p2").await.unwrap(), "after");
        assert_eq!(g.prompts(), vec!["p1".to_string(), "p2".to_string()]);
    }

    #[tokio::test]
    async fn test_generator_failing() {
        let g = MockGenerator::failing();
        assert!(g.generate("p").await.is_err());
        assert_eq!(g.prompts().len(), 1);
    }
}

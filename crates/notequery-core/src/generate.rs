//! Text generation trait shared by the query expander and the answer step.

use anyhow::Result;
use async_trait::async_trait;

/// A single-turn prompt-in, text-out model.
///
/// The same capability backs both query expansion and answer generation;
/// implementations may point them at different models.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

//! Multi-query expansion: ask a text generator for paraphrases of the
//! user's question so retrieval is less sensitive to wording.

use std::sync::Arc;
use std::time::Duration;

use crate::call::bounded;
use crate::generate::TextGenerator;
use crate::models::QueryExpansionSet;

/// Default instruction. `{count}` and `{question}` are substituted.
pub const DEFAULT_TEMPLATE: &str = "You are an AI language model assistant. Your task is to generate {count} \
different versions of the given user question to retrieve relevant documents from a vector \
database. By generating multiple perspectives on the user question, your goal is to help \
the user overcome some of the limitations of the distance-based similarity search. \
Provide these alternative questions separated by newlines.\n\
Original question: {question}";

pub struct QueryExpander {
    generator: Arc<dyn TextGenerator>,
    count: usize,
    template: String,
    call_timeout: Option<Duration>,
}

impl QueryExpander {
    pub fn new(generator: Arc<dyn TextGenerator>, count: usize) -> Self {
        Self {
            generator,
            count,
            template: DEFAULT_TEMPLATE.to_string(),
            call_timeout: None,
        }
    }

    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    #[must_use]
    pub fn with_call_timeout(mut self, limit: Option<Duration>) -> Self {
        self.call_timeout = limit;
        self
    }

    pub fn prompt_for(&self, question: &str) -> String {
        self.template
            .replace("{count}", &self.count.to_string())
            .replace("{question}", question.trim())
    }

    /// Paraphrase `question`.
    ///
    /// Never fails: a generator error, a timeout, or output with no
    /// non-blank lines all yield the one-element set holding `question`.
    pub async fn expand(&self, question: &str) -> QueryExpansionSet {
        let prompt = self.prompt_for(question);
        match bounded(
            self.call_timeout,
            "query expansion",
            self.generator.generate(&prompt),
        )
        .await
        {
            Ok(output) => {
                let set = parse_expansions(question, &output);
                if set.is_fallback_for(question) {
                    tracing::debug!("expansion produced no usable lines; using the question alone");
                } else {
                    tracing::debug!(expansions = set.len(), "expanded question");
                }
                set
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "query expansion failed; using the question alone");
                QueryExpansionSet::fallback(question)
            }
        }
    }
}

/// Split generator output on line breaks, trimming and dropping blank lines.
pub fn parse_expansions(question: &str, output: &str) -> QueryExpansionSet {
    QueryExpansionSet::from_lines(question, output.lines())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGenerator;

    #[test]
    fn test_parse_preserves_order() {
        let set = parse_expansions("q", "first\r\n\n  second  \nthird\n");
        assert_eq!(
            set.queries(),
            &["first".to_string(), "second".to_string(), "third".to_string()]
        );
    }

    #[test]
    fn test_prompt_contains_count_and_question() {
        let g = Arc::new(MockGenerator::default());
        let e = QueryExpander::new(g, 3);
        let p = e.prompt_for("  When was the trip?  ");
        assert!(p.contains("generate 3 different versions"));
        assert!(p.ends_with("Original question: When was the trip?"));
    }

    #[tokio::test]
    async fn test_expand_uses_generator_lines() {
        let g = MockGenerator::with_responses(["What trips did I take?\nWhere did I travel?"]);
        let e = QueryExpander::new(Arc::new(g.clone()), 5);
        let set = e.expand("trips?").await;
        assert_eq!(set.len(), 2);
        assert_eq!(g.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_output_falls_back() {
        let g = MockGenerator::with_responses(["\n   \n\t\n"]);
        let e = QueryExpander::new(Arc::new(g), 5);
        let set = e.expand("What is on my todo list?").await;
        assert!(set.is_fallback_for("What is on my todo list?"));
        assert_eq!(set.queries(), &["What is on my todo list?".to_string()]);
    }

    #[tokio::test]
    async fn test_generator_error_falls_back() {
        let e = QueryExpander::new(Arc::new(MockGenerator::failing()), 5);
        let set = e.expand("ideas").await;
        assert!(set.is_fallback_for("ideas"));
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let g = MockGenerator::with_responses(["late"]).with_delay(200);
        let e = QueryExpander::new(Arc::new(g), 5)
            .with_call_timeout(Some(Duration::from_millis(10)));
        let set = e.expand("ideas").await;
        assert!(set.is_fallback_for("ideas"));
    }
}

//! Grounded answer generation over retrieved notes.

use std::sync::Arc;
use std::time::Duration;

use crate::call::bounded;
use crate::error::RagError;
use crate::generate::TextGenerator;
use crate::models::{
    Chunk, RetrievedContext, META_DATE, META_PAGE, META_PARAGRAPH, META_SECTION, META_SOURCE,
};

/// Standing instruction placed before the retrieved notes.
pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant for question-answering tasks.
Use the following notes of retrieved context to answer the question.
Include links from the retrieved context that point back to the retrieved content.
If the relevant note has a date, include the date in the answer.
If you don't know the answer, say that you don't know.";

pub struct AnswerGenerator {
    model: Arc<dyn TextGenerator>,
    call_timeout: Option<Duration>,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn TextGenerator>) -> Self {
        Self {
            model,
            call_timeout: None,
        }
    }

    #[must_use]
    pub fn with_call_timeout(mut self, limit: Option<Duration>) -> Self {
        self.call_timeout = limit;
        self
    }

    /// Assemble the single prompt sent to the chat model.
    pub fn build_prompt(question: &str, context: &RetrievedContext) -> String {
        let mut prompt = String::from(SYSTEM_INSTRUCTION);
        prompt.push_str("\n\nContext:\n");
        if context.is_empty() {
            prompt.push_str("(no notes were retrieved)\n");
        }
        for (i, chunk) in context.chunks().iter().enumerate() {
            prompt.push_str(&format!("\n[{}] {}\n", i + 1, heading(chunk)));
            if let Some(date) = chunk.meta(META_DATE).filter(|d| !d.is_empty()) {
                prompt.push_str(&format!("Date: {date}\n"));
            }
            if let Some(source) = chunk.meta(META_SOURCE).filter(|s| !s.is_empty()) {
                prompt.push_str(&format!("Link: {source}\n"));
            }
            prompt.push_str(chunk.text.trim_end());
            prompt.push('\n');
        }
        prompt.push_str("\nQuestion: ");
        prompt.push_str(question.trim());
        prompt
    }

    /// Ask the chat model once. Blank output is a failure, not an answer.
    pub async fn answer(
        &self,
        question: &str,
        context: &RetrievedContext,
    ) -> Result<String, RagError> {
        let prompt = Self::build_prompt(question, context);
        tracing::debug!(
            model = self.model.model_name(),
            context_chunks = context.len(),
            prompt_chars = prompt.chars().count(),
            "generating answer"
        );

        let raw = bounded(self.call_timeout, "answer generation", self.model.generate(&prompt))
            .await
            .map_err(|e| RagError::GenerationUnavailable(format!("{e:#}")))?;

        let text = raw.trim();
        if text.is_empty() {
            return Err(RagError::GenerationUnavailable(
                "the chat model returned an empty response".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

/// `Section / Page / Paragraph`, skipping parts the chunk does not have.
fn heading(chunk: &Chunk) -> String {
    let parts: Vec<&str> = [META_SECTION, META_PAGE, META_PARAGRAPH]
        .iter()
        .filter_map(|k| chunk.meta(k))
        .filter(|v| !v.is_empty())
        .collect();
    if parts.is_empty() {
        "Note".to_string()
    } else {
        parts.join(" / ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGenerator;
    use crate::models::Metadata;

    fn dated_chunk() -> Chunk {
        let mut m = Metadata::new();
        m.insert(META_SECTION.into(), "Notes".into());
        m.insert(META_PAGE.into(), "Trip".into());
        m.insert(META_DATE.into(), "2021-03-05".into());
        m.insert(META_PARAGRAPH.into(), "Friday, March 05, 2021".into());
        m.insert(META_SOURCE.into(), "export/Notes section/Trip page/2021-03-05.md".into());
        Chunk::new("Took the train to Porto.", m)
    }

    fn context() -> RetrievedContext {
        let mut m = Metadata::new();
        m.insert(META_DATE.into(), String::new());
        m.insert(META_PARAGRAPH.into(), "ideas".into());
        RetrievedContext::new(vec![dated_chunk(), Chunk::new("Start a herb garden.", m)], 1, 0)
    }

    #[test]
    fn test_prompt_layout() {
        let p = AnswerGenerator::build_prompt(" Where did I go? ", &context());
        assert!(p.starts_with(SYSTEM_INSTRUCTION));
        assert!(p.contains("[1] Notes / Trip / Friday, March 05, 2021"));
        assert!(p.contains("Date: 2021-03-05"));
        assert!(p.contains("Link: export/Notes section/Trip page/2021-03-05.md"));
        assert!(p.contains("[2] ideas\nStart a herb garden."));
        assert_eq!(p.matches("Date:").count(), 1);
        assert!(p.ends_with("Question: Where did I go?"));
    }

    #[test]
    fn test_prompt_with_no_context() {
        let p = AnswerGenerator::build_prompt("q", &RetrievedContext::default());
        assert!(p.contains("(no notes were retrieved)"));
    }

    #[tokio::test]
    async fn test_answer_is_trimmed() {
        let g = MockGenerator::with_responses(["  You went to Porto on 2021-03-05.\n"]);
        let a = AnswerGenerator::new(Arc::new(g.clone()));
        let text = a.answer("Where did I go?", &context()).await.unwrap();
        assert_eq!(text, "You went to Porto on 2021-03-05.");
        assert_eq!(g.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_answer_is_unavailable() {
        for reply in ["", "   \n\t"] {
            let a = AnswerGenerator::new(Arc::new(MockGenerator::with_responses([reply])));
            let err = a.answer("q", &context()).await.unwrap_err();
            assert!(matches!(err, RagError::GenerationUnavailable(_)));
        }
    }

    #[tokio::test]
    async fn test_model_error_is_unavailable() {
        let a = AnswerGenerator::new(Arc::new(MockGenerator::failing()));
        let err = a.answer("q", &context()).await.unwrap_err();
        assert!(matches!(err, RagError::GenerationUnavailable(ref m) if m.contains("mock generation error")));
    }
}

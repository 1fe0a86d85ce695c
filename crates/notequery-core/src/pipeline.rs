//! End-to-end query path: expand, retrieve, answer.

use serde::Serialize;

use crate::answer::AnswerGenerator;
use crate::error::RagError;
use crate::expand::QueryExpander;
use crate::index::IndexHandle;
use crate::models::{
    Chunk, QueryExpansionSet, RetrievedContext, META_DATE, META_PAGE, META_PARAGRAPH, META_SECTION,
    META_SOURCE,
};
use crate::retrieve::MultiQueryRetriever;

/// The answer to one question plus what produced it.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub expansions: QueryExpansionSet,
    pub context: RetrievedContext,
}

/// A retrieved note as shown to the user next to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRef {
    pub source: String,
    pub section: String,
    pub page: String,
    pub paragraph: String,
    pub date: String,
}

impl SourceRef {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        let get = |k: &str| chunk.meta(k).unwrap_or_default().to_string();
        Self {
            source: get(META_SOURCE),
            section: get(META_SECTION),
            page: get(META_PAGE),
            paragraph: get(META_PARAGRAPH),
            date: get(META_DATE),
        }
    }
}

impl Answer {
    /// Distinct source notes behind the retrieved chunks, in retrieval order.
    pub fn sources(&self) -> Vec<SourceRef> {
        let mut out: Vec<SourceRef> = Vec::new();
        for chunk in self.context.chunks() {
            let r = SourceRef::from_chunk(chunk);
            if !out.contains(&r) {
                out.push(r);
            }
        }
        out
    }
}

/// Everything needed to answer questions against one opened index.
pub struct RagPipeline {
    index: IndexHandle,
    expander: QueryExpander,
    retriever: MultiQueryRetriever,
    answerer: AnswerGenerator,
}

impl RagPipeline {
    pub fn new(
        index: IndexHandle,
        expander: QueryExpander,
        retriever: MultiQueryRetriever,
        answerer: AnswerGenerator,
    ) -> Self {
        Self {
            index,
            expander,
            retriever,
            answerer,
        }
    }

    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        let expansions = self.expander.expand(question).await;
        let context = self
            .retriever
            .retrieve(question, &expansions, &self.index)
            .await?;
        let text = self.answerer.answer(question, &context).await?;

        Ok(Answer {
            text,
            expansions,
            context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::split;
    use crate::enrich::{enrich_all, PathConvention};
    use crate::index::{rebuild, RebuildOptions};
    use crate::mock::{MockEmbedder, MockGenerator};
    use crate::models::Document;
    use crate::store::memory::InMemoryStore;
    use std::sync::Arc;

    async fn pipeline(expander: MockGenerator, chat: MockGenerator) -> RagPipeline {
        let docs = vec![
            Document::new(
                "Train from Lisbon to Porto at nine.",
                "export/Notes section/Trip page/2021-03-05.md",
            ),
            Document::new(
                "Visited the Porto wine cellars.",
                "export/Notes section/Trip page/2021-03-06.md",
            ),
            Document::new(
                "Start a herb garden on the balcony.",
                "export/Notes section/Todo page/ideas.md",
            ),
        ];
        let docs = enrich_all(docs, &PathConvention::default()).unwrap();
        let chunks = split(&docs, 1000, 200).unwrap();
        let index = rebuild(
            Arc::new(InMemoryStore::new()),
            Arc::new(MockEmbedder::new(64)),
            &chunks,
            RebuildOptions::default(),
        )
        .await
        .unwrap();
        RagPipeline::new(
            index,
            QueryExpander::new(Arc::new(expander), 5),
            MultiQueryRetriever::new(1),
            AnswerGenerator::new(Arc::new(chat)),
        )
    }

    #[tokio::test]
    async fn test_ask_end_to_end() {
        let chat = MockGenerator::with_responses(["You took the train to Porto on March 5, 2021."]);
        let p = pipeline(
            MockGenerator::with_responses(["train to porto\nwine cellars porto"]),
            chat.clone(),
        )
        .await;

        let answer = p.ask("When did I go to Porto?").await.unwrap();
        assert_eq!(answer.text, "You took the train to Porto on March 5, 2021.");
        assert_eq!(answer.expansions.len(), 2);
        assert_eq!(answer.context.searches, 3);
        assert!(answer.context.len() >= 2);

        let sources = answer.sources();
        assert!(sources.iter().any(|s| s.date == "2021-03-05" && s.page == "Trip"));

        let prompt = &chat.prompts()[0];
        assert!(prompt.contains("Question: When did I go to Porto?"));
        assert!(prompt.contains("Date: 2021-03-05"));
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let p = pipeline(MockGenerator::default(), MockGenerator::default()).await;
        assert!(matches!(p.ask("   ").await, Err(RagError::EmptyQuestion)));
    }

    #[tokio::test]
    async fn test_expansion_failure_still_answers() {
        let p = pipeline(
            MockGenerator::failing(),
            MockGenerator::with_responses(["Plant basil."]),
        )
        .await;
        let answer = p.ask("herb garden").await.unwrap();
        assert!(answer.expansions.is_fallback_for("herb garden"));
        assert_eq!(answer.context.searches, 1);
        assert_eq!(answer.text, "Plant basil.");
    }

    #[tokio::test]
    async fn test_generation_failure_surfaces() {
        let p = pipeline(MockGenerator::default(), MockGenerator::with_responses([""])).await;
        assert!(matches!(
            p.ask("herb garden").await,
            Err(RagError::GenerationUnavailable(_))
        ));
    }
}

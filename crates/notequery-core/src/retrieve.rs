//! Multi-query retrieval.
//!
//! Searches the index once for the original question and once for each
//! distinct paraphrase, concurrently, then merges the hits in query order
//! with duplicates removed. A failed or timed-out search contributes
//! nothing; retrieval fails only when every search fails.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;

use crate::call::bounded;
use crate::error::RagError;
use crate::index::IndexHandle;
use crate::models::{QueryExpansionSet, RetrievedContext};

#[derive(Debug, Clone)]
pub struct MultiQueryRetriever {
    pub k_per_query: usize,
    pub call_timeout: Option<Duration>,
}

impl MultiQueryRetriever {
    pub fn new(k_per_query: usize) -> Self {
        Self {
            k_per_query,
            call_timeout: None,
        }
    }

    #[must_use]
    pub fn with_call_timeout(mut self, limit: Option<Duration>) -> Self {
        self.call_timeout = limit;
        self
    }

    /// The query strings issued for `question`: the question itself, then
    /// each expansion not already present.
    pub fn queries_for(question: &str, expansions: &QueryExpansionSet) -> Vec<String> {
        let mut seen = HashSet::new();
        std::iter::once(question.trim())
            .chain(expansions.queries().iter().map(|q| q.trim()))
            .filter(|q| !q.is_empty())
            .filter(|q| seen.insert(q.to_string()))
            .map(str::to_string)
            .collect()
    }

    pub async fn retrieve(
        &self,
        question: &str,
        expansions: &QueryExpansionSet,
        index: &IndexHandle,
    ) -> Result<RetrievedContext, RagError> {
        let queries = Self::queries_for(question, expansions);
        if queries.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        let k = self.k_per_query;
        let limit = self.call_timeout;
        let searches = queries.iter().map(|q| async move {
            bounded(limit, "search", async {
                index.search(q, k).await.map_err(anyhow::Error::from)
            })
            .await
        });
        let results = join_all(searches).await;

        let mut seen = HashSet::new();
        let mut chunks = Vec::new();
        let mut failed = 0usize;
        let mut last_error = String::new();

        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(hits) => {
                    tracing::debug!(query = %query, hits = hits.len(), "search finished");
                    for chunk in hits {
                        if seen.insert(chunk.fingerprint()) {
                            chunks.push(chunk);
                        }
                    }
                }
                Err(err) => {
                    failed += 1;
                    last_error = match err.downcast::<RagError>() {
                        // A backend that disagrees with the index is not transient.
                        Ok(cfg @ RagError::Configuration(_)) => return Err(cfg),
                        Ok(other) => other.to_string(),
                        Err(other) => format!("{other:#}"),
                    };
                    tracing::warn!(query = %query, error = %last_error, "search failed; skipping this query");
                }
            }
        }

        if failed == queries.len() {
            return Err(RagError::RetrievalUnavailable {
                attempts: failed,
                last_error,
            });
        }

        tracing::info!(
            searches = queries.len(),
            failed,
            chunks = chunks.len(),
            "retrieved context"
        );
        Ok(RetrievedContext::new(chunks, queries.len(), failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{open, rebuild, RebuildOptions};
    use crate::mock::MockEmbedder;
    use crate::models::{Chunk, Metadata};
    use crate::store::memory::InMemoryStore;
    use std::sync::Arc;

    fn chunk(text: &str, page: &str) -> Chunk {
        let mut m = Metadata::new();
        m.insert("page".to_string(), page.to_string());
        Chunk::new(text, m)
    }

    async fn index_with(embedder: MockEmbedder, chunks: &[Chunk]) -> IndexHandle {
        rebuild(
            Arc::new(InMemoryStore::new()),
            Arc::new(embedder),
            chunks,
            RebuildOptions::default(),
        )
        .await
        .unwrap()
    }

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk("flight to lisbon on friday", "Trip"),
            chunk("hotel near the lisbon castle", "Trip"),
            chunk("buy tomatoes and basil", "Groceries"),
            chunk("same words", "A"),
            chunk("same words", "B"),
        ]
    }

    #[test]
    fn test_queries_original_first_and_distinct() {
        let set = QueryExpansionSet::from_lines("q", ["a", "q", "b", "a"]);
        let qs = MultiQueryRetriever::queries_for(" q ", &set);
        assert_eq!(qs, vec!["q", "a", "b"]);
    }

    #[tokio::test]
    async fn test_merges_without_duplicates() {
        let index = index_with(MockEmbedder::new(64), &corpus()).await;
        let set = QueryExpansionSet::from_lines(
            "lisbon flight",
            ["lisbon hotel", "flight to lisbon"],
        );
        let r = MultiQueryRetriever::new(2);
        let ctx = r.retrieve("lisbon flight", &set, &index).await.unwrap();

        assert_eq!(ctx.searches, 3);
        assert_eq!(ctx.failed_searches, 0);
        let fps: HashSet<String> = ctx.chunks().iter().map(Chunk::fingerprint).collect();
        assert_eq!(fps.len(), ctx.len());
        assert!(ctx.len() <= 6);
        assert_eq!(ctx.chunks()[0].text, "flight to lisbon on friday");
    }

    #[tokio::test]
    async fn test_identical_top_results_kept_once() {
        let index = index_with(MockEmbedder::new(64), &corpus()).await;
        let set = QueryExpansionSet::from_lines("tomatoes basil", ["buy tomatoes", "basil"]);
        let ctx = MultiQueryRetriever::new(1)
            .retrieve("tomatoes basil", &set, &index)
            .await
            .unwrap();
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.chunks()[0].text, "buy tomatoes and basil");
    }

    #[tokio::test]
    async fn test_same_text_different_metadata_are_distinct() {
        let index = index_with(MockEmbedder::new(64), &corpus()).await;
        let set = QueryExpansionSet::fallback("same words");
        let ctx = MultiQueryRetriever::new(2)
            .retrieve("same words", &set, &index)
            .await
            .unwrap();
        assert_eq!(ctx.len(), 2);
        assert_ne!(ctx.chunks()[0].metadata, ctx.chunks()[1].metadata);
    }

    #[tokio::test]
    async fn test_partial_failure_is_absorbed() {
        let index = index_with(MockEmbedder::new(64).failing_on("poison"), &corpus()).await;
        let set = QueryExpansionSet::from_lines("basil", ["poison query"]);
        let ctx = MultiQueryRetriever::new(1)
            .retrieve("basil", &set, &index)
            .await
            .unwrap();
        assert_eq!(ctx.searches, 2);
        assert_eq!(ctx.failed_searches, 1);
        assert_eq!(ctx.len(), 1);
    }

    #[tokio::test]
    async fn test_all_failures_are_unavailable() {
        let index = index_with(MockEmbedder::new(64).failing_on("poison"), &corpus()).await;
        let set = QueryExpansionSet::from_lines("poison one", ["poison two"]);
        let err = MultiQueryRetriever::new(1)
            .retrieve("poison one", &set, &index)
            .await
            .unwrap_err();
        match err {
            RagError::RetrievalUnavailable {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("mock embedding error"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_configuration_error() {
        let store = Arc::new(InMemoryStore::new());
        rebuild(store.clone(), Arc::new(MockEmbedder::new(64)), &corpus(), RebuildOptions::default())
            .await
            .unwrap();
        let short = MockEmbedder::new(64).with_output_dims(32);
        let index = open(store, Arc::new(short)).await.unwrap();

        let set = QueryExpansionSet::from_lines("basil", ["lisbon hotel", "tomatoes"]);
        let err = MultiQueryRetriever::new(2)
            .retrieve("basil", &set, &index)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_timeouts_count_as_failures() {
        let index = index_with(MockEmbedder::new(64).with_delay(200), &corpus()).await;
        let set = QueryExpansionSet::fallback("basil");
        let err = MultiQueryRetriever::new(1)
            .with_call_timeout(Some(Duration::from_millis(10)))
            .retrieve("basil", &set, &index)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::RetrievalUnavailable { attempts: 1, .. }));
    }
}

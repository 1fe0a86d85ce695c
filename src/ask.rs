//! Query-phase assembly and `nq ask`.

use anyhow::Result;
use std::sync::Arc;

use notequery_core::answer::AnswerGenerator;
use notequery_core::embedding::EmbeddingBackend;
use notequery_core::expand::QueryExpander;
use notequery_core::generate::TextGenerator;
use notequery_core::index::{self, IndexHandle};
use notequery_core::pipeline::{Answer, RagPipeline};
use notequery_core::retrieve::MultiQueryRetriever;
use notequery_core::RagError;

use crate::config::Config;
use crate::ingest;
use crate::provider;
use crate::sqlite_store::SqliteVectorStore;

/// Attach to the index at `config.index.path` without modifying it.
pub async fn open_index(
    config: &Config,
    embedder: Arc<dyn EmbeddingBackend>,
) -> Result<IndexHandle, RagError> {
    index::open(Arc::new(SqliteVectorStore::new(&config.index.path)), embedder).await
}

/// Wire expander, retriever, and answer generator around `index`.
pub fn assemble(
    config: &Config,
    index: IndexHandle,
    generator: Arc<dyn TextGenerator>,
) -> RagPipeline {
    let timeout = config.retrieval.call_timeout();
    RagPipeline::new(
        index,
        QueryExpander::new(generator.clone(), config.retrieval.expansions)
            .with_call_timeout(timeout),
        MultiQueryRetriever::new(config.retrieval.k_per_query).with_call_timeout(timeout),
        AnswerGenerator::new(generator).with_call_timeout(timeout),
    )
}

/// Startup for the interactive surfaces: rebuild the index unless
/// `skip_embedding` is set, then build the pipeline.
pub async fn prepare(config: &Config, skip_embedding: bool) -> Result<RagPipeline> {
    let embedder = provider::create_embedder(&config.backend)?;
    let generator = provider::create_generator(&config.backend)?;

    let index = if skip_embedding {
        open_index(config, embedder).await?
    } else {
        let (handle, summary) = ingest::build_index(config, embedder).await?;
        eprintln!(
            "indexed {} notes into {} chunks ({})",
            summary.documents, summary.chunks, summary.model
        );
        handle
    };

    Ok(assemble(config, index, generator))
}

/// `nq ask`.
pub async fn run_ask(config: &Config, question: &str, show_context: bool) -> Result<()> {
    let embedder = provider::create_embedder(&config.backend)?;
    let generator = provider::create_generator(&config.backend)?;
    let index = open_index(config, embedder).await?;
    let pipeline = assemble(config, index, generator);

    let answer = pipeline.ask(question).await?;
    print!("{}", render_answer(&answer, show_context));
    Ok(())
}

/// Answer text, optionally followed by the queries issued and the notes used.
pub fn render_answer(answer: &Answer, show_context: bool) -> String {
    let mut out = format!("{}\n", answer.text);
    if !show_context {
        return out;
    }

    out.push_str("\nqueries:\n");
    for q in answer.expansions.queries() {
        out.push_str(&format!("  - {q}\n"));
    }
    out.push_str(&format!(
        "\nsources ({} chunks, {}/{} searches failed):\n",
        answer.context.len(),
        answer.context.failed_searches,
        answer.context.searches
    ));
    for s in answer.sources() {
        let date = if s.date.is_empty() {
            String::new()
        } else {
            format!(" [{}]", s.date)
        };
        out.push_str(&format!(
            "  - {} / {} / {}{} ({})\n",
            s.section, s.page, s.paragraph, date, s.source
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use notequery_core::models::{Chunk, Metadata, QueryExpansionSet, RetrievedContext};

    fn answer() -> Answer {
        let mut m = Metadata::new();
        m.insert("section".into(), "Notes".into());
        m.insert("page".into(), "Trip".into());
        m.insert("paragraph".into(), "Friday, March 05, 2021".into());
        m.insert("date".into(), "2021-03-05".into());
        m.insert("source".into(), "export/Notes section/Trip page/2021-03-05.md".into());
        Answer {
            text: "You went to Porto.".into(),
            expansions: QueryExpansionSet::from_lines("q", ["where did I travel"]),
            context: RetrievedContext::new(
                vec![Chunk::new("a", m.clone()), Chunk::new("b", m)],
                2,
                1,
            ),
        }
    }

    #[test]
    fn test_render_plain() {
        assert_eq!(render_answer(&answer(), false), "You went to Porto.\n");
    }

    #[test]
    fn test_render_with_context() {
        let out = render_answer(&answer(), true);
        assert!(out.contains("  - where did I travel\n"));
        assert!(out.contains("sources (2 chunks, 1/2 searches failed)"));
        assert!(out.contains("Notes / Trip / Friday, March 05, 2021 [2021-03-05]"));
        // Two chunks from one note collapse to one source line.
        assert_eq!(out.matches("export/Notes section").count(), 1);
    }
}

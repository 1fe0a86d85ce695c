//! `nq chat`: interactive question loop on stdin.
//!
//! Each line is one question. Retrieval and generation failures are shown
//! and the loop continues; `/quit` (or end of input) exits. Earlier turns
//! are kept for display only and never influence retrieval.

use anyhow::Result;
use std::io::{BufRead, Write};

use notequery_core::pipeline::RagPipeline;
use notequery_core::RagError;

use crate::config::Config;

pub async fn run_chat(config: &Config, skip_embedding: bool) -> Result<()> {
    let pipeline = crate::ask::prepare(config, skip_embedding).await?;
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run_repl(&pipeline, stdin.lock(), stdout.lock()).await?;
    Ok(())
}

/// One exchange, as kept in the session history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// Drive the loop over arbitrary input/output. Returns the session history.
pub async fn run_repl<R: BufRead, W: Write>(
    pipeline: &RagPipeline,
    input: R,
    mut output: W,
) -> Result<Vec<Turn>> {
    let mut history = Vec::new();
    writeln!(output, "Ask about your notes. Type /quit to exit.")?;

    let mut lines = input.lines();
    loop {
        write!(output, "> ")?;
        output.flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "/quit" || question == "/exit" {
            break;
        }

        match pipeline.ask(question).await {
            Ok(answer) => {
                writeln!(output, "{}\n", answer.text)?;
                history.push(Turn {
                    question: question.to_string(),
                    answer: answer.text,
                });
            }
            Err(err) => {
                tracing::debug!(code = err.code(), "question failed");
                writeln!(output, "{}\n", failure_message(&err))?;
            }
        }
    }

    writeln!(output)?;
    Ok(history)
}

/// User-facing text for a failed question.
pub fn failure_message(err: &RagError) -> String {
    match err {
        RagError::RetrievalUnavailable { .. } => {
            format!("Sorry, I couldn't search your notes right now ({err}).")
        }
        RagError::GenerationUnavailable(_) => {
            format!("Sorry, the chat model didn't produce an answer ({err}).")
        }
        other => format!("error: {other}"),
    }
}

//! # notequery CLI (`nq`)
//!
//! ## Usage
//!
//! ```bash
//! nq --config ./config/nq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nq build` | Load, enrich, chunk, and embed the notes; rebuild the index |
//! | `nq status` | Show the index location, model, dimensions, and entry count |
//! | `nq ask "<question>"` | Answer one question from the existing index |
//! | `nq chat` | Interactive question loop |
//! | `nq serve` | HTTP chat surface |
//!
//! Add `-v` flags for more logging (`-v` warn, `-vv` info, `-vvv` debug,
//! `-vvvv` trace). `RUST_LOG` overrides them.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use notequery::{ask, chat, config, ingest, logging, server, stats};

/// notequery: ask questions about an exported notebook.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/nq.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "nq",
    about = "notequery: ask questions about an exported notebook",
    version,
    long_about = "notequery infers section, page, and date metadata from a notebook export's \
    directory layout, indexes the notes for similarity search, and answers questions with \
    multi-query retrieval-augmented generation."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/nq.toml")]
    config: PathBuf,

    /// Increase logging verbosity (repeatable).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index from the note export.
    ///
    /// Discards any existing index, then embeds every chunk again.
    Build,

    /// Show what the index holds.
    Status,

    /// Answer one question.
    Ask {
        /// The question.
        question: String,

        /// Also print the expanded queries and the notes used.
        #[arg(long)]
        show_context: bool,
    },

    /// Interactive question loop on stdin.
    Chat {
        /// Reuse the existing index instead of rebuilding at startup.
        #[arg(long)]
        skip_embedding: bool,
    },

    /// Start the HTTP chat surface.
    Serve {
        /// Reuse the existing index instead of rebuilding at startup.
        #[arg(long)]
        skip_embedding: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build => {
            ingest::run_build(&cfg).await?;
        }
        Commands::Status => {
            stats::run_status(&cfg).await?;
        }
        Commands::Ask {
            question,
            show_context,
        } => {
            ask::run_ask(&cfg, &question, show_context).await?;
        }
        Commands::Chat { skip_embedding } => {
            chat::run_chat(&cfg, skip_embedding).await?;
        }
        Commands::Serve { skip_embedding } => {
            let pipeline = ask::prepare(&cfg, skip_embedding).await?;
            server::run_server(&cfg, pipeline).await?;
        }
    }

    Ok(())
}

//! # Context QA CLI (`cqa`)
//!
//! Ask questions about a document. The document is split into fixed-size
//! word segments, the segment most similar to the question is chosen by
//! TF-IDF cosine similarity, and that segment plus the conversation so far
//! is sent to a generation service.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cqa segments <file>` | Print the segments of a document |
//! | `cqa rank <file> "<query>"` | Print the best-matching segment and its score |
//! | `cqa ask <file> "<question>"` | Ask one question |
//! | `cqa chat [<file>]` | Interactive conversation |
//! | `cqa serve` | Start the HTTP chat server |
//!
//! ## Examples
//!
//! ```bash
//! cqa segments manual.pdf --size 200
//! cqa rank manual.pdf "how do I reset the device"
//! COHERE_API_KEY=... cqa ask manual.pdf "how do I reset the device?"
//! cqa chat manual.pdf --config ./config/cqa.toml
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use context_qa::commands;
use context_qa::config;
use context_qa::generation::create_generator;
use context_qa::progress::ProgressMode;
use context_qa::server;

const DEFAULT_CONFIG_PATH: &str = "./config/cqa.toml";

/// Context QA CLI: chat with a document.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cqa",
    about = "Chat with a document using TF-IDF retrieval and a generation service",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/cqa.toml`; built-in defaults apply when that
    /// file does not exist. An explicitly given path must exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Progress on stderr: `off`, `human`, or `json`.
    /// Defaults to `human` when stderr is a terminal, otherwise `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Print the segments of a document.
    Segments {
        /// Document path (.pdf, .txt, .md, .docx, .pptx, .xlsx).
        file: PathBuf,

        /// Words per segment (overrides `[segmentation].size`).
        #[arg(long)]
        size: Option<usize>,
    },

    /// Print the segment that best matches a query, without calling the
    /// generation service.
    Rank {
        /// Document path.
        file: PathBuf,

        /// The query string.
        query: String,

        /// Words per segment (overrides `[segmentation].size`).
        #[arg(long)]
        size: Option<usize>,
    },

    /// Ask a single question about a document.
    Ask {
        /// Document path.
        file: PathBuf,

        /// The question.
        question: String,
    },

    /// Start an interactive conversation.
    ///
    /// Each line is a question. `/load <path>` swaps the document,
    /// `/reset` starts over, `/history` prints the transcript, `/quit` exits.
    Chat {
        /// Optional document to load before the first question.
        file: Option<PathBuf>,
    },

    /// Start the HTTP chat server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let explicit = cli.config.is_some();
    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let cfg = config::load_or_default(&config_path, explicit)?;

    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Segments { file, size } => {
            commands::run_segments(&cfg, &file, size, progress.as_ref())?;
        }
        Commands::Rank { file, query, size } => {
            commands::run_rank(&cfg, &file, &query, size, progress.as_ref())?;
        }
        Commands::Ask { file, question } => {
            let generator = create_generator(&cfg.generation)?;
            commands::run_ask(
                &cfg,
                generator.as_ref(),
                &file,
                &question,
                progress.as_ref(),
            )
            .await?;
        }
        Commands::Chat { file } => {
            let generator = create_generator(&cfg.generation)?;
            commands::run_chat(&cfg, generator.as_ref(), file.as_deref(), progress.as_ref())
                .await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

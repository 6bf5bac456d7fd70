//! Aletheia - Confidence-Scored Retrieval and Generation
//!
//! Command-line entry point: ask questions against a passage corpus, label the
//! answers, and refit calibration from those labels.

mod cli;

use aletheia_core::{telemetry, PipelineConfig, QueryId};
use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "aletheia")]
#[command(about = "Confidence-scored question answering with calibrated delivery", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to .aletheia/config.toml)
    #[arg(long, global = true, env = "ALETHEIA_CONFIG")]
    config: Option<PathBuf>,

    /// Feedback database path (overrides feedback.db_path)
    #[arg(long, global = true, env = "ALETHEIA_DB_PATH")]
    db: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from a corpus
    Ask {
        /// The question
        query: String,

        /// JSON array of passages: [{"id", "source_doc_id", "text"}]
        #[arg(long)]
        corpus: PathBuf,

        /// OpenAI-compatible completions endpoint (overrides generation.endpoint)
        #[arg(long)]
        endpoint: Option<String>,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Label a delivered answer
    #[command(group(ArgGroup::new("label").required(true).args(["correct", "incorrect"])))]
    Feedback {
        /// Query ID printed by `ask`
        query_id: String,

        #[arg(long)]
        correct: bool,

        #[arg(long)]
        incorrect: bool,
    },

    /// Show the active calibration
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Refit calibration from labelled feedback
    Refit {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing(telemetry::level_from_verbosity(cli.verbose), cli.json_logs);
    debug!("Aletheia v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.unwrap_or_else(PipelineConfig::default_path);
    let config = PipelineConfig::load(Some(&config_path))
        .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;
    let db = cli.db.as_deref();

    match cli.command {
        Commands::Ask {
            query,
            corpus,
            endpoint,
            json,
        } => cli::ask::handle(config, query, corpus, endpoint, json, db).await?,
        Commands::Feedback {
            query_id, correct, ..
        } => {
            let query_id = QueryId::from_string(&query_id)
                .with_context(|| format!("Invalid query ID: {}", query_id))?;
            cli::feedback::handle(&config, query_id, correct, db).await?
        }
        Commands::Status { json } => cli::status::handle(&config, json, db).await?,
        Commands::Refit { json } => cli::refit::handle(&config, json, db).await?,
    }

    Ok(())
}

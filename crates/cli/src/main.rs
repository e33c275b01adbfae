//! Memline CLI — the main entry point.
//!
//! Commands:
//! - `record`  — Ingest a dialogue turn into a stream
//! - `context` — Print the assembled context for a stream
//! - `facts`   — List active hard facts
//! - `history` — Show a fact's supersession chain
//! - `correct` — Enter a human correction
//! - `compact` — Force a compaction cycle

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "memline",
    about = "Memline — operational memory for conversational assistants",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: ~/.memline/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project id; omit for the global stream
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one dialogue turn
    Record {
        /// Who spoke: "user" or "assistant"
        #[arg(short, long)]
        role: String,

        /// The turn content
        content: String,

        /// Citation in `source_type:item_count` form, repeatable
        #[arg(long = "citation")]
        citations: Vec<String>,
    },

    /// Print the assembled context for the stream
    Context {
        /// Character budget for the assembled output
        #[arg(short, long, default_value_t = 4000)]
        budget: usize,

        /// Print per-tier stats instead of the raw text
        #[arg(long)]
        stats: bool,
    },

    /// List active hard facts, newest first
    Facts,

    /// Show the supersession chain of one fact
    History {
        /// The fact id to audit
        fact_id: String,
    },

    /// Enter a human correction (confidence 1.0, wins over extracted facts)
    Correct {
        /// The corrected claim
        text: String,

        /// Conflict key, e.g. `person:marcus:role`
        #[arg(short, long)]
        key: Option<String>,

        /// Fact category (role_correction, assignment, deadline, decision,
        /// organizational, project_fact, preference, blocker)
        #[arg(short = 'c', long, default_value = "project_fact")]
        category: String,
    },

    /// Force a compaction cycle regardless of the threshold
    Compact,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let scope = commands::scope_from(cli.project);

    match cli.command {
        Commands::Record {
            role,
            content,
            citations,
        } => commands::record::run(cli.config, scope, &role, &content, citations).await?,
        Commands::Context { budget, stats } => {
            commands::context::run(cli.config, scope, budget, stats).await?
        }
        Commands::Facts => commands::facts::run(cli.config, scope).await?,
        Commands::History { fact_id } => commands::history::run(cli.config, &fact_id).await?,
        Commands::Correct {
            text,
            key,
            category,
        } => commands::correct::run(cli.config, scope, &text, key, &category).await?,
        Commands::Compact => commands::compact::run(cli.config, scope).await?,
    }

    Ok(())
}

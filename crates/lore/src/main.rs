//! # Lore CLI (`lore`)
//!
//! ```bash
//! lore --config ./config/lore.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lore init` | Create the SQLite database and run schema migrations |
//! | `lore index` | Index the source directory incrementally |
//! | `lore context "<query>"` | Print the assembled context for a query |
//! | `lore ask "<query>"` | Answer a query with a completion model |
//! | `lore conversations` | List stored conversations |
//! | `lore stats` | Show database statistics |
//!
//! Logs go to stderr through `tracing`. `RUST_LOG` overrides the default
//! filter; `--verbose` switches the default to `debug`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use lore::config;
use lore::index_cmd;
use lore::migrate;
use lore::query::{run_ask, run_context, ContextKind};
use lore::stats;

/// Lore — retrieval-augmented context assembly over a directory of
/// documents.
#[derive(Parser)]
#[command(
    name = "lore",
    about = "Lore — index documents and assemble retrieval context for language models",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lore.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` is set.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it against an existing database is safe.
    Init,

    /// Index the configured source directory.
    ///
    /// Unchanged documents are skipped by checksum; changed ones are
    /// re-segmented and re-embedded; documents whose files disappeared are
    /// removed.
    Index {
        /// Report what would change without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the context that would be sent to the completion model.
    Context {
        /// The query text.
        query: String,

        /// Selection policy.
        #[arg(long, value_enum, default_value = "knowledge")]
        kind: ContextKind,

        /// Only consider documents carrying this tag (knowledge).
        #[arg(long)]
        tag: Option<String>,

        /// Conversation to draw turns from (chat).
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Ask a question; starts a new conversation unless one is given.
    Ask {
        /// The question.
        query: String,

        /// Continue this conversation.
        #[arg(long)]
        conversation: Option<String>,

        /// Only consider documents carrying this tag.
        #[arg(long)]
        tag: Option<String>,
    },

    /// List conversations, newest first.
    Conversations,

    /// Show document, section and conversation counts.
    Stats,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "lore=debug,lore_core=debug"
    } else {
        "lore=info,lore_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_init(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index { dry_run } => {
            index_cmd::run_index(&cfg, dry_run).await?;
        }
        Commands::Context {
            query,
            kind,
            tag,
            conversation,
        } => {
            run_context(&cfg, &query, kind, tag.as_deref(), conversation.as_deref()).await?;
        }
        Commands::Ask {
            query,
            conversation,
            tag,
        } => {
            run_ask(&cfg, &query, conversation.as_deref(), tag.as_deref()).await?;
        }
        Commands::Conversations => {
            stats::run_conversations(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}

//! # Groundwork CLI (`gw`)
//!
//! ## Usage
//!
//! ```bash
//! gw --config ./config/groundwork.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gw init` | Create the Postgres extensions, tables and indexes |
//! | `gw load <file>` | Load documents, chunks, embeddings and grants from JSON |
//! | `gw retrieve "<query>" --team T --user U` | Ranked chunks visible to a principal |
//! | `gw ask "<question>" --team T --user U` | Grounded answer with cited sources |
//! | `gw serve` | Start the HTTP server |
//! | `gw completions <shell>` | Print shell completions |
//!
//! Logs go to stderr; set `RUST_LOG=debug` for per-stage counts.

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use groundwork::{config, load, migrate, query, server};

/// Groundwork: permission-scoped retrieval and grounded answers.
#[derive(Parser)]
#[command(
    name = "gw",
    about = "Groundwork: permission-scoped hybrid retrieval and citation-grounded answers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/groundwork.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Load documents from a JSON file.
    ///
    /// Each record carries a source, a document and its permission grants.
    /// Bodies are chunked and embedded with the configured provider.
    Load {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// Retrieve ranked chunks visible to a principal.
    Retrieve {
        query: String,

        #[command(flatten)]
        who: PrincipalArgs,

        /// Maximum number of results (defaults to `retrieval.final_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question from chunks visible to a principal.
    Ask {
        question: String,

        #[command(flatten)]
        who: PrincipalArgs,

        /// Maximum number of grounding chunks.
        #[arg(long)]
        limit: Option<usize>,

        /// Skip the self-check pass.
        #[arg(long)]
        no_self_check: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Print shell completions to stdout.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(clap::Args)]
struct PrincipalArgs {
    /// Team the query runs as.
    #[arg(long)]
    team: String,

    /// User the query runs as.
    #[arg(long)]
    user: String,

    /// Channel context, if any.
    #[arg(long)]
    channel: Option<String>,
}

impl PrincipalArgs {
    fn principal(&self) -> groundwork_core::models::Principal {
        query::principal(&self.team, &self.user, self.channel.as_deref())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "gw", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Load { file } => {
            load::run_load(&cfg, &file).await?;
        }
        Commands::Retrieve {
            query: text,
            who,
            limit,
        } => {
            query::run_retrieve(&cfg, &text, &who.principal(), limit).await?;
        }
        Commands::Ask {
            question,
            who,
            limit,
            no_self_check,
        } => {
            let self_check = cfg.generation.self_check && !no_self_check;
            query::run_ask(&cfg, &question, &who.principal(), limit, self_check).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

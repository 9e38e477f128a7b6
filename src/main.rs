//! # Schema Scout CLI (`scout`)
//!
//! The `scout` binary validates connections, lists catalogs, analyzes single
//! tables or views, answers questions, manages the analysis cache, and starts
//! the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! scout --config ./config/scout.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scout serve` | Start the HTTP API |
//! | `scout connect <conn>` | Validate a connection and list tables and views |
//! | `scout catalog <conn>` | Print the catalog grouped by schema (JSON) |
//! | `scout analyze <conn> <item>` | Analyze one table or view |
//! | `scout ask <conn> "<question>"` | Answer a question (`--mode summary` or `sql`) |
//! | `scout cache clear` | Delete every cached analysis |
//!
//! ## Examples
//!
//! ```bash
//! # List what a SQLite file contains
//! scout connect "sqlite://shop.db"
//!
//! # Analyze a table in a named PostgreSQL schema, ignoring the cache
//! scout analyze "postgres://app@localhost/shop" orders --schema sales --force
//!
//! # Ask against cached analyses, then against live data
//! scout ask "sqlite://shop.db" "Which product sells best?"
//! scout ask "sqlite://shop.db" "How many orders were placed in May?" --mode sql
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use schema_scout::{commands, config, server};

/// Schema Scout CLI: natural-language questions over relational databases.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used. See
/// `config/scout.example.toml` for every setting.
#[derive(Parser)]
#[command(
    name = "scout",
    about = "Schema Scout: ask natural-language questions about any relational database",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/scout.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,

    /// Validate a connection and list its tables and views.
    Connect {
        /// Connection URL, e.g. `sqlite://shop.db` or `postgres://user@host/db`.
        connection_string: String,
    },

    /// Print the catalog grouped by schema as JSON.
    Catalog {
        /// Connection URL.
        connection_string: String,
    },

    /// Analyze one table or view.
    ///
    /// Samples rows, computes completeness and duplicate metrics, and asks
    /// the chat model for a business summary and a schema explanation.
    /// Results are cached per connection and item.
    Analyze {
        /// Connection URL.
        connection_string: String,

        /// Table or view name.
        item: String,

        /// Schema holding the item (defaults to the connection's default schema).
        #[arg(long)]
        schema: Option<String>,

        /// Ignore any cached analysis and recompute it.
        #[arg(long)]
        force: bool,
    },

    /// Answer a question about the database.
    Ask {
        /// Connection URL.
        connection_string: String,

        /// The question, in plain language.
        question: String,

        /// `summary` answers from cached analyses; `sql` generates and runs a query.
        #[arg(long, default_value = "summary")]
        mode: String,

        /// Recompute every analysis before routing (summary mode only).
        #[arg(long)]
        force: bool,
    },

    /// Manage the analysis cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Cache management subcommands.
#[derive(Subcommand)]
enum CacheAction {
    /// Delete every cached analysis.
    Clear,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::debug!(path = %cli.config.display(), "no config file, using defaults");
        config::Config::minimal()
    };

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Connect { connection_string } => {
            commands::run_connect(&cfg, &connection_string).await?;
        }
        Commands::Catalog { connection_string } => {
            commands::run_catalog(&cfg, &connection_string).await?;
        }
        Commands::Analyze {
            connection_string,
            item,
            schema,
            force,
        } => {
            commands::run_analyze(&cfg, &connection_string, schema.as_deref(), &item, force)
                .await?;
        }
        Commands::Ask {
            connection_string,
            question,
            mode,
            force,
        } => {
            commands::run_ask(&cfg, &connection_string, &question, &mode, force).await?;
        }
        Commands::Cache {
            action: CacheAction::Clear,
        } => {
            commands::run_cache_clear(&cfg)?;
        }
    }

    Ok(())
}

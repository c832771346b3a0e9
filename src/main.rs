//! # Tab Harvest CLI (`harvest`)
//!
//! Operates the capture store and runs saves from the command line.
//!
//! ## Usage
//!
//! ```bash
//! harvest --config ./config/harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest init` | Create the SQLite store and run schema migrations |
//! | `harvest status` | Show captured sessions, queues, and auth state |
//! | `harvest import <file>` | Load a JSON snapshot of store keys |
//! | `harvest login --token <t>` | Store the API token |
//! | `harvest logout` | Forget the API token |
//! | `harvest select <id>` | Select the target search space |
//! | `harvest spaces` | List search spaces on the backend |
//! | `harvest save` | Upload captured pages once |
//! | `harvest reconcile` | Prune sessions of closed tabs |
//! | `harvest serve` | Start the HTTP host adapter |
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); command output goes to
//! stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tab_harvest::backend::Backend;
use tab_harvest::config::{self, Config};
use tab_harvest::dispatch::{handle_save, Dispatcher};
use tab_harvest::store::Store;
use tab_harvest::{db, migrate, reconcile, server, session, spaces, tabs};

/// Tab Harvest CLI: capture store maintenance and document sync.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "harvest",
    about = "Tab Harvest: per-tab browsing history store and document sync",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/harvest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the store schema.
    ///
    /// Creates the SQLite file and the key/value table. Idempotent.
    Init,

    /// Show what the store currently holds.
    Status,

    /// Load a JSON object of `key -> value` into the store.
    ///
    /// Collections must be wrapped the way the capture process writes them,
    /// e.g. `{"webhistory": {"webhistory": [...]}}`.
    Import {
        /// Path to the JSON snapshot.
        file: PathBuf,
    },

    /// Store the API token used for backend calls.
    Login {
        #[arg(long)]
        token: String,
    },

    /// Remove the stored API token.
    Logout,

    /// Select the search space captured pages are saved into.
    Select {
        /// Search space id.
        id: i64,
    },

    /// List the search spaces the stored token can access.
    Spaces,

    /// Upload all captured pages to the backend once.
    ///
    /// Prints `{"message": "Save Job Started"}` on success or
    /// `{"error": "..."}` and exits non-zero on failure.
    Save,

    /// Drop stored sessions and queue entries of tabs that are no longer open.
    ///
    /// Reads open tabs from `[tabs].file`.
    Reconcile,

    /// Start the HTTP host adapter on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Store initialized successfully.");
        }
        Commands::Status => {
            let store = db::open_store(&cfg).await?;
            let summary = session::summarize(&store).await?;
            println!("area:            {}", summary.area);
            println!("sessions:        {}", summary.sessions);
            println!("pending pages:   {}", summary.pending_pages);
            println!("url queue:       {}", summary.url_queue);
            println!("time queue:      {}", summary.time_queue);
            println!("authenticated:   {}", summary.authenticated);
            match summary.search_space_id {
                Some(id) => println!("search space:    {}", id),
                None => println!("search space:    (none)"),
            }
            println!(
                "backend:         {}",
                cfg.backend.resolve_url().as_deref().unwrap_or("(not configured)")
            );
        }
        Commands::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read snapshot: {}", file.display()))?;
            let snapshot: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", file.display()))?;
            let store = db::open_store(&cfg).await?;
            let keys = session::import_snapshot(&store, snapshot).await?;
            println!("imported keys: {}", keys.join(", "));
        }
        Commands::Login { token } => {
            let store = db::open_store(&cfg).await?;
            session::set_token(&store, &token).await?;
            println!("Token saved.");
        }
        Commands::Logout => {
            let store = db::open_store(&cfg).await?;
            session::clear_token(&store).await?;
            println!("Token removed.");
        }
        Commands::Select { id } => {
            let store = db::open_store(&cfg).await?;
            session::set_search_space_id(&store, id).await?;
            println!("Search space {} selected.", id);
        }
        Commands::Spaces => {
            run_spaces(&cfg).await?;
        }
        Commands::Save => {
            let store: Arc<dyn Store> = Arc::new(db::open_store(&cfg).await?);
            let dispatcher = Dispatcher::from_config(&cfg, store, tabs::from_config(&cfg))?;
            let response = handle_save(&dispatcher).await;
            println!("{}", serde_json::to_string(&response)?);
            if !response.is_ok() {
                std::process::exit(1);
            }
        }
        Commands::Reconcile => {
            let store = db::open_store(&cfg).await?;
            let oracle = tabs::from_config(&cfg);
            let report = reconcile::try_reconcile(&store, oracle.as_ref()).await?;
            if report.skipped {
                println!("reconcile: nothing captured yet");
            } else {
                println!("reconcile");
                println!("  live tabs: {}", report.live_tabs);
                println!(
                    "  sessions: kept {}, removed {}",
                    report.sessions.kept, report.sessions.removed
                );
                println!(
                    "  url queue: kept {}, removed {}",
                    report.url_queue.kept, report.url_queue.removed
                );
                println!(
                    "  time queue: kept {}, removed {}",
                    report.time_queue.kept, report.time_queue.removed
                );
                println!("ok");
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_spaces(cfg: &Config) -> anyhow::Result<()> {
    let Some(url) = cfg.backend.resolve_url() else {
        bail!("Backend URL not configured. Set [backend].url or {}.", config::BACKEND_URL_ENV);
    };
    let store = db::open_store(cfg).await?;
    let backend = Backend::new(&url, &cfg.backend)?;
    let spaces = spaces::list_search_spaces(&store, &backend).await?;

    let selected = session::load_search_space_id(&store).await?;
    println!("{:<3}{:<8} NAME", "", "ID");
    for space in spaces {
        let marker = if selected == Some(space.id) { "*" } else { "" };
        println!("{:<3}{:<8} {}", marker, space.id, space.name);
    }
    Ok(())
}

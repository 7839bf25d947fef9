// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ferry - operator CLI for the message relay.
//!
//! Inspects and maintains the relay's database: configuration checks,
//! session health, tasks and held approvals.

mod approvals;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ferry_config::model::FerryConfig;
use ferry_core::{FerryError, Store};
use ferry_storage::SqliteStore;

/// Ferry - per-message relay between chats.
#[derive(Parser, Debug)]
#[command(name = "ferry", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration and print the effective settings.
    Config,
    /// Show session health, task counts and pending approvals.
    Status,
    /// List forwarding tasks.
    Tasks {
        /// Only tasks owned by this user id.
        #[arg(long)]
        owner: Option<i64>,
    },
    /// Inspect or resolve messages held for manual approval.
    Approvals {
        #[command(subcommand)]
        action: ApprovalsCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ApprovalsCommands {
    /// List held messages.
    List {
        /// Include approved and rejected items.
        #[arg(long)]
        all: bool,
    },
    /// Reject a held message so it is never delivered.
    Reject {
        /// Approval id as shown by `ferry approvals list`.
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => ferry_config::load_and_validate_path(path),
        None => ferry_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            ferry_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.relay.log_level);

    if let Err(e) = run(cli, config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: FerryConfig) -> Result<(), FerryError> {
    let Some(command) = cli.command else {
        println!("ferry: use --help for available commands");
        return Ok(());
    };

    if let Commands::Config = command {
        return print_config(&config, cli.json);
    }

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&config.storage).await?);
    let result = match command {
        Commands::Status => status::run_status(store.as_ref(), &config.relay.name, cli.json).await,
        Commands::Tasks { owner } => status::run_tasks(store.as_ref(), owner, cli.json).await,
        Commands::Approvals {
            action: ApprovalsCommands::List { all },
        } => approvals::run_list(store.as_ref(), all, cli.json).await,
        Commands::Approvals {
            action: ApprovalsCommands::Reject { id },
        } => approvals::run_reject(Arc::clone(&store), &id).await,
        Commands::Config => Ok(()),
    };
    if let Err(e) = store.shutdown().await {
        tracing::warn!(error = %e, "store did not close cleanly");
    }
    result
}

/// Prints the validated configuration with the bot token masked.
fn print_config(config: &FerryConfig, json: bool) -> Result<(), FerryError> {
    let mut shown = config.clone();
    if shown.telegram.bot_token.is_some() {
        shown.telegram.bot_token = Some("********".to_string());
    }
    let rendered = if json {
        serde_json::to_string_pretty(&shown).map_err(|e| FerryError::Internal(e.to_string()))?
    } else {
        toml::to_string_pretty(&shown).map_err(|e| FerryError::Internal(e.to_string()))?
    };
    println!("{rendered}");
    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ferry={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

//! # Panier CLI
//!
//! Command-line front end for the shopping-list application.
//!
//! ## Command Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  panier [--config FILE] [--offline] <command>                          │
//! │                                                                         │
//! │  login / logout / mode <remote|offline>        account.rs               │
//! │  store   list | add | rename | delete          stores.rs                │
//! │  product list | add | edit | delete | prices   products.rs              │
//! │          scan                                                           │
//! │  list    show | add | remove | qty | delete    list.rs                  │
//! │          save | watch                                                   │
//! │  history list | export | delete                history.rs               │
//! │  reset                                         account.rs               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod commands;
mod prompt;
mod state;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use panier_sync::{BackendMode, PanierConfig};

use crate::commands::Command;
use crate::state::AppState;

/// Listes de courses par magasin, en ligne ou hors ligne.
#[derive(Parser, Debug)]
#[command(name = "panier", version, about, long_about = None)]
struct Cli {
    /// Config file (default: platform config directory)
    #[arg(long, env = "PANIER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Use the offline store for this run
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    // Switching mode must work before the config is complete
    if let Command::Mode { mode } = &cli.command {
        return commands::account::set_mode(cli.config.clone(), mode);
    }

    let mut config = PanierConfig::read(cli.config.clone()).context("Failed to read config")?;
    if cli.offline {
        config.backend.mode = BackendMode::Offline;
    }
    config.validate().context("Invalid configuration")?;
    debug!(mode = %config.mode(), "Configuration loaded");

    let state = AppState::init(config).await?;
    commands::run(&state, cli.command).await
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=panier=trace` - Show trace for panier crates only
/// - Default: `info,panier=debug,sqlx=warn`
///
/// Logs go to stderr; stdout carries command output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,panier=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

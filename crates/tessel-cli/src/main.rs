//! `tessel`: administer a Tessel data space and serve its API.
//!
//! # Usage
//!
//! ```text
//! tessel serve
//! tessel scripts list --status enabled
//! tessel ext install ./my-extension
//! tessel table add-column todos done --type checkbox
//! tessel table watch todos
//! ```
//!
//! Settings are read from `tessel.toml` (or `--config`) and `TESSEL_*`
//! environment variables.

mod commands;
mod config;
mod watch;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use commands::{ExtCommand, ScriptsCommand, TableCommand};
use config::TesselConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tessel", author, version, about = "Local-first data space")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "tessel.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Serve the JSON API over HTTP.
  Serve {
    /// Override the configured listen host.
    #[arg(long)]
    host: Option<String>,
    /// Override the configured listen port.
    #[arg(long)]
    port: Option<u16>,
  },
  /// Manage installed scripts.
  #[command(subcommand)]
  Scripts(ScriptsCommand),
  /// Manage installed extensions.
  #[command(subcommand)]
  Ext(ExtCommand),
  /// Work with user tables.
  #[command(subcommand)]
  Table(TableCommand),
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let mut cfg = TesselConfig::load(&cli.config)
    .with_context(|| format!("loading {}", cli.config.display()))?;

  match cli.command {
    Command::Serve { host, port } => {
      if let Some(host) = host {
        cfg.host = host;
      }
      if let Some(port) = port {
        cfg.port = port;
      }
      commands::serve(&cfg).await
    }
    Command::Scripts(cmd) => commands::scripts(&cfg, cmd).await,
    Command::Ext(cmd) => commands::ext(&cfg, cmd).await,
    Command::Table(cmd) => commands::table(&cfg, cmd).await,
  }
}

//! `touchbase`: check-in reminders from the terminal.
//!
//! # Usage
//!
//! ```
//! touchbase --user-id 42 sync
//! touchbase contacts
//! touchbase check-in 7 "How was the trip?"
//! touchbase --config ~/.config/touchbase/touchbase.toml unread
//! ```

mod client;
mod commands;
mod config;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use config::{Backend, Overrides, Settings};
use touchbase_store::{
  CacheContext,
  backend::{FileStorage, SqliteStorage},
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "touchbase", version, about = "Check-in reminders from the terminal")]
struct Cli {
  /// Path to a TOML settings file.
  #[arg(short, long, value_name = "FILE", env = "TOUCHBASE_CONFIG", default_value = "touchbase.toml")]
  config: PathBuf,

  /// Base URL of the API.
  #[arg(long)]
  base_url: Option<String>,

  /// Directory holding the local cache.
  #[arg(long, value_name = "DIR")]
  data_dir: Option<PathBuf>,

  /// Storage backend for the local cache.
  #[arg(long, value_enum)]
  backend: Option<Backend>,

  /// Id of the signed-in user.
  #[arg(long)]
  user_id: Option<u64>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Fetch the latest check-ins.
  Sync,
  /// List contacts by due date.
  Contacts,
  /// List groups by due date.
  Groups,
  /// Show one contact.
  Contact { id: u64 },
  /// Show one group and its members.
  Group { id: u64 },
  /// Show unread check-ins addressed to you.
  Unread,
  /// Send a check-in to a contact.
  CheckIn { person: u64, text: String },
  /// Check in with every member of a group.
  CheckInGroup { group: u64, text: String },
  /// Reply to a check-in.
  Reply { check_in: u64, text: String },
  /// Clear the local cache.
  Reset,
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
  let settings = Settings::load(&cli.config, Overrides {
    base_url: cli.base_url,
    data_dir: cli.data_dir,
    backend:  cli.backend,
    user_id:  cli.user_id,
  })?;

  let api = ApiClient::new(ApiConfig {
    base_url:     settings.base_url.clone(),
    access_token: settings.access_token.clone(),
    timeout:      Duration::from_secs(settings.timeout_secs),
  })?;

  match settings.backend {
    Backend::File => {
      let storage = FileStorage::open(&settings.data_dir)
        .await
        .with_context(|| format!("failed to open cache at {:?}", settings.data_dir))?;
      let ctx = CacheContext::new(Arc::new(storage));
      commands::run(&ctx, &api, &settings, cli.command).await
    }
    Backend::Sqlite => {
      tokio::fs::create_dir_all(&settings.data_dir)
        .await
        .with_context(|| format!("failed to create {:?}", settings.data_dir))?;
      let path = settings.data_dir.join("touchbase.sqlite3");
      let storage = SqliteStorage::open(&path)
        .await
        .with_context(|| format!("failed to open cache at {path:?}"))?;
      let ctx = CacheContext::new(Arc::new(storage));
      commands::run(&ctx, &api, &settings, cli.command).await
    }
  }
}

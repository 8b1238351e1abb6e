//! Layered settings: config file, then `TOUCHBASE_*` environment variables,
//! then command-line flags.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use touchbase_core::id::UserId;

/// Which storage backend holds the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
  /// One JSON file per store.
  #[default]
  File,
  /// A single SQLite database.
  Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  #[serde(default = "default_base_url")]
  pub base_url:     String,
  #[serde(default = "default_data_dir")]
  pub data_dir:     PathBuf,
  #[serde(default)]
  pub backend:      Backend,
  #[serde(default)]
  pub user_id:      Option<UserId>,
  #[serde(default)]
  pub access_token: Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_base_url() -> String { "http://localhost:8080/api".to_owned() }

fn default_data_dir() -> PathBuf { PathBuf::from("~/.local/share/touchbase") }

fn default_timeout_secs() -> u64 { 10 }

/// Values given on the command line; each one wins over file and environment.
#[derive(Debug, Default)]
pub struct Overrides {
  pub base_url: Option<String>,
  pub data_dir: Option<PathBuf>,
  pub backend:  Option<Backend>,
  pub user_id:  Option<u64>,
}

impl Settings {
  pub fn load(path: &Path, overrides: Overrides) -> anyhow::Result<Self> {
    let backend = overrides.backend.map(|b| match b {
      Backend::File => "file",
      Backend::Sqlite => "sqlite",
    });

    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("TOUCHBASE"))
      .set_override_option("base_url", overrides.base_url)?
      .set_override_option(
        "data_dir",
        overrides.data_dir.map(|p| p.to_string_lossy().into_owned()),
      )?
      .set_override_option("backend", backend)?
      .set_override_option("user_id", overrides.user_id)?
      .build()
      .with_context(|| format!("failed to read settings from {}", path.display()))?;

    let mut settings: Self = settings
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.data_dir = expand_tilde(&settings.data_dir);
    Ok(settings)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

//! Configuration loading.
//!
//! Values come from an optional TOML file layered with `TESSEL_*` environment
//! variables (`TESSEL_PORT=8080`, `TESSEL_STORE_PATH=...`). Anything unset
//! falls back to [`TesselConfig::default`].

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TesselConfig {
  /// SQLite file holding the data space.
  pub store_path:      PathBuf,
  /// Directory backing the extension file-system.
  pub extensions_root: PathBuf,
  pub host:            String,
  pub port:            u16,
}

impl Default for TesselConfig {
  fn default() -> Self {
    Self {
      store_path:      PathBuf::from("~/.local/share/tessel/space.sqlite3"),
      extensions_root: PathBuf::from("~/.local/share/tessel/files"),
      host:            "127.0.0.1".to_string(),
      port:            5233,
    }
  }
}

impl TesselConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("TESSEL"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise TesselConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.extensions_root = expand_tilde(&cfg.extensions_root);
    Ok(cfg)
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

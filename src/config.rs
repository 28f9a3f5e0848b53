use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::namespace_name;
use crate::sync::SchedulePolicy;

/// Environment variable overriding `remote.url`.
pub const REMOTE_URL_ENV: &str = "TODO_SYNC_REMOTE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub remote: RemoteConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  /// Where the offline database and logs live (defaults to the platform data dir)
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  #[serde(default = "default_remote_url")]
  pub url: String,
  /// Transport timeout; none means rely on the OS defaults
  pub timeout_secs: Option<u64>,
}

impl Default for RemoteConfig {
  fn default() -> Self {
    Self {
      url: default_remote_url(),
      timeout_secs: None,
    }
  }
}

fn default_remote_url() -> String {
  "http://localhost:8765".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Bumping this replaces the whole cache namespace on next install
  #[serde(default = "default_cache_version")]
  pub version: u32,
  /// Static shell resources seeded into a fresh namespace
  #[serde(default = "default_manifest")]
  pub manifest: Vec<String>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      version: default_cache_version(),
      manifest: default_manifest(),
    }
  }
}

impl CacheConfig {
  pub fn namespace(&self) -> String {
    namespace_name(self.version)
  }
}

fn default_cache_version() -> u32 {
  3
}

fn default_manifest() -> Vec<String> {
  [
    "/",
    "/assets/index.css",
    "/src/app.js",
    "/src/controller.js",
    "/src/helpers.js",
    "/src/template.js",
    "/src/store-remote.js",
    "/src/view.js",
    "/src/item.js",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Periodic retry interval; 0 disables the periodic trigger
  #[serde(default = "default_interval_secs")]
  pub interval_secs: u64,
  /// Connectivity probe interval; 0 disables the probe
  #[serde(default = "default_probe_secs")]
  pub probe_secs: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      interval_secs: default_interval_secs(),
      probe_secs: default_probe_secs(),
    }
  }
}

impl SyncConfig {
  pub fn policy(&self) -> SchedulePolicy {
    let period = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
    SchedulePolicy {
      interval: period(self.interval_secs),
      probe: period(self.probe_secs),
    }
  }
}

fn default_interval_secs() -> u64 {
  30
}

fn default_probe_secs() -> u64 {
  5
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./todo-sync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/todo-sync/config.yaml
  ///
  /// Falls back to defaults when no file exists. `TODO_SYNC_REMOTE_URL`
  /// overrides the remote url either way.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var(REMOTE_URL_ENV) {
      config.remote.url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("todo-sync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("todo-sync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Data directory, defaulting to `$XDG_DATA_HOME/todo-sync`.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("todo-sync"))
  }
}

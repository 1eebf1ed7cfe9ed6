use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::constants::constants;

/// User preferences stored in `prefs.toml` under the platform config directory.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct Config {
  /// Active keyword configuration (`Settings/<name>.json`).
  pub config_name: Option<String>,
  pub theme_name: Option<String>,
  pub fetch_timeout_secs: Option<u64>,
}

fn prefs_file() -> Option<PathBuf> {
  ProjectDirs::from("", "", "fastweb").map(|dirs| dirs.config_dir().join("prefs.toml"))
}

impl Config {
  pub fn load() -> Self {
    prefs_file().map(|path| Self::load_from(&path)).unwrap_or_default()
  }

  pub fn load_from(path: &Path) -> Self {
    let Ok(content) = std::fs::read_to_string(path) else {
      return Self::default();
    };
    match toml::from_str(&content) {
      Ok(config) => config,
      Err(e) => {
        warn!(path = %path.display(), err = %e, "config: ignoring malformed prefs");
        Self::default()
      }
    }
  }

  pub fn save(&self) {
    if let Some(path) = prefs_file() {
      self.save_to(&path);
    }
  }

  pub fn save_to(&self, path: &Path) {
    if let Some(dir) = path.parent()
      && std::fs::create_dir_all(dir).is_ok()
      && let Ok(content) = toml::to_string(self)
      && let Err(e) = std::fs::write(path, content)
    {
      warn!(path = %path.display(), err = %e, "config: failed to save prefs");
    }
  }

  /// The configured keyword file name, falling back to the built-in default.
  pub fn config_name(&self) -> String {
    self
      .config_name
      .as_deref()
      .map(str::trim)
      .filter(|name| !name.is_empty())
      .unwrap_or(constants().default_config_name.as_str())
      .to_string()
  }

  pub fn fetch_timeout(&self) -> Duration {
    Duration::from_secs(self.fetch_timeout_secs.filter(|secs| *secs > 0).unwrap_or(constants().fetch_timeout_secs))
  }
}

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (`RUST_LOG` syntax).
pub const LOG_ENV: &str = "FASTWEB_LOG";

pub fn logs_dir() -> PathBuf {
  ProjectDirs::from("", "", "fastweb")
    .map(|dirs| dirs.data_local_dir().join("logs"))
    .unwrap_or_else(|| std::env::temp_dir().join("fastweb").join("logs"))
}

/// Install the global subscriber writing to a daily-rotated file in [`logs_dir`].
///
/// The terminal belongs to the UI, so nothing is logged to stdout/stderr. Keep the
/// returned guard alive until exit so buffered lines are flushed.
pub fn init() -> Result<WorkerGuard> {
  let dir = logs_dir();
  std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;

  let appender = tracing_appender::rolling::daily(&dir, "fastweb.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn logs_dir_is_app_specific() {
    assert!(logs_dir().to_string_lossy().to_lowercase().contains("fastweb"));
  }
}

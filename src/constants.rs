//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! with no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  /// Configuration used when neither the CLI nor `prefs.toml` names one.
  pub default_config_name: String,

  // Data root layout
  pub settings_dir: String,
  pub images_dir: String,

  // Query sigils
  pub add_sigil: char,
  pub remove_sigil: char,

  // Favicon fetching
  pub fetch_timeout_secs: u64,
  pub user_agent: String,
  pub icon_sync_concurrency: usize,

  // Default iconography per theme
  pub light_icon: String,
  pub dark_icon: String,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed the first test run catches it.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

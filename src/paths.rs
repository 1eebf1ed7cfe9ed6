use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use crate::constants::constants;

/// Layout of the data root: `Settings/<name>.json` backing files and the flat `Images/` icon cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
  root: PathBuf,
}

impl DataPaths {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// The platform data directory (e.g. `~/.local/share/fastweb`), if one can be determined.
  pub fn platform_default() -> Option<Self> {
    ProjectDirs::from("", "", "fastweb").map(|dirs| Self::new(dirs.data_dir()))
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// A store bound to a missing root is permanently invalid.
  pub fn root_exists(&self) -> bool {
    self.root.is_dir()
  }

  pub fn settings_file(&self, config_name: &str) -> PathBuf {
    self.root.join(&constants().settings_dir).join(format!("{}.json", config_name))
  }

  pub fn images_dir(&self) -> PathBuf {
    self.root.join(&constants().images_dir)
  }

  /// Relative path stored in `iconPath` for a keyword's cached favicon.
  ///
  /// `Images/` stays flat: separators in the keyword become `_`, so no keyword can name a
  /// subdirectory or climb out of the data root.
  pub fn icon_relative_path(keyword: &str) -> String {
    format!("{}/{}.png", constants().images_dir, icon_stem(keyword))
  }

  /// Absolute location of a relative `iconPath`.
  pub fn resolve(&self, relative: &str) -> PathBuf {
    self.root.join(relative)
  }
}

fn icon_stem(keyword: &str) -> String {
  keyword.chars().map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c }).collect()
}

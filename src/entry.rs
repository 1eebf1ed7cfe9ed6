use serde::{Deserialize, Serialize};

/// One keyword → URL mapping, plus the relative path of its cached favicon.
///
/// `icon_path` is relative to the data root (e.g. `Images/gh.png`). Empty means
/// no icon has been cached yet and the theme's default icon is shown instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
  #[serde(alias = "Keyword")]
  pub keyword: String,
  #[serde(alias = "URL", alias = "Url")]
  pub url: String,
  #[serde(rename = "iconPath", alias = "IconPath", default)]
  pub icon_path: String,
}

impl EntryRecord {
  pub fn new(keyword: impl Into<String>, url: impl Into<String>) -> Self {
    Self { keyword: keyword.into(), url: url.into(), icon_path: String::new() }
  }

  pub fn has_icon_path(&self) -> bool {
    !self.icon_path.is_empty()
  }

  /// Case-insensitive substring match on the keyword. An empty needle matches everything.
  pub fn matches(&self, needle: &str) -> bool {
    if needle.is_empty() {
      return true;
    }
    self.keyword.to_lowercase().contains(&needle.to_lowercase())
  }
}

use std::sync::Arc;
use tracing::{info, warn};

use crate::browser::BrowserOpener;
use crate::constants::constants;
use crate::entry::EntryRecord;
use crate::icons::IconSet;
use crate::store::{RegistryStore, SyncHandle};

/// A raw search string plus the host's whitespace tokenization of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
  pub search: String,
  pub terms: Vec<String>,
}

impl Query {
  pub fn new(search: impl Into<String>) -> Self {
    let search = search.into();
    let terms = search.split_whitespace().map(str::to_string).collect();
    Self { search, terms }
  }
}

/// What activating a result does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  /// Informational result; activating it succeeds and does nothing.
  None,
  Open { url: String },
  Add { keyword: String, url: String },
  Remove { keyword: String },
}

/// One row of the result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultItem {
  pub title: String,
  pub subtitle: String,
  /// Path of the cached favicon, or the theme's default icon.
  pub icon: String,
  pub action: Action,
}

/// Result of running an [`Action`].
#[derive(Debug)]
pub struct Activation {
  pub success: bool,
  /// The icon sync pass scheduled by an add, if any.
  pub sync: Option<SyncHandle>,
}

impl Activation {
  fn done(success: bool) -> Self {
    Self { success, sync: None }
  }
}

/// Turns queries into result lists and runs the actions behind them.
///
/// - `+ keyword url` → a pending add
/// - `- text` → one remove result per keyword containing `text`
/// - anything else → one open result per keyword containing the input (empty lists all)
pub struct QueryResolver {
  store: RegistryStore,
  icons: IconSet,
  opener: Arc<dyn BrowserOpener>,
}

impl QueryResolver {
  pub fn new(store: RegistryStore, icons: IconSet, opener: Arc<dyn BrowserOpener>) -> Self {
    Self { store, icons, opener }
  }

  pub fn store(&self) -> &RegistryStore {
    &self.store
  }

  pub fn icons(&self) -> &IconSet {
    &self.icons
  }

  /// Swap in the icon set for a new theme.
  pub fn set_icons(&mut self, icons: IconSet) {
    self.icons = icons;
  }

  /// Bind to a freshly loaded store (configuration switch). The old store is dropped, not merged.
  pub fn replace_store(&mut self, store: RegistryStore) {
    self.store = store;
  }

  pub fn resolve(&self, query: &Query) -> Vec<ResultItem> {
    let c = constants();
    let mut results = Vec::new();

    if self.store.is_empty() {
      results.push(self.empty_store_hint());
    }

    let search = query.search.trim_start();
    if search.starts_with(c.add_sigil) {
      results.push(self.add_result(query));
    } else if let Some(rest) = search.strip_prefix(c.remove_sigil) {
      results.extend(self.store.lookup(rest.trim()).into_iter().map(|entry| ResultItem {
        title: format!("Remove {}", entry.keyword),
        subtitle: entry.url.clone(),
        icon: self.icon_for(&entry),
        action: Action::Remove { keyword: entry.keyword },
      }));
    } else {
      results.extend(self.store.lookup(search).into_iter().map(|entry| ResultItem {
        title: entry.keyword.clone(),
        subtitle: entry.url.clone(),
        icon: self.icon_for(&entry),
        action: Action::Open { url: entry.url },
      }));
    }

    results
  }

  /// Run a result's action. Failures are logged and reported through `success`.
  pub async fn activate(&self, action: &Action) -> Activation {
    match action {
      Action::None => Activation::done(true),
      Action::Open { url } => {
        let opened = self.opener.open(url);
        if !opened {
          warn!(url = %url, "resolver: browser did not open");
        }
        Activation::done(opened)
      }
      Action::Add { keyword, url } => {
        info!(keyword = %keyword, url = %url, "resolver: adding keyword");
        let sync = self.store.add(EntryRecord::new(keyword.as_str(), url.as_str())).await;
        Activation { success: sync.is_some(), sync }
      }
      Action::Remove { keyword } => {
        info!(keyword = %keyword, "resolver: removing keyword");
        Activation::done(self.store.remove(keyword).await)
      }
    }
  }

  fn add_result(&self, query: &Query) -> ResultItem {
    let sigil = constants().add_sigil;
    let args: Vec<&str> = query
      .terms
      .iter()
      .enumerate()
      .map(|(i, term)| if i == 0 { term.strip_prefix(sigil).unwrap_or(term.as_str()) } else { term.as_str() })
      .filter(|term| !term.is_empty())
      .collect();

    match args.as_slice() {
      [keyword, url] => ResultItem {
        title: "Add new keyword".to_string(),
        subtitle: format!("Keyword: {}, URL: {}", keyword, url),
        icon: self.icons.default_icon.clone(),
        action: Action::Add { keyword: keyword.to_string(), url: url.to_string() },
      },
      _ => ResultItem {
        title: "Add new keyword".to_string(),
        subtitle: format!("Usage: {} [keyword] [URL]", sigil),
        icon: self.icons.default_icon.clone(),
        action: Action::None,
      },
    }
  }

  fn empty_store_hint(&self) -> ResultItem {
    let subtitle = if self.store.is_valid() {
      format!(
        "Check {} or type `{} keyword url` to add one.",
        self.store.backing_file().display(),
        constants().add_sigil
      )
    } else {
      format!("Data directory for '{}' was not found; keywords cannot be saved.", self.store.config_name())
    };
    ResultItem {
      title: "No keywords configured".to_string(),
      subtitle,
      icon: self.icons.default_icon.clone(),
      action: Action::None,
    }
  }

  fn icon_for(&self, entry: &EntryRecord) -> String {
    match self.store.icon_location(entry) {
      Some(path) => path.display().to_string(),
      None => self.icons.default_icon.clone(),
    }
  }
}

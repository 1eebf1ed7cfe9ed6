use chrono::Local;
use futures::FutureExt;
use ratatui::widgets::ListState;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::config::Config;
use crate::favicon::FaviconFetcher;
use crate::icon_cache::IconCache;
use crate::icons::IconSet;
use crate::paths::DataPaths;
use crate::resolver::{Action, Query, QueryResolver, ResultItem};
use crate::store::{RegistryStore, SyncHandle};
use crate::theme::{self, THEMES};

/// Load the registry for `config_name` and start its initial icon sync.
pub async fn load_registry(paths: &DataPaths, config_name: &str, fetch_timeout: Duration) -> (RegistryStore, SyncHandle) {
  let icons = IconCache::new(paths.clone(), FaviconFetcher::new(fetch_timeout));
  RegistryStore::load(paths.clone(), config_name, icons).await
}

pub struct App {
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub theme_index: usize,
  pub results: Vec<ResultItem>,
  pub list_state: ListState,
  pub resolver: QueryResolver,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  pub should_quit: bool,
  paths: DataPaths,
  fetch_timeout: Duration,
  /// Set when `--config` pinned the configuration for this session.
  pinned_config: bool,
  /// Icon sync passes still running in the background.
  syncs: Vec<SyncHandle>,
  /// When the last error or status was set, used for auto-dismiss after 5 seconds.
  message_time: Option<Instant>,
}

impl App {
  pub fn new(
    resolver: QueryResolver,
    paths: DataPaths,
    theme_index: usize,
    fetch_timeout: Duration,
    pinned_config: bool,
  ) -> Self {
    let mut app = Self {
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      theme_index: theme_index.min(THEMES.len() - 1),
      results: Vec::new(),
      list_state: ListState::default(),
      resolver,
      last_error: None,
      status_message: None,
      should_quit: false,
      paths,
      fetch_timeout,
      pinned_config,
      syncs: Vec::new(),
      message_time: None,
    };
    app.resolver.set_icons(IconSet::for_theme(app.theme().host));
    app.refresh();
    app
  }

  pub fn theme(&self) -> &'static theme::Theme {
    // Safety: theme_index is clamped in new() and advanced modulo THEMES.len().
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.resolver.set_icons(IconSet::for_theme(self.theme().host));
    self.refresh();

    let mut config = Config::load();
    config.theme_name = Some(self.theme().name.to_string());
    config.save();
  }

  pub fn set_error(&mut self, msg: String) {
    self.status_message = None;
    self.last_error = Some(msg);
    self.message_time = Some(Instant::now());
  }

  pub fn set_status(&mut self, msg: String) {
    self.last_error = None;
    self.status_message = Some(msg);
    self.message_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
  }

  /// Clear stale messages after 5 seconds.
  pub fn expire_messages(&mut self) {
    if let Some(t) = self.message_time
      && t.elapsed() >= Duration::from_secs(5)
    {
      self.last_error = None;
      self.status_message = None;
      self.message_time = None;
    }
  }

  pub fn pending_syncs(&self) -> usize {
    self.syncs.len()
  }

  /// Re-resolve the current input. Keeps the selection in range.
  pub fn refresh(&mut self) {
    self.results = self.resolver.resolve(&Query::new(self.input.as_str()));
    if self.results.is_empty() {
      self.list_state.select(None);
    } else {
      let sel = self.list_state.selected().unwrap_or(0);
      self.list_state.select(Some(sel.min(self.results.len() - 1)));
    }
  }

  pub fn select_next(&mut self) {
    let count = self.results.len();
    if count > 0 {
      let i = self.list_state.selected().map_or(0, |i| (i + 1) % count);
      self.list_state.select(Some(i));
    }
  }

  pub fn select_previous(&mut self) {
    let count = self.results.len();
    if count > 0 {
      let i = self.list_state.selected().map_or(0, |i| if i == 0 { count - 1 } else { i - 1 });
      self.list_state.select(Some(i));
    }
  }

  pub fn clear_input(&mut self) {
    self.input.clear();
    self.cursor_position = 0;
    self.input_scroll = 0;
    self.list_state.select(Some(0));
    self.refresh();
  }

  pub fn track_sync(&mut self, handle: SyncHandle) {
    self.syncs.push(handle);
  }

  /// Give running sync passes up to `grace` to finish their persist before exit.
  pub async fn drain_syncs(&mut self, grace: Duration) {
    if self.syncs.is_empty() {
      return;
    }
    let pending = std::mem::take(&mut self.syncs);
    let count = pending.len();
    if tokio::time::timeout(grace, futures::future::join_all(pending)).await.is_err() {
      info!(count, "app: exiting with icon sync still running");
    }
  }

  /// Collect finished icon sync passes without waiting on running ones.
  pub fn poll_syncs(&mut self) {
    let (finished, running): (Vec<_>, Vec<_>) =
      std::mem::take(&mut self.syncs).into_iter().partition(|handle| handle.is_finished());
    self.syncs = running;

    let mut cached = 0;
    for handle in finished {
      match handle.now_or_never() {
        Some(Ok(report)) => cached += report.changed,
        Some(Err(e)) => {
          error!(err = %e, "app: icon sync task failed");
          self.set_error("Icon sync failed, see log for details.".to_string());
        }
        None => {}
      }
    }

    if cached > 0 {
      self.set_status(format!("Cached {} icon{} at {}", cached, if cached == 1 { "" } else { "s" }, Local::now().format("%H:%M")));
      self.refresh();
    }
  }

  /// Run the selected result's action.
  pub async fn activate_selected(&mut self) {
    let Some(item) = self.list_state.selected().and_then(|i| self.results.get(i)) else { return };
    let action = item.action.clone();
    let activation = self.resolver.activate(&action).await;
    if let Some(handle) = activation.sync {
      self.track_sync(handle);
    }

    match (&action, activation.success) {
      (Action::None, _) => {}
      (Action::Open { url }, true) => {
        self.set_status(format!("Opened {}", url));
      }
      (Action::Open { url }, false) => {
        self.set_error(format!("Failed to open {}", url));
      }
      (Action::Add { keyword, .. }, true) => {
        self.set_status(format!("Added '{}', fetching icon…", keyword));
        self.clear_input();
      }
      (Action::Add { keyword, .. }, false) => {
        self.set_error(format!("Could not add '{}'", keyword));
      }
      (Action::Remove { keyword }, true) => {
        self.set_status(format!("Removed '{}'", keyword));
      }
      (Action::Remove { keyword }, false) => {
        self.set_error(format!("Could not remove '{}'", keyword));
      }
    }
    self.refresh();
  }

  /// Re-read preferences and, if the configuration name changed, swap in a fresh store.
  pub async fn reload(&mut self) {
    if self.pinned_config {
      self.set_status("Configuration pinned by --config".to_string());
      return;
    }

    let config = Config::load();
    let name = config.config_name();
    self.fetch_timeout = config.fetch_timeout();
    if name == self.resolver.store().config_name() {
      self.set_status(format!("Configuration '{}' unchanged", name));
      return;
    }

    info!(from = %self.resolver.store().config_name(), to = %name, "app: switching configuration");
    let (store, handle) = load_registry(&self.paths, &name, self.fetch_timeout).await;
    self.resolver.replace_store(store);
    self.track_sync(handle);
    self.set_status(format!("Switched to '{}'", name));
    self.refresh();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::browser::BrowserOpener;
  use crate::entry::EntryRecord;
  use crate::store::test_support::{open_store, write_store};
  use std::sync::Arc;
  use tempfile::tempdir;

  struct NoBrowser;

  impl BrowserOpener for NoBrowser {
    fn open(&self, _url: &str) -> bool {
      false
    }
  }

  async fn app_with(root: &std::path::Path) -> App {
    let store = open_store(root, "FastWeb").await;
    let resolver = QueryResolver::new(store, IconSet::for_theme(THEMES[0].host), Arc::new(NoBrowser));
    App::new(resolver, DataPaths::new(root), 0, Duration::from_secs(1), true)
  }

  #[tokio::test]
  async fn refresh_tracks_input() {
    let dir = tempdir().expect("tempdir");
    write_store(
      dir.path(),
      "FastWeb",
      &[EntryRecord::new("gh", "https://github.com"), EntryRecord::new("yt", "https://youtube.com")],
    );
    let mut app = app_with(dir.path()).await;
    assert_eq!(app.results.len(), 2);
    assert_eq!(app.list_state.selected(), Some(0));

    app.input = "yt".to_string();
    app.refresh();
    assert_eq!(app.results.len(), 1);
    assert_eq!(app.results[0].title, "yt");
  }

  #[tokio::test]
  async fn selection_wraps() {
    let dir = tempdir().expect("tempdir");
    write_store(
      dir.path(),
      "FastWeb",
      &[EntryRecord::new("a", "https://a.example"), EntryRecord::new("b", "https://b.example")],
    );
    let mut app = app_with(dir.path()).await;
    app.select_next();
    assert_eq!(app.list_state.selected(), Some(1));
    app.select_next();
    assert_eq!(app.list_state.selected(), Some(0));
    app.select_previous();
    assert_eq!(app.list_state.selected(), Some(1));
  }

  #[tokio::test]
  async fn failed_open_sets_error() {
    let dir = tempdir().expect("tempdir");
    write_store(dir.path(), "FastWeb", &[EntryRecord::new("gh", "https://github.com")]);
    let mut app = app_with(dir.path()).await;
    app.activate_selected().await;
    assert_eq!(app.last_error.as_deref(), Some("Failed to open https://github.com"));
  }

  #[tokio::test]
  async fn remove_through_selected_result() {
    let dir = tempdir().expect("tempdir");
    write_store(dir.path(), "FastWeb", &[EntryRecord::new("gh", "https://github.com")]);
    let mut app = app_with(dir.path()).await;
    app.input = "-gh".to_string();
    app.refresh();
    app.activate_selected().await;
    assert_eq!(app.status_message.as_deref(), Some("Removed 'gh'"));
    assert!(app.resolver.store().is_empty());
  }

  #[tokio::test]
  async fn pinned_config_ignores_reload() {
    let dir = tempdir().expect("tempdir");
    let mut app = app_with(dir.path()).await;
    app.reload().await;
    assert_eq!(app.resolver.store().config_name(), "FastWeb");
    assert_eq!(app.status_message.as_deref(), Some("Configuration pinned by --config"));
  }
}

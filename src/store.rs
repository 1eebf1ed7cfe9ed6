use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::entry::EntryRecord;
use crate::icon_cache::IconCache;
use crate::paths::DataPaths;
use crate::sync::{self, SyncReport};

/// Handle to a detached icon sync pass. The interactive path never awaits it.
pub type SyncHandle = JoinHandle<SyncReport>;

/// The keyword registry for one named configuration.
///
/// Cloning is cheap and every clone refers to the same registry. The entry list sits
/// behind a mutex that is only held for in-memory reads and writes, never across an
/// `.await`; file writes are serialized separately so each persist writes a complete
/// snapshot (last writer wins).
#[derive(Clone)]
pub struct RegistryStore {
  inner: Arc<StoreInner>,
}

struct StoreInner {
  config_name: String,
  paths: DataPaths,
  backing_file: PathBuf,
  /// False when the data root is missing; every mutation is then a logged no-op.
  valid: bool,
  entries: StdMutex<Vec<EntryRecord>>,
  write_lock: AsyncMutex<()>,
  /// Number of successful persists.
  revision: AtomicU64,
  icons: IconCache,
}

impl RegistryStore {
  /// Read the registry for `config_name`. Never fails: a missing root, a missing file or
  /// malformed JSON all yield an empty store and an error in the log.
  pub async fn open(paths: DataPaths, config_name: &str, icons: IconCache) -> Self {
    let backing_file = paths.settings_file(config_name);
    let valid = paths.root_exists();

    let entries = if !valid {
      error!(root = %paths.root().display(), config = %config_name, "store: data root not found, store is read-only");
      Vec::new()
    } else {
      match read_entries(&backing_file).await {
        Ok(entries) => {
          info!(config = %config_name, count = entries.len(), "store: loaded");
          entries
        }
        Err(e) => {
          error!(config = %config_name, err = %format!("{:#}", e), "store: failed to load, starting empty");
          Vec::new()
        }
      }
    };

    Self {
      inner: Arc::new(StoreInner {
        config_name: config_name.to_string(),
        paths,
        backing_file,
        valid,
        entries: StdMutex::new(entries),
        write_lock: AsyncMutex::new(()),
        revision: AtomicU64::new(0),
        icons,
      }),
    }
  }

  /// [`open`](Self::open) the registry and start an icon sync pass for entries missing icons.
  pub async fn load(paths: DataPaths, config_name: &str, icons: IconCache) -> (Self, SyncHandle) {
    let store = Self::open(paths, config_name, icons).await;
    let handle = store.spawn_icon_sync(false);
    (store, handle)
  }

  fn entries(&self) -> MutexGuard<'_, Vec<EntryRecord>> {
    self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn config_name(&self) -> &str {
    &self.inner.config_name
  }

  pub fn backing_file(&self) -> &Path {
    &self.inner.backing_file
  }

  pub fn is_valid(&self) -> bool {
    self.inner.valid
  }

  pub fn len(&self) -> usize {
    self.entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries().is_empty()
  }

  pub fn revision(&self) -> u64 {
    self.inner.revision.load(Ordering::SeqCst)
  }

  pub(crate) fn icon_cache(&self) -> &IconCache {
    &self.inner.icons
  }

  /// Absolute path of the entry's cached icon, if it exists on disk.
  pub fn icon_location(&self, entry: &EntryRecord) -> Option<PathBuf> {
    if !entry.has_icon_path() {
      return None;
    }
    let path = self.inner.paths.resolve(&entry.icon_path);
    path.is_file().then_some(path)
  }

  /// All entries whose keyword contains `query` case-insensitively, in store order.
  /// An empty query lists everything.
  pub fn lookup(&self, query: &str) -> Vec<EntryRecord> {
    self.entries().iter().filter(|entry| entry.matches(query)).cloned().collect()
  }

  pub(crate) fn snapshot(&self) -> Vec<EntryRecord> {
    self.entries().clone()
  }

  /// Append `entry`, persist, and start an icon sync pass that persists again when done.
  ///
  /// Returns `None` without touching anything when the store is invalid or the entry is empty.
  pub async fn add(&self, entry: EntryRecord) -> Option<SyncHandle> {
    if !self.is_valid() {
      error!(config = %self.config_name(), keyword = %entry.keyword, "store: add ignored, store is invalid");
      return None;
    }
    if entry.keyword.trim().is_empty() || entry.url.trim().is_empty() {
      warn!(keyword = %entry.keyword, url = %entry.url, "store: add ignored, keyword and url are required");
      return None;
    }

    info!(config = %self.config_name(), keyword = %entry.keyword, url = %entry.url, "store: add");
    self.entries().push(entry);
    self.persist().await;
    Some(self.spawn_icon_sync(true))
  }

  /// Remove every entry whose keyword equals `keyword` exactly (case-sensitive).
  /// Persists and returns `true` if anything was removed.
  pub async fn remove(&self, keyword: &str) -> bool {
    if !self.is_valid() {
      error!(config = %self.config_name(), keyword = %keyword, "store: remove ignored, store is invalid");
      return false;
    }

    let removed = {
      let mut entries = self.entries();
      let before = entries.len();
      entries.retain(|entry| entry.keyword != keyword);
      before - entries.len()
    };

    if removed == 0 {
      debug!(config = %self.config_name(), keyword = %keyword, "store: nothing to remove");
      return false;
    }

    info!(config = %self.config_name(), keyword = %keyword, removed, "store: remove");
    self.persist().await;
    true
  }

  /// Write the full entry list to the backing file (temp file, then rename).
  ///
  /// Failures are logged; the return value only reports whether the write happened.
  pub async fn persist(&self) -> bool {
    if !self.is_valid() {
      error!(config = %self.config_name(), "store: persist ignored, store is invalid");
      return false;
    }

    let _guard = self.inner.write_lock.lock().await;
    let snapshot = self.snapshot();
    match write_entries(self.backing_file(), &snapshot).await {
      Ok(()) => {
        let revision = self.inner.revision.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(config = %self.config_name(), count = snapshot.len(), revision, "store: persisted");
        true
      }
      Err(e) => {
        error!(config = %self.config_name(), err = %format!("{:#}", e), "store: failed to persist");
        false
      }
    }
  }

  /// Copy icon paths found by a sync pass back onto the live entries.
  ///
  /// Entries are matched by keyword and url, so entries removed while the pass ran stay
  /// removed. Other entries sharing the keyword share the icon file too: they pick it up
  /// if they still lack a usable icon and the file exists. Returns how many live entries
  /// changed.
  pub(crate) fn apply_icons(&self, updated: &[EntryRecord]) -> usize {
    let paths = &self.inner.paths;
    let on_disk: Vec<bool> = updated.iter().map(|update| paths.resolve(&update.icon_path).is_file()).collect();

    let mut entries = self.entries();
    let mut changed = 0;
    for (update, exists) in updated.iter().zip(on_disk) {
      for entry in entries.iter_mut() {
        if entry.keyword != update.keyword || entry.icon_path == update.icon_path {
          continue;
        }
        let lacks_icon = !entry.has_icon_path() || !paths.resolve(&entry.icon_path).is_file();
        if entry.url == update.url || (exists && lacks_icon) {
          entry.icon_path = update.icon_path.clone();
          changed += 1;
        }
      }
    }
    changed
  }

  /// Run [`sync::run`] detached on the Tokio runtime.
  pub fn spawn_icon_sync(&self, force_persist: bool) -> SyncHandle {
    let store = self.clone();
    tokio::spawn(async move { sync::run(&store, force_persist).await })
  }
}

async fn read_entries(path: &Path) -> Result<Vec<EntryRecord>> {
  let text = tokio::fs::read_to_string(path).await.with_context(|| format!("Failed to read {}", path.display()))?;
  let entries: Option<Vec<EntryRecord>> =
    serde_json::from_str(&text).with_context(|| format!("Malformed keyword file {}", path.display()))?;
  Ok(entries.unwrap_or_default())
}

async fn write_entries(path: &Path, entries: &[EntryRecord]) -> Result<()> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("Failed to create settings directory {}", parent.display()))?;
  }
  let json = serde_json::to_vec_pretty(entries).context("Failed to serialize keyword entries")?;
  let tmp = path.with_extension("json.tmp");
  tokio::fs::write(&tmp, json).await.with_context(|| format!("Failed to write {}", tmp.display()))?;
  tokio::fs::rename(&tmp, path).await.with_context(|| format!("Failed to replace {}", path.display()))?;
  Ok(())
}

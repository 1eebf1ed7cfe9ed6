use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::constants::constants;
use crate::entry::EntryRecord;
use crate::store::RegistryStore;

/// Outcome of one background icon sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
  /// Entries that lacked a usable icon when the pass started.
  pub attempted: usize,
  /// Live entries whose `icon_path` was set by this pass.
  pub changed: usize,
  /// Whether the pass ended with a successful persist.
  pub persisted: bool,
}

/// Fetch icons for every entry missing one, then persist once if anything changed
/// (or unconditionally with `force_persist`).
///
/// Each fetch works on its own copy of an entry, so the tasks share nothing; results are
/// merged back in one step after all of them finish, and the single persist comes last.
pub async fn run(store: &RegistryStore, force_persist: bool) -> SyncReport {
  if !store.is_valid() {
    return SyncReport::default();
  }

  let icons = store.icon_cache();
  let mut seen = HashSet::new();
  let pending: Vec<EntryRecord> = store
    .snapshot()
    .into_iter()
    .filter(|entry| !icons.has_usable_icon(entry))
    // Entries sharing a keyword share one icon file; fetch it once.
    .filter(|entry| seen.insert(entry.keyword.clone()))
    .collect();
  let attempted = pending.len();
  debug!(config = %store.config_name(), attempted, force_persist, "sync: starting pass");

  let updated: Vec<EntryRecord> = stream::iter(pending)
    .map(|mut entry| async move {
      let changed = icons.ensure_cached(&mut entry).await;
      changed.then_some(entry)
    })
    .buffer_unordered(constants().icon_sync_concurrency.max(1))
    .filter_map(|updated| async move { updated })
    .collect()
    .await;

  let changed = store.apply_icons(&updated);
  let persisted = if force_persist || changed > 0 { store.persist().await } else { false };

  info!(config = %store.config_name(), attempted, changed, persisted, "sync: pass complete");
  SyncReport { attempted, changed, persisted }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::favicon::test_server::TestServer;
  use crate::store::test_support::{dead_url, open_store, write_store};
  use std::io::Cursor;
  use tempfile::tempdir;

  fn png_bytes() -> Vec<u8> {
    let image = image::DynamicImage::new_rgba8(1, 1);
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
  }

  #[tokio::test]
  async fn many_changes_persist_once() {
    let dir = tempdir().expect("tempdir");
    let server = TestServer::start(200, png_bytes()).await;
    write_store(
      dir.path(),
      "FastWeb",
      &[
        EntryRecord::new("one", server.url("/1")),
        EntryRecord::new("two", server.url("/2")),
        EntryRecord::new("three", server.url("/3")),
      ],
    );
    let store = open_store(dir.path(), "FastWeb").await;

    let report = run(&store, false).await;
    assert_eq!(report, SyncReport { attempted: 3, changed: 3, persisted: true });
    assert_eq!(store.revision(), 1);
    assert_eq!(server.hits(), 3);
    assert!(store.lookup("").iter().all(|e| e.icon_path == format!("Images/{}.png", e.keyword)));

    let reopened = open_store(dir.path(), "FastWeb").await;
    assert_eq!(reopened.lookup("two")[0].icon_path, "Images/two.png");
  }

  #[tokio::test]
  async fn nothing_changed_means_no_persist() {
    let dir = tempdir().expect("tempdir");
    write_store(dir.path(), "FastWeb", &[EntryRecord::new("down", dead_url())]);
    let store = open_store(dir.path(), "FastWeb").await;

    let report = run(&store, false).await;
    assert_eq!(report, SyncReport { attempted: 1, changed: 0, persisted: false });
    assert_eq!(store.revision(), 0);
  }

  #[tokio::test]
  async fn force_persist_writes_even_without_changes() {
    let dir = tempdir().expect("tempdir");
    write_store(dir.path(), "FastWeb", &[EntryRecord::new("down", dead_url())]);
    let store = open_store(dir.path(), "FastWeb").await;

    let report = run(&store, true).await;
    assert!(report.persisted);
    assert_eq!(report.changed, 0);
    assert_eq!(store.revision(), 1);
  }

  #[tokio::test]
  async fn entries_with_icons_are_skipped() {
    let dir = tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("Images")).unwrap();
    std::fs::write(dir.path().join("Images/gh.png"), png_bytes()).unwrap();
    let server = TestServer::start(200, png_bytes()).await;
    let mut cached = EntryRecord::new("gh", server.url("/"));
    cached.icon_path = "Images/gh.png".to_string();
    write_store(dir.path(), "FastWeb", &[cached]);
    let store = open_store(dir.path(), "FastWeb").await;

    let report = run(&store, false).await;
    assert_eq!(report, SyncReport::default());
    assert_eq!(server.hits(), 0);
    assert_eq!(store.revision(), 0);
  }

  #[tokio::test]
  async fn duplicate_keywords_fetch_once() {
    let dir = tempdir().expect("tempdir");
    let server = TestServer::start(200, png_bytes()).await;
    write_store(
      dir.path(),
      "FastWeb",
      &[EntryRecord::new("dup", server.url("/a")), EntryRecord::new("dup", server.url("/b"))],
    );
    let store = open_store(dir.path(), "FastWeb").await;

    let report = run(&store, false).await;
    assert_eq!(report.attempted, 1);
    assert_eq!(report.changed, 2);
    assert_eq!(server.hits(), 1);
    assert_eq!(store.revision(), 1);
    assert!(store.lookup("dup").iter().all(|e| e.icon_path == "Images/dup.png"));

    let reopened = open_store(dir.path(), "FastWeb").await;
    assert!(reopened.lookup("dup").iter().all(|e| e.icon_path == "Images/dup.png"));
  }

  #[tokio::test]
  async fn spawned_pass_runs_detached() {
    let dir = tempdir().expect("tempdir");
    let server = TestServer::start(200, png_bytes()).await;
    write_store(dir.path(), "FastWeb", &[EntryRecord::new("bg", server.url("/"))]);
    let store = open_store(dir.path(), "FastWeb").await;

    let handle = store.spawn_icon_sync(false);
    // Lookups don't wait for the pass.
    assert_eq!(store.lookup("bg").len(), 1);
    let report = handle.await.expect("sync task");
    assert_eq!(report.changed, 1);
    assert_eq!(store.lookup("bg")[0].icon_path, "Images/bg.png");
  }

  #[tokio::test]
  async fn invalid_store_does_nothing() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(&dir.path().join("missing"), "FastWeb").await;
    assert_eq!(run(&store, true).await, SyncReport::default());
    assert_eq!(store.revision(), 0);
  }
}

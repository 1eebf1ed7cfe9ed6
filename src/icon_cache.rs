use anyhow::{Context, Result};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::entry::EntryRecord;
use crate::favicon::FaviconFetcher;
use crate::paths::DataPaths;

/// Writes fetched favicons into the flat `Images/` directory, one `<keyword>.png` per entry.
#[derive(Debug, Clone)]
pub struct IconCache {
  paths: DataPaths,
  fetcher: FaviconFetcher,
}

impl IconCache {
  pub fn new(paths: DataPaths, fetcher: FaviconFetcher) -> Self {
    Self { paths, fetcher }
  }

  /// Whether the entry already points at an icon file that exists.
  pub fn has_usable_icon(&self, entry: &EntryRecord) -> bool {
    entry.has_icon_path() && self.paths.resolve(&entry.icon_path).is_file()
  }

  /// Make sure `entry` has a cached icon, fetching one if needed.
  ///
  /// Returns `true` only when `entry.icon_path` was set by this call. A failed fetch or
  /// write leaves the entry untouched.
  pub async fn ensure_cached(&self, entry: &mut EntryRecord) -> bool {
    if self.has_usable_icon(entry) {
      return false;
    }

    let relative = DataPaths::icon_relative_path(&entry.keyword);
    let target = self.paths.resolve(&relative);

    // A file left by an earlier run (or a hand-edited store) is adopted as-is.
    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
      debug!(keyword = %entry.keyword, path = %target.display(), "icon: adopting existing file");
      entry.icon_path = relative;
      return true;
    }

    let Some(bytes) = self.fetcher.fetch(&entry.url).await else {
      return false;
    };

    match write_icon(&self.paths.images_dir(), &target, bytes).await {
      Ok(()) => {
        info!(keyword = %entry.keyword, path = %target.display(), "icon: cached");
        entry.icon_path = relative;
        true
      }
      Err(e) => {
        warn!(keyword = %entry.keyword, err = %format!("{:#}", e), "icon: failed to write");
        false
      }
    }
  }
}

async fn write_icon(images_dir: &Path, target: &Path, bytes: Vec<u8>) -> Result<()> {
  tokio::fs::create_dir_all(images_dir)
    .await
    .with_context(|| format!("Failed to create image directory {}", images_dir.display()))?;
  let data = tokio::task::spawn_blocking(move || to_png(bytes)).await.context("Icon transcode task panicked")?;
  let tmp = tmp_path(target);
  tokio::fs::write(&tmp, &data).await.with_context(|| format!("Failed to write {}", tmp.display()))?;
  tokio::fs::rename(&tmp, target).await.with_context(|| format!("Failed to move icon into {}", target.display()))?;
  Ok(())
}

/// Re-encode decodable images (ICO, PNG, GIF, ...) as PNG so the `.png` name is honest.
/// Bytes the decoder doesn't understand are kept verbatim.
fn to_png(bytes: Vec<u8>) -> Vec<u8> {
  let Ok(image) = image::load_from_memory(&bytes) else {
    return bytes;
  };
  let mut out = Cursor::new(Vec::new());
  match image.write_to(&mut out, image::ImageFormat::Png) {
    Ok(()) => out.into_inner(),
    Err(_) => bytes,
  }
}

fn tmp_path(target: &Path) -> PathBuf {
  let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(".tmp");
  target.with_file_name(name)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::favicon::test_server::{TestServer, loopback_fetcher};
  use tempfile::tempdir;

  fn png_bytes() -> Vec<u8> {
    let image = image::DynamicImage::new_rgba8(2, 2);
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
  }

  #[tokio::test]
  async fn writes_icon_and_sets_relative_path() {
    let dir = tempdir().expect("tempdir");
    let server = TestServer::start(200, png_bytes()).await;
    let cache = IconCache::new(DataPaths::new(dir.path()), loopback_fetcher());
    let mut entry = EntryRecord::new("local", server.url("/app"));

    assert!(cache.ensure_cached(&mut entry).await);
    assert_eq!(entry.icon_path, "Images/local.png");
    let written = std::fs::read(dir.path().join("Images/local.png")).unwrap();
    assert!(image::load_from_memory(&written).is_ok());
  }

  #[tokio::test]
  async fn second_call_is_a_no_op() {
    let dir = tempdir().expect("tempdir");
    let server = TestServer::start(200, png_bytes()).await;
    let cache = IconCache::new(DataPaths::new(dir.path()), loopback_fetcher());
    let mut entry = EntryRecord::new("local", server.url("/"));

    assert!(cache.ensure_cached(&mut entry).await);
    assert_eq!(server.hits(), 1);
    assert!(!cache.ensure_cached(&mut entry).await);
    assert!(!cache.ensure_cached(&mut entry).await);
    assert_eq!(server.hits(), 1);
  }

  #[tokio::test]
  async fn existing_icon_makes_no_request() {
    let dir = tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("Images")).unwrap();
    std::fs::write(dir.path().join("Images/gh.png"), png_bytes()).unwrap();
    let server = TestServer::start(200, png_bytes()).await;
    let cache = IconCache::new(DataPaths::new(dir.path()), loopback_fetcher());
    let mut entry = EntryRecord::new("gh", server.url("/"));
    entry.icon_path = "Images/gh.png".to_string();

    assert!(!cache.ensure_cached(&mut entry).await);
    assert!(!cache.ensure_cached(&mut entry).await);
    assert_eq!(server.hits(), 0);
  }

  #[tokio::test]
  async fn adopts_file_already_on_disk() {
    let dir = tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("Images")).unwrap();
    std::fs::write(dir.path().join("Images/gh.png"), png_bytes()).unwrap();
    let server = TestServer::start(200, png_bytes()).await;
    let cache = IconCache::new(DataPaths::new(dir.path()), loopback_fetcher());
    let mut entry = EntryRecord::new("gh", server.url("/"));

    assert!(cache.ensure_cached(&mut entry).await);
    assert_eq!(entry.icon_path, "Images/gh.png");
    assert_eq!(server.hits(), 0);
  }

  #[tokio::test]
  async fn stale_icon_path_is_refetched() {
    let dir = tempdir().expect("tempdir");
    let server = TestServer::start(200, png_bytes()).await;
    let cache = IconCache::new(DataPaths::new(dir.path()), loopback_fetcher());
    let mut entry = EntryRecord::new("gh", server.url("/"));
    entry.icon_path = "Images/gone.png".to_string();

    assert!(cache.ensure_cached(&mut entry).await);
    assert_eq!(entry.icon_path, "Images/gh.png");
    assert_eq!(server.hits(), 1);
  }

  #[tokio::test]
  async fn keywords_with_separators_stay_in_images() {
    let root = tempdir().expect("tempdir");
    let data = root.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    let server = TestServer::start(200, png_bytes()).await;
    let cache = IconCache::new(DataPaths::new(&data), loopback_fetcher());

    let mut nested = EntryRecord::new("a/b", server.url("/"));
    assert!(cache.ensure_cached(&mut nested).await);
    assert_eq!(nested.icon_path, "Images/a_b.png");
    assert!(data.join("Images/a_b.png").is_file());
    assert!(!cache.ensure_cached(&mut nested).await);

    let mut climbing = EntryRecord::new("../../escaped", server.url("/"));
    assert!(cache.ensure_cached(&mut climbing).await);
    assert_eq!(climbing.icon_path, "Images/.._.._escaped.png");
    assert!(!root.path().join("escaped.png").exists());
    assert_eq!(server.hits(), 2);
  }

  #[tokio::test]
  async fn fetch_failure_leaves_entry_unchanged() {
    let dir = tempdir().expect("tempdir");
    let server = TestServer::start(500, Vec::new()).await;
    let cache = IconCache::new(DataPaths::new(dir.path()), loopback_fetcher());
    let mut entry = EntryRecord::new("broken", server.url("/"));

    assert!(!cache.ensure_cached(&mut entry).await);
    assert!(entry.icon_path.is_empty());
    assert!(!dir.path().join("Images/broken.png").exists());
  }

  #[test]
  fn undecodable_bytes_are_kept_verbatim() {
    let raw = b"definitely not an image".to_vec();
    assert_eq!(to_png(raw.clone()), raw);
  }

  #[test]
  fn decodable_bytes_become_png() {
    let bmp = {
      let image = image::DynamicImage::new_rgb8(1, 1);
      let mut out = Cursor::new(Vec::new());
      image.write_to(&mut out, image::ImageFormat::Bmp).unwrap();
      out.into_inner()
    };
    let converted = to_png(bmp);
    assert_eq!(image::guess_format(&converted).unwrap(), image::ImageFormat::Png);
  }
}

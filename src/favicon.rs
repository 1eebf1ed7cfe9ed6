use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::constants;

/// Best-effort `/favicon.ico` downloader. One attempt per call, no retries.
#[derive(Debug, Clone)]
pub struct FaviconFetcher {
  client: Client,
}

impl FaviconFetcher {
  /// Build a fetcher whose requests give up after `timeout`.
  pub fn new(timeout: Duration) -> Self {
    let client = Client::builder().timeout(timeout).user_agent(constants().user_agent.as_str()).build();
    match client {
      Ok(client) => Self { client },
      Err(e) => {
        warn!(err = %e, "favicon: failed to build configured HTTP client, using defaults");
        Self { client: Client::new() }
      }
    }
  }

  pub fn with_client(client: Client) -> Self {
    Self { client }
  }

  /// Download `<scheme>://<host>[:port]/favicon.ico` for `url`.
  ///
  /// Returns the body only for a success status with a non-empty body; malformed URLs,
  /// network errors, timeouts and error statuses all yield `None`.
  pub async fn fetch(&self, url: &str) -> Option<Vec<u8>> {
    let Some(icon_url) = favicon_url(url) else {
      warn!(url = %url, "favicon: cannot derive authority root");
      return None;
    };

    let response = match self.client.get(icon_url.as_str()).send().await {
      Ok(response) => response,
      Err(e) => {
        warn!(url = %icon_url, err = %e, "favicon: request failed");
        return None;
      }
    };

    let status = response.status();
    if !status.is_success() {
      warn!(url = %icon_url, status = status.as_u16(), "favicon: non-success status");
      return None;
    }

    match response.bytes().await {
      Ok(bytes) if bytes.is_empty() => {
        warn!(url = %icon_url, "favicon: empty body");
        None
      }
      Ok(bytes) => {
        debug!(url = %icon_url, len = bytes.len(), "favicon: fetched");
        Some(bytes.to_vec())
      }
      Err(e) => {
        warn!(url = %icon_url, err = %e, "favicon: failed to read body");
        None
      }
    }
  }
}

/// The favicon location for a page URL: its authority root plus `/favicon.ico`.
/// Only `http` and `https` URLs with a host qualify.
pub fn favicon_url(url: &str) -> Option<Url> {
  let parsed = Url::parse(url.trim()).ok()?;
  if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
    return None;
  }
  let root = parsed.origin().ascii_serialization();
  Url::parse(&format!("{}/favicon.ico", root)).ok()
}

#[cfg(test)]
pub(crate) mod test_server {
  //! Loopback HTTP server answering every request with a canned response.

  use std::net::SocketAddr;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  pub struct TestServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
  }

  impl TestServer {
    pub async fn start(status: u16, body: Vec<u8>) -> Self {
      let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
      let addr = listener.local_addr().expect("local addr");
      let hits = Arc::new(AtomicUsize::new(0));
      let paths = Arc::new(Mutex::new(Vec::new()));

      let hit_counter = Arc::clone(&hits);
      let seen_paths = Arc::clone(&paths);
      tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
          let body = body.clone();
          let hit_counter = Arc::clone(&hit_counter);
          let seen_paths = Arc::clone(&seen_paths);
          tokio::spawn(async move {
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
              let n = socket.read(&mut buf).await.unwrap_or(0);
              if n == 0 {
                break;
              }
              request.extend_from_slice(&buf[..n]);
              if request.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
              }
            }
            let request = String::from_utf8_lossy(&request);
            if let Some(path) = request.lines().next().and_then(|line| line.split(' ').nth(1)) {
              seen_paths.lock().unwrap().push(path.to_string());
            }
            hit_counter.fetch_add(1, Ordering::SeqCst);

            let reason = if status == 200 { "OK" } else { "Error" };
            let head = format!(
              "HTTP/1.1 {} {}\r\nContent-Type: image/x-icon\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
              status,
              reason,
              body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
          });
        }
      });

      Self { addr, hits, paths }
    }

    pub fn url(&self, path: &str) -> String {
      format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
      self.hits.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
      self.paths.lock().unwrap().clone()
    }
  }

  /// A fetcher that never goes through an environment proxy.
  pub fn loopback_fetcher() -> super::FaviconFetcher {
    let client = reqwest::Client::builder()
      .no_proxy()
      .timeout(std::time::Duration::from_secs(5))
      .build()
      .expect("loopback client");
    super::FaviconFetcher::with_client(client)
  }
}

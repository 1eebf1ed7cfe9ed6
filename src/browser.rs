use std::process::{Command, Stdio};
use tracing::{error, info};

/// Opens URLs in the user's default browser.
pub trait BrowserOpener: Send + Sync {
  /// Returns `false` if the browser could not be launched.
  fn open(&self, url: &str) -> bool;
}

/// Launches the platform opener (`open`, `xdg-open`, or the Windows URL protocol handler).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

/// The URL is always its own argument; no shell sees it, so `&` and `?` survive.
fn opener_command(url: &str) -> Command {
  #[cfg(target_os = "macos")]
  let mut cmd = Command::new("open");
  #[cfg(target_os = "windows")]
  let mut cmd = {
    let mut c = Command::new("rundll32");
    c.arg("url.dll,FileProtocolHandler");
    c
  };
  #[cfg(not(any(target_os = "macos", target_os = "windows")))]
  let mut cmd = Command::new("xdg-open");

  cmd.arg(url);
  cmd
}

impl BrowserOpener for SystemBrowser {
  fn open(&self, url: &str) -> bool {
    let mut cmd = opener_command(url);
    match cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null()).spawn() {
      Ok(mut child) => {
        info!(url = %url, "browser: opened");
        // Reap the child in a background thread to avoid zombie processes.
        std::thread::spawn(move || {
          let _ = child.wait();
        });
        true
      }
      Err(e) => {
        error!(url = %url, err = %e, "browser: failed to launch opener");
        false
      }
    }
  }
}

mod app;
mod browser;
mod config;
mod constants;
mod entry;
mod favicon;
mod icon_cache;
mod icons;
mod input;
mod logging;
mod paths;
mod resolver;
mod store;
mod sync;
mod theme;
mod ui;

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use app::{App, load_registry};
use browser::SystemBrowser;
use config::Config;
use favicon::FaviconFetcher;
use icon_cache::IconCache;
use icons::{HostTheme, IconSet};
use paths::DataPaths;
use resolver::{Query, QueryResolver};
use store::RegistryStore;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Open websites by keyword", long_about = None)]
struct Args {
  /// Keyword configuration to use (Settings/<NAME>.json). Defaults to prefs.toml, then "FastWeb".
  #[arg(short, long)]
  config: Option<String>,

  /// Data directory holding Settings/ and Images/. Not created if missing.
  #[arg(short, long)]
  data_dir: Option<PathBuf>,

  /// Color theme: 'light', 'dark', 'high-contrast-white' or 'high-contrast-black'
  #[arg(short, long)]
  theme: Option<HostTheme>,

  /// Resolve QUERY once, print "title<TAB>subtitle" lines and exit
  #[arg(short, long, conflicts_with = "sync")]
  query: Option<String>,

  /// Fetch missing favicons, save the keyword file and exit
  #[arg(long)]
  sync: bool,

  /// Print shell completions and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<Shell>,
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    clap_complete::generate(shell, &mut Args::command(), "fastweb", &mut std::io::stdout());
    return Ok(());
  }

  let _log_guard = match logging::init() {
    Ok(guard) => Some(guard),
    Err(e) => {
      eprintln!("fastweb: logging disabled: {:#}", e);
      None
    }
  };

  let config = Config::load();
  let paths = resolve_data_paths(args.data_dir.clone())?;
  let config_name = args.config.clone().unwrap_or_else(|| config.config_name());
  info!(root = %paths.root().display(), config = %config_name, "fastweb starting");

  if let Some(query) = &args.query {
    return print_query(&paths, &config_name, &config, query).await;
  }

  if args.sync {
    return run_sync(&paths, &config_name, &config).await;
  }

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, args, config, paths, config_name).await;
  ratatui::restore();
  result
}

/// `--data-dir` is used as given; the platform default is created on first run.
fn resolve_data_paths(explicit: Option<PathBuf>) -> Result<DataPaths> {
  if let Some(dir) = explicit {
    return Ok(DataPaths::new(dir));
  }
  let paths = DataPaths::platform_default().ok_or_else(|| anyhow!("Could not determine a data directory"))?;
  if let Err(e) = std::fs::create_dir_all(paths.root()) {
    warn!(root = %paths.root().display(), err = %e, "failed to create data directory");
  }
  Ok(paths)
}

fn initial_theme_index(args: &Args, config: &Config) -> usize {
  if let Some(host) = args.theme {
    return theme::for_host(host);
  }
  config.theme_name.as_deref().and_then(theme::position).unwrap_or(0)
}

async fn print_query(paths: &DataPaths, config_name: &str, config: &Config, query: &str) -> Result<()> {
  let icons = IconCache::new(paths.clone(), FaviconFetcher::new(config.fetch_timeout()));
  let store = RegistryStore::open(paths.clone(), config_name, icons).await;
  let host = theme::THEMES[config.theme_name.as_deref().and_then(theme::position).unwrap_or(0)].host;
  let resolver = QueryResolver::new(store, IconSet::for_theme(host), Arc::new(SystemBrowser));

  for item in resolver.resolve(&Query::new(query)) {
    println!("{}\t{}", item.title, item.subtitle);
  }
  Ok(())
}

async fn run_sync(paths: &DataPaths, config_name: &str, config: &Config) -> Result<()> {
  let icons = IconCache::new(paths.clone(), FaviconFetcher::new(config.fetch_timeout()));
  let store = RegistryStore::open(paths.clone(), config_name, icons).await;
  let report = sync::run(&store, false).await;
  println!(
    "{}: {} missing, {} cached, {}",
    store.backing_file().display(),
    report.attempted,
    report.changed,
    if report.persisted { "saved" } else { "not saved" }
  );
  Ok(())
}

async fn run(
  terminal: &mut DefaultTerminal,
  args: Args,
  config: Config,
  paths: DataPaths,
  config_name: String,
) -> Result<()> {
  let theme_index = initial_theme_index(&args, &config);
  let (store, initial_sync) = load_registry(&paths, &config_name, config.fetch_timeout()).await;
  let resolver = QueryResolver::new(store, IconSet::for_theme(theme::THEMES[theme_index].host), Arc::new(SystemBrowser));
  let mut app = App::new(resolver, paths, theme_index, config.fetch_timeout(), args.config.is_some());
  app.track_sync(initial_sync);

  loop {
    app.poll_syncs();
    app.expire_messages();

    terminal.draw(|frame| ui::ui(frame, &mut app)).context("Failed to draw frame")?;

    if event::poll(Duration::from_millis(100)).context("Failed to poll terminal events")? {
      match event::read().context("Failed to read terminal event")? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  info!(pending_syncs = app.pending_syncs(), "fastweb exiting");
  app.drain_syncs(config.fetch_timeout() + Duration::from_secs(1)).await;
  Ok(())
}

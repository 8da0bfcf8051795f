mod cache;
mod config;
mod error;
mod jira;
mod logging;
mod server;
mod tools;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use cache::{CacheLayer, MemoryStorage, NoopStorage, SqliteStorage};
use config::{CacheBackend, CacheConfig, Config};
use jira::{JiraClient, JiraService};
use server::McpServer;
use tools::ToolDispatcher;

#[derive(Parser, Debug)]
#[command(name = "jira-mcp")]
#[command(about = "Jira tools for MCP clients, served over stdio")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/jira-mcp/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Bypass the cache entirely
  #[arg(long)]
  no_cache: bool,

  /// Also write logs to this file (rotated daily)
  #[arg(long)]
  log_file: Option<PathBuf>,

  /// Log filter, e.g. "debug" or "jira_mcp=trace"
  #[arg(long)]
  log_level: Option<String>,
}

fn build_cache(config: &CacheConfig) -> Result<CacheLayer> {
  let cache = match config.backend {
    CacheBackend::Memory => CacheLayer::new(MemoryStorage::new()),
    CacheBackend::Sqlite => CacheLayer::new(SqliteStorage::open(config.path.as_deref())?),
    CacheBackend::Disabled => CacheLayer::new(NoopStorage),
  };
  Ok(cache.with_single_flight(config.single_flight))
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Command line overrides
  if args.no_cache {
    config.cache.backend = CacheBackend::Disabled;
  }
  if let Some(file) = args.log_file {
    config.logging.file = Some(file);
  }
  if let Some(level) = args.log_level {
    config.logging.level = level;
  }

  let _log_guard = logging::init(&config.logging)?;

  let cache = build_cache(&config.cache)?;
  let client = JiraClient::new(&config.jira)?;
  info!(
    url = %config.jira.url,
    backend = ?config.cache.backend,
    single_flight = config.cache.single_flight,
    "starting"
  );

  let service = JiraService::new(Arc::new(client), cache, config.cache.ttl);
  let server = McpServer::new(ToolDispatcher::new(service));
  server.run().await
}

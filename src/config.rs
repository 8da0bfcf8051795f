use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub jira: JiraConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
  /// Auto-detect based on URL: .atlassian.net = cloud, else on-premise
  #[default]
  Auto,
  /// Jira Cloud - uses Basic auth (email + API token as password)
  Cloud,
  /// Jira On-premise - uses Bearer auth (PAT)
  Onpremise,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
  pub url: String,
  #[serde(default)]
  pub email: String,
  /// Authentication type: auto, cloud, or onpremise
  #[serde(default)]
  pub auth_type: AuthType,
}

impl JiraConfig {
  /// The auth type with `Auto` resolved against the URL.
  pub fn resolved_auth_type(&self) -> AuthType {
    match self.auth_type {
      AuthType::Auto => {
        let host = url::Url::parse(&self.url)
          .ok()
          .and_then(|u| u.host_str().map(str::to_lowercase));
        match host {
          Some(h) if h.ends_with(".atlassian.net") => AuthType::Cloud,
          _ => AuthType::Onpremise,
        }
      }
      explicit => explicit,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  #[default]
  Memory,
  Sqlite,
  Disabled,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub backend: CacheBackend,
  /// Database file for the sqlite backend (default: $XDG_DATA_HOME/jira-mcp/cache.db)
  pub path: Option<PathBuf>,
  /// Run at most one remote fetch per key at a time
  pub single_flight: bool,
  pub ttl: TtlConfig,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend: CacheBackend::default(),
      path: None,
      single_flight: true,
      ttl: TtlConfig::default(),
    }
  }
}

/// Time-to-live per class of read, in seconds.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TtlConfig {
  /// Searches and other issue-state reads
  pub search: u64,
  /// Listings and metadata (projects, versions, boards, users)
  pub listing: u64,
  /// Rarely-changing reference data (fields, link types, server info)
  pub reference: u64,
}

impl Default for TtlConfig {
  fn default() -> Self {
    Self {
      search: 60,
      listing: 300,
      reference: 600,
    }
  }
}

impl TtlConfig {
  pub fn search(&self) -> Duration {
    Duration::from_secs(self.search)
  }

  pub fn listing(&self) -> Duration {
    Duration::from_secs(self.listing)
  }

  pub fn reference(&self) -> Duration {
    Duration::from_secs(self.reference)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Filter directive, e.g. "info" or "jira_mcp=debug". RUST_LOG takes precedence.
  pub level: String,
  /// Also write logs to a daily-rolling file at this path
  pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      file: None,
    }
  }
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jira-mcp.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jira-mcp/config.yaml
  /// 4. JIRA_URL / JIRA_EMAIL / JIRA_AUTH_TYPE environment variables
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Self::from_env(),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("jira-mcp.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jira-mcp").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  fn from_env() -> Result<Self> {
    let url = std::env::var("JIRA_URL").map_err(|_| {
      eyre!(
        "No configuration file found and JIRA_URL is not set. Create ~/.config/jira-mcp/config.yaml \
         or set JIRA_URL and JIRA_EMAIL."
      )
    })?;

    let auth_type = match std::env::var("JIRA_AUTH_TYPE") {
      Ok(v) => serde_yaml::from_str(&v).map_err(|_| eyre!("Invalid JIRA_AUTH_TYPE: {}", v))?,
      Err(_) => AuthType::Auto,
    };

    Ok(Config {
      jira: JiraConfig {
        url,
        email: std::env::var("JIRA_EMAIL").unwrap_or_default(),
        auth_type,
      },
      cache: CacheConfig::default(),
      logging: LoggingConfig::default(),
    })
  }

  /// Get the Jira API token from environment variables.
  ///
  /// Checks JIRA_MCP_TOKEN first, then JIRA_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("JIRA_MCP_TOKEN")
      .or_else(|_| std::env::var("JIRA_API_TOKEN"))
      .map_err(|_| {
        eyre!("Jira API token not found. Set JIRA_MCP_TOKEN or JIRA_API_TOKEN environment variable.")
      })
  }

  /// Get the personal access token for on-premise Jira.
  ///
  /// Checks JIRA_MCP_PAT, then falls back to the API token variables.
  pub fn get_personal_token() -> Result<String> {
    std::env::var("JIRA_MCP_PAT").or_else(|_| Self::get_api_token())
  }
}

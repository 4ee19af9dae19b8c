//! Application configuration for dxtscout.
//!
//! User config lives at `~/.dxtscout/dxtscout.toml`. The file only names the
//! environment variables that hold secrets; credentials themselves come from
//! the environment (optionally seeded from a `.env` file by the CLI).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DxtScoutError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dxtscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dxtscout";

/// Discovery queries run against both GitHub search surfaces.
pub const DEFAULT_QUERIES: [&str; 4] = [
    "manifest.json dxt extension",
    "anthropic dxt",
    "filename:manifest.json \"dxt_version\"",
    "mcp server extension",
];

// ---------------------------------------------------------------------------
// Config structs (matching dxtscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// GitHub API settings.
    #[serde(default)]
    pub github: GitHubConfig,

    /// Record store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Run behaviour.
    #[serde(default)]
    pub discovery: DiscoverySettings,
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST API root.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Name of the env var holding the GitHub token (never store the token itself).
    #[serde(default = "default_github_token_env")]
    pub token_env: String,

    /// Minimum ms between search requests (the search API allows ~30/min).
    #[serde(default = "default_search_delay")]
    pub search_delay_ms: u64,

    /// Minimum ms between content and repository reads.
    #[serde(default = "default_content_delay")]
    pub content_delay_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Search page size. Only the first page is read.
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Discovery queries.
    #[serde(default = "default_queries")]
    pub queries: Vec<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_env: default_github_token_env(),
            search_delay_ms: default_search_delay(),
            content_delay_ms: default_content_delay(),
            timeout_secs: default_timeout(),
            per_page: default_per_page(),
            queries: default_queries(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".into()
}
fn default_github_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_search_delay() -> u64 {
    2000
}
fn default_content_delay() -> u64 {
    500
}
fn default_timeout() -> u64 {
    30
}
fn default_per_page() -> u32 {
    100
}
fn default_queries() -> Vec<String> {
    DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect()
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Env var holding the store URL (`libsql://…`, `https://…`, or `file:…`).
    #[serde(default = "default_store_url_env")]
    pub url_env: String,

    /// Env var holding the store auth token.
    #[serde(default = "default_store_token_env")]
    pub token_env: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url_env: default_store_url_env(),
            token_env: default_store_token_env(),
        }
    }
}

fn default_store_url_env() -> String {
    "DXT_STORE_URL".into()
}
fn default_store_token_env() -> String {
    "DXT_STORE_TOKEN".into()
}

/// `[discovery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Candidates checked at once. 1 keeps the run strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Re-check non-matches recorded more than this many days ago.
    /// Unset means a non-match is never re-checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_match_ttl_days: Option<u32>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            non_match_ttl_days: None,
        }
    }
}

fn default_concurrency() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Runtime options (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime GitHub client options.
#[derive(Debug, Clone)]
pub struct GitHubOptions {
    pub api_base: String,
    pub search_delay_ms: u64,
    pub content_delay_ms: u64,
    pub timeout_secs: u64,
    pub per_page: u32,
}

impl From<&AppConfig> for GitHubOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_base: config.github.api_base.clone(),
            search_delay_ms: config.github.search_delay_ms,
            content_delay_ms: config.github.content_delay_ms,
            timeout_secs: config.github.timeout_secs,
            per_page: config.github.per_page,
        }
    }
}

/// Runtime discovery-run options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub queries: Vec<String>,
    pub concurrency: u32,
    pub non_match_ttl_days: Option<u32>,
    /// Check at most this many candidates (highest stars first).
    pub limit: Option<usize>,
}

impl From<&AppConfig> for RunOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            queries: config.github.queries.clone(),
            concurrency: config.discovery.concurrency.max(1),
            non_match_ttl_days: config.discovery.non_match_ttl_days,
            limit: None,
        }
    }
}

/// Secrets and endpoints required before any network call is made.
#[derive(Clone)]
pub struct Credentials {
    pub github_token: String,
    pub store_url: String,
    pub store_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("github_token", &"<redacted>")
            .field("store_url", &self.store_url)
            .field("store_token", &"<redacted>")
            .finish()
    }
}

/// Read all three credentials from the environment.
///
/// Every missing variable is reported in a single config error.
pub fn resolve_credentials(config: &AppConfig) -> Result<Credentials> {
    resolve_credentials_with(config, |name| std::env::var(name).ok())
}

/// Like [`resolve_credentials`], reading variables through `lookup`.
pub fn resolve_credentials_with(
    config: &AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Credentials> {
    let mut missing = Vec::new();
    let mut read = |name: &str| match lookup(name) {
        Some(val) if !val.trim().is_empty() => val.trim().to_string(),
        _ => {
            missing.push(name.to_string());
            String::new()
        }
    };

    let github_token = read(&config.github.token_env);
    let store_url = read(&config.store.url_env);
    let store_token = read(&config.store.token_env);

    if !missing.is_empty() {
        return Err(DxtScoutError::config(format!(
            "missing required environment variables: {}",
            missing.join(", ")
        )));
    }

    Ok(Credentials {
        github_token,
        store_url,
        store_token,
    })
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dxtscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DxtScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dxtscout/dxtscout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DxtScoutError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DxtScoutError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DxtScoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DxtScoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DxtScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

//! Application configuration for cfpscout.
//!
//! User config lives at `~/.cfpscout/cfpscout.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CfpScoutError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "cfpscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".cfpscout";

// ---------------------------------------------------------------------------
// Config structs (matching cfpscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Fetch layer settings.
    #[serde(default)]
    pub fetch: FetchSection,

    /// Retry/backoff schedule for failed URLs.
    #[serde(default)]
    pub retry: RetrySection,

    /// Extraction thresholds.
    #[serde(default)]
    pub extraction: ExtractionSection,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding `urls.db` and the HTML `cache/`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Maximum URLs processed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.cfpscout".into()
}
fn default_concurrency() -> u32 {
    5
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    /// Per-attempt HTTP timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Static fetch attempts per URL.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base delay for exponential backoff between static attempts.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// HTML cache time-to-live.
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,

    /// Whether SPA shells escalate to headless rendering.
    #[serde(default = "default_true")]
    pub render: bool,

    /// Timeout for one rendering session.
    #[serde(default = "default_render_timeout_secs")]
    pub render_timeout_secs: u64,

    /// Wait after page load and after consent dismissal.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            base_delay_ms: default_base_delay_ms(),
            cache_ttl_hours: default_cache_ttl_hours(),
            render: true,
            render_timeout_secs: default_render_timeout_secs(),
            settle_ms: default_settle_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_cache_ttl_hours() -> u64 {
    24
}
fn default_true() -> bool {
    true
}
fn default_render_timeout_secs() -> u64 {
    45
}
fn default_settle_ms() -> u64 {
    2000
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    /// Retry ceiling before a URL is marked permanently failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff per retry count, in hours. The last value repeats.
    #[serde(default = "default_backoff_hours")]
    pub backoff_hours: Vec<u64>,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_hours: default_backoff_hours(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_backoff_hours() -> Vec<u64> {
    vec![1, 6, 24]
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSection {
    /// Merged results below this are recorded as `low_confidence` failures.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_min_confidence() -> f64 {
    0.2
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config file + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetch configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub retries: u32,
    pub base_delay: Duration,
    pub cache_ttl: Duration,
    pub render: bool,
    pub render_timeout: Duration,
    pub settle: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        let f = &config.fetch;
        Self {
            timeout: Duration::from_secs(f.timeout_secs),
            retries: f.retries.clamp(1, 3),
            base_delay: Duration::from_millis(f.base_delay_ms),
            cache_ttl: Duration::from_secs(f.cache_ttl_hours * 3600),
            render: f.render,
            render_timeout: Duration::from_secs(f.render_timeout_secs),
            settle: Duration::from_millis(f.settle_ms),
        }
    }
}

/// Retry ceiling and backoff schedule for failed URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay indexed by `retry_count`; the last entry repeats.
    pub schedule: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RetryPolicy {
    fn from(config: &AppConfig) -> Self {
        let mut schedule: Vec<Duration> = config
            .retry
            .backoff_hours
            .iter()
            .map(|h| Duration::from_secs(h * 3600))
            .collect();
        if schedule.is_empty() {
            schedule = default_backoff_hours()
                .into_iter()
                .map(|h| Duration::from_secs(h * 3600))
                .collect();
        }
        Self {
            max_retries: config.retry.max_retries,
            schedule,
        }
    }
}

/// Runtime extraction settings.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub concurrency: usize,
    pub min_confidence: f64,
}

impl From<&AppConfig> for ExtractionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.defaults.concurrency.max(1) as usize,
            min_confidence: config.extraction.min_confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.cfpscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CfpScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.cfpscout/cfpscout.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| CfpScoutError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CfpScoutError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CfpScoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CfpScoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CfpScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve a configured directory, expanding a leading `~/`.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| CfpScoutError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None if path == "~" => dirs::home_dir()
            .ok_or_else(|| CfpScoutError::config("could not determine home directory")),
        None => Ok(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("backoff_hours"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.retry.max_retries, 3);
        assert_eq!(parsed.fetch.cache_ttl_hours, 24);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[fetch]
render = false

[retry]
backoff_hours = [2, 4]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(!config.fetch.render);
        assert_eq!(config.fetch.retries, 3);
        assert_eq!(config.defaults.concurrency, 5);

        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.schedule.len(), 2);
        assert_eq!(policy.schedule[1], Duration::from_secs(4 * 3600));
    }

    #[test]
    fn retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(
            policy.schedule,
            vec![
                Duration::from_secs(3600),
                Duration::from_secs(6 * 3600),
                Duration::from_secs(24 * 3600),
            ]
        );
    }

    #[test]
    fn fetch_config_clamps_retries() {
        let mut app = AppConfig::default();
        app.fetch.retries = 10;
        assert_eq!(FetchConfig::from(&app).retries, 3);
        app.fetch.retries = 0;
        assert_eq!(FetchConfig::from(&app).retries, 1);
    }

    #[test]
    fn expand_home_passthrough() {
        assert_eq!(expand_home("/var/lib/cfp").unwrap(), PathBuf::from("/var/lib/cfp"));
    }
}

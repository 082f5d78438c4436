//! Application configuration for tabharvest.
//!
//! User config lives at `~/.tabharvest/tabharvest.toml` and is read-only from
//! tabharvest's point of view. CLI flags override config file values, which
//! override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "tabharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".tabharvest";

// ---------------------------------------------------------------------------
// Config structs (matching tabharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Phase-one settings.
    #[serde(default)]
    pub warmup: WarmupSection,

    /// Confirmation checkpoint settings.
    #[serde(default)]
    pub confirm: ConfirmSection,

    /// Phase-two settings.
    #[serde(default)]
    pub extract: ExtractSection,

    /// Output artifact settings.
    #[serde(default)]
    pub artifact: ArtifactSection,

    /// Settings for contexts materialized over HTTP.
    #[serde(default)]
    pub fetch: FetchSection,
}

/// `[warmup]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupSection {
    /// Time each context stays active before moving on.
    #[serde(default = "default_settle_interval_ms")]
    pub settle_interval_ms: u64,
}

impl Default for WarmupSection {
    fn default() -> Self {
        Self {
            settle_interval_ms: default_settle_interval_ms(),
        }
    }
}

fn default_settle_interval_ms() -> u64 {
    150
}

/// `[confirm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmSection {
    /// Delay before the yes/no prompt is shown.
    #[serde(default = "default_confirm_delay_ms")]
    pub delay_ms: u64,
}

impl Default for ConfirmSection {
    fn default() -> Self {
        Self {
            delay_ms: default_confirm_delay_ms(),
        }
    }
}

fn default_confirm_delay_ms() -> u64 {
    200
}

/// `[extract]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractSection {
    /// Maximum in-flight extractions. `0` means one task per context.
    #[serde(default)]
    pub max_concurrency: usize,

    /// Deadline for a single context's extraction.
    #[serde(default = "default_extract_timeout_ms")]
    pub timeout_ms: u64,

    /// Sort identifiers before writing instead of keeping merge order.
    #[serde(default)]
    pub sort_output: bool,
}

impl Default for ExtractSection {
    fn default() -> Self {
        Self {
            max_concurrency: 0,
            timeout_ms: default_extract_timeout_ms(),
            sort_output: false,
        }
    }
}

fn default_extract_timeout_ms() -> u64 {
    10_000
}

/// `[artifact]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSection {
    /// Leading part of the artifact filename.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Directory artifacts are saved into.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for ArtifactSection {
    fn default() -> Self {
        Self {
            file_prefix: default_file_prefix(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_file_prefix() -> String {
    "magnets".into()
}
fn default_output_dir() -> String {
    ".".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    /// Request timeout for materializing a remote context.
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent sent when materializing remote contexts.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("tabharvest/", env!("CARGO_PKG_VERSION")).into()
}

// ---------------------------------------------------------------------------
// Harvest config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for one harvest process.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// How long each context stays active during warm-up.
    pub settle_interval: Duration,
    /// Delay before the confirmation prompt appears.
    pub confirm_delay: Duration,
    /// Cap on concurrent extractions (`None` = unbounded).
    pub max_concurrency: Option<usize>,
    /// Per-context extraction deadline.
    pub extract_timeout: Duration,
    /// Sort identifiers lexicographically before writing.
    pub sort_output: bool,
    /// Artifact filename prefix.
    pub file_prefix: String,
    /// Directory the artifact is saved into.
    pub output_dir: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for HarvestConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            settle_interval: Duration::from_millis(config.warmup.settle_interval_ms),
            confirm_delay: Duration::from_millis(config.confirm.delay_ms),
            max_concurrency: match config.extract.max_concurrency {
                0 => None,
                n => Some(n),
            },
            extract_timeout: Duration::from_millis(config.extract.timeout_ms),
            sort_output: config.extract.sort_output,
            file_prefix: config.artifact.file_prefix.clone(),
            output_dir: PathBuf::from(&config.artifact.output_dir),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.tabharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.tabharvest/tabharvest.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        HarvestError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    if config.artifact.file_prefix.trim().is_empty() {
        return Err(HarvestError::config("artifact.file_prefix must not be empty"));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("settle_interval_ms = 150"));
        assert!(toml_str.contains("file_prefix"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[extract]
max_concurrency = 8
sort_output = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.extract.max_concurrency, 8);
        assert_eq!(config.extract.timeout_ms, 10_000);
        assert_eq!(config.warmup.settle_interval_ms, 150);
        assert_eq!(config.confirm.delay_ms, 200);
    }

    #[test]
    fn harvest_config_from_app_config() {
        let harvest = HarvestConfig::from(&AppConfig::default());
        assert_eq!(harvest.settle_interval, Duration::from_millis(150));
        assert_eq!(harvest.confirm_delay, Duration::from_millis(200));
        assert_eq!(harvest.max_concurrency, None);
        assert!(!harvest.sort_output);
        assert_eq!(harvest.file_prefix, "magnets");

        let mut app = AppConfig::default();
        app.extract.max_concurrency = 3;
        assert_eq!(HarvestConfig::from(&app).max_concurrency, Some(3));
    }

    #[test]
    fn load_rejects_empty_prefix() {
        let dir = std::env::temp_dir().join(format!("th-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[artifact]\nfile_prefix = \"  \"\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("file_prefix"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_reports_malformed_toml() {
        let dir = std::env::temp_dir().join(format!("th-config-bad-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[warmup\nsettle_interval_ms = ").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, HarvestError::Config { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}

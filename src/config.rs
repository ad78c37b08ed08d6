/*!
 * Configuration support for gap analysis
 *
 * Provides runtime options for matching thresholds, keyword vocabulary and
 * progress/parallel behavior.
 */

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::locator::RoleKeywords;

/// Environment variable prefix (`GAPSCAN_MANUFACTURER_PREFIX_LEN`, ...)
pub const ENV_PREFIX: &str = "GAPSCAN";

/// Global configuration for the gap analysis pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapConfig {
    /// Characters of the refusal manufacturer that must appear in the active one
    #[serde(default = "default_manufacturer_prefix_len")]
    pub manufacturer_prefix_len: usize,

    /// Characters of the refused drug name that must appear in the active one
    #[serde(default = "default_drug_prefix_len")]
    pub drug_prefix_len: usize,

    /// Leading rows searched for the header
    #[serde(default = "default_header_scan_rows")]
    pub header_scan_rows: usize,

    /// Tokens with this many characters or fewer are discarded
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,

    /// Column keywords
    #[serde(default)]
    pub keywords: RoleKeywords,

    /// Marker that flags a validity cell as expired
    #[serde(default = "default_expired_marker")]
    pub expired_marker: String,

    /// Manufacturers shown in the gap ranking
    #[serde(default = "default_top_manufacturers")]
    pub top_manufacturers: usize,

    /// Whether to show progress bars during reconciliation
    #[serde(default, alias = "progress_bar")]
    pub enable_progress_bar: bool,

    /// Whether to classify refusal records in parallel
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            manufacturer_prefix_len: default_manufacturer_prefix_len(),
            drug_prefix_len: default_drug_prefix_len(),
            header_scan_rows: default_header_scan_rows(),
            min_token_len: default_min_token_len(),
            keywords: RoleKeywords::default(),
            expired_marker: default_expired_marker(),
            top_manufacturers: default_top_manufacturers(),
            enable_progress_bar: false,
            parallel: default_parallel(),
        }
    }
}

// Default value functions for serde
fn default_manufacturer_prefix_len() -> usize {
    MANUFACTURER_PREFIX_LEN
}

fn default_drug_prefix_len() -> usize {
    DRUG_PREFIX_LEN
}

fn default_header_scan_rows() -> usize {
    HEADER_SCAN_ROWS
}

fn default_min_token_len() -> usize {
    MIN_TOKEN_LEN
}

fn default_expired_marker() -> String {
    KEYWORD_EXPIRED.to_string()
}

fn default_top_manufacturers() -> usize {
    TOP_MANUFACTURERS
}

fn default_parallel() -> bool {
    true
}

impl GapConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration of the alternate workflow (15-character manufacturer prefix)
    pub fn alternate_workflow() -> Self {
        Self {
            manufacturer_prefix_len: ALTERNATE_MANUFACTURER_PREFIX_LEN,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - `GAPSCAN_MANUFACTURER_PREFIX_LEN`: number
    /// - `GAPSCAN_DRUG_PREFIX_LEN`: number
    /// - `GAPSCAN_HEADER_SCAN_ROWS`: number
    /// - `GAPSCAN_MIN_TOKEN_LEN`: number
    /// - `GAPSCAN_EXPIRED_MARKER`: text
    /// - `GAPSCAN_TOP_MANUFACTURERS`: number
    /// - `GAPSCAN_PROGRESS_BAR`: "true" or "false"
    /// - `GAPSCAN_PARALLEL`: "true" or "false"
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let var = |name: &str| std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok();

        if let Some(len) = var("MANUFACTURER_PREFIX_LEN").and_then(|v| v.parse().ok()) {
            config.manufacturer_prefix_len = len;
        }
        if let Some(len) = var("DRUG_PREFIX_LEN").and_then(|v| v.parse().ok()) {
            config.drug_prefix_len = len;
        }
        if let Some(rows) = var("HEADER_SCAN_ROWS").and_then(|v| v.parse().ok()) {
            config.header_scan_rows = rows;
        }
        if let Some(len) = var("MIN_TOKEN_LEN").and_then(|v| v.parse().ok()) {
            config.min_token_len = len;
        }
        if let Some(marker) = var("EXPIRED_MARKER") {
            config.expired_marker = marker;
        }
        if let Some(top) = var("TOP_MANUFACTURERS").and_then(|v| v.parse().ok()) {
            config.top_manufacturers = top;
        }
        if let Some(val) = var("PROGRESS_BAR") {
            config.enable_progress_bar = val.to_lowercase() == "true";
        }
        if let Some(val) = var("PARALLEL") {
            config.parallel = val.to_lowercase() == "true";
        }

        config
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| crate::GapError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                suggestion: Some("Check that the file is valid TOML format".to_string()),
            })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::GapError::Configuration {
                message: format!("Failed to serialize config: {}", e),
                suggestion: None,
            })?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/gapscan/config.toml` on Unix-like systems
    /// or `%APPDATA%\gapscan\config.toml` on Windows
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "gapscan")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Layer the default config file (if any) and `GAPSCAN_*` variables
    ///
    /// Later sources win: built-in defaults, then the file, then the
    /// environment.
    pub fn layered(config_file: Option<&Path>) -> crate::Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = config_file {
            builder = builder.add_source(::config::File::from(path).required(false));
        }
        builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .and_then(|settings| settings.try_deserialize::<Self>())
            .map_err(|e| crate::GapError::Configuration {
                message: format!("Failed to load configuration: {}", e),
                suggestion: Some(format!(
                    "Check the config file and {}_* environment variables",
                    ENV_PREFIX
                )),
            })
    }

    /// Load configuration from the default location and environment
    ///
    /// Falls back to environment variables alone if the layered load fails.
    pub fn load() -> Self {
        let path = Self::default_config_path();
        Self::layered(path.as_deref()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable configuration");
            Self::from_env()
        })
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<Option<GapConfig>> = RwLock::new(None);
}

/// Set the global configuration
pub fn set_global_config(config: GapConfig) {
    let mut guard = GLOBAL_CONFIG.write().unwrap_or_else(|e| e.into_inner());
    *guard = Some(config);
}

/// Get the global configuration (or load one if not set)
pub fn global_config() -> GapConfig {
    GLOBAL_CONFIG.read()
        .unwrap_or_else(|e| e.into_inner())
        .as_ref()
        .cloned()
        .unwrap_or_else(GapConfig::load)
}

/// Clear the global configuration
pub fn clear_global_config() {
    let mut guard = GLOBAL_CONFIG.write().unwrap_or_else(|e| e.into_inner());
    *guard = None;
}

/// Builder for customizing configuration
pub struct ConfigBuilder {
    config: GapConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Start building a new configuration
    pub fn new() -> Self {
        Self {
            config: GapConfig::default(),
        }
    }

    pub fn manufacturer_prefix_len(mut self, len: usize) -> Self {
        self.config.manufacturer_prefix_len = len;
        self
    }

    pub fn drug_prefix_len(mut self, len: usize) -> Self {
        self.config.drug_prefix_len = len;
        self
    }

    pub fn header_scan_rows(mut self, rows: usize) -> Self {
        self.config.header_scan_rows = rows;
        self
    }

    pub fn min_token_len(mut self, len: usize) -> Self {
        self.config.min_token_len = len;
        self
    }

    /// Replace the column keyword table
    pub fn keywords(mut self, keywords: RoleKeywords) -> Self {
        self.config.keywords = keywords;
        self
    }

    pub fn expired_marker(mut self, marker: &str) -> Self {
        self.config.expired_marker = marker.to_string();
        self
    }

    pub fn top_manufacturers(mut self, n: usize) -> Self {
        self.config.top_manufacturers = n;
        self
    }

    /// Set progress bar enabled
    pub fn progress_bar(mut self, enabled: bool) -> Self {
        self.config.enable_progress_bar = enabled;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Build the configuration
    pub fn build(self) -> GapConfig {
        self.config
    }
}

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles the configuration of the orchestration core including
/// loading, validating and saving configuration settings.
/// Represents the crate configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Generative-text API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Reading-speed scaling used by the subtitle trimmer
    #[serde(default)]
    pub speed_factor: SpeedFactorConfig,

    /// Durable storage locations and persistence tuning
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Generative-text API configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiConfig {
    /// API key for the service
    #[serde(default = "String::new")]
    pub key: String,

    /// Model identifier (e.g., "claude-3-haiku")
    #[serde(default = "default_model")]
    pub model: String,

    /// Service endpoint URL (optional, for self-hosted gateways)
    #[serde(default = "String::new")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            model: default_model(),
            endpoint: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Reading-speed factors for duration estimation
///
/// Dividing an estimated duration by `max` models the "read faster" capacity
/// of a viewer, producing a lower bound on the feasible subtitle duration.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpeedFactorConfig {
    /// Minimum acceptable speed multiplier
    #[serde(default = "default_speed_min")]
    pub min: f64,

    /// Maximum acceptable speed multiplier
    #[serde(default = "default_speed_max")]
    pub max: f64,
}

impl Default for SpeedFactorConfig {
    fn default() -> Self {
        Self {
            min: default_speed_min(),
            max: default_speed_max(),
        }
    }
}

/// Storage configuration for the response log and usage counters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding one JSON document per log partition
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// JSON document holding the usage counters
    #[serde(default = "default_usage_file")]
    pub usage_file: PathBuf,

    /// Minimum seconds between two debounced usage-counter flushes
    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            usage_file: default_usage_file(),
            save_interval_secs: default_save_interval_secs(),
        }
    }
}

fn default_model() -> String {
    "claude-3-haiku".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_speed_min() -> f64 {
    1.0
}

fn default_speed_max() -> f64 {
    1.4
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("output/llm_log")
}

fn default_usage_file() -> PathBuf {
    PathBuf::from("output/usage_counter.json")
}

fn default_save_interval_secs() -> u64 {
    // 5 minutes between debounced flushes
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            speed_factor: SpeedFactorConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.api.key.trim().is_empty() {
            return Err(anyhow!("api.key is missing in the configuration"));
        }
        if self.api.model.trim().is_empty() {
            return Err(anyhow!("api.model is missing in the configuration"));
        }
        if self.speed_factor.min <= 0.0 {
            return Err(anyhow!("speed_factor.min must be positive"));
        }
        if self.speed_factor.max < self.speed_factor.min {
            return Err(anyhow!(
                "speed_factor.max ({}) must not be below speed_factor.min ({})",
                self.speed_factor.max,
                self.speed_factor.min
            ));
        }
        Ok(())
    }
}

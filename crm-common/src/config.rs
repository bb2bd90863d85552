//! Bootstrap configuration loading
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables (applied by the binary through clap `env`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing TOML file is not fatal: a warning is logged and defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CRM_CONFIG";

/// Default HTTP port for crm-leads
pub const DEFAULT_PORT: u16 = 5780;

/// Default model served by Hugging Face style inference endpoints
pub const DEFAULT_MODEL_NAME: &str = "distilbert-base-uncased-finetuned-sst-2-english";

/// Bootstrap configuration loaded from TOML
///
/// Cannot change while the service runs; restart to pick up edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Background enrichment worker pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Number of concurrent enrichment workers
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Which sentiment model backs the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierBackend {
    /// Built-in word list model, no network access
    Lexicon,
    /// Hugging Face style text-classification endpoint
    Http,
}

/// Sentiment classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_backend")]
    pub backend: ClassifierBackend,

    /// Inference endpoint URL (required for the `http` backend)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token sent to the inference endpoint
    #[serde(default)]
    pub api_token: Option<String>,

    /// Model name, used for logging and endpoint defaults
    #[serde(default = "default_model")]
    pub model: String,

    /// Notes are truncated to this many characters before inference
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Per-request timeout for the `http` backend
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_workers() -> usize {
    2
}

fn default_backend() -> ClassifierBackend {
    ClassifierBackend::Lexicon
}

fn default_model() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

fn default_max_input_chars() -> usize {
    512
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            host: default_host(),
            port: default_port(),
            logging: LoggingConfig::default(),
            enrichment: EnrichmentConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoint: None,
            api_token: None,
            model: default_model(),
            max_input_chars: default_max_input_chars(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl TomlConfig {
    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.enrichment.workers == 0 {
            return Err(Error::Config(
                "enrichment.workers must be at least 1".to_string(),
            ));
        }
        if self.classifier.max_input_chars == 0 {
            return Err(Error::Config(
                "classifier.max_input_chars must be at least 1".to_string(),
            ));
        }
        if self.classifier.backend == ClassifierBackend::Http
            && self
                .classifier
                .endpoint
                .as_deref()
                .map_or(true, |e| e.trim().is_empty())
        {
            return Err(Error::Config(
                "classifier.endpoint is required when classifier.backend = \"http\"".to_string(),
            ));
        }
        Ok(())
    }

    /// Database path, falling back to `crm.db` inside the data folder
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| default_data_folder().join("crm.db"))
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse TOML {}: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, or defaults if the file does not exist
///
/// A file that exists but fails to parse is still an error.
pub fn load_or_default(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let config = load_toml_config(path)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve which config file to read
///
/// CLI argument, then `CRM_CONFIG`, then the per-user config directory.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::config_dir()
        .map(|d| d.join("crm").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("crm.toml"))
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("crm"))
        .unwrap_or_else(|| PathBuf::from("./crm_data"))
}

/// Write config back out as TOML
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize TOML: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

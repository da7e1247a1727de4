//! Configuration management
//!
//! This module handles loading, validation, and management of the tripsquad
//! configuration. Configuration is stored in TOML format at
//! ~/.tripsquad/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level and data directory
//! - **memory**: Chunk size, default result limit, partition prefix, retention
//! - **orchestrator**: Concurrency bound, per-call timeout and request defaults
//! - **llm**: Optional text-generation backend (Ollama)
//! - **persistence**: Snapshot backend (`memory` or `sqlite`)
//!
//! # Examples
//!
//! ```no_run
//! use tripsquad_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Chunk size: {}", config.memory.max_chunk_size);
//! # Ok(())
//! # }
//! ```

use sdk::errors::SquadError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    pub core: CoreConfig,

    /// Associative memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Workflow settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Text-generation backend (optional)
    #[serde(default)]
    pub llm: LLMConfig,

    /// Snapshot persistence
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Memory system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Records longer than this many characters are chunked
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Result limit used when a query does not set one
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Partition names are `<prefix>_<suffix>`
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,

    /// Days a fragment is kept before cleanup removes it
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Hours between scheduled retention cleanups
    #[serde(default = "default_cleanup_interval_hours")]
    pub cleanup_interval_hours: u64,
}

impl MemoryConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_hours * 3600)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            max_results: default_max_results(),
            collection_prefix: default_collection_prefix(),
            retention_days: default_retention_days(),
            cleanup_interval_hours: default_cleanup_interval_hours(),
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Projects allowed in flight at once
    #[serde(default = "default_max_concurrent_projects")]
    pub max_concurrent_projects: usize,

    /// Upper bound for any single worker call
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    #[serde(default = "default_duration")]
    pub default_duration: u32,

    #[serde(default = "default_budget")]
    pub default_budget: f64,

    #[serde(default = "default_travelers")]
    pub default_travelers: u32,

    /// Finished projects kept in memory; older ones are served from snapshots
    #[serde(default = "default_max_finished_projects")]
    pub max_finished_projects: usize,

    /// Messages kept in the bus log before the oldest are dropped
    #[serde(default = "default_bus_log_capacity")]
    pub bus_log_capacity: usize,
}

impl OrchestratorConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_projects: default_max_concurrent_projects(),
            call_timeout_secs: default_call_timeout_secs(),
            default_duration: default_duration(),
            default_budget: default_budget(),
            default_travelers: default_travelers(),
            max_finished_projects: default_max_finished_projects(),
            bus_log_capacity: default_bus_log_capacity(),
        }
    }
}

/// Text-generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Ask the backend for itinerary overviews
    #[serde(default)]
    pub enabled: bool,

    /// Base URL for the Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

/// Snapshot persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// `memory` or `sqlite`
    #[serde(default = "default_persistence_backend")]
    pub backend: String,

    /// SQLite file name, relative to `core.data_dir`
    #[serde(default = "default_db_file")]
    pub db_file: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: default_persistence_backend(),
            db_file: default_db_file(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.tripsquad")
}

fn default_max_chunk_size() -> usize {
    1000
}

fn default_max_results() -> usize {
    10
}

fn default_collection_prefix() -> String {
    "tripsquad_knowledge".to_string()
}

fn default_retention_days() -> u32 {
    365
}

fn default_cleanup_interval_hours() -> u64 {
    24
}

fn default_max_finished_projects() -> usize {
    256
}

fn default_bus_log_capacity() -> usize {
    10_000
}

fn default_max_concurrent_projects() -> usize {
    8
}

fn default_call_timeout_secs() -> u64 {
    60
}

fn default_duration() -> u32 {
    7
}

fn default_budget() -> f64 {
    2000.0
}

fn default_travelers() -> u32 {
    1
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_persistence_backend() -> String {
    "memory".to_string()
}

fn default_db_file() -> PathBuf {
    PathBuf::from("tripsquad.db")
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    /// Load configuration from the default location (~/.tripsquad/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written, TOML parsing
    /// fails, or validation fails.
    pub fn load_or_create() -> Result<Self, SquadError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, SquadError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SquadError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| SquadError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, SquadError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SquadError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default_config();
        config.validate_and_process()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| SquadError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| SquadError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.tripsquad/config.toml)
    fn default_config_path() -> Result<PathBuf, SquadError> {
        let home = dirs::home_dir()
            .ok_or_else(|| SquadError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".tripsquad").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
            },
            memory: MemoryConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            llm: LLMConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }

    /// Absolute path of the SQLite snapshot database.
    pub fn db_path(&self) -> PathBuf {
        if self.persistence.db_file.is_absolute() {
            self.persistence.db_file.clone()
        } else {
            self.core.data_dir.join(&self.persistence.db_file)
        }
    }

    /// Validate and process configuration
    ///
    /// Checks value ranges, expands ~ in the data directory and creates it
    /// if it doesn't exist.
    fn validate_and_process(&mut self) -> Result<(), SquadError> {
        self.validate()?;

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                SquadError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }

    /// Range checks that need no file system access.
    pub fn validate(&self) -> Result<(), SquadError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(SquadError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.memory.max_chunk_size == 0 {
            return Err(SquadError::Config(
                "memory.max_chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.memory.max_results == 0 {
            return Err(SquadError::Config(
                "memory.max_results must be greater than 0".to_string(),
            ));
        }
        if self.memory.cleanup_interval_hours == 0 {
            return Err(SquadError::Config(
                "memory.cleanup_interval_hours must be greater than 0".to_string(),
            ));
        }
        if self.memory.collection_prefix.trim().is_empty() {
            return Err(SquadError::Config(
                "memory.collection_prefix must not be empty".to_string(),
            ));
        }

        if self.orchestrator.max_finished_projects == 0 || self.orchestrator.bus_log_capacity == 0 {
            return Err(SquadError::Config(
                "orchestrator.max_finished_projects and bus_log_capacity must be greater than 0"
                    .to_string(),
            ));
        }
        if self.orchestrator.max_concurrent_projects == 0 {
            return Err(SquadError::Config(
                "orchestrator.max_concurrent_projects must be greater than 0".to_string(),
            ));
        }
        if self.orchestrator.call_timeout_secs == 0 {
            return Err(SquadError::Config(
                "orchestrator.call_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.orchestrator.default_budget <= 0.0 || self.orchestrator.default_duration == 0 {
            return Err(SquadError::Config(
                "orchestrator defaults must be positive".to_string(),
            ));
        }

        let valid_backends = ["memory", "sqlite"];
        if !valid_backends.contains(&self.persistence.backend.as_str()) {
            return Err(SquadError::Config(format!(
                "Invalid persistence backend '{}'. Must be one of: {}",
                self.persistence.backend,
                valid_backends.join(", ")
            )));
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, SquadError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| SquadError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| SquadError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| SquadError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.memory.max_chunk_size, 1000);
        assert_eq!(config.memory.max_results, 10);
        assert_eq!(config.orchestrator.default_duration, 7);
        assert_eq!(config.persistence.backend, "memory");
        assert!(!config.llm.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        assert_eq!(expand_path(&path).unwrap(), path);
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let mut config = Config::default_config();
        config.memory.max_chunk_size = 0;
        assert!(matches!(config.validate(), Err(SquadError::Config(_))));
    }

    #[test]
    fn test_housekeeping_defaults_and_bounds() {
        let mut config = Config::default_config();
        assert_eq!(config.memory.cleanup_interval(), Duration::from_secs(24 * 3600));
        assert_eq!(config.orchestrator.max_finished_projects, 256);
        assert_eq!(config.orchestrator.bus_log_capacity, 10_000);

        config.memory.cleanup_interval_hours = 0;
        assert!(matches!(config.validate(), Err(SquadError::Config(_))));

        let mut config = Config::default_config();
        config.orchestrator.max_finished_projects = 0;
        assert!(matches!(config.validate(), Err(SquadError::Config(_))));
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let mut config = Config::default_config();
        config.persistence.backend = "postgres".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("postgres"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [core]
            log_level = "debug"

            [memory]
            max_chunk_size = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.memory.max_chunk_size, 500);
        assert_eq!(config.memory.max_results, 10);
        assert_eq!(config.orchestrator.call_timeout_secs, 60);
    }

    #[test]
    fn test_db_path_is_relative_to_data_dir() {
        let mut config = Config::default_config();
        config.core.data_dir = PathBuf::from("/var/lib/tripsquad");
        assert_eq!(
            config.db_path(),
            PathBuf::from("/var/lib/tripsquad/tripsquad.db")
        );
    }
}

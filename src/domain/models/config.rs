use serde::{Deserialize, Serialize};

/// Main configuration structure for magcat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Pipeline defaults applied when the CLI flags leave them unset
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` catalogue database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".magcat/catalogue.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Pipeline defaults: the scales and clustering parameters used when a
/// caller does not choose explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Default native scale for homogenisation
    #[serde(default = "default_native_scale")]
    pub native_scale: String,

    /// Default target scale for homogenisation
    #[serde(default = "default_target_scale")]
    pub target_scale: String,

    /// Merge threshold for hierarchical clustering, in metric units
    /// (seconds for the origin-time metric)
    #[serde(default = "default_clustering_threshold")]
    pub clustering_threshold: f64,
}

fn default_native_scale() -> String {
    "mb".to_string()
}

fn default_target_scale() -> String {
    "Mw".to_string()
}

const fn default_clustering_threshold() -> f64 {
    200.0
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            native_scale: default_native_scale(),
            target_scale: default_target_scale(),
            clustering_threshold: default_clustering_threshold(),
        }
    }
}

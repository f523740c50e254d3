use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::core::matcher::MatchThresholds;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub google: GoogleSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSettings {
    pub api_key: String,
    #[serde(default = "default_geocode_url")]
    pub geocode_url: String,
    #[serde(default = "default_distance_matrix_url")]
    pub distance_matrix_url: String,
}

fn default_geocode_url() -> String {
    "https://maps.googleapis.com/maps/api/geocode/json".to_string()
}

fn default_distance_matrix_url() -> String {
    "https://maps.googleapis.com/maps/api/distancematrix/json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_driving_threshold")]
    pub driving_threshold_miles: f64,
    #[serde(default = "default_straight_line_threshold")]
    pub straight_line_threshold_miles: f64,
    #[serde(default = "default_zip_prefix_length")]
    pub zip_prefix_length: usize,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            driving_threshold_miles: default_driving_threshold(),
            straight_line_threshold_miles: default_straight_line_threshold(),
            zip_prefix_length: default_zip_prefix_length(),
        }
    }
}

fn default_driving_threshold() -> f64 {
    15.0
}
fn default_straight_line_threshold() -> f64 {
    30.0
}
fn default_zip_prefix_length() -> usize {
    1
}

impl From<MatchingSettings> for MatchThresholds {
    fn from(settings: MatchingSettings) -> Self {
        Self {
            driving_threshold_miles: settings.driving_threshold_miles,
            straight_line_threshold_miles: settings.straight_line_threshold_miles,
            zip_prefix_length: settings.zip_prefix_length,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with CNI_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            // Add default config file
            .add_source(File::with_name("config/default").required(false))
            // Add local config file (for development overrides)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with CNI)
            // e.g., CNI__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("CNI")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = apply_env_overrides(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("CNI")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Fold the conventional standalone environment variables (the names the
/// deployment scripts already export) into the layered config.
fn apply_env_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let database_url = env::var("DATABASE_URL")
        .or_else(|_| env::var("CNI_DATABASE__URL"))
        .ok();

    let api_key = env::var("GOOGLE_MAPS_API_KEY")
        .or_else(|_| env::var("CNI_GOOGLE__API_KEY"))
        .ok();

    let mut builder = Config::builder().add_source(settings);

    if let Some(url) = database_url {
        builder = builder.set_override("database.url", url)?;
    }
    if let Some(key) = api_key {
        builder = builder.set_override("google.api_key", key)?;
    }

    builder.build()
}

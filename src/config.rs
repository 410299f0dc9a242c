//! Configuration management for the `TripWeaver` application
//!
//! Handles loading configuration from files and environment variables,
//! and provides validation for all configuration settings.

use crate::TripweaverError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the `TripWeaver` application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripweaverConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Relational cache settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Geocoding provider settings
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    /// Places-search provider settings
    #[serde(default)]
    pub places: PlacesConfig,
    /// Generative text provider settings
    #[serde(default)]
    pub generative: GenerativeConfig,
    /// Location resolver heuristics
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_server_host")]
    pub host: String,
    /// Listen port
    #[serde(default = "default_server_port")]
    pub port: u16,
}

/// Relational cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file location
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Geocoding provider configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Maps platform API key
    pub api_key: Option<String>,
    /// Base URL for the geocoding API
    #[serde(default = "default_geocoding_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_geocoding_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of retries for transient failures
    #[serde(default = "default_provider_max_retries")]
    pub max_retries: u32,
}

/// Places-search provider configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacesConfig {
    /// Maps platform API key (may be shared with geocoding)
    pub api_key: Option<String>,
    /// Base URL for the places API
    #[serde(default = "default_places_base_url")]
    pub base_url: String,
    /// Per-category search timeout in seconds
    #[serde(default = "default_places_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of retries for transient failures
    #[serde(default = "default_provider_max_retries")]
    pub max_retries: u32,
    /// Maximum places returned per category
    #[serde(default = "default_places_per_category")]
    pub max_per_category: usize,
    /// Locale bias passed to text search when the request carries none
    #[serde(default = "default_language")]
    pub language: String,
}

/// Generative text provider configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerativeConfig {
    /// API key for the chat-completions endpoint
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_generative_base_url")]
    pub base_url: String,
    /// Model identifier
    #[serde(default = "default_generative_model")]
    pub model: String,
    /// Completion timeout in seconds
    #[serde(default = "default_generative_timeout")]
    pub timeout_seconds: u32,
    /// Sampling temperature
    #[serde(default = "default_generative_temperature")]
    pub temperature: f32,
    /// Completion token budget
    #[serde(default = "default_generative_max_tokens")]
    pub max_tokens: u32,
}

/// Location resolver heuristics
///
/// The suffix list drives ambiguity detection: candidates whose locality
/// names collapse to the same base name after suffix stripping, but whose
/// administrative regions differ, are treated as distinct same-named
/// cities. Kept as data so new ambiguous pairs need no code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Minimum candidate confidence to keep (0.0-1.0)
    #[serde(default = "default_resolver_min_confidence")]
    pub min_confidence: f32,
    /// Administrative suffixes stripped when comparing locality names
    #[serde(default = "default_admin_suffixes")]
    pub admin_suffixes: Vec<String>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_database_path() -> String {
    "tripweaver.db".to_string()
}

fn default_geocoding_base_url() -> String {
    "https://maps.googleapis.com/maps/api".to_string()
}

fn default_geocoding_timeout() -> u32 {
    5
}

fn default_places_base_url() -> String {
    "https://places.googleapis.com".to_string()
}

fn default_places_timeout() -> u32 {
    10
}

fn default_provider_max_retries() -> u32 {
    2
}

fn default_places_per_category() -> usize {
    10
}

fn default_language() -> String {
    "en".to_string()
}

fn default_generative_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_generative_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_generative_timeout() -> u32 {
    20
}

fn default_generative_temperature() -> f32 {
    0.7
}

fn default_generative_max_tokens() -> u32 {
    1200
}

fn default_resolver_min_confidence() -> f32 {
    0.3
}

fn default_admin_suffixes() -> Vec<String> {
    [
        " metropolitan city",
        " special city",
        " city",
        "-si",
        "-gun",
        "-gu",
        "특별시",
        "광역시",
        "시",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_geocoding_base_url(),
            timeout_seconds: default_geocoding_timeout(),
            max_retries: default_provider_max_retries(),
        }
    }
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_places_base_url(),
            timeout_seconds: default_places_timeout(),
            max_retries: default_provider_max_retries(),
            max_per_category: default_places_per_category(),
            language: default_language(),
        }
    }
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_generative_base_url(),
            model: default_generative_model(),
            timeout_seconds: default_generative_timeout(),
            temperature: default_generative_temperature(),
            max_tokens: default_generative_max_tokens(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_resolver_min_confidence(),
            admin_suffixes: default_admin_suffixes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for TripweaverConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            geocoding: GeocodingConfig::default(),
            places: PlacesConfig::default(),
            generative: GenerativeConfig::default(),
            resolver: ResolverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TripweaverConfig {
    /// Load configuration from the default file location and environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from the specified path
    ///
    /// A missing file is fine; environment variables with the `TRIPWEAVER_`
    /// prefix override file values either way (e.g.
    /// `TRIPWEAVER_PLACES__API_KEY`).
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| PathBuf::from("tripweaver.toml"));
        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("TRIPWEAVER")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let config: TripweaverConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.geocoding.timeout_seconds == 0 || self.geocoding.timeout_seconds > 60 {
            return Err(
                TripweaverError::config("Geocoding timeout must be between 1 and 60 seconds")
                    .into(),
            );
        }

        if self.places.timeout_seconds == 0 || self.places.timeout_seconds > 120 {
            return Err(TripweaverError::config(
                "Places search timeout must be between 1 and 120 seconds",
            )
            .into());
        }

        if self.generative.timeout_seconds == 0 || self.generative.timeout_seconds > 300 {
            return Err(TripweaverError::config(
                "Generative timeout must be between 1 and 300 seconds",
            )
            .into());
        }

        if self.places.max_per_category == 0 || self.places.max_per_category > 50 {
            return Err(TripweaverError::config(
                "Places per category must be between 1 and 50",
            )
            .into());
        }

        if !(0.0..=1.0).contains(&self.resolver.min_confidence) {
            return Err(TripweaverError::config(
                "Resolver minimum confidence must be between 0.0 and 1.0",
            )
            .into());
        }

        if !(0.0..=2.0).contains(&self.generative.temperature) {
            return Err(TripweaverError::config(
                "Generative temperature must be between 0.0 and 2.0",
            )
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(TripweaverError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(TripweaverError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("geocoding", &self.geocoding.base_url),
            ("places", &self.places.base_url),
            ("generative", &self.generative.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(TripweaverError::config(format!(
                    "The {name} base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        if self.database.path.trim().is_empty() {
            return Err(TripweaverError::config("Database path cannot be empty").into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TripweaverConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.places.max_per_category, 10);
        assert_eq!(config.places.language, "en");
        assert_eq!(config.logging.level, "info");
        assert!(config.geocoding.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_suffix_defaults_cover_common_admin_units() {
        let config = TripweaverConfig::default();
        assert!(
            config
                .resolver
                .admin_suffixes
                .iter()
                .any(|s| s == " metropolitan city")
        );
        assert!(config.resolver.admin_suffixes.iter().any(|s| s == "-si"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = TripweaverConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid log level")
        );
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = TripweaverConfig::default();
        config.places.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Places search timeout")
        );
    }

    #[test]
    fn test_config_validation_bad_base_url() {
        let mut config = TripweaverConfig::default();
        config.generative.base_url = "ftp://nope".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = TripweaverConfig::load_from_path(Some(PathBuf::from(
            "definitely-missing-tripweaver.toml",
        )))
        .unwrap();
        assert_eq!(config.server.port, 8080);
    }
}

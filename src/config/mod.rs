//! Configuration management
//!
//! This module handles loading and parsing configuration for Inkwell.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Content rules
    #[serde(default)]
    pub content: ContentConfig,
    /// Site settings defaults
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Bearer token guarding the admin API. Admin routes are closed when unset.
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            admin_token: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/inkwell.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Content rules applied by the post service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Reject status changes that are not in the transition table
    #[serde(default = "default_enforce_transitions")]
    pub enforce_status_transitions: bool,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            enforce_status_transitions: default_enforce_transitions(),
        }
    }
}

fn default_enforce_transitions() -> bool {
    true
}

/// Settings section of the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Fallback values for site settings that have no stored row.
    /// Entries given here override the built-in set key by key.
    #[serde(default)]
    pub defaults: SettingsDefaults,
}

/// Default values for site settings, keyed by setting name.
///
/// Handed to the settings repository at construction; used both as the
/// read fallback and as the seed set for `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsDefaults(BTreeMap<String, String>);

impl SettingsDefaults {
    /// An empty defaults map
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// The defaults shipped with Inkwell
    pub fn builtin() -> Self {
        let entries = [
            ("site_name", "Inkwell"),
            ("site_description", "A blog powered by Inkwell"),
            ("site_url", ""),
            ("posts_per_page", "10"),
            ("footer_text", ""),
            ("comments_enabled", "true"),
            ("comment_moderation", "true"),
        ];
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Add or replace a default
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Overlay `other` on top of these defaults
    pub fn merged_with(mut self, other: SettingsDefaults) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SettingsDefaults {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FromIterator<(String, String)> for SettingsDefaults {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        // A partial defaults section extends the built-in set instead of replacing it
        let configured = std::mem::replace(&mut config.settings.defaults, SettingsDefaults::empty());
        config.settings.defaults = SettingsDefaults::builtin().merged_with(configured);

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - INKWELL_SERVER_HOST
    /// - INKWELL_SERVER_PORT
    /// - INKWELL_SERVER_CORS_ORIGIN
    /// - INKWELL_SERVER_ADMIN_TOKEN
    /// - INKWELL_DATABASE_DRIVER
    /// - INKWELL_DATABASE_URL
    /// - INKWELL_CONTENT_ENFORCE_STATUS_TRANSITIONS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("INKWELL_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("INKWELL_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("INKWELL_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(token) = std::env::var("INKWELL_SERVER_ADMIN_TOKEN") {
            if !token.trim().is_empty() {
                self.server.admin_token = Some(token);
            }
        }

        if let Ok(driver) = std::env::var("INKWELL_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("INKWELL_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(flag) = std::env::var("INKWELL_CONTENT_ENFORCE_STATUS_TRANSITIONS") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.content.enforce_status_transitions = true,
                "0" | "false" | "no" => self.content.enforce_status_transitions = false,
                _ => {}
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test module that touches INKWELL_* variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_VARS: &[&str] = &[
    "INKWELL_SERVER_HOST",
    "INKWELL_SERVER_PORT",
    "INKWELL_SERVER_CORS_ORIGIN",
    "INKWELL_SERVER_ADMIN_TOKEN",
    "INKWELL_DATABASE_DRIVER",
    "INKWELL_DATABASE_URL",
    "INKWELL_CONTENT_ENFORCE_STATUS_TRANSITIONS",
];

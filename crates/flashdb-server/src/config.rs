//! Configuration system for the FlashDB server
//!
//! Loads configuration from:
//! 1. config.yaml - operational settings (port, engine, logging)
//! 2. .env file / process environment - per-deployment overrides
//!
//! Environment variables always override config.yaml values. A missing
//! config file means defaults.

use std::path::Path;
use std::time::Duration;

use flashdb::{ConnectionOptions, NestingPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Engine name ("sqlite", "duckdb"); unset picks the first built-in engine
    pub engine: Option<String>,

    /// Statements slower than this are logged and counted as slow
    pub max_query_execution_time_ms: Option<u64>,

    pub max_rows: Option<u64>,

    /// "reject" or "savepoint"
    pub nested_transactions: Option<String>,
}

impl DatabaseConfig {
    pub fn connection_options(&self) -> Result<ConnectionOptions, ConfigError> {
        let mut options = ConnectionOptions::new();

        if let Some(engine) = &self.engine {
            options = options.with_engine(engine.clone());
        }
        if let Some(ms) = self.max_query_execution_time_ms {
            options = options.with_max_query_execution_time(Duration::from_millis(ms));
        }
        if let Some(max_rows) = self.max_rows {
            options = options.with_max_rows(max_rows);
        }
        if let Some(policy) = &self.nested_transactions {
            let policy: NestingPolicy = policy.parse().map_err(|message| ConfigError::Invalid {
                key: "database.nested_transactions".to_string(),
                message,
            })?;
            options = options.with_nested_transactions(policy);
        }

        Ok(options)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`], reading overrides through `lookup`
    pub fn load_with<P, F>(path: P, lookup: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => serde_yaml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("FLASHDB_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("FLASHDB_SERVER_PORT") {
            self.server.port = parse_number("FLASHDB_SERVER_PORT", &port)?;
        }

        if let Some(engine) = lookup("FLASHDB_ENGINE") {
            self.database.engine = Some(engine);
        }
        if let Some(ms) = lookup("FLASHDB_MAX_QUERY_MS") {
            self.database.max_query_execution_time_ms = Some(parse_number("FLASHDB_MAX_QUERY_MS", &ms)?);
        }
        if let Some(rows) = lookup("FLASHDB_MAX_ROWS") {
            self.database.max_rows = Some(parse_number("FLASHDB_MAX_ROWS", &rows)?);
        }
        if let Some(policy) = lookup("FLASHDB_NESTED_TRANSACTIONS") {
            self.database.nested_transactions = Some(policy);
        }

        if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(output) = lookup("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Some(dir) = lookup("LOG_DIR") {
            self.logging.directory = dir;
        }

        Ok(())
    }

    /// Set logging environment variables for the logging module
    pub fn apply_logging_env(&self) {
        std::env::set_var("RUST_LOG", &self.logging.level);
        std::env::set_var("LOG_FORMAT", &self.logging.format);
        std::env::set_var("LOG_OUTPUT", &self.logging.output);
        std::env::set_var("LOG_DIR", &self.logging.directory);
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.engine, None);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.output, "stdout");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with(dir.path().join("absent.yaml"), no_env).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
database:
  engine: sqlite
  max_rows: 500
  nested_transactions: savepoint
"#,
        )
        .unwrap();

        let config = Config::load_with(&path, no_env).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.engine.as_deref(), Some("sqlite"));
        assert_eq!(config.database.max_rows, Some(500));

        let options = config.database.connection_options().unwrap();
        assert_eq!(options.max_rows, Some(500));
        assert_eq!(options.nested_transactions, NestingPolicy::Savepoint);
    }

    #[test]
    fn test_env_var_override() {
        let config_yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080
database:
  engine: sqlite
logging:
  level: "info"
  format: "pretty"
  output: "stdout"
  directory: "./logs"
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, config_yaml).unwrap();

        let env: HashMap<&str, &str> = [
            ("FLASHDB_SERVER_PORT", "9090"),
            ("FLASHDB_ENGINE", "duckdb"),
            ("FLASHDB_MAX_QUERY_MS", "250"),
            ("LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let config = Config::load_with(&path, |key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.engine.as_deref(), Some("duckdb"));
        assert_eq!(config.database.max_query_execution_time_ms, Some(250));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.bind_address(), "127.0.0.1:9090");
    }

    #[test]
    fn test_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let err = Config::load_with(&path, |key| {
            (key == "FLASHDB_SERVER_PORT").then(|| "eighty".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "FLASHDB_SERVER_PORT"));

        let config = DatabaseConfig {
            nested_transactions: Some("sometimes".to_string()),
            ..Default::default()
        };
        assert!(config.connection_options().is_err());
    }
}

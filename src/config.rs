//! Configuration management for the PostgreSQL MCP Server.
//!
//! Configuration is loaded once at startup, either from a JSON file
//! (`config.json` or the file named by `POSTGRES_MCP_CONFIG`) or from
//! environment variables. The resulting [`Config`] is never mutated.

use crate::constants::{
    CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE, DEFAULT_MAX_ROWS, DEFAULT_QUERY_TIMEOUT_SECS,
    MAX_QUERY_TIMEOUT_SECS,
};
use crate::error::ServerError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Server configuration.
///
/// Server-level credentials are database-agnostic: the target database is
/// chosen per call.
///
/// Unrecognized keys in a config file are ignored.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// PostgreSQL hostname or IP address
    pub host: String,

    /// PostgreSQL port
    pub port: u16,

    /// Login role
    pub user: String,

    /// Login password
    pub password: String,

    /// Restrict statements to read-only prefixes
    #[serde(default)]
    pub read_only: bool,

    /// Connect and statement timeout, in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,

    /// Maximum result rows per query
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_query_timeout() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}

fn default_max_rows() -> usize {
    DEFAULT_MAX_ROWS
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"****")
            .field("read_only", &self.read_only)
            .field("query_timeout", &self.query_timeout)
            .field("max_rows", &self.max_rows)
            .finish()
    }
}

impl Config {
    /// Load configuration from the first available source.
    ///
    /// 1. The JSON file named by `POSTGRES_MCP_CONFIG`
    /// 2. `config.json` in the working directory
    /// 3. Environment variables (see [`Config::from_env`])
    pub fn load() -> Result<Self, ServerError> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            return Self::from_file(default_path);
        }

        Self::from_env()
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServerError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::from_json(&content)
            .map_err(|e| ServerError::config(format!("{} ({})", e, path.display())))?;

        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from a JSON document.
    pub fn from_json(content: &str) -> Result<Self, ServerError> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| ServerError::config(format!("Invalid configuration JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// ## Required
    /// - `POSTGRES_HOST`: Server hostname
    /// - `POSTGRES_PORT`: Server port
    /// - `POSTGRES_USER`: Login role
    /// - `POSTGRES_PASSWORD`: Login password
    ///
    /// ## Optional
    /// - `POSTGRES_READ_ONLY`: Read-only mode (default: false)
    /// - `POSTGRES_QUERY_TIMEOUT`: Connect/statement timeout in seconds (default: 30)
    /// - `POSTGRES_MAX_ROWS`: Maximum result rows (default: 1000)
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .ok_or_else(|| ServerError::config(format!("{key} environment variable is required")))
        };

        let host = required("POSTGRES_HOST")?;
        let port = parse_value("POSTGRES_PORT", &required("POSTGRES_PORT")?)?;
        let user = required("POSTGRES_USER")?;
        let password = required("POSTGRES_PASSWORD")?;

        let read_only = match lookup("POSTGRES_READ_ONLY") {
            Some(v) => parse_bool("POSTGRES_READ_ONLY", &v)?,
            None => false,
        };

        let query_timeout = match lookup("POSTGRES_QUERY_TIMEOUT") {
            Some(v) => parse_value("POSTGRES_QUERY_TIMEOUT", &v)?,
            None => DEFAULT_QUERY_TIMEOUT_SECS,
        };

        let max_rows = match lookup("POSTGRES_MAX_ROWS") {
            Some(v) => parse_value("POSTGRES_MAX_ROWS", &v)?,
            None => DEFAULT_MAX_ROWS,
        };

        let config = Config {
            host,
            port,
            user,
            password,
            read_only,
            query_timeout,
            max_rows,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.host.trim().is_empty() {
            return Err(ServerError::config("host must not be empty"));
        }
        if self.user.trim().is_empty() {
            return Err(ServerError::config("user must not be empty"));
        }
        if self.port == 0 {
            return Err(ServerError::config("port must be between 1 and 65535"));
        }
        if self.query_timeout == 0 || self.query_timeout > MAX_QUERY_TIMEOUT_SECS {
            return Err(ServerError::config(format!(
                "query_timeout must be between 1 and {} seconds",
                MAX_QUERY_TIMEOUT_SECS
            )));
        }
        if self.max_rows == 0 {
            return Err(ServerError::config("max_rows must be at least 1"));
        }
        Ok(())
    }

    /// Connect timeout and statement timeout share this value.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Statement timeout in milliseconds, as sent to the server.
    pub fn statement_timeout_ms(&self) -> u64 {
        self.query_timeout * 1000
    }

    /// Replace every occurrence of the password in a user-visible message.
    pub fn redact(&self, message: &str) -> String {
        if self.password.is_empty() {
            message.to_string()
        } else {
            message.replace(&self.password, "****")
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ServerError>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ServerError::config(format!("{key} has invalid value '{value}': {e}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ServerError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ServerError::config(format!(
            "{key} has invalid value '{value}': expected true or false"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("POSTGRES_HOST", "db.internal"),
        ("POSTGRES_PORT", "5432"),
        ("POSTGRES_USER", "app"),
        ("POSTGRES_PASSWORD", "s3cret"),
    ];

    #[test]
    fn test_json_defaults() {
        let config = Config::from_json(
            r#"{"host": "localhost", "port": 5432, "user": "postgres", "password": "pw"}"#,
        )
        .unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert!(!config.read_only);
        assert_eq!(config.query_timeout, 30);
        assert_eq!(config.max_rows, 1000);
        assert_eq!(config.statement_timeout_ms(), 30_000);
        assert_eq!(config.query_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_json_overrides() {
        let config = Config::from_json(
            r#"{"host": "h", "port": 6543, "user": "u", "password": "p",
                "read_only": true, "query_timeout": 5, "max_rows": 2}"#,
        )
        .unwrap();

        assert!(config.read_only);
        assert_eq!(config.query_timeout, 5);
        assert_eq!(config.max_rows, 2);
        assert_eq!(config.statement_timeout_ms(), 5_000);
    }

    #[test]
    fn test_json_missing_required_field() {
        let err = Config::from_json(r#"{"host": "h", "port": 5432, "user": "u"}"#).unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_json_rejects_malformed_values() {
        assert!(Config::from_json(
            r#"{"host": "h", "port": "not-a-port", "user": "u", "password": "p"}"#
        )
        .is_err());
        assert!(Config::from_json(
            r#"{"host": "h", "port": 5432, "user": "u", "password": "p", "max_rows": 0}"#
        )
        .is_err());
        assert!(Config::from_json(
            r#"{"host": "h", "port": 5432, "user": "u", "password": "p", "query_timeout": 0}"#
        )
        .is_err());
    }

    #[test]
    fn test_json_ignores_extra_keys() {
        let config = Config::from_json(
            r#"{"host": "h", "port": 5432, "user": "u", "password": "p",
                "database": "legacy", "comment": "shared with other tools"}"#,
        )
        .unwrap();
        assert_eq!(config.host, "h");
        assert_eq!(config.max_rows, DEFAULT_MAX_ROWS);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"host": "h", "port": 5432, "user": "u", "password": "p", "read_only": true}}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.read_only);

        let err = Config::from_file("/nonexistent/config.json").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn test_env_required_and_defaults() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 5432);
        assert!(!config.read_only);
        assert_eq!(config.max_rows, DEFAULT_MAX_ROWS);

        let err = Config::from_lookup(lookup_from(&REQUIRED[..3])).unwrap_err();
        assert!(err.to_string().contains("POSTGRES_PASSWORD"));
    }

    #[test]
    fn test_env_optional_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("POSTGRES_READ_ONLY", "yes"));
        pairs.push(("POSTGRES_QUERY_TIMEOUT", "10"));
        pairs.push(("POSTGRES_MAX_ROWS", "50"));

        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert!(config.read_only);
        assert_eq!(config.query_timeout, 10);
        assert_eq!(config.max_rows, 50);
    }

    #[test]
    fn test_env_malformed_values_are_fatal() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("POSTGRES_READ_ONLY", "maybe"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("POSTGRES_MAX_ROWS", "lots"));
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("POSTGRES_MAX_ROWS"));
    }

    #[test]
    fn test_debug_hides_password() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("****"));
    }

    #[test]
    fn test_redact() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(
            config.redact("password s3cret rejected"),
            "password **** rejected"
        );
        assert_eq!(config.redact("nothing secret"), "nothing secret");
    }
}

//! Builder, HTTP transport and MySQL transport configuration.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use request_builder_core::GlobalSettings;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Settings supplied once per compile. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderConfig {
    /// Prefix-type name -> base URL.
    #[serde(default)]
    pub prefixes: HashMap<String, String>,
    /// Default parameter values.
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl BuilderConfig {
    /// Reads a JSON settings file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid settings
    /// object.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing settings file {}", path.display()))
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix_type: impl Into<String>, url: impl Into<String>) -> Self {
        self.prefixes.insert(prefix_type.into(), url.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn into_settings(self) -> GlobalSettings {
        GlobalSettings {
            prefixes: self.prefixes,
            params: self.params,
        }
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout applied by the client.
    pub timeout: Duration,
    /// Sent as `User-Agent` on every request.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("request-builder/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// MySQL transport settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    /// Maximum pool size.
    pub connection_limit: u32,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: None,
            connection_limit: 10,
        }
    }
}

impl MysqlConfig {
    /// Reads `MYSQL_HOST`, `MYSQL_PORT`, `MYSQL_USER`, `MYSQL_PASSWORD`,
    /// `MYSQL_DATABASE` and `MYSQL_CONNECTION_LIMIT`. Missing or unparsable
    /// values keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("MYSQL_HOST").unwrap_or(defaults.host),
            port: lookup("MYSQL_PORT")
                .and_then(|port| port.parse().ok())
                .unwrap_or(defaults.port),
            user: lookup("MYSQL_USER").unwrap_or(defaults.user),
            password: lookup("MYSQL_PASSWORD").unwrap_or(defaults.password),
            database: lookup("MYSQL_DATABASE").filter(|name| !name.is_empty()),
            connection_limit: lookup("MYSQL_CONNECTION_LIMIT")
                .and_then(|limit| limit.parse().ok())
                .unwrap_or(defaults.connection_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    #[test]
    fn builder_config_defaults_are_empty() {
        let config: BuilderConfig = serde_json::from_value(json!({})).unwrap();
        assert!(config.prefixes.is_empty());
        assert!(config.params.is_empty());
    }

    #[test]
    fn builder_config_loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"prefixes": {{"default": "https://api.example.com"}}, "params": {{"tenant": "acme"}}}}"#
        )
        .unwrap();

        let config = BuilderConfig::from_json_file(file.path()).unwrap();
        let settings = config.into_settings();
        assert_eq!(settings.prefixes["default"], "https://api.example.com");
        assert_eq!(settings.params["tenant"], json!("acme"));
    }

    #[test]
    fn builder_config_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = BuilderConfig::from_json_file(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("parsing settings file"));
    }

    #[test]
    fn http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("request-builder/"));
    }

    #[test]
    fn mysql_config_defaults_when_env_is_empty() {
        let config = MysqlConfig::from_lookup(|_| None);
        assert_eq!(config, MysqlConfig::default());
    }

    #[test]
    fn mysql_config_reads_every_variable() {
        let config = MysqlConfig::from_lookup(|key| {
            let value = match key {
                "MYSQL_HOST" => "db.internal",
                "MYSQL_PORT" => "3307",
                "MYSQL_USER" => "app",
                "MYSQL_PASSWORD" => "secret",
                "MYSQL_DATABASE" => "shop",
                "MYSQL_CONNECTION_LIMIT" => "4",
                _ => return None,
            };
            Some(value.to_string())
        });
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 3307);
        assert_eq!(config.user, "app");
        assert_eq!(config.password, "secret");
        assert_eq!(config.database.as_deref(), Some("shop"));
        assert_eq!(config.connection_limit, 4);
    }

    #[test]
    fn mysql_config_ignores_unparsable_numbers() {
        let config = MysqlConfig::from_lookup(|key| {
            (key == "MYSQL_CONNECTION_LIMIT").then(|| "many".to_string())
        });
        assert_eq!(config.connection_limit, 10);
    }
}

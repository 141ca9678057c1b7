//! # pl-config
//!
//! Layered settings for the parley server and admin commands.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults ([`Settings::default`])
//! 2. an optional TOML file
//! 3. `PARLEY_*` environment variables, with `__` between nested keys
//!    (e.g. `PARLEY_SERVER__PORT=9000`, `PARLEY_MAIL__MAILDIR_PATH=/var/mail/parley`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "PARLEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub mail: MailSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// sqlx connection string, e.g. `sqlite:parley.db`
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite:parley.db".into(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Secret-key mode: requests must also send `X-APIKey`
    pub require_api_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    /// Maildir root. Notifications are disabled when unset.
    pub maildir_path: Option<PathBuf>,
    pub from_address: String,
    pub notify_address: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            maildir_path: None,
            from_address: "parley@localhost".into(),
            notify_address: "parley@localhost".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl Settings {
    /// Loads `.env` (if any), then the layered sources from the process
    /// environment. `path` is the optional TOML file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!(path = %env_file.display(), "loaded .env");
        }
        Self::load_from(path, None)
    }

    /// Same as [`Settings::load`] without `.env`, reading variables from
    /// `vars` instead of the process environment when given.
    pub fn load_from(path: Option<&Path>, vars: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(vars),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be at least 1".into()));
        }
        if self.mail.maildir_path.is_some()
            && (self.mail.from_address.is_empty() || self.mail.notify_address.is_empty())
        {
            return Err(ConfigError::Invalid(
                "mail.from_address and mail.notify_address are required when mail is enabled".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load_from(None, vars(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.server.bind_addr(), "127.0.0.1:8080");
        assert!(settings.mail.maildir_path.is_none());
        assert!(!settings.auth.require_api_key);
    }

    #[test]
    fn test_file_then_env_precedence() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9000

[database]
url = "sqlite:/tmp/file.db"

[mail]
maildir_path = "/var/local/maildir/parley"
"#
        )
        .unwrap();

        let settings = Settings::load_from(
            Some(file.path()),
            vars(&[
                ("PARLEY_SERVER__PORT", "9100"),
                ("PARLEY_AUTH__REQUIRE_API_KEY", "true"),
                ("PARLEY_LOG__JSON", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.database.url, "sqlite:/tmp/file.db");
        assert_eq!(settings.database.max_connections, 5);
        assert_eq!(
            settings.mail.maildir_path.as_deref(),
            Some(Path::new("/var/local/maildir/parley"))
        );
        assert!(settings.auth.require_api_key);
        assert!(settings.log.json);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let res = Settings::load_from(Some(Path::new("/nonexistent/parley.toml")), vars(&[]));
        assert!(matches!(res, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let res = Settings::load_from(None, vars(&[("PARLEY_DATABASE__MAX_CONNECTIONS", "0")]));
        assert!(matches!(res, Err(ConfigError::Invalid(_))));

        let res = Settings::load_from(
            None,
            vars(&[
                ("PARLEY_MAIL__MAILDIR_PATH", "/tmp/box"),
                ("PARLEY_MAIL__NOTIFY_ADDRESS", ""),
            ]),
        );
        assert!(matches!(res, Err(ConfigError::Invalid(_))));
    }
}

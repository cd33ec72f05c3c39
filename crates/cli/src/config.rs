//! `linkme-admin.toml` loading and validation.
//!
//! Secrets can be supplied through the environment instead of the file:
//! `LINKME_DATABASE_URL`, `LINKME_MAIL_API_KEY` and `LINKME_ADMIN_TOKEN`
//! override the matching keys.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mailer::MailSettings;
use orders::{EmailAddress, Rate};
use serde::Deserialize;
use thiserror::Error;
use workflow::WorkflowSettings;

pub const ENV_DATABASE_URL: &str = "LINKME_DATABASE_URL";
pub const ENV_MAIL_API_KEY: &str = "LINKME_MAIL_API_KEY";
pub const ENV_ADMIN_TOKEN: &str = "LINKME_ADMIN_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("`{key}` is required (set it in the config file or {env})")]
    Missing { key: &'static str, env: &'static str },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub mail: MailConfig,
    pub workflow: WorkflowConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            admin_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// libpq-style connection string. Without it orders live in memory.
    pub url: Option<String>,
    /// Apply pending migrations when `serve` starts.
    pub migrate_on_start: bool,
    /// Upper bound on pooled connections.
    pub max_connections: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            migrate_on_start: false,
            max_connections: 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailConfig {
    /// When false, notifications are only logged.
    pub enabled: bool,
    pub api_url: String,
    pub api_key: Option<String>,
    pub from: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Time one notification may spend retrying inside a staff request.
    pub retry_budget_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        let defaults = MailSettings::default();
        Self {
            enabled: false,
            api_url: defaults.api_url,
            api_key: None,
            from: defaults.from,
            timeout_secs: defaults.timeout.as_secs(),
            max_retries: defaults.max_retries,
            retry_budget_secs: defaults.retry_budget.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    pub public_base_url: Option<String>,
    pub info_request_ttl_days: Option<u32>,
    pub staff_email: Option<String>,
    pub default_vat_rate: Option<Rate>,
    pub default_commission_rate: Option<Rate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint, e.g. `http://localhost:4317`. Unset disables export.
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: "linkme-admin".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `path` (defaults apply when it does not exist and `required` is
    /// false), applies environment overrides and validates the result.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(path, &text)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => Self::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies secret overrides; blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_DATABASE_URL) {
            self.database.url = Some(url);
        }
        if let Some(key) = get(ENV_MAIL_API_KEY) {
            self.mail.api_key = Some(key);
        }
        if let Some(token) = get(ENV_ADMIN_TOKEN) {
            self.server.admin_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections", "must be at least 1"));
        }
        self.workflow_settings()?;
        if self.mail.enabled {
            self.mail_settings()?;
        }
        if let Some(endpoint) = &self.telemetry.otlp_endpoint {
            if !is_http_url(endpoint) {
                return Err(invalid("telemetry.otlp_endpoint", "expected an http(s) URL"));
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind
            .parse()
            .map_err(|e| invalid("server.bind", format!("{e}")))
    }

    /// Required by `serve`.
    pub fn admin_token(&self) -> Result<&str, ConfigError> {
        self.server
            .admin_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::Missing {
                key: "server.admin_token",
                env: ENV_ADMIN_TOKEN,
            })
    }

    /// Required by `migrate` and by `orders` commands.
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database.url.as_deref().ok_or(ConfigError::Missing {
            key: "database.url",
            env: ENV_DATABASE_URL,
        })
    }

    pub fn mail_settings(&self) -> Result<MailSettings, ConfigError> {
        let api_key = self
            .mail
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::Missing {
                key: "mail.api_key",
                env: ENV_MAIL_API_KEY,
            })?;
        if !is_http_url(&self.mail.api_url) {
            return Err(invalid("mail.api_url", "expected an http(s) URL"));
        }
        if self.mail.from.trim().is_empty() {
            return Err(invalid("mail.from", "sender is empty"));
        }
        Ok(MailSettings {
            api_url: self.mail.api_url.clone(),
            api_key,
            from: self.mail.from.clone(),
            timeout: Duration::from_secs(self.mail.timeout_secs.max(1)),
            max_retries: self.mail.max_retries,
            retry_budget: Duration::from_secs(self.mail.retry_budget_secs),
            ..MailSettings::default()
        })
    }

    pub fn workflow_settings(&self) -> Result<WorkflowSettings, ConfigError> {
        let defaults = WorkflowSettings::default();
        let wf = &self.workflow;

        let public_base_url = wf
            .public_base_url
            .clone()
            .unwrap_or(defaults.public_base_url);
        if !is_http_url(&public_base_url) {
            return Err(invalid("workflow.public_base_url", "expected an http(s) URL"));
        }

        let info_request_ttl = match wf.info_request_ttl_days {
            Some(0) => return Err(invalid("workflow.info_request_ttl_days", "must be at least 1")),
            Some(days) => chrono::Duration::days(i64::from(days)),
            None => defaults.info_request_ttl,
        };

        let staff_email = match &wf.staff_email {
            Some(raw) => Some(
                EmailAddress::parse(raw)
                    .ok_or_else(|| invalid("workflow.staff_email", "not an e-mail address"))?,
            ),
            None => None,
        };

        Ok(WorkflowSettings {
            public_base_url,
            info_request_ttl,
            staff_email,
            default_vat_rate: wf.default_vat_rate.unwrap_or(defaults.default_vat_rate),
            default_commission_rate: wf
                .default_commission_rate
                .unwrap_or(defaults.default_commission_rate),
        })
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn full_file_is_parsed() {
        let file = write(
            r#"
            [server]
            bind = "0.0.0.0:9000"
            admin_token = "s3cret"

            [database]
            url = "host=db user=linkme"
            migrate_on_start = true
            max_connections = 4

            [mail]
            enabled = true
            api_key = "re_123"
            from = "LinkMe <no-reply@verone.example>"

            [workflow]
            public_base_url = "https://verone.example"
            info_request_ttl_days = 7
            staff_email = "ops@verone.example"
            default_vat_rate = "0.055"

            [telemetry]
            otlp_endpoint = "http://collector:4317"
            "#,
        );
        let config = AppConfig::load(file.path(), true).unwrap();

        assert_eq!(config.bind_addr().unwrap().port(), 9000);
        assert_eq!(config.admin_token().unwrap(), "s3cret");
        assert!(config.database.migrate_on_start);
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.mail_settings().unwrap().api_key, "re_123");

        let wf = config.workflow_settings().unwrap();
        assert_eq!(wf.info_request_ttl, chrono::Duration::days(7));
        assert_eq!(wf.default_vat_rate.to_string(), "5.5 %");
        assert_eq!(wf.staff_email.unwrap().as_str(), "ops@verone.example");
    }

    #[test]
    fn missing_optional_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml"), false).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert!(!config.mail.enabled);

        let err = AppConfig::load(&dir.path().join("absent.toml"), true).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write("[server]\nport = 8080\n");
        let err = AppConfig::load(file.path(), true).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn environment_overrides_secrets() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| match key {
            ENV_ADMIN_TOKEN => Some("from-env".to_string()),
            ENV_DATABASE_URL => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.admin_token().unwrap(), "from-env");
        assert!(config.database_url().is_err());
    }

    #[test]
    fn enabled_mail_needs_a_key() {
        let err = AppConfig::parse(Path::new("linkme-admin.toml"), "[mail]\nenabled = true\n")
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: "mail.api_key", .. }));
    }

    #[test]
    fn invalid_values_are_reported_by_key() {
        let mut config = AppConfig::default();
        config.workflow.info_request_ttl_days = Some(0);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "workflow.info_request_ttl_days", .. }));

        let mut config = AppConfig::default();
        config.server.bind = "localhost".into();
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Invalid { key: "server.bind", .. }
        ));

        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Invalid { key: "database.max_connections", .. }
        ));
    }
}

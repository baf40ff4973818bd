//! Layered configuration: defaults -> optional TOML file -> `COASTAL_` environment.
//!
//! Nested keys use `__` in the environment, e.g.
//! `COASTAL_AUDIT__BUFFER_CAPACITY=500`.

use crate::audit::entry::LogLevel;
use crate::error::{CoreError, CoreResult};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    pub audit: AuditConfig,
    pub notify: NotifyConfig,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    pub min_level: LogLevel,
    pub buffer_capacity: usize,
    /// Cutoff for the remote bulk purge.
    pub retention_days: i64,
    /// Total persistence attempts per entry; 1 disables retries.
    pub persist_attempts: u32,
    pub persist_backoff_ms: u64,
    pub admin_recipients: Vec<String>,
    pub session_id: String,
    pub ip_address: String,
    pub user_agent: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            buffer_capacity: 1000,
            retention_days: 90,
            persist_attempts: 1,
            persist_backoff_ms: 200,
            admin_recipients: vec![
                "admin@coastal-system.gov".to_string(),
                "ops@coastal-system.gov".to_string(),
            ],
            session_id: "no-session".to_string(),
            ip_address: "client-ip".to_string(),
            user_agent: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifyConfig {
    pub channel_timeout_ms: u64,
    /// Dispatched alerts kept for lookup and acknowledgment; oldest go first.
    pub alert_history_capacity: usize,
    pub webhooks: Vec<WebhookEndpoint>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            channel_timeout_ms: 10_000,
            alert_history_capacity: 1000,
            webhooks: vec![
                WebhookEndpoint::new("https://api.emergency.gov/alerts", "emergency_api_key"),
                WebhookEndpoint::new("https://api.weather.gov/alerts", "weather_api_key"),
                WebhookEndpoint::new("https://api.local.gov/emergency", "local_api_key"),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookEndpoint {
    pub url: String,
    pub api_key: String,
}

impl WebhookEndpoint {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        let url = Url::parse(&self.url)
            .map_err(|e| CoreError::Config(format!("invalid webhook url {}: {}", self.url, e)))?;
        let scheme = url.scheme().to_ascii_lowercase();
        if scheme != "https" && scheme != "http" {
            return Err(CoreError::Config(format!(
                "webhook url {} must be http or https",
                self.url
            )));
        }
        if url.host_str().is_none() {
            return Err(CoreError::Config(format!(
                "webhook url {} has no host",
                self.url
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Base URL for the `/api/...` collaborator endpoints.
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_ms: 15_000,
        }
    }
}

impl CoreConfig {
    /// Loads defaults, then `path` if it exists, then `COASTAL_*` variables.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(CoreConfig::default()));
        if let Some(p) = path {
            if p.exists() {
                figment = figment.merge(Toml::file(p));
            } else {
                tracing::debug!(path = %p.display(), "config file not found, using defaults");
            }
        }
        figment = figment.merge(Env::prefixed("COASTAL_").split("__"));
        let config: CoreConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.audit.buffer_capacity == 0 {
            return Err(CoreError::Config(
                "audit.buffer_capacity must be at least 1".to_string(),
            ));
        }
        if self.audit.retention_days <= 0 {
            return Err(CoreError::Config(
                "audit.retention_days must be positive".to_string(),
            ));
        }
        if self.audit.persist_attempts == 0 {
            return Err(CoreError::Config(
                "audit.persist_attempts must be at least 1".to_string(),
            ));
        }
        if self.notify.alert_history_capacity == 0 {
            return Err(CoreError::Config(
                "notify.alert_history_capacity must be at least 1".to_string(),
            ));
        }
        for w in &self.notify.webhooks {
            w.validate()?;
        }
        Url::parse(&self.transport.base_url)
            .map_err(|e| CoreError::Config(format!("invalid transport.base_url: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let c = CoreConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.audit.buffer_capacity, 1000);
        assert_eq!(c.notify.webhooks.len(), 3);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coastal.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[audit]\nbuffer_capacity = 25\nmin_level = \"DEBUG\"").unwrap();
        let c = CoreConfig::load(Some(&path)).unwrap();
        assert_eq!(c.audit.buffer_capacity, 25);
        assert_eq!(c.audit.min_level, LogLevel::Debug);
        assert_eq!(c.audit.retention_days, 90);
    }

    #[test]
    fn rejects_non_http_webhook() {
        let mut c = CoreConfig::default();
        c.notify.webhooks = vec![WebhookEndpoint::new("ftp://example.org/hook", "k")];
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut c = CoreConfig::default();
        c.audit.buffer_capacity = 0;
        assert!(matches!(c.validate(), Err(CoreError::Config(_))));

        let mut c = CoreConfig::default();
        c.notify.alert_history_capacity = 0;
        assert!(matches!(c.validate(), Err(CoreError::Config(_))));
    }
}

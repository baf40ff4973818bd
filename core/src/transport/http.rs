use super::{AdminAlert, AuditBackend, DeliveryChannel, NotificationGateway};
use crate::audit::entry::LogEntry;
use crate::clock::rfc3339;
use crate::config::{TransportConfig, WebhookEndpoint};
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use time::OffsetDateTime;
use url::Url;

/// reqwest-backed implementation of both collaborator contracts.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanupResponse {
    deleted_count: u64,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> CoreResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| CoreError::Config(format!("invalid transport.base_url: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| CoreError::Transport(format!("http client: {}", e)))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> CoreResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| CoreError::Transport(format!("bad endpoint {}: {}", path, e)))
    }
}

fn transport_err(what: &str, e: reqwest::Error) -> CoreError {
    CoreError::Transport(format!("{}: {}", what, e))
}

#[async_trait]
impl AuditBackend for HttpTransport {
    async fn persist_log(&self, entry: &LogEntry) -> CoreResult<()> {
        let resp = self
            .client
            .post(self.endpoint("/api/logs")?)
            .json(entry)
            .send()
            .await
            .map_err(|e| transport_err("persist log", e))?;
        if !resp.status().is_success() {
            return Err(CoreError::Transport(format!(
                "persist log rejected with status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn send_admin_alert(&self, alert: &AdminAlert) -> CoreResult<()> {
        let resp = self
            .client
            .post(self.endpoint("/api/notifications/emergency")?)
            .json(alert)
            .send()
            .await
            .map_err(|e| transport_err("admin alert", e))?;
        if !resp.status().is_success() {
            return Err(CoreError::Transport(format!(
                "admin alert rejected with status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn cleanup_logs(&self, cutoff: OffsetDateTime) -> CoreResult<u64> {
        let resp = self
            .client
            .delete(self.endpoint("/api/logs/cleanup")?)
            .json(&json!({ "cutoffDate": rfc3339(cutoff) }))
            .send()
            .await
            .map_err(|e| transport_err("log cleanup", e))?;
        if !resp.status().is_success() {
            return Err(CoreError::Transport(format!(
                "log cleanup rejected with status {}",
                resp.status()
            )));
        }
        let body: CleanupResponse = resp
            .json()
            .await
            .map_err(|e| transport_err("log cleanup response", e))?;
        Ok(body.deleted_count)
    }
}

#[async_trait]
impl NotificationGateway for HttpTransport {
    async fn deliver(&self, channel: DeliveryChannel, body: &serde_json::Value) -> CoreResult<bool> {
        let path = format!("/api/notifications/{}", channel.as_str());
        let resp = self
            .client
            .post(self.endpoint(&path)?)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_err(channel.as_str(), e))?;
        Ok(resp.status().is_success())
    }

    async fn post_webhook(
        &self,
        endpoint: &WebhookEndpoint,
        body: &serde_json::Value,
    ) -> CoreResult<bool> {
        let resp = self
            .client
            .post(&endpoint.url)
            .header("X-API-Key", &endpoint.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_err(&endpoint.url, e))?;
        Ok(resp.status().is_success())
    }
}

//! Boundary contracts with the external collaborators: log persistence,
//! administrator paging, and notification delivery.

pub mod http;
pub mod memory;

use crate::audit::entry::LogEntry;
use crate::config::WebhookEndpoint;
use crate::error::CoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

pub use http::HttpTransport;
pub use memory::MemoryTransport;

/// Immediate administrator page for ERROR/CRITICAL audit entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminAlert {
    pub subject: String,
    pub body: String,
    pub priority: String,
    pub recipients: Vec<String>,
}

/// Channels served by `POST /api/notifications/{channel}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    Email,
    Sms,
    Broadcast,
    Social,
}

impl DeliveryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryChannel::Email => "email",
            DeliveryChannel::Sms => "sms",
            DeliveryChannel::Broadcast => "broadcast",
            DeliveryChannel::Social => "social",
        }
    }
}

impl fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait AuditBackend: Send + Sync {
    async fn persist_log(&self, entry: &LogEntry) -> CoreResult<()>;
    async fn send_admin_alert(&self, alert: &AdminAlert) -> CoreResult<()>;
    /// Purges stored entries older than `cutoff`, returning how many went.
    async fn cleanup_logs(&self, cutoff: OffsetDateTime) -> CoreResult<u64>;
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// `Ok(true)` when the collaborator answered with a success status.
    async fn deliver(&self, channel: DeliveryChannel, body: &serde_json::Value) -> CoreResult<bool>;
    async fn post_webhook(
        &self,
        endpoint: &WebhookEndpoint,
        body: &serde_json::Value,
    ) -> CoreResult<bool>;
}

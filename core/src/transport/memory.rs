use super::{AdminAlert, AuditBackend, DeliveryChannel, NotificationGateway};
use crate::audit::entry::LogEntry;
use crate::config::WebhookEndpoint;
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDelivery {
    pub channel: DeliveryChannel,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWebhook {
    pub url: String,
    pub api_key: String,
    pub body: serde_json::Value,
}

/// In-process collaborator: records every call and can be told to fail,
/// reject, or stall specific channels and endpoints.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    persisted: Mutex<Vec<LogEntry>>,
    admin_alerts: Mutex<Vec<AdminAlert>>,
    deliveries: Mutex<Vec<RecordedDelivery>>,
    webhooks: Mutex<Vec<RecordedWebhook>>,
    cleanup_cutoffs: Mutex<Vec<OffsetDateTime>>,
    failing_channels: Mutex<HashSet<DeliveryChannel>>,
    rejecting_channels: Mutex<HashSet<DeliveryChannel>>,
    channel_delays: Mutex<HashMap<DeliveryChannel, Duration>>,
    failing_webhooks: Mutex<HashSet<String>>,
    persist_failures_left: AtomicU32,
    persist_attempts: AtomicU32,
    fail_cleanup: AtomicBool,
    cleanup_deleted: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls on `channel` return a transport error.
    pub fn fail_channel(&self, channel: DeliveryChannel) {
        lock(&self.failing_channels).insert(channel);
    }

    /// Calls on `channel` reach the collaborator but get a non-success status.
    pub fn reject_channel(&self, channel: DeliveryChannel) {
        lock(&self.rejecting_channels).insert(channel);
    }

    pub fn delay_channel(&self, channel: DeliveryChannel, delay: Duration) {
        lock(&self.channel_delays).insert(channel, delay);
    }

    pub fn fail_webhook(&self, url: impl Into<String>) {
        lock(&self.failing_webhooks).insert(url.into());
    }

    /// The next `n` persistence attempts fail.
    pub fn fail_next_persists(&self, n: u32) {
        self.persist_failures_left.store(n, Ordering::SeqCst);
    }

    pub fn fail_cleanup(&self, fail: bool) {
        self.fail_cleanup.store(fail, Ordering::SeqCst);
    }

    pub fn set_cleanup_deleted(&self, n: u64) {
        self.cleanup_deleted.store(n, Ordering::SeqCst);
    }

    pub fn persisted(&self) -> Vec<LogEntry> {
        lock(&self.persisted).clone()
    }

    pub fn persist_attempts(&self) -> u32 {
        self.persist_attempts.load(Ordering::SeqCst)
    }

    pub fn admin_alerts(&self) -> Vec<AdminAlert> {
        lock(&self.admin_alerts).clone()
    }

    pub fn deliveries(&self) -> Vec<RecordedDelivery> {
        lock(&self.deliveries).clone()
    }

    pub fn deliveries_on(&self, channel: DeliveryChannel) -> Vec<RecordedDelivery> {
        lock(&self.deliveries)
            .iter()
            .filter(|d| d.channel == channel)
            .cloned()
            .collect()
    }

    pub fn webhooks(&self) -> Vec<RecordedWebhook> {
        lock(&self.webhooks).clone()
    }

    pub fn cleanup_cutoffs(&self) -> Vec<OffsetDateTime> {
        lock(&self.cleanup_cutoffs).clone()
    }
}

#[async_trait]
impl AuditBackend for MemoryTransport {
    async fn persist_log(&self, entry: &LogEntry) -> CoreResult<()> {
        self.persist_attempts.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .persist_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(CoreError::Transport("log store unavailable".to_string()));
        }
        lock(&self.persisted).push(entry.clone());
        Ok(())
    }

    async fn send_admin_alert(&self, alert: &AdminAlert) -> CoreResult<()> {
        lock(&self.admin_alerts).push(alert.clone());
        Ok(())
    }

    async fn cleanup_logs(&self, cutoff: OffsetDateTime) -> CoreResult<u64> {
        if self.fail_cleanup.load(Ordering::SeqCst) {
            return Err(CoreError::Transport("cleanup endpoint unavailable".to_string()));
        }
        lock(&self.cleanup_cutoffs).push(cutoff);
        Ok(self.cleanup_deleted.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl NotificationGateway for MemoryTransport {
    async fn deliver(&self, channel: DeliveryChannel, body: &serde_json::Value) -> CoreResult<bool> {
        let delay = lock(&self.channel_delays).get(&channel).copied();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if lock(&self.failing_channels).contains(&channel) {
            return Err(CoreError::Transport(format!("{} gateway unreachable", channel)));
        }
        lock(&self.deliveries).push(RecordedDelivery {
            channel,
            body: body.clone(),
        });
        Ok(!lock(&self.rejecting_channels).contains(&channel))
    }

    async fn post_webhook(
        &self,
        endpoint: &WebhookEndpoint,
        body: &serde_json::Value,
    ) -> CoreResult<bool> {
        if lock(&self.failing_webhooks).contains(&endpoint.url) {
            return Err(CoreError::Transport(format!(
                "connection refused: {}",
                endpoint.url
            )));
        }
        lock(&self.webhooks).push(RecordedWebhook {
            url: endpoint.url.clone(),
            api_key: endpoint.api_key.clone(),
            body: body.clone(),
        });
        Ok(true)
    }
}

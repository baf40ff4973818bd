use crate::audit::entry::{Actor, LogCategory, LogLevel};
use crate::audit::log::{lock, AuditLog};
use crate::clock::{rfc3339, Clock};
use crate::config::{NotifyConfig, WebhookEndpoint};
use crate::determinism::ids;
use crate::determinism::time_range::time_range_or;
use crate::error::{CoreError, CoreResult};
use crate::notify::catalog::{default_message, recipients_for};
use crate::notify::model::{
    Acknowledgment, Alert, AlertStatistics, AlertStatus, ChannelOutcome, ChannelResults, Dispatch,
    EndpointOutcome, Severity,
};
use crate::transport::{DeliveryChannel, NotificationGateway};
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SMS_MESSAGE_LIMIT: usize = 100;
pub const DEFAULT_STATISTICS_RANGE: &str = "24h";

/// Fans an alert out over email, SMS, broadcast, webhooks and social media.
///
/// Channels run concurrently and fail independently: an error or timeout on
/// one channel is recorded in that channel's outcome and never aborts the
/// others.
pub struct NotificationDispatcher {
    config: NotifyConfig,
    gateway: Arc<dyn NotificationGateway>,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    alerts: Mutex<VecDeque<Alert>>,
}

impl NotificationDispatcher {
    pub fn new(
        config: NotifyConfig,
        gateway: Arc<dyn NotificationGateway>,
        audit: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            gateway,
            audit,
            clock,
            alerts: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn send_emergency_alert(
        &self,
        alert_type: &str,
        severity: Severity,
        location: &str,
        custom_message: Option<&str>,
    ) -> CoreResult<Dispatch> {
        if alert_type.trim().is_empty() {
            return Err(CoreError::InvalidInput("alert type is empty".to_string()));
        }
        if location.trim().is_empty() {
            return Err(CoreError::InvalidInput("alert location is empty".to_string()));
        }

        let message = match custom_message {
            Some(m) if !m.trim().is_empty() => m.to_string(),
            _ => default_message(alert_type, &severity, location),
        };
        let alert = Alert {
            id: ids::alert_id(),
            alert_type: alert_type.to_string(),
            recipients: recipients_for(&severity),
            severity,
            location: location.to_string(),
            message,
            timestamp: self.clock.now(),
            status: AlertStatus::Pending,
            results: None,
            acknowledgment: None,
        };
        self.remember(alert.clone());
        tracing::info!(
            alert_id = %alert.id,
            alert_type,
            severity = %alert.severity,
            recipients = alert.recipients.len(),
            "dispatching emergency alert"
        );

        let (email, sms, broadcast, webhook, social) = tokio::join!(
            self.guarded("email", self.send_email(&alert)),
            self.guarded("sms", self.send_sms(&alert)),
            self.guarded("broadcast", self.send_broadcast(&alert)),
            self.guarded("webhook", self.send_webhooks(&alert)),
            self.guarded("social", self.send_social(&alert)),
        );
        let results = ChannelResults {
            email,
            sms,
            broadcast,
            webhook,
            social,
        };

        if let Some(stored) = lock(&self.alerts).iter_mut().find(|a| a.id == alert.id) {
            stored.status = AlertStatus::Sent;
            stored.results = Some(results.clone());
        }

        self.audit.log_alert(
            &alert.alert_type,
            alert.severity.as_str(),
            &alert.location,
            json!({
                "alertId": alert.id,
                "message": alert.message,
                "recipients": alert.recipients.len(),
                "failedChannels": results.failed_channels(),
            }),
        );
        for (channel, outcome) in results.iter().filter(|(_, o)| !o.success) {
            tracing::warn!(alert_id = %alert.id, channel, error = ?outcome.error, "channel delivery failed");
            self.audit.log(
                LogLevel::Warn,
                LogCategory::Notification,
                "channel_failed",
                json!({
                    "alertId": alert.id,
                    "channel": channel,
                    "error": outcome.error,
                    "endpoints": outcome.endpoints,
                }),
                &Actor::System,
            );
        }

        Ok(Dispatch {
            alert_id: alert.id,
            results,
        })
    }

    /// Runs one channel attempt under the configured timeout; errors become
    /// a failed outcome for that channel only.
    async fn guarded<F>(&self, channel: &'static str, attempt: F) -> ChannelOutcome
    where
        F: Future<Output = CoreResult<ChannelOutcome>>,
    {
        let limit = Duration::from_millis(self.config.channel_timeout_ms);
        match tokio::time::timeout(limit, attempt).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => ChannelOutcome::failed(e.to_string()),
            Err(_) => {
                tracing::debug!(channel, timeout_ms = self.config.channel_timeout_ms, "channel timed out");
                ChannelOutcome::failed(format!(
                    "timed out after {} ms",
                    self.config.channel_timeout_ms
                ))
            }
        }
    }

    async fn deliver(&self, channel: DeliveryChannel, body: Value) -> CoreResult<ChannelOutcome> {
        if self.gateway.deliver(channel, &body).await? {
            Ok(ChannelOutcome::delivered(self.clock.now()))
        } else {
            Ok(ChannelOutcome::failed(format!(
                "{} gateway rejected the request",
                channel
            )))
        }
    }

    async fn send_email(&self, alert: &Alert) -> CoreResult<ChannelOutcome> {
        let body = json!({
            "to": alert.recipients.iter().map(|c| c.email.as_str()).collect::<Vec<_>>(),
            "subject": format!(
                "{}: {} - {}",
                alert.severity.as_str().to_uppercase(),
                alert.alert_type,
                alert.location
            ),
            "body": format_email_body(alert),
            "priority": if alert.severity.is_critical() { "high" } else { "normal" },
        });
        self.deliver(DeliveryChannel::Email, body).await
    }

    async fn send_sms(&self, alert: &Alert) -> CoreResult<ChannelOutcome> {
        let body = json!({
            "to": alert.recipients.iter().map(|c| c.phone.as_str()).collect::<Vec<_>>(),
            "message": format_sms_message(alert),
        });
        self.deliver(DeliveryChannel::Sms, body).await
    }

    async fn send_broadcast(&self, alert: &Alert) -> CoreResult<ChannelOutcome> {
        let body = json!({
            "message": alert.message,
            "severity": alert.severity,
            "location": alert.location,
            "duration": if alert.severity.is_critical() { 300 } else { 180 },
        });
        self.deliver(DeliveryChannel::Broadcast, body).await
    }

    async fn send_webhooks(&self, alert: &Alert) -> CoreResult<ChannelOutcome> {
        let body = json!({
            "alert_id": alert.id,
            "type": alert.alert_type,
            "severity": alert.severity,
            "location": alert.location,
            "message": alert.message,
            "timestamp": rfc3339(alert.timestamp),
        });
        let endpoints = join_all(
            self.config
                .webhooks
                .iter()
                .map(|endpoint| self.post_webhook(endpoint, &body)),
        )
        .await;
        let failed = endpoints.iter().filter(|e| !e.success).count();
        let mut outcome = if failed == 0 {
            ChannelOutcome::delivered(self.clock.now())
        } else {
            ChannelOutcome::failed(format!(
                "{} of {} webhook endpoints failed",
                failed,
                endpoints.len()
            ))
        };
        outcome.endpoints = endpoints;
        Ok(outcome)
    }

    async fn post_webhook(&self, endpoint: &WebhookEndpoint, body: &Value) -> EndpointOutcome {
        let (success, error) = match self.gateway.post_webhook(endpoint, body).await {
            Ok(true) => (true, None),
            Ok(false) => (false, Some("endpoint rejected the request".to_string())),
            Err(e) => (false, Some(e.to_string())),
        };
        EndpointOutcome {
            url: endpoint.url.clone(),
            success,
            error,
        }
    }

    async fn send_social(&self, alert: &Alert) -> CoreResult<ChannelOutcome> {
        if !alert.severity.is_elevated() {
            return Ok(ChannelOutcome::skipped("Low severity"));
        }
        let location_tag: String = alert.location.split_whitespace().collect();
        let body = json!({
            "message": format_social_message(alert),
            "hashtags": ["#CoastalAlert", "#EmergencyUpdate", format!("#{}", location_tag)],
            "urgent": alert.severity.is_critical(),
        });
        self.deliver(DeliveryChannel::Social, body).await
    }

    pub fn acknowledge_alert(&self, alert_id: &str, user_id: &str, notes: &str) -> CoreResult<Alert> {
        let at = self.clock.now();
        let acknowledged = {
            let mut alerts = lock(&self.alerts);
            let alert = alerts
                .iter_mut()
                .find(|a| a.id == alert_id)
                .ok_or_else(|| CoreError::AlertNotFound(alert_id.to_string()))?;
            alert.acknowledgment = Some(Acknowledgment {
                by: user_id.to_string(),
                at,
                notes: notes.to_string(),
            });
            alert.clone()
        };
        self.audit.log_user_action(
            "alert_acknowledged",
            user_id,
            json!({ "alertId": alert_id, "notes": notes }),
        );
        Ok(acknowledged)
    }

    fn remember(&self, alert: Alert) {
        let mut alerts = lock(&self.alerts);
        alerts.push_back(alert);
        while alerts.len() > self.config.alert_history_capacity {
            if let Some(old) = alerts.pop_front() {
                tracing::debug!(alert_id = %old.id, "alert aged out of history");
            }
        }
    }

    pub fn get_alert(&self, alert_id: &str) -> Option<Alert> {
        lock(&self.alerts).iter().find(|a| a.id == alert_id).cloned()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        lock(&self.alerts).iter().cloned().collect()
    }

    /// Counts and mean acknowledgment latency for alerts sent within `range`
    /// (e.g. `24h`, `7d`).
    pub fn get_alert_statistics(&self, range: &str) -> AlertStatistics {
        let now = self.clock.now();
        let cutoff = now - time_range_or(range, time::Duration::DAY);
        let alerts = lock(&self.alerts);
        let recent: Vec<&Alert> = alerts.iter().filter(|a| a.timestamp >= cutoff).collect();

        let latencies: Vec<f64> = recent
            .iter()
            .filter_map(|a| a.acknowledgment.as_ref().map(|ack| (ack.at - a.timestamp).as_seconds_f64()))
            .collect();
        let average_response_minutes = if latencies.is_empty() {
            0
        } else {
            (latencies.iter().sum::<f64>() / latencies.len() as f64 / 60.0).round() as i64
        };

        AlertStatistics {
            total: recent.len(),
            critical: recent.iter().filter(|a| a.severity == Severity::Critical).count(),
            warning: recent.iter().filter(|a| a.severity == Severity::Warning).count(),
            acknowledged: latencies.len(),
            average_response_minutes,
        }
    }
}

fn format_email_body(alert: &Alert) -> String {
    format!(
        "COASTAL THREAT ALERT SYSTEM\n\n\
         Alert Type: {}\n\
         Severity: {}\n\
         Location: {}\n\
         Time: {}\n\n\
         Message: {}\n\n\
         This is an automated alert from the Coastal Threat Alert System.\n\
         For more information, contact the Emergency Operations Center.\n",
        alert.alert_type,
        alert.severity.as_str().to_uppercase(),
        alert.location,
        rfc3339(alert.timestamp),
        alert.message
    )
}

pub fn format_sms_message(alert: &Alert) -> String {
    let mut excerpt: String = alert.message.chars().take(SMS_MESSAGE_LIMIT).collect();
    if alert.message.chars().count() > SMS_MESSAGE_LIMIT {
        excerpt.push_str("...");
    }
    format!(
        "ALERT: {} - {} at {}. {}",
        alert.alert_type,
        alert.severity.as_str().to_uppercase(),
        alert.location,
        excerpt
    )
}

fn format_social_message(alert: &Alert) -> String {
    let marker = if alert.severity.is_critical() {
        "\u{1F6A8}"
    } else {
        "\u{26A0}\u{FE0F}"
    };
    format!(
        "{} {} ALERT: {} detected at {}. {}",
        marker,
        alert.severity.as_str().to_uppercase(),
        alert.alert_type,
        alert.location,
        alert.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn alert(message: &str) -> Alert {
        Alert {
            id: "ALERT_X".to_string(),
            alert_type: "tsunami".to_string(),
            severity: Severity::Critical,
            location: "Harbor Bay".to_string(),
            message: message.to_string(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            status: AlertStatus::Pending,
            recipients: Vec::new(),
            results: None,
            acknowledgment: None,
        }
    }

    #[test]
    fn sms_truncates_long_messages() {
        let long = "x".repeat(150);
        let sms = format_sms_message(&alert(&long));
        assert!(sms.starts_with("ALERT: tsunami - CRITICAL at Harbor Bay. "));
        assert!(sms.ends_with(&format!("{}...", "x".repeat(100))));
        assert!(!sms.contains(&"x".repeat(101)));
    }

    #[test]
    fn sms_keeps_short_messages_whole() {
        let sms = format_sms_message(&alert("Move inland."));
        assert!(sms.ends_with("Move inland."));
    }

    #[test]
    fn social_marker_depends_on_severity() {
        let mut a = alert("m");
        assert!(format_social_message(&a).starts_with('\u{1F6A8}'));
        a.severity = Severity::Warning;
        assert!(format_social_message(&a).contains("WARNING ALERT: tsunami detected at Harbor Bay."));
    }
}

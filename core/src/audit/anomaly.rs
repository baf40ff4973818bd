use crate::audit::entry::{LogCategory, LogEntry};
use crate::audit::log::AuditLog;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

pub const EXCESSIVE_ACTIVITY_THRESHOLD: usize = 100;
pub const FAILED_LOGIN_THRESHOLD: usize = 5;
pub const DEFAULT_ANOMALY_WINDOW: Duration = Duration::HOUR;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    ExcessiveActivity,
    MultipleFailedLogins,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub count: usize,
    pub threshold: usize,
}

/// Flags `actor_id` when, inside `(now - window, now]`, it performed more
/// than 100 actions or failed more than 5 logins.
pub fn detect_anomalies(
    entries: &[LogEntry],
    actor_id: &str,
    window: Duration,
    now: OffsetDateTime,
) -> Vec<Anomaly> {
    let cutoff = now - window;
    let recent: Vec<&LogEntry> = entries
        .iter()
        .filter(|e| e.actor.actor_id() == actor_id && e.timestamp > cutoff)
        .collect();

    let mut anomalies = Vec::new();
    if recent.len() > EXCESSIVE_ACTIVITY_THRESHOLD {
        anomalies.push(Anomaly {
            kind: AnomalyKind::ExcessiveActivity,
            count: recent.len(),
            threshold: EXCESSIVE_ACTIVITY_THRESHOLD,
        });
    }

    let failed_logins = recent
        .iter()
        .filter(|e| e.category == LogCategory::Security && e.action == "login_failed")
        .count();
    if failed_logins > FAILED_LOGIN_THRESHOLD {
        anomalies.push(Anomaly {
            kind: AnomalyKind::MultipleFailedLogins,
            count: failed_logins,
            threshold: FAILED_LOGIN_THRESHOLD,
        });
    }
    anomalies
}

impl AuditLog {
    pub fn detect_anomalous_activity(&self, actor_id: &str, window: Option<Duration>) -> Vec<Anomaly> {
        let now = self.clock().now();
        let anomalies = detect_anomalies(
            &self.entries(),
            actor_id,
            window.unwrap_or(DEFAULT_ANOMALY_WINDOW),
            now,
        );
        if !anomalies.is_empty() {
            tracing::info!(actor_id, count = anomalies.len(), "anomalous activity detected");
        }
        anomalies
    }
}

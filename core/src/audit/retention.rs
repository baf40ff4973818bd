//! Retention policies: how long each buffered entry must be kept.
//!
//! An entry's effective retention is the longest of its level retention and
//! the retention of every regulatory regime that covers its category.

use crate::audit::entry::{Actor, LogCategory, LogEntry, LogLevel};
use crate::audit::log::AuditLog;
use crate::clock::rfc3339;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{Duration, OffsetDateTime};

pub fn level_retention_days(level: LogLevel) -> i64 {
    match level {
        LogLevel::Debug => 7,
        LogLevel::Info => 30,
        LogLevel::Warn => 90,
        LogLevel::Error => 365,
        LogLevel::Critical => 2555,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regime {
    Epa,
    Sox,
    Gdpr,
}

pub const REGIMES: [Regime; 3] = [Regime::Epa, Regime::Sox, Regime::Gdpr];

impl Regime {
    pub fn retention_days(&self) -> i64 {
        match self {
            Regime::Epa => 2555,
            Regime::Sox => 2555,
            Regime::Gdpr => 2190,
        }
    }

    pub fn categories(&self) -> &'static [LogCategory] {
        match self {
            Regime::Epa => &[
                LogCategory::SensorData,
                LogCategory::Alert,
                LogCategory::Compliance,
            ],
            Regime::Sox => &[
                LogCategory::AuditTrail,
                LogCategory::DataChange,
                LogCategory::UserAction,
            ],
            Regime::Gdpr => &[LogCategory::UserAction, LogCategory::DataChange],
        }
    }

    pub fn covers(&self, category: LogCategory) -> bool {
        self.categories().contains(&category)
    }
}

pub fn effective_retention(level: LogLevel, category: LogCategory) -> Duration {
    let days = REGIMES
        .iter()
        .filter(|r| r.covers(category))
        .map(|r| r.retention_days())
        .fold(level_retention_days(level), i64::max);
    Duration::days(days)
}

pub fn is_expired(entry: &LogEntry, now: OffsetDateTime) -> bool {
    now - entry.timestamp > effective_retention(entry.level, entry.category)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CleanupReport {
    #[serde(with = "time::serde::rfc3339")]
    pub cutoff: OffsetDateTime,
    pub local_removed: usize,
    /// Expired entries kept because an older entry is still retained.
    pub local_deferred: usize,
    pub remote_deleted: u64,
}

/// Length of the oldest run of expired entries.
///
/// Only this prefix may leave the buffer: removing an entry from the middle
/// would orphan its successor's `prev_chain_hash`.
pub fn expired_prefix_len<'a>(
    entries: impl IntoIterator<Item = &'a LogEntry>,
    now: OffsetDateTime,
) -> usize {
    entries
        .into_iter()
        .take_while(|e| is_expired(e, now))
        .count()
}

impl AuditLog {
    /// Drops the expired head of the buffer and asks the backend to purge
    /// anything older than `retention_days`.
    ///
    /// Expired entries behind a still-retained one stay buffered until they
    /// reach the head, so the remaining entries always form one unbroken chain.
    pub async fn cleanup_old_logs(&self) -> CleanupReport {
        let now = self.clock().now();
        let (local_removed, local_deferred) = {
            let mut state = self.state();
            let removed = expired_prefix_len(&state.entries, now);
            state.entries.drain(..removed);
            let deferred = state.entries.iter().filter(|e| is_expired(e, now)).count();
            (removed, deferred)
        };
        if local_deferred > 0 {
            tracing::debug!(local_deferred, "expired audit entries held behind retained ones");
        }

        let cutoff = now - Duration::days(self.config().retention_days);
        let remote_deleted = match self.backend().cleanup_logs(cutoff).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "remote audit cleanup failed");
                self.log_cleanup_failure(&e, cutoff);
                0
            }
        };

        self.log(
            LogLevel::Info,
            LogCategory::Maintenance,
            "logs_cleaned",
            json!({
                "cutoffDate": rfc3339(cutoff),
                "localRemoved": local_removed,
                "localDeferred": local_deferred,
                "deletedCount": remote_deleted,
            }),
            &Actor::System,
        );
        tracing::info!(local_removed, remote_deleted, "audit cleanup finished");

        CleanupReport {
            cutoff,
            local_removed,
            local_deferred,
            remote_deleted,
        }
    }

    fn log_cleanup_failure(&self, e: &CoreError, cutoff: OffsetDateTime) {
        self.log_error(
            e,
            json!({ "operation": "cleanup_old_logs", "cutoffDate": rfc3339(cutoff) }),
            &Actor::System,
        );
    }
}

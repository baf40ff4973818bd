use crate::audit::entry::{Actor, LogCategory, LogEntry, LogLevel};
use crate::audit::integrity::IntegrityReport;
use crate::audit::log::AuditLog;
use crate::audit::report::LogFilter;
use crate::audit::retention::CleanupReport;
use crate::tally::count_by;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{Duration, OffsetDateTime};

pub const HEALTH_WINDOW: Duration = Duration::HOUR;
const CRITICAL_ERROR_COUNT: usize = 10;
const WARNING_ERROR_COUNT: usize = 5;
const TOP_ERRORS: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorCount {
    pub action: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub total_logs: usize,
    pub error_count: usize,
    pub critical_count: usize,
    pub warning_count: usize,
    pub top_errors: Vec<ErrorCount>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceReport {
    pub cleanup: CleanupReport,
    pub integrity: IntegrityReport,
    pub health: SystemHealth,
}

/// Most frequent ERROR/CRITICAL actions, highest count first.
pub fn top_errors(entries: &[LogEntry], limit: usize) -> Vec<ErrorCount> {
    let counts = count_by(
        entries
            .iter()
            .filter(|e| e.level >= LogLevel::Error)
            .map(|e| e.action.clone()),
    );
    let mut out: Vec<ErrorCount> = counts
        .into_iter()
        .map(|(action, count)| ErrorCount { action, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.action.cmp(&b.action)));
    out.truncate(limit);
    out
}

pub fn health_of(entries: &[LogEntry], now: OffsetDateTime) -> SystemHealth {
    let count = |pred: fn(&LogEntry) -> bool| entries.iter().filter(|e| pred(e)).count();
    let error_count = count(|e| e.level == LogLevel::Error);
    let status = if error_count > CRITICAL_ERROR_COUNT {
        HealthStatus::Critical
    } else if error_count > WARNING_ERROR_COUNT {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    };
    SystemHealth {
        status,
        total_logs: entries.len(),
        error_count,
        critical_count: count(|e| e.level == LogLevel::Critical),
        warning_count: count(|e| e.level == LogLevel::Warn),
        top_errors: top_errors(entries, TOP_ERRORS),
        last_updated: now,
    }
}

/// True when every whitespace-separated term occurs in the entry's JSON,
/// case-insensitively.
pub fn entry_matches_terms(entry: &LogEntry, terms: &[String]) -> bool {
    let haystack = match serde_json::to_string(entry) {
        Ok(s) => s.to_lowercase(),
        Err(_) => return false,
    };
    terms.iter().all(|t| haystack.contains(t.as_str()))
}

impl AuditLog {
    /// Health over the last hour of buffered entries.
    pub fn get_system_health(&self) -> SystemHealth {
        let now = self.clock().now();
        let recent = self.query_logs(&LogFilter {
            start: Some(now - HEALTH_WINDOW),
            ..LogFilter::default()
        });
        health_of(&recent, now)
    }

    pub fn get_top_errors(&self, limit: usize) -> Vec<ErrorCount> {
        let now = self.clock().now();
        let recent = self.query_logs(&LogFilter {
            start: Some(now - HEALTH_WINDOW),
            ..LogFilter::default()
        });
        top_errors(&recent, limit)
    }

    pub fn search_logs(&self, query: &str, filter: &LogFilter) -> Vec<LogEntry> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        self.query_logs(filter)
            .into_iter()
            .filter(|e| entry_matches_terms(e, &terms))
            .collect()
    }

    /// Cleanup, then integrity verification, then a health snapshot.
    pub async fn perform_scheduled_maintenance(&self) -> MaintenanceReport {
        let cleanup = self.cleanup_old_logs().await;
        let integrity = self.verify_all_logs_integrity();
        let health = self.get_system_health();
        if integrity.invalid_count > 0 {
            tracing::warn!(
                invalid = integrity.invalid_count,
                "integrity check found modified audit entries"
            );
        }
        self.log(
            LogLevel::Info,
            LogCategory::Maintenance,
            "scheduled_maintenance",
            json!({
                "cleanup": &cleanup,
                "integrity": &integrity,
                "health": &health,
            }),
            &Actor::System,
        );
        MaintenanceReport {
            cleanup,
            integrity,
            health,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_entries_no_top_errors() {
        assert!(top_errors(&[], 5).is_empty());
    }

    #[test]
    fn empty_window_is_healthy() {
        let h = health_of(&[], OffsetDateTime::UNIX_EPOCH);
        assert_eq!(h.status, HealthStatus::Healthy);
        assert_eq!(h.total_logs, 0);
    }
}

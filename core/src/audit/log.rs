use crate::audit::entry::{finalize_entry, Actor, LogCategory, LogContext, LogEntry, LogLevel, ZERO_HASH_64};
use crate::audit::sanitize::sanitize_payload;
use crate::clock::{rfc3339, Clock};
use crate::config::AuditConfig;
use crate::determinism::ids;
use crate::transport::{AdminAlert, AuditBackend};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackgroundTask {
    Persist,
    AdminAlert,
}

/// Outcome of background persistence and paging since the last flush.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlushReport {
    pub persisted: usize,
    pub persist_failed: usize,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
}

impl FlushReport {
    fn record(&mut self, task: BackgroundTask, ok: bool) {
        match (task, ok) {
            (BackgroundTask::Persist, true) => self.persisted += 1,
            (BackgroundTask::Persist, false) => self.persist_failed += 1,
            (BackgroundTask::AdminAlert, true) => self.alerts_sent += 1,
            (BackgroundTask::AdminAlert, false) => self.alerts_failed += 1,
        }
    }
}

pub(crate) struct BufferState {
    pub(crate) entries: VecDeque<LogEntry>,
    pub(crate) chain_head: String,
}

#[derive(Default)]
struct PendingTasks {
    handles: Vec<(BackgroundTask, JoinHandle<bool>)>,
    settled: FlushReport,
}

/// Append-only, bounded audit log.
///
/// `log` returns as soon as the entry is buffered; persistence and
/// administrator paging run on spawned tasks whose completion is observable
/// through [`AuditLog::flush`].
pub struct AuditLog {
    config: AuditConfig,
    context: LogContext,
    backend: Arc<dyn AuditBackend>,
    clock: Arc<dyn Clock>,
    state: Mutex<BufferState>,
    pending: Mutex<PendingTasks>,
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl AuditLog {
    pub fn new(config: AuditConfig, backend: Arc<dyn AuditBackend>, clock: Arc<dyn Clock>) -> Self {
        let context = LogContext {
            session_id: config.session_id.clone(),
            ip_address: config.ip_address.clone(),
            user_agent: config.user_agent.clone(),
        };
        Self {
            state: Mutex::new(BufferState {
                entries: VecDeque::with_capacity(config.buffer_capacity.min(4096)),
                chain_head: ZERO_HASH_64.to_string(),
            }),
            config,
            context,
            backend,
            clock,
            pending: Mutex::new(PendingTasks::default()),
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn backend(&self) -> Arc<dyn AuditBackend> {
        Arc::clone(&self.backend)
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, BufferState> {
        lock(&self.state)
    }

    /// Records one action. Returns the new entry id, or `None` when `level`
    /// is below the configured minimum.
    pub fn log(
        &self,
        level: LogLevel,
        category: LogCategory,
        action: &str,
        payload: Value,
        actor: &Actor,
    ) -> Option<String> {
        if level < self.config.min_level {
            return None;
        }
        let payload = sanitize_payload(&payload);

        let entry = {
            let mut state = lock(&self.state);
            // Read under the lock so buffer order and timestamp order agree.
            let timestamp = self.clock.now();
            let draft = LogEntry {
                id: ids::log_id(),
                timestamp,
                level,
                category,
                action: action.to_string(),
                actor: actor.clone(),
                context: self.context.clone(),
                payload,
                digest: String::new(),
                prev_chain_hash: state.chain_head.clone(),
                chain_hash: String::new(),
            };
            let entry = match finalize_entry(draft) {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(action, error = %e, "could not digest audit entry");
                    return None;
                }
            };
            state.chain_head = entry.chain_hash.clone();
            state.entries.push_back(entry.clone());
            while state.entries.len() > self.config.buffer_capacity {
                state.entries.pop_front();
            }
            entry
        };

        tracing::debug!(
            log_id = %entry.id,
            level = %entry.level,
            category = %entry.category,
            action = %entry.action,
            "audit entry recorded"
        );

        let id = entry.id.clone();
        if level.is_alerting() {
            self.spawn_admin_alert(&entry);
        }
        self.spawn_persist(entry);
        Some(id)
    }

    /// Snapshot of the buffer, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.state).entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, log_id: &str) -> Option<LogEntry> {
        lock(&self.state)
            .entries
            .iter()
            .find(|e| e.id == log_id)
            .cloned()
    }

    /// Waits for every outstanding background task and returns the tally
    /// since the previous flush.
    pub async fn flush(&self) -> FlushReport {
        let (handles, mut report) = {
            let mut pending = lock(&self.pending);
            (
                std::mem::take(&mut pending.handles),
                std::mem::take(&mut pending.settled),
            )
        };
        for (task, handle) in handles {
            let ok = handle.await.unwrap_or(false);
            report.record(task, ok);
        }
        report
    }

    fn spawn_persist(&self, entry: LogEntry) {
        let backend = Arc::clone(&self.backend);
        let attempts = self.config.persist_attempts.max(1);
        let mut delay = Duration::from_millis(self.config.persist_backoff_ms);
        self.spawn_background(BackgroundTask::Persist, async move {
            for attempt in 1..=attempts {
                match backend.persist_log(&entry).await {
                    Ok(()) => return true,
                    Err(e) if attempt < attempts => {
                        tracing::debug!(log_id = %entry.id, attempt, error = %e, "retrying audit persistence");
                        tokio::time::sleep(delay).await;
                        delay = delay.saturating_mul(2);
                    }
                    Err(e) => {
                        tracing::warn!(log_id = %entry.id, attempts, error = %e, "failed to persist audit entry");
                    }
                }
            }
            false
        });
    }

    fn spawn_admin_alert(&self, entry: &LogEntry) {
        let body = serde_json::to_string_pretty(entry).unwrap_or_else(|_| entry.id.clone());
        let alert = AdminAlert {
            subject: format!("Critical System Event: {}", entry.action),
            body: format!("A critical event has occurred in the system:\n\n{}", body),
            priority: "high".to_string(),
            recipients: self.config.admin_recipients.clone(),
        };
        let backend = Arc::clone(&self.backend);
        let log_id = entry.id.clone();
        self.spawn_background(BackgroundTask::AdminAlert, async move {
            match backend.send_admin_alert(&alert).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(log_id = %log_id, error = %e, "failed to page administrators");
                    false
                }
            }
        });
    }

    fn spawn_background<F>(&self, task: BackgroundTask, fut: F)
    where
        F: Future<Output = bool> + Send + 'static,
    {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(rt) => rt.spawn(fut),
            Err(_) => {
                tracing::warn!(?task, "no async runtime available, background audit task dropped");
                lock(&self.pending).settled.record(task, false);
                return;
            }
        };
        let mut pending = lock(&self.pending);
        // Fold finished tasks into the tally so the handle list stays short.
        let mut still_running = Vec::with_capacity(pending.handles.len() + 1);
        for (t, h) in std::mem::take(&mut pending.handles) {
            if h.is_finished() {
                let ok = h.now_or_never().and_then(|r| r.ok()).unwrap_or(false);
                pending.settled.record(t, ok);
            } else {
                still_running.push((t, h));
            }
        }
        still_running.push((task, handle));
        pending.handles = still_running;
    }

    // ---------------------------------------------------------------------
    // Category helpers
    // ---------------------------------------------------------------------

    pub fn log_user_action(&self, action: &str, user_id: &str, data: Value) -> Option<String> {
        let payload = merge(json!({ "userId": user_id }), data);
        self.log(
            LogLevel::Info,
            LogCategory::UserAction,
            action,
            payload,
            &Actor::operator(user_id),
        )
    }

    pub fn log_system_event(&self, event: &str, data: Value) -> Option<String> {
        self.log(LogLevel::Info, LogCategory::SystemEvent, event, data, &Actor::System)
    }

    pub fn log_sensor_data(&self, sensor_id: &str, readings: Value, status: &str) -> Option<String> {
        let level = if status == "error" {
            LogLevel::Error
        } else {
            LogLevel::Debug
        };
        self.log(
            level,
            LogCategory::SensorData,
            "data_received",
            json!({ "sensorId": sensor_id, "readings": readings, "status": status }),
            &Actor::System,
        )
    }

    pub fn log_alert(&self, alert_type: &str, severity: &str, location: &str, data: Value) -> Option<String> {
        let level = if severity == "critical" {
            LogLevel::Critical
        } else {
            LogLevel::Warn
        };
        let payload = merge(json!({ "severity": severity, "location": location }), data);
        self.log(level, LogCategory::Alert, alert_type, payload, &Actor::System)
    }

    pub fn log_security_event(&self, event: &str, actor: &Actor, data: Value) -> Option<String> {
        let user_id = match actor {
            Actor::Anonymous => Value::Null,
            other => Value::String(other.actor_id().to_string()),
        };
        let payload = merge(json!({ "userId": user_id }), data);
        self.log(LogLevel::Warn, LogCategory::Security, event, payload, actor)
    }

    pub fn log_api_request(
        &self,
        endpoint: &str,
        method: &str,
        actor: &Actor,
        response_code: u16,
        duration_ms: u64,
    ) -> Option<String> {
        let level = if response_code >= 400 {
            LogLevel::Error
        } else {
            LogLevel::Debug
        };
        self.log(
            level,
            LogCategory::ApiRequest,
            &format!("{} {}", method, endpoint),
            json!({
                "userId": actor.actor_id(),
                "responseCode": response_code,
                "duration": duration_ms,
                "timestamp": rfc3339(self.clock.now()),
            }),
            actor,
        )
    }

    pub fn log_data_change(&self, table: &str, record_id: &str, changes: Value, actor: &Actor) -> Option<String> {
        self.log(
            LogLevel::Info,
            LogCategory::DataChange,
            &format!("{}_modified", table),
            json!({
                "table": table,
                "recordId": record_id,
                "changes": changes,
                "userId": actor.actor_id(),
            }),
            actor,
        )
    }

    pub fn create_audit_trail(
        &self,
        entity_type: &str,
        entity_id: &str,
        operation: &str,
        old_values: &Value,
        new_values: &Value,
        actor: &Actor,
    ) -> Option<String> {
        self.log(
            LogLevel::Info,
            LogCategory::AuditTrail,
            operation,
            json!({
                "entityType": entity_type,
                "entityId": entity_id,
                "operation": operation,
                "oldValues": old_values,
                "newValues": new_values,
                "changes": calculate_changes(old_values, new_values),
            }),
            actor,
        )
    }

    pub fn log_compliance_event(
        &self,
        regulation: &str,
        requirement: &str,
        status: &str,
        evidence: Value,
    ) -> Option<String> {
        self.log(
            LogLevel::Info,
            LogCategory::Compliance,
            &format!("{}_{}", regulation, requirement),
            json!({
                "regulation": regulation,
                "requirement": requirement,
                "status": status,
                "evidence": evidence,
                "auditDate": rfc3339(self.clock.now()),
            }),
            &Actor::System,
        )
    }

    pub fn log_performance_metric(&self, metric: &str, value: f64, threshold: Option<f64>) -> Option<String> {
        let level = match threshold {
            Some(t) if value > t => LogLevel::Warn,
            _ => LogLevel::Debug,
        };
        self.log(
            level,
            LogCategory::Performance,
            metric,
            json!({
                "metric": metric,
                "value": value,
                "threshold": threshold,
                "timestamp": rfc3339(self.clock.now()),
            }),
            &Actor::System,
        )
    }

    pub fn log_error(&self, error: &dyn std::error::Error, context: Value, actor: &Actor) -> Option<String> {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(s) = source {
            causes.push(s.to_string());
            source = s.source();
        }
        self.log(
            LogLevel::Error,
            LogCategory::Error,
            "exception_occurred",
            json!({
                "message": error.to_string(),
                "causes": causes,
                "context": context,
            }),
            actor,
        )
    }
}

/// Shallow merge of two JSON objects; keys in `extra` win.
fn merge(base: Value, extra: Value) -> Value {
    match (base, extra) {
        (Value::Object(mut a), Value::Object(b)) => {
            a.extend(b);
            Value::Object(a)
        }
        (a, Value::Null) => a,
        (Value::Object(mut a), other) => {
            a.insert("data".to_string(), other);
            Value::Object(a)
        }
        (_, b) => b,
    }
}

/// Field-level diff between two JSON objects.
pub fn calculate_changes(old_values: &Value, new_values: &Value) -> Value {
    let empty = serde_json::Map::new();
    let old = old_values.as_object().unwrap_or(&empty);
    let new = new_values.as_object().unwrap_or(&empty);
    let mut changes = serde_json::Map::new();
    for (k, v) in new {
        if old.get(k) != Some(v) {
            changes.insert(
                k.clone(),
                json!({ "from": old.get(k).cloned().unwrap_or(Value::Null), "to": v }),
            );
        }
    }
    for (k, v) in old {
        if !new.contains_key(k) {
            changes.insert(k.clone(), json!({ "from": v, "to": null, "removed": true }));
        }
    }
    Value::Object(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changes_cover_modified_added_and_removed() {
        let old = json!({"status": "active", "crew": 4, "note": "x"});
        let new = json!({"status": "resolved", "crew": 4, "eta": 10});
        let c = calculate_changes(&old, &new);
        assert_eq!(c["status"], json!({"from": "active", "to": "resolved"}));
        assert_eq!(c["eta"], json!({"from": null, "to": 10}));
        assert_eq!(c["note"]["removed"], true);
        assert!(c.get("crew").is_none());
    }

    #[test]
    fn merge_prefers_extra_keys() {
        let m = merge(json!({"a": 1, "b": 2}), json!({"b": 3}));
        assert_eq!(m, json!({"a": 1, "b": 3}));
        assert_eq!(merge(json!({"a": 1}), Value::Null), json!({"a": 1}));
    }
}

use crate::determinism::ids::sha256_hex;
use crate::determinism::json_canonical;
use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

pub const ZERO_HASH_64: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Entries at this level page the administrators immediately.
    pub fn is_alerting(&self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Critical)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogCategory {
    UserAction,
    SystemEvent,
    SensorData,
    Alert,
    Security,
    ApiRequest,
    DataChange,
    AuditTrail,
    Compliance,
    Performance,
    Error,
    Maintenance,
    Incident,
    Notification,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::UserAction => "USER_ACTION",
            LogCategory::SystemEvent => "SYSTEM_EVENT",
            LogCategory::SensorData => "SENSOR_DATA",
            LogCategory::Alert => "ALERT",
            LogCategory::Security => "SECURITY",
            LogCategory::ApiRequest => "API_REQUEST",
            LogCategory::DataChange => "DATA_CHANGE",
            LogCategory::AuditTrail => "AUDIT_TRAIL",
            LogCategory::Compliance => "COMPLIANCE",
            LogCategory::Performance => "PERFORMANCE",
            LogCategory::Error => "ERROR",
            LogCategory::Maintenance => "MAINTENANCE",
            LogCategory::Incident => "INCIDENT",
            LogCategory::Notification => "NOTIFICATION",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LogCategory::UserAction => "User Actions",
            LogCategory::SystemEvent => "System Events",
            LogCategory::SensorData => "Sensor Data",
            LogCategory::Alert => "Alerts",
            LogCategory::Security => "Security Events",
            LogCategory::ApiRequest => "API Requests",
            LogCategory::DataChange => "Data Changes",
            LogCategory::AuditTrail => "Audit Trail",
            LogCategory::Compliance => "Compliance",
            LogCategory::Performance => "Performance",
            LogCategory::Error => "Errors",
            LogCategory::Maintenance => "Maintenance",
            LogCategory::Incident => "Incidents",
            LogCategory::Notification => "Notifications",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed an audited action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    System,
    Operator(String),
    Anonymous,
}

impl Actor {
    pub fn operator(id: impl Into<String>) -> Self {
        Actor::Operator(id.into())
    }

    pub fn actor_id(&self) -> &str {
        match self {
            Actor::System => "system",
            Actor::Operator(id) => id,
            Actor::Anonymous => "anonymous",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.actor_id())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogContext {
    pub session_id: String,
    pub ip_address: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub level: LogLevel,
    pub category: LogCategory,
    pub action: String,
    pub actor: Actor,
    pub context: LogContext,
    pub payload: serde_json::Value,
    pub digest: String,          // hex 64
    pub prev_chain_hash: String, // hex 64
    pub chain_hash: String,      // hex 64
}

#[derive(Serialize)]
struct DigestInput<'a> {
    level: LogLevel,
    category: LogCategory,
    action: &'a str,
    payload: &'a serde_json::Value,
}

/// SHA-256 over the canonical JSON of `(level, category, action, payload)`.
pub fn compute_digest(
    level: LogLevel,
    category: LogCategory,
    action: &str,
    payload: &serde_json::Value,
) -> CoreResult<String> {
    let bytes = json_canonical::to_canonical_bytes(&DigestInput {
        level,
        category,
        action,
        payload,
    })?;
    Ok(sha256_hex(&bytes))
}

pub fn compute_chain_hash(prev_chain_hash: &str, digest: &str, id: &str) -> String {
    sha256_hex(format!("{}{}{}", prev_chain_hash, digest, id).as_bytes())
}

/// Fills `digest` and `chain_hash` from the entry's own fields and `prev_chain_hash`.
pub fn finalize_entry(mut entry: LogEntry) -> CoreResult<LogEntry> {
    entry.digest = compute_digest(entry.level, entry.category, &entry.action, &entry.payload)?;
    entry.chain_hash = compute_chain_hash(&entry.prev_chain_hash, &entry.digest, &entry.id);
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Critical);
        assert!(LogLevel::Critical.is_alerting());
        assert!(!LogLevel::Warn.is_alerting());
    }

    #[test]
    fn digest_ignores_payload_key_order() {
        let a = serde_json::json!({"b": 1, "a": {"y": 2, "x": 3}});
        let b = serde_json::json!({"a": {"x": 3, "y": 2}, "b": 1});
        let da = compute_digest(LogLevel::Info, LogCategory::Alert, "x", &a).unwrap();
        let db = compute_digest(LogLevel::Info, LogCategory::Alert, "x", &b).unwrap();
        assert_eq!(da, db);
        assert_eq!(da.len(), 64);
    }

    #[test]
    fn actor_serializes_tagged() {
        let v = serde_json::to_value(Actor::operator("op-7")).unwrap();
        assert_eq!(v, serde_json::json!({"kind": "operator", "id": "op-7"}));
        let v = serde_json::to_value(Actor::System).unwrap();
        assert_eq!(v, serde_json::json!({"kind": "system"}));
    }
}

//! Tamper-evident, retention-governed audit log.

pub mod anomaly;
pub mod entry;
pub mod health;
pub mod integrity;
pub mod log;
pub mod report;
pub mod retention;
pub mod sanitize;

pub use entry::{Actor, LogCategory, LogContext, LogEntry, LogLevel};
pub use log::{AuditLog, FlushReport};

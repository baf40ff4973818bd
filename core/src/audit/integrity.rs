use crate::audit::entry::{compute_chain_hash, compute_digest, LogEntry};
use crate::audit::log::AuditLog;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntegrityReport {
    pub total_checked: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    /// Percentage of valid entries; 100 for an empty buffer.
    pub integrity_rate: f64,
    pub invalid_log_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainVerification {
    pub is_valid: bool,
    pub checked_entries: usize,
    /// Id of the first entry whose link does not match, if any.
    pub first_invalid: Option<String>,
}

/// Recomputes the entry's digest from its own fields and compares.
pub fn verify_log_integrity(entry: &LogEntry) -> bool {
    match compute_digest(entry.level, entry.category, &entry.action, &entry.payload) {
        Ok(d) => d == entry.digest,
        Err(_) => false,
    }
}

pub fn verify_entries(entries: &[LogEntry]) -> IntegrityReport {
    let invalid_log_ids: Vec<String> = entries
        .iter()
        .filter(|e| !verify_log_integrity(e))
        .map(|e| e.id.clone())
        .collect();
    let total_checked = entries.len();
    let invalid_count = invalid_log_ids.len();
    let valid_count = total_checked - invalid_count;
    let integrity_rate = if total_checked == 0 {
        100.0
    } else {
        round2(valid_count as f64 / total_checked as f64 * 100.0)
    };
    IntegrityReport {
        total_checked,
        valid_count,
        invalid_count,
        integrity_rate,
        invalid_log_ids,
    }
}

/// Checks digests and hash-chain links across a contiguous run of entries.
///
/// The first entry's `prev_chain_hash` is taken as given, since its
/// predecessor may already have been evicted.
pub fn verify_chain(entries: &[LogEntry]) -> ChainVerification {
    let mut expected_prev: Option<&str> = None;
    for (idx, e) in entries.iter().enumerate() {
        let link_ok = expected_prev.map_or(true, |p| p == e.prev_chain_hash);
        let hash_ok = compute_chain_hash(&e.prev_chain_hash, &e.digest, &e.id) == e.chain_hash;
        if !link_ok || !hash_ok || !verify_log_integrity(e) {
            return ChainVerification {
                is_valid: false,
                checked_entries: idx + 1,
                first_invalid: Some(e.id.clone()),
            };
        }
        expected_prev = Some(&e.chain_hash);
    }
    ChainVerification {
        is_valid: true,
        checked_entries: entries.len(),
        first_invalid: None,
    }
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl AuditLog {
    pub fn verify_all_logs_integrity(&self) -> IntegrityReport {
        verify_entries(&self.entries())
    }

    pub fn verify_chain(&self) -> ChainVerification {
        verify_chain(&self.entries())
    }
}

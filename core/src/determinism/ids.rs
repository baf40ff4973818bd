use sha2::{Digest, Sha256};
use ulid::Ulid;

pub fn log_id() -> String {
    format!("LOG_{}", Ulid::new())
}

pub fn alert_id() -> String {
    format!("ALERT_{}", Ulid::new())
}

pub fn evacuation_id() -> String {
    format!("EVAC_{}", Ulid::new())
}

pub fn report_id() -> String {
    format!("RPT_{}", Ulid::new())
}

pub fn timeline_entry_id() -> String {
    Ulid::new().to_string().to_ascii_lowercase()
}

/// `INC_<year>_<6-digit sequence>`; the sequence wraps at one million.
pub fn incident_id(year: i32, sequence: u32) -> String {
    format!("INC_{:04}_{:06}", year, sequence % 1_000_000)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_id_is_zero_padded() {
        assert_eq!(incident_id(2026, 42), "INC_2026_000042");
        assert_eq!(incident_id(2026, 1_000_007), "INC_2026_000007");
    }

    #[test]
    fn prefixed_ids_are_unique() {
        assert_ne!(log_id(), log_id());
        assert!(alert_id().starts_with("ALERT_"));
    }
}

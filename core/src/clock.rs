use std::sync::Mutex;
use time::{Duration, OffsetDateTime};

/// Source of wall-clock time for every timestamp the core produces.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock that only moves when told to. Used by tests and drills.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }

    pub fn set(&self, to: OffsetDateTime) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

pub fn rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let start = OffsetDateTime::from_unix_timestamp(1_767_225_600).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::minutes(15));
        assert_eq!(clock.now() - start, Duration::minutes(15));
    }

    #[test]
    fn rfc3339_is_utc() {
        let ts = OffsetDateTime::from_unix_timestamp(0).unwrap();
        assert_eq!(rfc3339(ts), "1970-01-01T00:00:00Z");
    }
}

//! Bookkeeping timestamps
//!
//! `_created_at` and `_updated_at` are RFC3339 UTC strings with microsecond
//! precision. The clock never hands out the same or an earlier instant
//! twice, so every mutation observably advances `_updated_at` even when
//! the wall clock is coarse or steps backwards.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Serialized timestamp format: `2026-10-19T08:30:00.123456Z`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Monotonic wall-clock source owned by an engine instance
#[derive(Debug)]
pub struct Clock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    /// Next instant, strictly after every instant returned before.
    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let mut now = Utc::now().trunc_subsecs(6);
        if let Some(previous) = *last {
            if now <= previous {
                now = previous + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }

    /// Next instant in the serialized format.
    pub fn timestamp(&self) -> String {
        self.now().format(TIMESTAMP_FORMAT).to_string()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_strictly_increase() {
        let clock = Clock::new();
        let mut previous = clock.timestamp();
        for _ in 0..1000 {
            let next = clock.timestamp();
            assert!(next > previous, "{} should be after {}", next, previous);
            previous = next;
        }
    }

    #[test]
    fn test_timestamp_format() {
        let ts = Clock::new().timestamp();
        assert_eq!(ts.len(), "2026-10-19T08:30:00.123456Z".len());
        assert!(ts.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}

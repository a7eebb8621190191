use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const DAY_SECS: i64 = 86_400;

/// Wall-clock source in Unix seconds.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Server day rollover, as an hour in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReset {
    pub hour: u32,
    #[serde(default)]
    pub utc_offset_secs: i32,
}

impl Default for DailyReset {
    fn default() -> Self {
        Self {
            hour: 2,
            utc_offset_secs: 0,
        }
    }
}

impl DailyReset {
    /// First reset boundary strictly after `now`.
    pub fn next_after(&self, now: i64) -> i64 {
        let offset = FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix());
        let boundary = DateTime::from_timestamp(now, 0)
            .map(|t| t.with_timezone(&offset).date_naive())
            .and_then(|day| day.and_hms_opt(self.hour, 0, 0))
            .and_then(|local| offset.from_local_datetime(&local).single())
            .map(|t| t.timestamp());

        match boundary {
            Some(ts) if ts > now => ts,
            Some(ts) => ts + DAY_SECS,
            None => now + DAY_SECS,
        }
    }
}

/// RFC 3339 rendering for log lines.
pub fn format_ts(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-10T00:00:00Z
    const MIDNIGHT: i64 = 1_710_028_800;

    #[test]
    fn reset_later_today() {
        let reset = DailyReset::default();
        assert_eq!(reset.next_after(MIDNIGHT), MIDNIGHT + 2 * 3600);
    }

    #[test]
    fn reset_rolls_to_tomorrow() {
        let reset = DailyReset::default();
        assert_eq!(reset.next_after(MIDNIGHT + 2 * 3600), MIDNIGHT + DAY_SECS + 2 * 3600);
        assert_eq!(reset.next_after(MIDNIGHT + 5 * 3600), MIDNIGHT + DAY_SECS + 2 * 3600);
    }

    #[test]
    fn reset_honours_offset() {
        // 02:00 at UTC+8 is 18:00 UTC the previous day.
        let reset = DailyReset {
            hour: 2,
            utc_offset_secs: 8 * 3600,
        };
        assert_eq!(reset.next_after(MIDNIGHT), MIDNIGHT + 18 * 3600);
    }

    #[test]
    fn manual_clock_moves() {
        let clock = ManualClock::new(100);
        clock.advance(50);
        assert_eq!(clock.now(), 150);
        clock.set(10);
        assert_eq!(clock.now(), 10);
    }
}

//! Resource accrual of a tiered, capped, constant-rate machine.
//!
//! Times are Unix seconds, amounts are whole units. Interval counts always
//! round up when asking how long something takes, so the machine is never
//! expected to have produced more than it really has.

use crate::event::MachineTier;

/// Units produced after `elapsed` seconds idle. Time beyond the cap produces nothing.
pub fn accumulated(tier: &MachineTier, elapsed: i64) -> u64 {
    if tier.interval <= 0 {
        return 0;
    }
    let effective = elapsed.clamp(0, tier.cap.max(0));
    let intervals = (effective / tier.interval) as u64;
    intervals.saturating_mul(tier.yield_per_interval)
}

/// Seconds of production needed to yield at least `target` units.
///
/// Non-positive targets need no time. A tier that yields nothing can never
/// reach a positive target and reports `i64::MAX`.
pub fn time_to_produce(tier: &MachineTier, target: i64) -> i64 {
    if target <= 0 {
        return 0;
    }
    if tier.yield_per_interval == 0 || tier.interval <= 0 {
        return i64::MAX;
    }
    let target = target as u64;
    let intervals = target.div_ceil(tier.yield_per_interval);
    i64::try_from(intervals)
        .ok()
        .and_then(|n| n.checked_mul(tier.interval))
        .unwrap_or(i64::MAX)
}

use serde::{Deserialize, Serialize};

use crate::event::MachineTier;

/// How far short of the production cap the idle deadline is placed.
///
/// A machine left at its cap stops producing, so the idle deadline sits
/// below the literal cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "value", rename_all = "snake_case")]
pub enum SafetyMargin {
    /// `cap - n * interval`
    Intervals(u32),
    /// `cap * p / 100`
    Percent(u32),
}

impl Default for SafetyMargin {
    fn default() -> Self {
        SafetyMargin::Intervals(2)
    }
}

impl SafetyMargin {
    /// Seconds after a claim at which the machine should be emptied. Never negative.
    pub fn idle_window(&self, tier: &MachineTier) -> i64 {
        let cap = tier.cap.max(0);
        match *self {
            SafetyMargin::Intervals(n) => {
                cap.saturating_sub((n as i64).saturating_mul(tier.interval)).max(0)
            }
            SafetyMargin::Percent(p) => cap.saturating_mul(p.min(100) as i64) / 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WakeReason {
    /// Idle deadline before the machine saturates.
    IdleCap,
    /// Enough resource will have been produced to finish the target.
    ResourceReady,
    /// Event finished for today; wait for the server reset.
    DailyReset,
    /// Step option grants no experience; only the idle deadline applies.
    Misconfigured,
}

/// Immediate action allocation for the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionPlan {
    /// Actions to perform now: `min(affordable, needed)`.
    pub actions: u64,
    /// Actions that would reach `target_exp`.
    pub needed: u64,
    /// Actions the current balance pays for.
    pub affordable: u64,
    pub target_exp: u64,
    pub cost_per_action: u64,
    /// The option grants zero experience, so no count of actions helps.
    pub stalled: bool,
}

impl ActionPlan {
    /// True when performing `actions` reaches the target.
    pub fn completes_target(&self) -> bool {
        !self.stalled && self.actions == self.needed
    }

    pub fn total_cost(&self) -> u64 {
        self.actions.saturating_mul(self.cost_per_action)
    }

    /// Resource still missing to perform all `needed` actions. Negative when covered.
    pub fn shortfall(&self, balance: u64) -> i64 {
        let required = self.needed as i128 * self.cost_per_action as i128;
        let missing = required - balance as i128;
        missing.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

/// When to wake next, and how many actions to run right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleDecision {
    pub wake_at: i64,
    pub actions: u64,
    pub reason: WakeReason,
    pub standard_deadline: Option<i64>,
    pub resource_deadline: Option<i64>,
}

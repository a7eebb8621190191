use tracing::warn;

use super::types::{ActionPlan, SafetyMargin, ScheduleDecision, WakeReason};
use crate::error::Result;
use crate::event::{EventTable, MachineTier, ProgressionStep};
use crate::kernel::production::time_to_produce;
use crate::kernel::profile::AccountProfile;
use crate::kernel::time::DailyReset;

/// Pure scheduling decisions: (profile, tables, now) -> (actions now, next wake).
#[derive(Debug, Clone, Copy, Default)]
pub struct Planner {
    pub margin: SafetyMargin,
    pub reset: DailyReset,
}

impl Planner {
    pub fn new(margin: SafetyMargin, reset: DailyReset) -> Self {
        Self { margin, reset }
    }

    /// How many actions the balance affords without overshooting the step target.
    pub fn plan_actions(&self, step: &ProgressionStep, profile: &AccountProfile) -> Result<ActionPlan> {
        let option = step.option(profile.option)?;
        let target_exp = step.target_exp(profile.option, profile.exp);
        let cost = option.cost.amount;

        if option.exp == 0 {
            warn!(
                account = %profile.account,
                step = step.index,
                option = profile.option,
                "Option grants no experience, falling back to idle deadline"
            );
            return Ok(ActionPlan {
                target_exp,
                cost_per_action: cost,
                stalled: true,
                ..ActionPlan::default()
            });
        }

        let remaining = target_exp.saturating_sub(profile.exp);
        let needed = remaining.div_ceil(option.exp);
        let affordable = if cost == 0 {
            u64::MAX
        } else {
            profile.primary / cost
        };

        Ok(ActionPlan {
            actions: affordable.min(needed),
            needed,
            affordable,
            target_exp,
            cost_per_action: cost,
            stalled: false,
        })
    }

    /// `last_claim` plus the margined idle window.
    pub fn standard_deadline(&self, tier: &MachineTier, last_claim: i64) -> i64 {
        last_claim.saturating_add(self.margin.idle_window(tier))
    }

    /// `last_claim` plus the production time covering the plan's shortfall.
    pub fn resource_deadline(&self, tier: &MachineTier, plan: &ActionPlan, profile: &AccountProfile) -> i64 {
        let shortfall = plan.shortfall(profile.primary);
        profile.last_claim.saturating_add(time_to_produce(tier, shortfall))
    }

    /// Next wake time: the earlier of the idle and resource deadlines.
    ///
    /// An account that finished the last step waits for the daily reset instead.
    pub fn schedule(
        &self,
        table: &EventTable,
        profile: &AccountProfile,
        now: i64,
    ) -> Result<ScheduleDecision> {
        let step = table.step(profile.step)?;

        if table.is_final_step(profile.step) && step.is_complete(profile.exp) {
            return Ok(ScheduleDecision {
                wake_at: self.reset.next_after(now),
                actions: 0,
                reason: WakeReason::DailyReset,
                standard_deadline: None,
                resource_deadline: None,
            });
        }

        let tier = table.tier(profile.tier)?;
        let standard = self.standard_deadline(tier, profile.last_claim);
        let plan = self.plan_actions(step, profile)?;

        if plan.stalled {
            return Ok(ScheduleDecision {
                wake_at: standard,
                actions: 0,
                reason: WakeReason::Misconfigured,
                standard_deadline: Some(standard),
                resource_deadline: None,
            });
        }

        let resource = self.resource_deadline(tier, &plan, profile);
        let (wake_at, reason) = if resource < standard {
            (resource, WakeReason::ResourceReady)
        } else {
            (standard, WakeReason::IdleCap)
        };

        Ok(ScheduleDecision {
            wake_at,
            actions: plan.actions,
            reason,
            standard_deadline: Some(standard),
            resource_deadline: Some(resource),
        })
    }
}

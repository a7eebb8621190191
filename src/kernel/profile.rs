use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::{AssetCost, StepOption};
use crate::services::store::ScheduleRecord;

/// Subscriber identifier, as listed in the account store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Progress as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileSnapshot {
    pub step: u32,
    pub exp: u64,
    pub option: usize,
    pub tier: u32,
    pub primary: u64,
    pub secondary: u64,
}

/// Local mirror of one account's event progress.
///
/// Owned by that account's runner. Remote fields are refreshed each cycle and
/// patched optimistically after each successful action; `last_claim` and
/// `next_action_at` only exist locally (and in the schedule record).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProfile {
    pub account: AccountId,
    pub step: u32,
    pub exp: u64,
    pub option: usize,
    pub tier: u32,
    pub primary: u64,
    pub secondary: u64,
    pub last_claim: i64,
    pub next_action_at: i64,
}

impl AccountProfile {
    pub fn new(account: AccountId, snapshot: ProfileSnapshot) -> Self {
        let mut profile = Self {
            account,
            step: 0,
            exp: 0,
            option: 0,
            tier: 0,
            primary: 0,
            secondary: 0,
            last_claim: 0,
            next_action_at: 0,
        };
        profile.refresh(snapshot);
        profile
    }

    pub fn refresh(&mut self, snapshot: ProfileSnapshot) {
        self.step = snapshot.step;
        self.exp = snapshot.exp;
        self.option = snapshot.option;
        self.tier = snapshot.tier;
        self.primary = snapshot.primary;
        self.secondary = snapshot.secondary;
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            step: self.step,
            exp: self.exp,
            option: self.option,
            tier: self.tier,
            primary: self.primary,
            secondary: self.secondary,
        }
    }

    pub fn is_due(&self, now: i64) -> bool {
        now >= self.next_action_at
    }

    /// Server balance wins when it was reported; otherwise add what was collected.
    pub fn record_claim(&mut self, at: i64, balance: Option<u64>, collected: Option<u64>) {
        self.last_claim = at;
        match (balance, collected) {
            (Some(balance), _) => self.primary = balance,
            (None, Some(collected)) => self.primary = self.primary.saturating_add(collected),
            (None, None) => {}
        }
    }

    /// Applies `count` actions of `option`. Returns the experience gained.
    pub fn apply_actions(
        &mut self,
        count: u64,
        option: &StepOption,
        max_exp: u64,
        balance: Option<u64>,
    ) -> u64 {
        let before = self.exp;
        self.exp = self
            .exp
            .saturating_add(count.saturating_mul(option.exp))
            .min(max_exp.max(before));
        self.primary = balance.unwrap_or_else(|| {
            self.primary
                .saturating_sub(option.cost.amount.saturating_mul(count))
        });
        self.exp - before
    }

    pub fn record_upgrade(&mut self, cost: &AssetCost, balance: Option<u64>) {
        self.tier += 1;
        self.secondary = balance.unwrap_or_else(|| self.secondary.saturating_sub(cost.amount));
    }

    /// Resumes timing from a persisted record of the same event.
    pub fn restore(&mut self, record: &ScheduleRecord) {
        self.last_claim = record.last_claim;
        self.next_action_at = record.next_action_at;
    }

    pub fn schedule_record(&self, event_id: u32) -> ScheduleRecord {
        ScheduleRecord {
            event_id,
            last_claim: self.last_claim,
            next_action_at: self.next_action_at,
            step: self.step,
            tier: self.tier,
            exp: self.exp,
        }
    }
}

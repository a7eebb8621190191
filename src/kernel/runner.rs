use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::production::accumulated;
use super::profile::{AccountId, AccountProfile, ProfileSnapshot};
use super::time::{format_ts, Clock};
use crate::error::{Error, ErrorKind, Result};
use crate::event::{EventDefinition, EventTable};
use crate::planner::{Planner, ScheduleDecision};
use crate::services::{AccountStore, EventActions};

/// Server refusal meaning the story dialogue of the chapter must be played first.
const DIALOGUE_PENDING: &str = "DATING_REQUIREMENT_NOT_MATCH";

/// Where an event stands relative to the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPhase {
    /// No event known.
    Idle,
    /// Known, not yet started.
    Waiting,
    /// Inside `[start, end)`.
    Active,
    /// End passed.
    Finished,
}

impl EventPhase {
    pub fn at(event: Option<&EventDefinition>, now: i64) -> Self {
        match event {
            None => EventPhase::Idle,
            Some(e) if now < e.start => EventPhase::Waiting,
            Some(e) if now < e.end => EventPhase::Active,
            Some(_) => EventPhase::Finished,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub poll_interval: Duration,
    /// Lower bound on `next_action_at - now` after a cycle, in seconds.
    pub min_wake_delay: i64,
    pub precollect: bool,
    pub planner: Planner,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            min_wake_delay: 30,
            precollect: true,
            planner: Planner::default(),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub phase: EventPhase,
    /// False when the account was not due, or the phase allowed no work.
    pub ran: bool,
    pub collected: Option<u64>,
    /// What the machine should have held at the claim, by the local model.
    pub expected: u64,
    pub actions: u64,
    pub exp_gained: u64,
    pub reward_claimed: bool,
    pub upgrades: u32,
    pub decision: Option<ScheduleDecision>,
    pub next_action_at: i64,
}

impl CycleReport {
    fn idle(phase: EventPhase, next_action_at: i64) -> Self {
        Self {
            phase,
            ran: false,
            collected: None,
            expected: 0,
            actions: 0,
            exp_gained: 0,
            reward_claimed: false,
            upgrades: 0,
            decision: None,
            next_action_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Cancelled,
    EventFinished,
}

/// Per-account control loop for one event.
///
/// Owns the account's profile exclusively. Within a cycle the remote calls run
/// strictly in order: claim, consume, reward, upgrade, reschedule.
pub struct EventRunner<A, S, C> {
    actions: A,
    store: Arc<S>,
    clock: Arc<C>,
    table: Arc<EventTable>,
    options: RunnerOptions,
    profile: AccountProfile,
    resumed: bool,
}

impl<A, S, C> EventRunner<A, S, C>
where
    A: EventActions,
    S: AccountStore,
    C: Clock,
{
    pub fn new(
        account: AccountId,
        actions: A,
        store: Arc<S>,
        clock: Arc<C>,
        table: Arc<EventTable>,
        options: RunnerOptions,
    ) -> Self {
        Self {
            actions,
            store,
            clock,
            table,
            options,
            profile: AccountProfile::new(account, ProfileSnapshot::default()),
            resumed: false,
        }
    }

    pub fn profile(&self) -> &AccountProfile {
        &self.profile
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    pub fn account(&self) -> &AccountId {
        &self.profile.account
    }

    fn event(&self) -> &EventDefinition {
        &self.table.definition
    }

    /// Fetches the remote profile and picks up a persisted schedule of the same event.
    pub async fn resume(&mut self) -> Result<()> {
        let snapshot = self.actions.fetch_profile(&self.table.definition).await?;
        self.profile.refresh(snapshot);

        match self.store.load_schedule(&self.profile.account).await {
            Ok(Some(record)) if record.event_id == self.event().id => {
                self.profile.restore(&record);
                info!(
                    last_claim = %format_ts(record.last_claim),
                    next_action_at = %format_ts(record.next_action_at),
                    "Resumed saved schedule"
                );
            }
            Ok(_) => debug!("No saved schedule for this event"),
            Err(e) => warn!(error = %e, "Could not read saved schedule"),
        }

        self.resumed = true;
        info!(
            step = self.profile.step,
            exp = self.profile.exp,
            tier = self.profile.tier,
            primary = self.profile.primary,
            secondary = self.profile.secondary,
            "Profile loaded"
        );
        Ok(())
    }

    /// One pass of the account's action sequence, if it is due at `now`.
    pub async fn run_cycle(&mut self, now: i64) -> Result<CycleReport> {
        let phase = EventPhase::at(Some(self.event()), now);
        let skip = CycleReport::idle(phase, self.profile.next_action_at);
        match phase {
            EventPhase::Idle | EventPhase::Finished => return Ok(skip),
            EventPhase::Waiting if !self.options.precollect => return Ok(skip),
            _ => {}
        }
        if !self.resumed {
            self.resume().await?;
        }
        if !self.profile.is_due(now) {
            return Ok(CycleReport {
                next_action_at: self.profile.next_action_at,
                ..skip
            });
        }

        let event_id = self.event().id;
        let snapshot = self.actions.fetch_profile(&self.table.definition).await?;
        self.profile.refresh(snapshot);

        let mut report = CycleReport {
            ran: true,
            ..skip
        };
        (report.collected, report.expected) = self.claim(now).await?;

        if phase == EventPhase::Waiting {
            // Event not open yet: only keep the machine from saturating.
            let tier = self.table.tier(self.profile.tier)?;
            let wake_at = self
                .options
                .planner
                .standard_deadline(tier, self.profile.last_claim);
            report.next_action_at = self.reschedule(wake_at, now).await;
            return Ok(report);
        }

        let table = Arc::clone(&self.table);
        let step = table.step(self.profile.step)?;
        let plan = self.options.planner.plan_actions(step, &self.profile)?;

        if plan.actions > 0 {
            let option = step.option(self.profile.option)?;
            match self
                .actions
                .perform_step_action(event_id, step.index, option.index, &option.cost, plan.actions)
                .await
            {
                Ok(receipt) => {
                    let gained =
                        self.profile
                            .apply_actions(plan.actions, option, step.max_exp, receipt.balance);
                    report.actions = plan.actions;
                    report.exp_gained = gained;
                    info!(
                        step = step.index,
                        option = option.index,
                        actions = plan.actions,
                        needed = plan.needed,
                        exp = self.profile.exp,
                        target = plan.target_exp,
                        primary = self.profile.primary,
                        "Performed step actions"
                    );
                }
                Err(e) => self.tolerate_rejection("step action", e)?,
            }
        }

        if step.is_complete(self.profile.exp) {
            report.reward_claimed = self.claim_reward(step.index).await?;
        }

        report.upgrades = self.upgrade_machine().await?;

        let decision = self.options.planner.schedule(&table, &self.profile, now)?;
        report.decision = Some(decision);
        report.next_action_at = self.reschedule(decision.wake_at, now).await;
        info!(
            reason = ?decision.reason,
            wake_at = %format_ts(report.next_action_at),
            step = self.profile.step,
            exp = self.profile.exp,
            primary = self.profile.primary,
            "Scheduled next cycle"
        );
        Ok(report)
    }

    /// Polls until cancelled or the event ends. Only fatal errors escape.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<RunOutcome> {
        loop {
            let now = self.clock.now();
            let cycle = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled),
                cycle = self.run_cycle(now) => cycle,
            };

            match cycle {
                Ok(report) if report.phase == EventPhase::Finished => {
                    info!(event = self.event().id, "Event finished");
                    return Ok(RunOutcome::EventFinished);
                }
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Account task stopping");
                    return Err(e);
                }
                Err(e) => warn!(error = %e, kind = ?e.kind(), "Cycle abandoned, retrying next poll"),
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled),
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }
    }

    /// Empties the machine. A refused claim leaves `last_claim` untouched.
    async fn claim(&mut self, now: i64) -> Result<(Option<u64>, u64)> {
        let tier = self.table.tier(self.profile.tier)?;
        let expected = accumulated(tier, now.saturating_sub(self.profile.last_claim));
        match self.actions.claim_resource(self.event().id).await {
            Ok(receipt) => {
                let at = receipt.server_time.unwrap_or(now);
                self.profile.record_claim(at, receipt.balance, receipt.collected);
                info!(
                    collected = receipt.collected.unwrap_or_default(),
                    expected,
                    primary = self.profile.primary,
                    "Collected resource"
                );
                Ok((receipt.collected, expected))
            }
            Err(e) => {
                self.tolerate_rejection("resource claim", e)?;
                Ok((None, expected))
            }
        }
    }

    /// Claims the completed step's reward and resynchronises the profile.
    ///
    /// A refusal (for example a reward that was already claimed) is logged and
    /// otherwise ignored.
    async fn claim_reward(&mut self, step: u32) -> Result<bool> {
        let event = self.table.definition.clone();
        if let Err(e) = self.actions.claim_step_reward(event.id, step).await {
            self.tolerate_rejection("reward claim", e)?;
            return Ok(false);
        }
        info!(step, "Claimed step reward");

        match self.actions.fetch_profile(&event).await {
            Ok(snapshot) => self.profile.refresh(snapshot),
            Err(e) => self.tolerate_rejection("profile resync", e)?,
        }
        Ok(true)
    }

    /// Upgrades one tier at a time while the secondary balance covers the next cost.
    async fn upgrade_machine(&mut self) -> Result<u32> {
        let event_id = self.event().id;
        let mut upgrades = 0;
        loop {
            let tier = self.table.tier(self.profile.tier)?;
            let Some(cost) = tier.upgrade_cost.clone() else {
                break;
            };
            if self.profile.secondary == 0 || self.profile.secondary < cost.amount {
                break;
            }

            let target = tier.tier + 1;
            match self.actions.purchase_tier_upgrade(event_id, target, &cost).await {
                Ok(receipt) => {
                    self.profile.record_upgrade(&cost, receipt.balance);
                    upgrades += 1;
                    info!(
                        tier = self.profile.tier,
                        cost = cost.amount,
                        secondary = self.profile.secondary,
                        "Upgraded machine"
                    );
                }
                Err(e) => {
                    self.tolerate_rejection("machine upgrade", e)?;
                    break;
                }
            }
        }
        Ok(upgrades)
    }

    /// Stores the next wake time, never sooner than the minimum delay.
    async fn reschedule(&mut self, wake_at: i64, now: i64) -> i64 {
        let next = wake_at.max(now.saturating_add(self.options.min_wake_delay));
        self.profile.next_action_at = next;

        let record = self.profile.schedule_record(self.event().id);
        if let Err(e) = self.store.save_schedule(&self.profile.account, record).await {
            warn!(error = %e, "Could not persist schedule");
        }
        next
    }

    /// Logs a server refusal and lets the cycle go on. Anything else is handed
    /// back, which abandons the cycle without rescheduling.
    fn tolerate_rejection(&self, what: &str, e: Error) -> Result<()> {
        if e.kind() != ErrorKind::Rejected {
            return Err(e);
        }
        if e.rejection_message() == Some(DIALOGUE_PENDING) {
            warn!(step = self.profile.step, "{} refused: finish the chapter dialogue in game first", what);
        } else {
            warn!(error = %e, "{} rejected", what);
        }
        Ok(())
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::profile::AccountId;
use super::runner::{EventPhase, EventRunner, RunOutcome, RunnerOptions};
use super::time::{format_ts, Clock, DailyReset};
use crate::config::Settings;
use crate::error::Result;
use crate::event::{ConfigLoader, EventTable};
use crate::planner::Planner;
use crate::services::{AccountRecord, AccountStore, ActionsFactory, EventActions};

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub bundle_name: String,
    pub sync_interval: Duration,
    /// How long a cancelled task may take to wind down before it is aborted.
    pub shutdown_grace: Duration,
    pub max_concurrent_logins: usize,
    pub daily_reset: DailyReset,
    pub runner: RunnerOptions,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            bundle_name: "SexualDatingSetting.zip".to_string(),
            sync_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(5),
            max_concurrent_logins: 4,
            daily_reset: DailyReset::default(),
            runner: RunnerOptions::default(),
        }
    }
}

impl OrchestratorOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            bundle_name: settings.bundle_name.clone(),
            sync_interval: settings.sync_interval(),
            shutdown_grace: Duration::from_secs(5),
            max_concurrent_logins: settings.max_concurrent_logins,
            daily_reset: settings.daily_reset,
            runner: RunnerOptions {
                poll_interval: settings.poll_interval(),
                min_wake_delay: settings.min_wake_delay_secs as i64,
                precollect: settings.precollect,
                planner: Planner::new(settings.safety_margin, settings.daily_reset),
            },
        }
    }
}

struct AccountTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Accounts added and removed by one subscription sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<AccountId>,
    pub removed: Vec<AccountId>,
}

/// Runs one `EventRunner` task per subscribed account.
///
/// The task map is owned here and only changed through `add_account`,
/// `remove_account`, `sync_accounts` and `shutdown`. Every task gets a child of
/// the orchestrator's cancellation token.
pub struct Orchestrator<S, F, L, C> {
    store: Arc<S>,
    factory: F,
    loader: L,
    clock: Arc<C>,
    options: OrchestratorOptions,
    gate: Arc<Semaphore>,
    cancel: CancellationToken,
    tasks: HashMap<AccountId, AccountTask>,
    table: Option<Arc<EventTable>>,
}

impl<S, F, L, C> Orchestrator<S, F, L, C>
where
    S: AccountStore,
    F: ActionsFactory,
    L: ConfigLoader,
    C: Clock,
{
    pub fn new(store: Arc<S>, factory: F, loader: L, clock: Arc<C>, options: OrchestratorOptions) -> Self {
        let gate = Arc::new(Semaphore::new(options.max_concurrent_logins.max(1)));
        Self {
            store,
            factory,
            loader,
            clock,
            options,
            gate,
            cancel: CancellationToken::new(),
            tasks: HashMap::new(),
            table: None,
        }
    }

    /// Cancelling this token stops `run` and every account task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn event(&self) -> Option<&Arc<EventTable>> {
        self.table.as_ref()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &AccountId> {
        self.tasks.keys()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// True while the account's task has not returned.
    pub fn is_running(&self, account: &AccountId) -> bool {
        self.tasks
            .get(account)
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Switches to another event. Tasks of the previous event are stopped.
    pub async fn set_event(&mut self, table: Arc<EventTable>) {
        let changed = self
            .table
            .as_ref()
            .map_or(true, |current| current.definition.id != table.definition.id);
        if !changed {
            return;
        }
        self.stop_all().await;
        info!(
            event = table.definition.id,
            name = %table.definition.name,
            start = %format_ts(table.definition.start),
            end = %format_ts(table.definition.end),
            steps = table.step_count(),
            "Event selected"
        );
        self.table = Some(table);
    }

    /// Loads the configuration bundle and selects the current or next event.
    pub async fn load_event(&self) -> Result<Option<Arc<EventTable>>> {
        let config = self.loader.load(&self.options.bundle_name).await?;
        Ok(EventTable::discover(&config, self.clock.now())?.map(Arc::new))
    }

    /// Spawns a runner for `record`. Returns false if it already has one or
    /// no event is selected.
    pub fn add_account(&mut self, record: AccountRecord) -> Result<bool> {
        if self.tasks.contains_key(&record.id) {
            return Ok(false);
        }
        let Some(table) = self.table.clone() else {
            debug!(account = %record.id, "No event selected, not starting account");
            return Ok(false);
        };

        let actions = self.factory.connect(&record)?;
        let cancel = self.cancel.child_token();
        let span = info_span!("account", account = %record.id);
        let runner = EventRunner::new(
            record.id.clone(),
            actions,
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            table,
            self.options.runner.clone(),
        );
        let handle = tokio::spawn(
            drive_account(runner, Arc::clone(&self.gate), cancel.clone()).instrument(span),
        );

        info!(account = %record.id, "Account added");
        self.tasks.insert(record.id, AccountTask { cancel, handle });
        Ok(true)
    }

    /// Cancels the account's task and waits for it to stop.
    pub async fn remove_account(&mut self, account: &AccountId) -> bool {
        match self.tasks.remove(account) {
            Some(task) => {
                stop_task(account, task, self.options.shutdown_grace).await;
                info!(account = %account, "Account removed");
                true
            }
            None => false,
        }
    }

    /// Reconciles running tasks with the store's subscription list.
    pub async fn sync_accounts(&mut self) -> Result<SyncReport> {
        let records = self.store.list_accounts().await?;
        let wanted: HashSet<AccountId> = records.iter().map(|r| r.id.clone()).collect();

        let mut report = SyncReport::default();
        let stale: Vec<AccountId> = self
            .tasks
            .keys()
            .filter(|id| !wanted.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            self.remove_account(&id).await;
            report.removed.push(id);
        }

        for record in records {
            let id = record.id.clone();
            match self.add_account(record) {
                Ok(true) => report.added.push(id),
                Ok(false) => {}
                Err(e) => warn!(account = %id, error = %e, "Could not start account"),
            }
        }
        Ok(report)
    }

    /// Cancels everything and waits for all tasks.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        self.stop_all().await;
    }

    async fn stop_all(&mut self) {
        let grace = self.options.shutdown_grace;
        for (id, task) in self.tasks.drain() {
            stop_task(&id, task, grace).await;
        }
    }

    /// Main loop: keep an event selected and the task set in sync until cancelled.
    pub async fn run(&mut self) -> Result<()> {
        info!(bundle = %self.options.bundle_name, "Orchestrator started");
        while !self.cancel.is_cancelled() {
            let now = self.clock.now();
            let phase = EventPhase::at(self.table.as_ref().map(|t| &t.definition), now);

            if matches!(phase, EventPhase::Idle | EventPhase::Finished) {
                if phase == EventPhase::Finished {
                    self.stop_all().await;
                    self.table = None;
                }
                match self.load_event().await {
                    Ok(Some(table)) => {
                        self.set_event(table).await;
                        continue;
                    }
                    Ok(None) => {
                        let wake = self.options.daily_reset.next_after(now);
                        info!(until = %format_ts(wake), "No event scheduled, waiting for daily reset");
                        self.pause(secs_until(now, wake)).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Could not load event configuration");
                        self.pause(self.options.sync_interval).await;
                    }
                }
                continue;
            }

            if phase == EventPhase::Waiting && !self.options.runner.precollect {
                if let Some(start) = self.table.as_ref().map(|t| t.definition.start) {
                    info!(start = %format_ts(start), "Waiting for event start");
                    self.pause(secs_until(now, start).min(self.options.sync_interval))
                        .await;
                    continue;
                }
            }

            match self.sync_accounts().await {
                Ok(report) if !report.added.is_empty() || !report.removed.is_empty() => info!(
                    added = report.added.len(),
                    removed = report.removed.len(),
                    running = self.tasks.len(),
                    "Subscriptions synced"
                ),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Could not read subscriptions"),
            }
            self.pause(self.options.sync_interval).await;
        }

        self.shutdown().await;
        info!("Orchestrator stopped");
        Ok(())
    }

    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}

fn secs_until(now: i64, at: i64) -> Duration {
    Duration::from_secs(at.saturating_sub(now).max(1) as u64)
}

async fn stop_task(account: &AccountId, task: AccountTask, grace: Duration) {
    task.cancel.cancel();
    let mut handle = task.handle;
    if tokio::time::timeout(grace, &mut handle).await.is_err() {
        warn!(account = %account, "Task ignored cancellation, aborting");
        handle.abort();
    }
}

/// Body of one account task: admission, initial load, then the poll loop.
async fn drive_account<A, S, C>(
    mut runner: EventRunner<A, S, C>,
    gate: Arc<Semaphore>,
    cancel: CancellationToken,
) where
    A: EventActions,
    S: AccountStore,
    C: Clock,
{
    let poll = runner.options().poll_interval;
    loop {
        let resumed = tokio::select! {
            _ = cancel.cancelled() => return,
            resumed = async {
                // Only the login burst is gated; the permit drops after the first load.
                let _permit = gate.acquire().await;
                runner.resume().await
            } => resumed,
        };
        match resumed {
            Ok(()) => break,
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Account could not start");
                return;
            }
            Err(e) => warn!(error = %e, "Initial load failed, retrying"),
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(poll) => {}
        }
    }

    match runner.run(cancel).await {
        Ok(RunOutcome::Cancelled) => debug!("Account task cancelled"),
        Ok(RunOutcome::EventFinished) => info!("Account done for this event"),
        Err(e) => error!(error = %e, "Account task failed"),
    }
}

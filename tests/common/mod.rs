#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rendezvous::event::{
    AssetCost, AssetRef, ConfigLoader, ConfigurationTable, EventDefinition, EventTable,
    MachineTier, ProgressionStep, StepOption,
};
use rendezvous::kernel::ProfileSnapshot;
use rendezvous::services::{
    AccountRecord, ActionReceipt, ActionsFactory, ClaimReceipt, EventActions, UpgradeReceipt,
};
use rendezvous::{Error, Result};

// 2024-03-10T00:00:00Z, inside the fixture event's window.
pub const NOW: i64 = 1_710_028_800;

pub const BUNDLE: &str = r#"{
  "sexual_dating_settings": [
    {"event_id": 6, "event_type": 1, "name": "Winter Date", "version_id": 1,
     "timeslot_detail": [{"start_time": 1000, "end_time": 2000}]},
    {"event_id": 7, "event_type": 1, "name": "Spring Date", "version_id": 3, "pet_id": 12,
     "timeslot_detail": [{"start_time": 1710000000, "end_time": 1711000000}]},
    {"event_id": 8, "event_type": 1, "name": "Summer Date", "version_id": 1,
     "timeslot_detail": [{"start_time": 1712000000, "end_time": 1713000000}]}
  ],
  "h_sence_settings": [
    {"event_id": 7, "chapter_id": 2, "max_exp": 1000, "option_detail": [
      {"exp": 50, "exp_require": 0, "item_cost": [{"asset_type": 6, "asset_id": 600101, "amount": 20}]},
      {"exp": 100, "exp_require": 400, "item_cost": [{"asset_type": 6, "asset_id": "600101", "amount": 30}]}
    ]},
    {"event_id": 7, "chapter_id": 1, "max_exp": 500, "option_detail": [
      {"exp": 50, "exp_require": 0, "item_cost": [{"asset_type": 6, "asset_id": 600101, "amount": 20}]}
    ]},
    {"event_id": 8, "chapter_id": 1, "max_exp": 10, "option_detail": [{"exp": 1}]}
  ],
  "explore_item_settings": [
    {"event_id": 7, "tier": 2, "duration": 1800, "max_explore_limit": 86400,
     "reward_list": [{"asset_id": 600101, "amount": 10}],
     "cost_list": [{"asset_id": 600102, "amount": 500}]},
    {"event_id": 7, "tier": 1, "duration": 3600, "max_explore_limit": 86400,
     "reward_list": [{"asset_id": 600101, "amount": 10}], "cost_list": []},
    {"event_id": 7, "tier": 3, "duration": 1800, "max_explore_limit": 86400,
     "reward_list": [{"asset_id": 600101, "amount": 20}],
     "cost_list": [{"asset_id": "600102", "amount": 800}]},
    {"event_id": 8, "tier": 1, "duration": 60, "max_explore_limit": 600,
     "reward_list": [{"asset_id": 700101, "amount": 1}]}
  ],
  "message_detail_settings": [
    {"event_id": 7, "chapter": 1, "name": "First Meeting", "message_data": [
      {"id": 101, "save_point": 0, "selection_list": [
        {"selection_id": 1, "correct": 0, "content": "Leave"},
        {"selection_id": 2, "correct": 1, "content": "Stay",
         "item_cost": [{"asset_id": 600101, "amount": 5}]}
      ]},
      {"id": 102, "selection_list": []}
    ]}
  ]
}"#;

pub fn bundle() -> ConfigurationTable {
    serde_json::from_str(BUNDLE).expect("fixture bundle parses")
}

/// Event 7 of the fixture bundle.
pub fn spring_table() -> Arc<EventTable> {
    let table = EventTable::discover(&bundle(), NOW)
        .expect("fixture bundle is valid")
        .expect("event 7 is ongoing");
    Arc::new(table)
}

pub fn wine() -> AssetRef {
    AssetRef {
        asset_type: 6,
        asset_id: "600101".into(),
    }
}

pub fn herbs() -> AssetRef {
    AssetRef {
        asset_type: 6,
        asset_id: "600102".into(),
    }
}

pub fn definition(start: i64, end: i64) -> EventDefinition {
    EventDefinition {
        id: 7,
        version: 1,
        name: "Spring Date".into(),
        start,
        end,
        primary: wine(),
        secondary: Some(herbs()),
    }
}

/// `(exp, unlock_exp, cost)` per option.
pub fn step(index: u32, max_exp: u64, options: &[(u64, u64, u64)]) -> ProgressionStep {
    ProgressionStep {
        index,
        max_exp,
        options: options
            .iter()
            .enumerate()
            .map(|(i, &(exp, unlock_exp, cost))| StepOption {
                index: i,
                exp,
                unlock_exp,
                cost: AssetCost {
                    asset: wine(),
                    amount: cost,
                },
            })
            .collect(),
    }
}

pub fn tier(tier: u32, interval: i64, cap: i64, yield_per_interval: u64, upgrade: Option<u64>) -> MachineTier {
    MachineTier {
        tier,
        interval,
        cap,
        yield_per_interval,
        upgrade_cost: upgrade.map(|amount| AssetCost {
            asset: herbs(),
            amount,
        }),
    }
}

pub fn snapshot(step: u32, exp: u64, primary: u64, secondary: u64) -> ProfileSnapshot {
    ProfileSnapshot {
        step,
        exp,
        option: 0,
        tier: 1,
        primary,
        secondary,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch,
    Claim,
    Act { step: u32, option: usize, count: u64, cost: u64 },
    Reward { step: u32 },
    Upgrade { tier: u32, cost: u64 },
}

/// Server side of the fake game: progress plus a call log.
#[derive(Debug, Default)]
pub struct FakeServer {
    pub snapshot: ProfileSnapshot,
    pub calls: Vec<Call>,
    /// Added to the primary balance by each claim.
    pub claim_yield: u64,
    pub server_time: Option<i64>,
    pub fail_fetch: bool,
    pub fail_claim: bool,
    pub fail_act: bool,
    pub reject_act: Option<&'static str>,
    pub reject_reward: Option<&'static str>,
    pub reject_upgrade: Option<&'static str>,
    pub claimed_steps: BTreeSet<u32>,
}

/// Counts first logins in flight across every account of a factory.
#[derive(Debug, Default)]
pub struct LoginGauge {
    pub delay: Duration,
    current: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl LoginGauge {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    async fn visit(&self) {
        let inside = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(inside, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
    }
}

/// `EventActions` backed by a `FakeServer` that follows the event table's rules.
#[derive(Clone)]
pub struct MockActions {
    pub server: Arc<Mutex<FakeServer>>,
    table: Arc<EventTable>,
    gauge: Option<Arc<LoginGauge>>,
}

impl MockActions {
    pub fn new(table: Arc<EventTable>, snapshot: ProfileSnapshot) -> Self {
        Self {
            server: Arc::new(Mutex::new(FakeServer {
                snapshot,
                ..FakeServer::default()
            })),
            table,
            gauge: None,
        }
    }

    pub fn with_gauge(mut self, gauge: Arc<LoginGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.server.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.server.lock().unwrap().calls.clear();
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeServer) -> R) -> R {
        f(&mut self.server.lock().unwrap())
    }
}

impl EventActions for MockActions {
    async fn fetch_profile(&self, _event: &EventDefinition) -> Result<ProfileSnapshot> {
        let first = !self.server.lock().unwrap().calls.contains(&Call::Fetch);
        if let (true, Some(gauge)) = (first, &self.gauge) {
            gauge.visit().await;
        }
        let mut server = self.server.lock().unwrap();
        server.calls.push(Call::Fetch);
        if server.fail_fetch {
            return Err(Error::Malformed("connection reset".into()));
        }
        Ok(server.snapshot)
    }

    async fn claim_resource(&self, _event_id: u32) -> Result<ClaimReceipt> {
        let mut server = self.server.lock().unwrap();
        server.calls.push(Call::Claim);
        if server.fail_claim {
            return Err(Error::Malformed("connection reset".into()));
        }
        let collected = server.claim_yield;
        server.snapshot.primary += collected;
        Ok(ClaimReceipt {
            server_time: server.server_time,
            balance: Some(server.snapshot.primary),
            collected: Some(collected),
        })
    }

    async fn perform_step_action(
        &self,
        _event_id: u32,
        step: u32,
        option: usize,
        cost: &AssetCost,
        count: u64,
    ) -> Result<ActionReceipt> {
        let mut server = self.server.lock().unwrap();
        server.calls.push(Call::Act {
            step,
            option,
            count,
            cost: cost.amount,
        });
        if server.fail_act {
            return Err(Error::Malformed("connection reset".into()));
        }
        if let Some(reason) = server.reject_act {
            return Err(Error::rejected(None, reason));
        }
        let total = cost.amount * count;
        if total > server.snapshot.primary {
            return Err(Error::rejected(Some(11002), "NOT_ENOUGH_ITEM"));
        }
        let definition = self.table.step(step)?;
        let gained = definition.option(option)?.exp * count;
        server.snapshot.primary -= total;
        server.snapshot.exp = (server.snapshot.exp + gained).min(definition.max_exp);
        Ok(ActionReceipt {
            balance: Some(server.snapshot.primary),
        })
    }

    async fn claim_step_reward(&self, _event_id: u32, step: u32) -> Result<()> {
        let mut server = self.server.lock().unwrap();
        server.calls.push(Call::Reward { step });
        if let Some(reason) = server.reject_reward {
            return Err(Error::rejected(None, reason));
        }
        if !server.claimed_steps.insert(step) {
            return Err(Error::rejected(None, "ALREADY_CLAIMED"));
        }
        if step < self.table.step_count() {
            server.snapshot.step = step + 1;
            server.snapshot.exp = 0;
            server.snapshot.option = 0;
        }
        Ok(())
    }

    async fn purchase_tier_upgrade(
        &self,
        _event_id: u32,
        target_tier: u32,
        cost: &AssetCost,
    ) -> Result<UpgradeReceipt> {
        let mut server = self.server.lock().unwrap();
        server.calls.push(Call::Upgrade {
            tier: target_tier,
            cost: cost.amount,
        });
        if let Some(reason) = server.reject_upgrade {
            return Err(Error::rejected(None, reason));
        }
        server.snapshot.secondary -= cost.amount;
        server.snapshot.tier = target_tier;
        Ok(UpgradeReceipt {
            balance: Some(server.snapshot.secondary),
        })
    }
}

/// Hands every account a fresh `MockActions` starting from `snapshot`.
pub struct MockFactory {
    pub table: Arc<EventTable>,
    pub snapshot: ProfileSnapshot,
    pub connected: Arc<Mutex<Vec<AccountRecord>>>,
    pub gauge: Option<Arc<LoginGauge>>,
}

impl MockFactory {
    pub fn new(table: Arc<EventTable>, snapshot: ProfileSnapshot) -> Self {
        Self {
            table,
            snapshot,
            connected: Arc::new(Mutex::new(Vec::new())),
            gauge: None,
        }
    }
}

impl ActionsFactory for MockFactory {
    type Actions = MockActions;

    fn connect(&self, account: &AccountRecord) -> Result<MockActions> {
        self.connected.lock().unwrap().push(account.clone());
        let actions = MockActions::new(Arc::clone(&self.table), self.snapshot);
        Ok(match &self.gauge {
            Some(gauge) => actions.with_gauge(Arc::clone(gauge)),
            None => actions,
        })
    }
}

/// Serves the fixture bundle from memory.
pub struct StaticLoader(pub ConfigurationTable);

impl ConfigLoader for StaticLoader {
    async fn load(&self, _bundle_name: &str) -> Result<ConfigurationTable> {
        Ok(self.0.clone())
    }
}

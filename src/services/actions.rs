use std::future::Future;
use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::serde_id;
use super::store::AccountRecord;
use super::transport::{Credentials, Endpoints, Envelope, HttpTransport, ItemAmount, Transport};
use crate::error::{Error, Result};
use crate::event::{AssetCost, AssetRef, EventDefinition};
use crate::kernel::profile::ProfileSnapshot;

const RECORDS: &str = "/api/sexual_dating/records";
const BACKPACK: &str = "/api/user/backpack";
const CLAIM_EXPLORE: &str = "/api/sexual_dating/claimItemExplore";
const OPTION_CLICK: &str = "/api/sexual_dating/option/click";
const CHAPTER_CLAIM: &str = "/api/sexual_dating/claim";
const UPGRADE_TIER: &str = "/api/sexual_dating/upgradeExploreItemTier";

/// Result of emptying the production machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClaimReceipt {
    /// Server clock at the time of the claim.
    pub server_time: Option<i64>,
    /// Primary balance after the claim.
    pub balance: Option<u64>,
    /// Amount the claim added.
    pub collected: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionReceipt {
    /// Primary balance after the actions were paid for.
    pub balance: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpgradeReceipt {
    /// Secondary balance after the upgrade.
    pub balance: Option<u64>,
}

/// Semantic operations against the game server for one account.
pub trait EventActions: Send + Sync + 'static {
    /// Current step, experience, option, tier and both balances.
    fn fetch_profile(
        &self,
        event: &EventDefinition,
    ) -> impl Future<Output = Result<ProfileSnapshot>> + Send;

    fn claim_resource(&self, event_id: u32) -> impl Future<Output = Result<ClaimReceipt>> + Send;

    /// Performs `count` actions of `option`; `cost` is the per-action price.
    fn perform_step_action(
        &self,
        event_id: u32,
        step: u32,
        option: usize,
        cost: &AssetCost,
        count: u64,
    ) -> impl Future<Output = Result<ActionReceipt>> + Send;

    fn claim_step_reward(&self, event_id: u32, step: u32) -> impl Future<Output = Result<()>> + Send;

    fn purchase_tier_upgrade(
        &self,
        event_id: u32,
        target_tier: u32,
        cost: &AssetCost,
    ) -> impl Future<Output = Result<UpgradeReceipt>> + Send;
}

/// Builds the action client for each subscribed account.
pub trait ActionsFactory: Send + Sync + 'static {
    type Actions: EventActions;

    fn connect(&self, account: &AccountRecord) -> Result<Self::Actions>;
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    user_record: Option<UserRecord>,
    #[serde(default)]
    user_explore_item_record: Option<ExploreRecord>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    current_chapter: u32,
    #[serde(default)]
    exp: u64,
    #[serde(default)]
    unlock_option: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct ExploreRecord {
    tier: u32,
}

#[derive(Debug, Default, Deserialize)]
struct BackpackResponse {
    #[serde(default)]
    user_item: Vec<BackpackItem>,
}

#[derive(Debug, Deserialize)]
struct BackpackItem {
    #[serde(deserialize_with = "serde_id::string")]
    item_id: String,
    #[serde(default)]
    amount: u64,
}

#[derive(Debug, Default, Deserialize)]
struct ClaimResponse {
    #[serde(default)]
    reward_list: Vec<ItemAmount>,
}

impl BackpackResponse {
    fn amount_of(&self, asset: &AssetRef) -> u64 {
        self.user_item
            .iter()
            .filter(|i| i.item_id == asset.asset_id)
            .map(|i| i.amount)
            .sum()
    }
}

/// Cost list as the server expects it: a JSON array string.
pub fn cost_payload(cost: &AssetCost) -> String {
    let asset_id = cost
        .asset
        .asset_id
        .parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(cost.asset.asset_id.clone()));
    json!([{
        "asset_type": cost.asset.asset_type,
        "asset_id": asset_id,
        "amount": cost.amount,
    }])
    .to_string()
}

/// `EventActions` over any `Transport`.
pub struct GameEventApi<T> {
    transport: T,
}

impl<T: Transport> GameEventApi<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> EventActions for GameEventApi<T> {
    async fn fetch_profile(&self, event: &EventDefinition) -> Result<ProfileSnapshot> {
        let records = self
            .transport
            .get(RECORDS, &[("event_id", event.id.to_string())])
            .await?
            .into_result()?;
        let records: RecordsResponse = records.response_as()?;
        let user = records
            .user_record
            .ok_or_else(|| Error::Malformed(format!("no record for event {}", event.id)))?;

        let backpack: BackpackResponse = self
            .transport
            .get(BACKPACK, &[])
            .await?
            .into_result()?
            .response_as()?;

        Ok(ProfileSnapshot {
            step: user.current_chapter,
            exp: user.exp,
            option: user.unlock_option.last().copied().unwrap_or(0),
            tier: records.user_explore_item_record.map(|r| r.tier).unwrap_or(1),
            primary: backpack.amount_of(&event.primary),
            secondary: event
                .secondary
                .as_ref()
                .map(|asset| backpack.amount_of(asset))
                .unwrap_or(0),
        })
    }

    async fn claim_resource(&self, event_id: u32) -> Result<ClaimReceipt> {
        let envelope = self
            .transport
            .post(CLAIM_EXPLORE, &[("event_id", event_id.to_string())])
            .await?
            .into_result()?;
        let claim: ClaimResponse = envelope.response_as().unwrap_or_default();
        Ok(ClaimReceipt {
            server_time: envelope.server_time,
            balance: envelope.updated_amount(),
            collected: claim.reward_list.first().map(|r| r.amount),
        })
    }

    async fn perform_step_action(
        &self,
        event_id: u32,
        step: u32,
        option: usize,
        cost: &AssetCost,
        count: u64,
    ) -> Result<ActionReceipt> {
        let envelope: Envelope = self
            .transport
            .post(
                OPTION_CLICK,
                &[
                    ("event_id", event_id.to_string()),
                    ("chapter_id", step.to_string()),
                    ("option_index", option.to_string()),
                    ("amount", count.to_string()),
                    ("cost", cost_payload(&cost.scaled(count))),
                ],
            )
            .await?
            .into_result()?;
        Ok(ActionReceipt {
            balance: envelope.updated_amount(),
        })
    }

    async fn claim_step_reward(&self, event_id: u32, step: u32) -> Result<()> {
        self.transport
            .post(
                CHAPTER_CLAIM,
                &[
                    ("event_id", event_id.to_string()),
                    ("chapter_id", step.to_string()),
                ],
            )
            .await?
            .into_result()?;
        Ok(())
    }

    async fn purchase_tier_upgrade(
        &self,
        event_id: u32,
        target_tier: u32,
        cost: &AssetCost,
    ) -> Result<UpgradeReceipt> {
        let envelope = self
            .transport
            .post(
                UPGRADE_TIER,
                &[
                    ("event_id", event_id.to_string()),
                    ("tier", target_tier.to_string()),
                    ("cost", cost_payload(cost)),
                ],
            )
            .await?
            .into_result()?;
        Ok(UpgradeReceipt {
            balance: envelope.updated_amount(),
        })
    }
}

/// One `HttpTransport` per account, sharing a connection pool.
pub struct HttpActionsFactory {
    client: Client,
    endpoints: Arc<Endpoints>,
}

impl HttpActionsFactory {
    pub fn new(client: Client, endpoints: Endpoints) -> Self {
        Self {
            client,
            endpoints: Arc::new(endpoints),
        }
    }
}

impl ActionsFactory for HttpActionsFactory {
    type Actions = GameEventApi<HttpTransport>;

    fn connect(&self, account: &AccountRecord) -> Result<Self::Actions> {
        let credentials = Credentials {
            login_id: account.login_id,
            user_id: account.user_id,
        };
        Ok(GameEventApi::new(HttpTransport::new(
            self.client.clone(),
            Arc::clone(&self.endpoints),
            credentials,
        )))
    }
}

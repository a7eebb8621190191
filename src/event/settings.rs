//! Raw shape of a decoded `SexualDatingSetting` bundle.
//!
//! Only the record types the automation reads are modelled; everything else
//! in the bundle is ignored by serde.

use serde::{Deserialize, Serialize};

use crate::services::serde_id;

/// Decoded event bundle, keyed by record type.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigurationTable {
    #[serde(default)]
    pub sexual_dating_settings: Vec<EventSetting>,
    #[serde(default)]
    pub h_sence_settings: Vec<SceneSetting>,
    #[serde(default)]
    pub explore_item_settings: Vec<ExploreItemSetting>,
    #[serde(default)]
    pub message_detail_settings: Vec<MessageChapterSetting>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventSetting {
    pub event_id: u32,
    #[serde(default)]
    pub event_type: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version_id: u32,
    #[serde(default)]
    pub pet_id: u32,
    pub timeslot_detail: Vec<Timeslot>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Timeslot {
    pub start_time: i64,
    pub end_time: i64,
}

/// One entry of a reward or cost list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AssetAmount {
    #[serde(default = "default_asset_type")]
    pub asset_type: u32,
    #[serde(deserialize_with = "serde_id::string")]
    pub asset_id: String,
    pub amount: u64,
}

/// Item assets; the only type the event spends.
pub const ITEM_ASSET_TYPE: u32 = 6;

fn default_asset_type() -> u32 {
    ITEM_ASSET_TYPE
}

/// A chapter ("scene") of the clicker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneSetting {
    pub event_id: u32,
    pub chapter_id: u32,
    pub max_exp: u64,
    #[serde(default)]
    pub active: u32,
    #[serde(default)]
    pub option_detail: Vec<OptionSetting>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptionSetting {
    pub exp: u64,
    #[serde(default)]
    pub exp_require: u64,
    #[serde(default)]
    pub item_cost: Vec<AssetAmount>,
}

/// A production machine tier.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExploreItemSetting {
    pub event_id: u32,
    pub tier: u32,
    /// Seconds per production interval.
    pub duration: u64,
    /// Seconds of production the machine can hold.
    pub max_explore_limit: u64,
    #[serde(default)]
    pub reward_list: Vec<AssetAmount>,
    /// Cost of reaching this tier from the one below.
    #[serde(default)]
    pub cost_list: Vec<AssetAmount>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageChapterSetting {
    #[serde(default)]
    pub event_id: u32,
    pub chapter: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message_data: Vec<MessageSetting>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageSetting {
    pub id: u32,
    #[serde(default)]
    pub save_point: u32,
    #[serde(default)]
    pub progress_percent: u32,
    #[serde(default)]
    pub selection_list: Vec<SelectionSetting>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectionSetting {
    #[serde(default)]
    pub selection_id: u32,
    #[serde(default)]
    pub correct: u32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub item_cost: Vec<AssetAmount>,
}

impl SelectionSetting {
    pub fn is_correct(&self) -> bool {
        self.correct == 1
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::settings::{AssetAmount, ConfigurationTable, EventSetting, ExploreItemSetting};
use crate::error::{Error, Result};

/// Identifies an inventory asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    pub asset_type: u32,
    pub asset_id: String,
}

/// An amount of one asset, as charged by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCost {
    pub asset: AssetRef,
    pub amount: u64,
}

impl AssetCost {
    /// Total cost of `count` repetitions.
    pub fn scaled(&self, count: u64) -> AssetCost {
        AssetCost {
            asset: self.asset.clone(),
            amount: self.amount.saturating_mul(count),
        }
    }
}

impl From<&AssetAmount> for AssetCost {
    fn from(value: &AssetAmount) -> Self {
        AssetCost {
            asset: AssetRef {
                asset_type: value.asset_type,
                asset_id: value.asset_id.clone(),
            },
            amount: value.amount,
        }
    }
}

/// Identity and validity window of one event. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub id: u32,
    pub version: u32,
    pub name: String,
    pub start: i64,
    pub end: i64,
    /// Spent on step actions ("wine").
    pub primary: AssetRef,
    /// Spent on machine upgrades ("herbs"). Absent when the machine cannot be upgraded.
    pub secondary: Option<AssetRef>,
}

impl EventDefinition {
    /// `[start, end)`
    pub fn contains(&self, now: i64) -> bool {
        self.start <= now && now < self.end
    }
}

/// One selectable click option within a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOption {
    pub index: usize,
    /// Experience granted per action.
    pub exp: u64,
    /// Step experience at which this option unlocks.
    pub unlock_exp: u64,
    /// Resource charged per action.
    pub cost: AssetCost,
}

/// A chapter: a unit of progression gated by an experience maximum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressionStep {
    pub index: u32,
    pub max_exp: u64,
    pub options: Vec<StepOption>,
}

impl ProgressionStep {
    pub fn option(&self, index: usize) -> Result<&StepOption> {
        self.options.get(index).ok_or(Error::MissingOption {
            step: self.index,
            option: index,
        })
    }

    /// Experience the current option should be driven to.
    ///
    /// While a later option is still locked, its unlock threshold is the
    /// target; once the account has reached it the target is the step maximum.
    pub fn target_exp(&self, option: usize, exp: u64) -> u64 {
        match self.options.get(option + 1) {
            Some(next) if exp < next.unlock_exp => next.unlock_exp.min(self.max_exp),
            _ => self.max_exp,
        }
    }

    pub fn is_complete(&self, exp: u64) -> bool {
        exp >= self.max_exp
    }
}

/// A production machine level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineTier {
    pub tier: u32,
    /// Seconds per produced batch.
    pub interval: i64,
    /// Seconds of production before the machine saturates.
    pub cap: i64,
    /// Units produced per interval.
    pub yield_per_interval: u64,
    /// Cost of moving to the next tier. `None` on the highest tier.
    pub upgrade_cost: Option<AssetCost>,
}

/// Correct selection for a dialogue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueAnswer {
    pub message_id: u32,
    pub choice: usize,
    pub content: String,
    pub cost: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueChapter {
    pub chapter: u32,
    pub name: String,
    pub answers: Vec<DialogueAnswer>,
}

/// Queryable, validated view over one event's settings.
#[derive(Debug, Clone)]
pub struct EventTable {
    pub definition: EventDefinition,
    steps: BTreeMap<u32, ProgressionStep>,
    tiers: BTreeMap<u32, MachineTier>,
    dialogue: Vec<DialogueChapter>,
}

impl EventTable {
    /// Validates step and tier tables.
    ///
    /// Steps and tiers must both be contiguous from 1, every step needs an
    /// option, and every tier a non-zero interval and yield.
    pub fn new(
        definition: EventDefinition,
        steps: Vec<ProgressionStep>,
        tiers: Vec<MachineTier>,
    ) -> Result<Self> {
        let steps: BTreeMap<u32, ProgressionStep> =
            steps.into_iter().map(|s| (s.index, s)).collect();
        let tiers: BTreeMap<u32, MachineTier> = tiers.into_iter().map(|t| (t.tier, t)).collect();

        if steps.is_empty() {
            return Err(Error::Config(format!("event {} has no steps", definition.id)));
        }
        for (expected, (index, step)) in (1u32..).zip(&steps) {
            if *index != expected {
                return Err(Error::Config(format!(
                    "event {} steps are not contiguous: expected {}, found {}",
                    definition.id, expected, index
                )));
            }
            if step.options.is_empty() {
                return Err(Error::Config(format!("step {} has no options", index)));
            }
        }

        if tiers.is_empty() {
            return Err(Error::Config(format!("event {} has no machine tiers", definition.id)));
        }
        for (expected, (index, tier)) in (1u32..).zip(&tiers) {
            if *index != expected {
                return Err(Error::Config(format!(
                    "event {} tiers are not contiguous: expected {}, found {}",
                    definition.id, expected, index
                )));
            }
            if tier.interval <= 0 || tier.yield_per_interval == 0 || tier.cap < 0 {
                return Err(Error::Config(format!(
                    "tier {} has interval {}s, cap {}s, yield {}",
                    index, tier.interval, tier.cap, tier.yield_per_interval
                )));
            }
        }

        Ok(Self {
            definition,
            steps,
            tiers,
            dialogue: Vec::new(),
        })
    }

    /// Picks the ongoing event, else the earliest upcoming one, and builds its table.
    pub fn discover(config: &ConfigurationTable, now: i64) -> Result<Option<Self>> {
        match select_event(&config.sexual_dating_settings, now) {
            Some(event) => Self::build(config, event).map(Some),
            None => Ok(None),
        }
    }

    pub fn build(config: &ConfigurationTable, event: &EventSetting) -> Result<Self> {
        let id = event.event_id;
        let slot = event
            .timeslot_detail
            .first()
            .ok_or_else(|| Error::Config(format!("event {} has no timeslot", id)))?;

        let mut machines: Vec<&ExploreItemSetting> = config
            .explore_item_settings
            .iter()
            .filter(|m| m.event_id == id)
            .collect();
        machines.sort_by_key(|m| m.tier);

        let (primary, secondary) = resolve_assets(id, &machines)?;

        let definition = EventDefinition {
            id,
            version: event.version_id,
            name: event.name.clone(),
            start: slot.start_time,
            end: slot.end_time,
            primary: primary.clone(),
            secondary,
        };

        let mut tiers = Vec::with_capacity(machines.len());
        for (pos, machine) in machines.iter().enumerate() {
            let upgrade_cost = machines
                .get(pos + 1)
                .and_then(|next| next.cost_list.first())
                .map(AssetCost::from);
            tiers.push(MachineTier {
                tier: machine.tier,
                interval: seconds(machine.duration, "duration")?,
                cap: seconds(machine.max_explore_limit, "max_explore_limit")?,
                yield_per_interval: machine.reward_list.first().map(|r| r.amount).unwrap_or(0),
                upgrade_cost,
            });
        }

        let mut steps: Vec<ProgressionStep> = config
            .h_sence_settings
            .iter()
            .filter(|s| s.event_id == id)
            .map(|scene| ProgressionStep {
                index: scene.chapter_id,
                max_exp: scene.max_exp,
                options: scene
                    .option_detail
                    .iter()
                    .enumerate()
                    .map(|(index, option)| StepOption {
                        index,
                        exp: option.exp,
                        unlock_exp: option.exp_require,
                        cost: option.item_cost.first().map(AssetCost::from).unwrap_or_else(
                            || AssetCost {
                                asset: primary.clone(),
                                amount: 0,
                            },
                        ),
                    })
                    .collect(),
            })
            .collect();
        steps.sort_by_key(|s| s.index);

        let mut table = Self::new(definition, steps, tiers)?;
        table.dialogue = config
            .message_detail_settings
            .iter()
            .filter(|c| c.event_id == id)
            .map(|chapter| DialogueChapter {
                chapter: chapter.chapter,
                name: chapter.name.clone(),
                answers: chapter
                    .message_data
                    .iter()
                    .filter_map(|message| {
                        message
                            .selection_list
                            .iter()
                            .enumerate()
                            .find(|(_, s)| s.is_correct())
                            .map(|(pos, selection)| DialogueAnswer {
                                message_id: message.id,
                                choice: pos + 1,
                                content: selection.content.clone(),
                                cost: selection.item_cost.first().map(|c| c.amount),
                            })
                    })
                    .collect(),
            })
            .collect();
        Ok(table)
    }

    pub fn step(&self, index: u32) -> Result<&ProgressionStep> {
        self.steps.get(&index).ok_or(Error::MissingStep(index))
    }

    pub fn tier(&self, tier: u32) -> Result<&MachineTier> {
        self.tiers.get(&tier).ok_or(Error::MissingTier(tier))
    }

    pub fn step_count(&self) -> u32 {
        self.steps.len() as u32
    }

    pub fn is_final_step(&self, index: u32) -> bool {
        index == self.step_count()
    }

    pub fn steps(&self) -> impl Iterator<Item = &ProgressionStep> {
        self.steps.values()
    }

    pub fn tiers(&self) -> impl Iterator<Item = &MachineTier> {
        self.tiers.values()
    }

    pub fn dialogue(&self) -> &[DialogueChapter] {
        &self.dialogue
    }
}

/// Ongoing event first, otherwise the one starting soonest.
pub fn select_event(events: &[EventSetting], now: i64) -> Option<&EventSetting> {
    let window = |e: &EventSetting| e.timeslot_detail.first().map(|s| (s.start_time, s.end_time));

    events
        .iter()
        .find(|e| matches!(window(e), Some((start, end)) if start <= now && now < end))
        .or_else(|| {
            events
                .iter()
                .filter_map(|e| window(e).map(|(start, _)| (start, e)))
                .filter(|(start, _)| now < *start)
                .min_by_key(|(start, _)| *start)
                .map(|(_, e)| e)
        })
}

fn resolve_assets(
    event_id: u32,
    machines: &[&ExploreItemSetting],
) -> Result<(AssetRef, Option<AssetRef>)> {
    let to_ref = |a: &AssetAmount| AssetRef {
        asset_type: a.asset_type,
        asset_id: a.asset_id.clone(),
    };

    if let Some(machine) = machines.iter().find(|m| !m.cost_list.is_empty()) {
        if let Some(reward) = machine.reward_list.first() {
            return Ok((to_ref(reward), machine.cost_list.first().map(to_ref)));
        }
    }
    machines
        .first()
        .and_then(|m| m.reward_list.first())
        .map(|reward| (to_ref(reward), None))
        .ok_or_else(|| Error::Config(format!("event {} machine produces nothing", event_id)))
}

fn seconds(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::Config(format!("{} out of range: {}", field, value)))
}

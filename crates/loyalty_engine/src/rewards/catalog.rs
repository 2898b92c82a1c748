//! Quest definitions and the read-mostly quest catalog.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::RewardError;

/// Business event categories that can advance quest progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerCategory {
    Booking,
    Review,
    Exploration,
    ProfileCompletion,
    Social,
    DailyCheckIn,
    Referral,
    Streak,
}

/// How often a quest's progress window resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestRecurrence {
    None,
    Daily,
    Weekly,
}

/// An admin-authored quest definition. Immutable per version; soft-disabled
/// via `is_active`, never deleted while progress rows reference it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub quest_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub trigger_category: TriggerCategory,
    pub target_count: u32,
    pub reward_points: u64,
    pub recurrence: QuestRecurrence,
    #[serde(default)]
    pub reward_badge_id: Option<String>,
    pub is_active: bool,
}

impl Quest {
    pub fn validate(&self) -> Result<(), RewardError> {
        if self.quest_id.trim().is_empty() {
            return Err(RewardError::QuestInvalid {
                quest_id: self.quest_id.clone(),
                reason: "quest id cannot be empty".to_string(),
            });
        }
        if self.target_count == 0 {
            return Err(RewardError::QuestInvalid {
                quest_id: self.quest_id.clone(),
                reason: "target count must be at least 1".to_string(),
            });
        }
        if let Some(badge_id) = &self.reward_badge_id {
            if badge_id.trim().is_empty() {
                return Err(RewardError::QuestInvalid {
                    quest_id: self.quest_id.clone(),
                    reason: "reward badge id cannot be empty when set".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// In-memory registry of quest definitions keyed by quest id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestCatalog {
    #[serde(default)]
    quests: BTreeMap<String, Quest>,
}

impl QuestCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_quests(quests: Vec<Quest>) -> Result<Self, RewardError> {
        let mut catalog = Self::new();
        for quest in quests {
            catalog.upsert(quest)?;
        }
        Ok(catalog)
    }

    /// Insert or replace a quest definition after validating it.
    pub fn upsert(&mut self, quest: Quest) -> Result<(), RewardError> {
        quest.validate()?;
        self.quests.insert(quest.quest_id.clone(), quest);
        Ok(())
    }

    /// Soft-disable or re-enable a quest.
    pub fn set_active(&mut self, quest_id: &str, is_active: bool) -> Result<(), RewardError> {
        let quest = self
            .quests
            .get_mut(quest_id)
            .ok_or_else(|| RewardError::QuestNotFound {
                quest_id: quest_id.to_string(),
            })?;
        quest.is_active = is_active;
        Ok(())
    }

    pub fn quest(&self, quest_id: &str) -> Option<&Quest> {
        self.quests.get(quest_id)
    }

    /// All active quests whose trigger category matches, in quest id order.
    pub fn active_by_category(&self, category: TriggerCategory) -> Vec<Quest> {
        self.quests
            .values()
            .filter(|quest| quest.is_active && quest.trigger_category == category)
            .cloned()
            .collect()
    }

    /// All active quests in quest id order.
    pub fn active_quests(&self) -> Vec<Quest> {
        self.quests
            .values()
            .filter(|quest| quest.is_active)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }
}

//! Read-only views over engine state.
//!
//! Views never create rows, never persist epoch resets, and never credit.
//! Store failures on this path degrade to empty defaults; only the write
//! path fails loud.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::badge::UserBadge;
use super::catalog::{QuestRecurrence, TriggerCategory};
use super::engine::RewardEngine;
use super::epoch::should_reset;
use super::ledger::{source_label, RewardSource, RewardTransaction, TransactionKind};
use super::progress::progress_percent;
use super::tier::{RewardTier, TierProgress};
use super::types::{Metadata, TransactionId, UnixMillis};

/// One ledger entry decorated for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntryView {
    pub transaction_id: TransactionId,
    pub kind: TransactionKind,
    pub source: RewardSource,
    pub source_label: String,
    pub points: u64,
    pub balance_after: i64,
    pub occurred_at: UnixMillis,
    pub description: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl LedgerEntryView {
    fn from_transaction(transaction: RewardTransaction) -> Self {
        Self {
            transaction_id: transaction.id,
            kind: transaction.kind,
            source: transaction.source,
            source_label: source_label(transaction.source).to_string(),
            points: transaction.points,
            balance_after: transaction.balance_after,
            occurred_at: transaction.occurred_at,
            description: transaction.description,
            metadata: transaction.metadata,
        }
    }
}

/// A user's balance, tier, and recent ledger history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRewardsSummary {
    pub user_id: String,
    pub points: i64,
    pub tier: RewardTier,
    pub progress_to_next: Option<TierProgress>,
    pub recent_transactions: Vec<LedgerEntryView>,
    #[serde(default)]
    pub badges: Vec<UserBadge>,
}

/// One active quest with the viewing user's effective progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestBoardEntry {
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
    pub current_count: u32,
    pub is_completed: bool,
    pub progress_percent: f64,
}

impl RewardEngine {
    /// Current balance, tier, progress-to-next, and the most recent ledger
    /// entries newest first. The balance and tier come straight from the
    /// store, so a transaction this request just wrote is always visible.
    pub fn user_rewards_summary(&self, user_id: &str) -> UserRewardsSummary {
        let balance = self.store().balance(user_id).unwrap_or_else(|error| {
            tracing::warn!(user_id, ?error, "balance read failed, serving empty summary");
            None
        });
        let points = balance.map(|row| row.points).unwrap_or(0);
        let tier = self.tiers().tier_for(points).clone();
        let progress_to_next = self.tiers().progress_to_next(points);
        let recent_transactions = self
            .store()
            .recent_transactions(user_id, self.config().recent_history_limit)
            .unwrap_or_else(|error| {
                tracing::warn!(user_id, ?error, "ledger read failed, serving empty history");
                Vec::new()
            })
            .into_iter()
            .map(LedgerEntryView::from_transaction)
            .collect();
        let badges = self.store().badges_for_user(user_id).unwrap_or_else(|error| {
            tracing::warn!(user_id, ?error, "badge read failed, serving empty badge list");
            Vec::new()
        });
        UserRewardsSummary {
            user_id: user_id.to_string(),
            points,
            tier,
            progress_to_next,
            recent_transactions,
            badges,
        }
    }

    /// All active quests with the user's effective progress. Quests without
    /// a progress row report zero counts; rows whose recurrence window has
    /// elapsed are shown reset. Nothing is written, so the stored row still
    /// resets only on its next trigger. Responses are served from the
    /// bounded TTL cache and invalidated on every commit for the user.
    pub fn quest_board(&self, user_id: &str, now: UnixMillis) -> Vec<QuestBoardEntry> {
        let cache_key = user_id.to_string();
        if let Some(entries) = self.board_cache.get(&cache_key) {
            return entries;
        }

        let progress_rows = self.store().progress_for_user(user_id).unwrap_or_else(|error| {
            tracing::warn!(user_id, ?error, "progress read failed, serving zero progress");
            Vec::new()
        });
        let mut progress_by_quest = BTreeMap::new();
        for row in progress_rows {
            progress_by_quest.insert(row.progress.quest_id.clone(), row.progress);
        }

        let entries = self
            .active_quests()
            .into_iter()
            .map(|quest| {
                let (current_count, is_completed) = progress_by_quest
                    .get(&quest.quest_id)
                    .map(|progress| {
                        if should_reset(quest.recurrence, progress.last_reset_at, now) {
                            (0, false)
                        } else {
                            (progress.current_count, progress.is_completed)
                        }
                    })
                    .unwrap_or((0, false));
                QuestBoardEntry {
                    quest_id: quest.quest_id.clone(),
                    title: quest.title.clone(),
                    description: quest.description.clone(),
                    trigger_category: quest.trigger_category,
                    target_count: quest.target_count,
                    reward_points: quest.reward_points,
                    recurrence: quest.recurrence,
                    reward_badge_id: quest.reward_badge_id.clone(),
                    current_count,
                    is_completed,
                    progress_percent: progress_percent(current_count, quest.target_count),
                }
            })
            .collect::<Vec<_>>();

        self.board_cache.insert(cache_key, entries.clone());
        entries
    }
}

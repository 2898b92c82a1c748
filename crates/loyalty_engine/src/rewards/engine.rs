//! The reward engine: trigger intake, atomic crediting, and catalog admin.
//!
//! The engine is the only writer of ledger rows and balance rows. Every
//! mutation is a read-compute-commit cycle against the store's versioned
//! rows; conflicting commits are retried whole with fresh reads so two
//! concurrent triggers can never both extend the ledger from the same
//! previous balance.

use serde_json::Value as JsonValue;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::badge::UserBadge;
use super::cache::TtlCache;
use super::catalog::{Quest, QuestCatalog, TriggerCategory};
use super::error::RewardError;
use super::events::{NotificationSink, RewardEvent};
use super::ledger::{
    source_label, verify_user_chain, LedgerInvariantReport, LedgerInvariantViolation, RewardSource,
    RewardTransaction, TransactionKind,
};
use super::progress::{advance_progress, progress_percent, QuestProgress, QuestTriggerReport};
use super::store::{LedgerCommit, ProgressCommit, RewardStore};
use super::tier::TierTable;
use super::types::{Metadata, UnixMillis};
use super::views::QuestBoardEntry;

const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 5;
const DEFAULT_RECENT_HISTORY_LIMIT: usize = 20;
const DEFAULT_QUEST_BOARD_CACHE_TTL_MS: u64 = 5_000;
const DEFAULT_QUEST_BOARD_CACHE_MAX_ENTRIES: usize = 1_024;

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_commit_attempts: u32,
    pub recent_history_limit: usize,
    pub quest_board_cache_ttl_ms: u64,
    pub quest_board_cache_max_entries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            recent_history_limit: DEFAULT_RECENT_HISTORY_LIMIT,
            quest_board_cache_ttl_ms: DEFAULT_QUEST_BOARD_CACHE_TTL_MS,
            quest_board_cache_max_entries: DEFAULT_QUEST_BOARD_CACHE_MAX_ENTRIES,
        }
    }
}

/// Shared, thread-safe reward engine. Clone the surrounding `Arc`; all
/// methods take `&self`.
pub struct RewardEngine {
    config: EngineConfig,
    catalog: RwLock<QuestCatalog>,
    tiers: TierTable,
    store: Arc<dyn RewardStore>,
    notifications: Arc<dyn NotificationSink>,
    pub(super) board_cache: TtlCache<String, Vec<QuestBoardEntry>>,
}

impl RewardEngine {
    pub fn new(
        config: EngineConfig,
        catalog: QuestCatalog,
        tiers: TierTable,
        store: Arc<dyn RewardStore>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        let board_cache = TtlCache::new(
            Duration::from_millis(config.quest_board_cache_ttl_ms),
            config.quest_board_cache_max_entries,
        );
        Self {
            config,
            catalog: RwLock::new(catalog),
            tiers,
            store,
            notifications,
            board_cache,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    pub fn store(&self) -> &Arc<dyn RewardStore> {
        &self.store
    }

    /// Insert or replace a quest definition.
    pub fn upsert_quest(&self, quest: Quest) -> Result<(), RewardError> {
        self.catalog
            .write()
            .expect("lock catalog")
            .upsert(quest)?;
        self.board_cache.clear();
        Ok(())
    }

    /// Soft-disable or re-enable a quest.
    pub fn set_quest_active(&self, quest_id: &str, is_active: bool) -> Result<(), RewardError> {
        self.catalog
            .write()
            .expect("lock catalog")
            .set_active(quest_id, is_active)?;
        self.board_cache.clear();
        Ok(())
    }

    pub fn quest(&self, quest_id: &str) -> Option<Quest> {
        self.catalog
            .read()
            .expect("lock catalog")
            .quest(quest_id)
            .cloned()
    }

    pub fn active_quests(&self) -> Vec<Quest> {
        self.catalog.read().expect("lock catalog").active_quests()
    }

    /// Process one qualifying domain event. Every active quest matching the
    /// trigger category is advanced independently; a completion that newly
    /// occurs credits its reward exactly once. Duplicate deliveries of the
    /// same logical event double-count; idempotency is the caller's
    /// responsibility.
    pub fn track_progress(
        &self,
        user_id: &str,
        category: TriggerCategory,
        metadata: Metadata,
        now: UnixMillis,
    ) -> Result<Vec<QuestTriggerReport>, RewardError> {
        let quests = self
            .catalog
            .read()
            .expect("lock catalog")
            .active_by_category(category);
        let mut reports = Vec::with_capacity(quests.len());
        for quest in quests {
            reports.push(self.process_quest_trigger(user_id, &quest, category, &metadata, now)?);
        }
        Ok(reports)
    }

    fn process_quest_trigger(
        &self,
        user_id: &str,
        quest: &Quest,
        category: TriggerCategory,
        metadata: &Metadata,
        now: UnixMillis,
    ) -> Result<QuestTriggerReport, RewardError> {
        for attempt in 1..=self.config.max_commit_attempts {
            let stored = self.store.progress(user_id, &quest.quest_id)?;
            let (mut progress, expected_version) = match stored {
                Some(row) => (row.progress, row.version),
                None => (QuestProgress::new(user_id, &quest.quest_id, now), 0),
            };
            let advance = advance_progress(quest, &mut progress, now);

            if advance.already_completed {
                return Ok(trigger_report(quest, &progress, 0, false));
            }

            let mut credit = None;
            let mut previous_points = 0;
            if advance.just_completed && quest.reward_points > 0 {
                let balance = self.store.balance(user_id)?;
                let (points, balance_version) = balance
                    .map(|row| (row.points, row.version))
                    .unwrap_or((0, 0));
                previous_points = points;
                let reward = i64::try_from(quest.reward_points).unwrap_or(i64::MAX);
                let new_balance = points.saturating_add(reward);
                let mut entry_metadata = metadata.clone();
                entry_metadata.insert(
                    "quest_id".to_string(),
                    JsonValue::String(quest.quest_id.clone()),
                );
                entry_metadata.insert(
                    "trigger".to_string(),
                    serde_json::to_value(category).unwrap_or(JsonValue::Null),
                );
                credit = Some(LedgerCommit {
                    user_id: user_id.to_string(),
                    expected_balance_version: balance_version,
                    kind: TransactionKind::Credit,
                    source: RewardSource::Quest,
                    points: quest.reward_points,
                    balance_after: new_balance,
                    new_tier_id: self.tiers.tier_for(new_balance).tier_id.clone(),
                    occurred_at: now,
                    description: quest.title.clone(),
                    metadata: entry_metadata,
                });
            }

            let progress_commit = ProgressCommit {
                row: progress.clone(),
                expected_version,
            };
            match self.store.commit(Some(progress_commit), credit) {
                Ok(appended) => {
                    self.board_cache.invalidate(&user_id.to_string());
                    let points_earned = appended
                        .as_ref()
                        .map(|transaction| transaction.points)
                        .unwrap_or(0);
                    if let Some(transaction) = appended {
                        self.emit_ledger_events(&transaction, previous_points);
                    }
                    if advance.just_completed {
                        self.notify(RewardEvent::QuestCompleted {
                            user_id: user_id.to_string(),
                            quest_id: quest.quest_id.clone(),
                            reward_points: quest.reward_points,
                            completed_at: now,
                        });
                        self.grant_reward_badge(user_id, quest, now);
                    }
                    return Ok(trigger_report(
                        quest,
                        &progress,
                        points_earned,
                        advance.just_completed,
                    ));
                }
                Err(RewardError::StoreConflict { .. }) => {
                    tracing::debug!(
                        user_id,
                        quest_id = %quest.quest_id,
                        attempt,
                        "trigger commit conflicted, retrying with fresh reads"
                    );
                }
                Err(error) => return Err(error),
            }
        }
        Err(RewardError::CreditRetriesExhausted {
            user_id: user_id.to_string(),
            attempts: self.config.max_commit_attempts,
        })
    }

    /// Alternate ledger entry point for the membership/billing collaborator.
    /// Follows the same atomic read-balance/append/update-cache protocol as
    /// quest crediting.
    pub fn activate_membership_bonus(
        &self,
        user_id: &str,
        points: u64,
        source: RewardSource,
        metadata: Metadata,
        now: UnixMillis,
    ) -> Result<RewardTransaction, RewardError> {
        self.apply_ledger_entry(
            user_id,
            TransactionKind::Credit,
            source,
            points,
            source_label(source).to_string(),
            metadata,
            now,
        )
    }

    /// Append one ledger entry with its balance/tier cache update, retried
    /// on version conflicts. Debits that would overdraw the balance are
    /// rejected; the ledger never records a negative running balance.
    pub fn apply_ledger_entry(
        &self,
        user_id: &str,
        kind: TransactionKind,
        source: RewardSource,
        points: u64,
        description: String,
        metadata: Metadata,
        now: UnixMillis,
    ) -> Result<RewardTransaction, RewardError> {
        if points == 0 {
            return Err(RewardError::EntryPointsZero {
                user_id: user_id.to_string(),
            });
        }
        let magnitude = i64::try_from(points).unwrap_or(i64::MAX);
        for attempt in 1..=self.config.max_commit_attempts {
            let balance = self.store.balance(user_id)?;
            let (previous_points, balance_version) = balance
                .map(|row| (row.points, row.version))
                .unwrap_or((0, 0));
            if kind == TransactionKind::Debit && previous_points < magnitude {
                return Err(RewardError::InsufficientBalance {
                    user_id: user_id.to_string(),
                    requested: points,
                    available: previous_points,
                });
            }
            let signed = match kind {
                TransactionKind::Credit => magnitude,
                TransactionKind::Debit => -magnitude,
            };
            let new_balance = previous_points.saturating_add(signed);
            let commit = LedgerCommit {
                user_id: user_id.to_string(),
                expected_balance_version: balance_version,
                kind,
                source,
                points,
                balance_after: new_balance,
                new_tier_id: self.tiers.tier_for(new_balance).tier_id.clone(),
                occurred_at: now,
                description: description.clone(),
                metadata: metadata.clone(),
            };
            match self.store.commit(None, Some(commit)) {
                Ok(Some(transaction)) => {
                    self.emit_ledger_events(&transaction, previous_points);
                    return Ok(transaction);
                }
                Ok(None) => {
                    unreachable!("a ledger commit always returns the appended transaction")
                }
                Err(RewardError::StoreConflict { .. }) => {
                    tracing::debug!(
                        user_id,
                        attempt,
                        "ledger entry commit conflicted, retrying with fresh reads"
                    );
                }
                Err(error) => return Err(error),
            }
        }
        Err(RewardError::CreditRetriesExhausted {
            user_id: user_id.to_string(),
            attempts: self.config.max_commit_attempts,
        })
    }

    /// Idempotent badge grant. Returns whether a new badge row was created.
    pub fn grant_badge(
        &self,
        user_id: &str,
        badge_id: &str,
        metadata: Metadata,
        now: UnixMillis,
    ) -> Result<bool, RewardError> {
        let granted = self
            .store
            .grant_badge(UserBadge::new(user_id, badge_id, now, metadata))?;
        if granted {
            self.notify(RewardEvent::BadgeGranted {
                user_id: user_id.to_string(),
                badge_id: badge_id.to_string(),
                granted_at: now,
            });
        }
        Ok(granted)
    }

    /// Replay every user's ledger and check it against the cached balance
    /// and tier.
    pub fn verify_ledger(&self) -> Result<LedgerInvariantReport, RewardError> {
        let mut report = LedgerInvariantReport::default();
        for user_id in self.store.user_ids()? {
            let mut transactions = self.store.transactions_for_user(&user_id)?;
            let balance = self.store.balance(&user_id)?;
            let cached_points = balance.as_ref().map(|row| row.points).unwrap_or(0);
            report.total_users += 1;
            report.total_transactions += transactions.len();
            verify_user_chain(&user_id, &mut transactions, cached_points, &mut report.violations);
            if let Some(row) = balance {
                let expected_tier = self.tiers.tier_for(row.points).tier_id.as_str();
                if row.tier_id != expected_tier {
                    report.violations.push(LedgerInvariantViolation {
                        code: "tier_stale".to_string(),
                        user_id: user_id.clone(),
                        message: format!(
                            "cached tier {} does not match {} for {} points",
                            row.tier_id, expected_tier, row.points
                        ),
                    });
                }
            }
        }
        Ok(report)
    }

    fn emit_ledger_events(&self, transaction: &RewardTransaction, previous_points: i64) {
        self.notify(RewardEvent::LedgerAppended {
            user_id: transaction.user_id.clone(),
            transaction_id: transaction.id,
            kind: transaction.kind,
            source: transaction.source,
            points: transaction.points,
            balance_after: transaction.balance_after,
            occurred_at: transaction.occurred_at,
        });
        let previous_tier = self.tiers.tier_for(previous_points).tier_id.clone();
        let new_tier = self.tiers.tier_for(transaction.balance_after).tier_id.clone();
        if previous_tier != new_tier {
            self.notify(RewardEvent::TierChanged {
                user_id: transaction.user_id.clone(),
                previous_tier_id: previous_tier,
                new_tier_id: new_tier,
                points: transaction.balance_after,
            });
        }
    }

    fn grant_reward_badge(&self, user_id: &str, quest: &Quest, now: UnixMillis) {
        let Some(badge_id) = &quest.reward_badge_id else {
            return;
        };
        let mut metadata = Metadata::new();
        metadata.insert(
            "quest_id".to_string(),
            JsonValue::String(quest.quest_id.clone()),
        );
        if let Err(error) = self.grant_badge(user_id, badge_id, metadata, now) {
            tracing::warn!(
                user_id,
                badge_id = %badge_id,
                ?error,
                "badge grant failed after quest completion; ledger credit stands"
            );
        }
    }

    pub(super) fn notify(&self, event: RewardEvent) {
        if let Err(error) = self.notifications.dispatch(&event) {
            tracing::warn!(error = %error, "reward notification dispatch failed");
        }
    }
}

fn trigger_report(
    quest: &Quest,
    progress: &QuestProgress,
    points_earned: u64,
    just_completed: bool,
) -> QuestTriggerReport {
    QuestTriggerReport {
        quest_id: quest.quest_id.clone(),
        current_count: progress.current_count,
        target_count: quest.target_count,
        is_completed: progress.is_completed,
        progress_percent: progress_percent(progress.current_count, quest.target_count),
        points_earned,
        just_completed,
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineConfig, RewardEngine};
    use crate::rewards::badge::UserBadge;
    use crate::rewards::catalog::{Quest, QuestCatalog, QuestRecurrence, TriggerCategory};
    use crate::rewards::error::RewardError;
    use crate::rewards::events::{NotificationSink, RewardEvent};
    use crate::rewards::ledger::{RewardSource, RewardTransaction, TransactionKind};
    use crate::rewards::store::{
        BalanceRow, LedgerCommit, MemoryRewardStore, ProgressCommit, ProgressRow, RewardStore,
    };
    use crate::rewards::tier::{RewardTier, TierTable};
    use crate::rewards::types::Metadata;
    use std::sync::Arc;

    fn tier_table() -> TierTable {
        TierTable::new(vec![RewardTier {
            tier_id: "bronze".to_string(),
            name: "bronze".to_string(),
            min_points: 0,
            benefits: Vec::new(),
            multiplier: 1.0,
        }])
        .expect("tier table")
    }

    fn quest(quest_id: &str, target_count: u32, reward_points: u64) -> Quest {
        Quest {
            quest_id: quest_id.to_string(),
            title: format!("quest {quest_id}"),
            description: String::new(),
            trigger_category: TriggerCategory::Booking,
            target_count,
            reward_points,
            recurrence: QuestRecurrence::None,
            reward_badge_id: None,
            is_active: true,
        }
    }

    fn engine_with(
        quests: Vec<Quest>,
        store: Arc<dyn RewardStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> RewardEngine {
        RewardEngine::new(
            EngineConfig::default(),
            QuestCatalog::from_quests(quests).expect("catalog"),
            tier_table(),
            store,
            sink,
        )
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn dispatch(&self, _event: &RewardEvent) -> Result<(), String> {
            Err("downstream unavailable".to_string())
        }
    }

    /// A store whose commits always report a version conflict.
    struct ConflictingStore;

    impl RewardStore for ConflictingStore {
        fn balance(&self, _user_id: &str) -> Result<Option<BalanceRow>, RewardError> {
            Ok(None)
        }

        fn progress(
            &self,
            _user_id: &str,
            _quest_id: &str,
        ) -> Result<Option<ProgressRow>, RewardError> {
            Ok(None)
        }

        fn progress_for_user(&self, _user_id: &str) -> Result<Vec<ProgressRow>, RewardError> {
            Ok(Vec::new())
        }

        fn commit(
            &self,
            _progress: Option<ProgressCommit>,
            _credit: Option<LedgerCommit>,
        ) -> Result<Option<RewardTransaction>, RewardError> {
            Err(RewardError::StoreConflict {
                user_id: "user-1".to_string(),
                expected_version: 0,
                found_version: 1,
            })
        }

        fn grant_badge(&self, _badge: UserBadge) -> Result<bool, RewardError> {
            Ok(false)
        }

        fn badges_for_user(&self, _user_id: &str) -> Result<Vec<UserBadge>, RewardError> {
            Ok(Vec::new())
        }

        fn recent_transactions(
            &self,
            _user_id: &str,
            _limit: usize,
        ) -> Result<Vec<RewardTransaction>, RewardError> {
            Ok(Vec::new())
        }

        fn transactions_for_user(
            &self,
            _user_id: &str,
        ) -> Result<Vec<RewardTransaction>, RewardError> {
            Ok(Vec::new())
        }

        fn user_ids(&self) -> Result<Vec<String>, RewardError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn zero_point_entries_are_rejected() {
        let engine = engine_with(
            Vec::new(),
            Arc::new(MemoryRewardStore::new()),
            Arc::new(FailingSink),
        );
        let result = engine.apply_ledger_entry(
            "user-1",
            TransactionKind::Credit,
            RewardSource::Adjustment,
            0,
            "nothing".to_string(),
            Metadata::new(),
            1_000,
        );
        assert!(matches!(result, Err(RewardError::EntryPointsZero { .. })));
    }

    #[test]
    fn zero_reward_quest_completes_without_a_ledger_row() {
        let store = Arc::new(MemoryRewardStore::new());
        let engine = engine_with(
            vec![quest("q-free", 1, 0)],
            store.clone(),
            Arc::new(FailingSink),
        );
        let reports = engine
            .track_progress("user-1", TriggerCategory::Booking, Metadata::new(), 1_000)
            .expect("track");
        assert!(reports[0].just_completed);
        assert_eq!(reports[0].points_earned, 0);
        assert_eq!(store.transaction_count(), 0);
        let progress = store
            .progress("user-1", "q-free")
            .expect("read")
            .expect("row");
        assert!(progress.progress.is_completed);
    }

    #[test]
    fn persistent_conflicts_surface_after_bounded_retries() {
        let engine = engine_with(
            vec![quest("q-1", 1, 50)],
            Arc::new(ConflictingStore),
            Arc::new(FailingSink),
        );
        let result =
            engine.track_progress("user-1", TriggerCategory::Booking, Metadata::new(), 1_000);
        assert!(matches!(
            result,
            Err(RewardError::CreditRetriesExhausted { attempts: 5, .. })
        ));
    }

    #[test]
    fn notification_failures_never_fail_crediting() {
        let store = Arc::new(MemoryRewardStore::new());
        let engine = engine_with(
            vec![quest("q-1", 1, 50)],
            store.clone(),
            Arc::new(FailingSink),
        );
        let reports = engine
            .track_progress("user-1", TriggerCategory::Booking, Metadata::new(), 1_000)
            .expect("track");
        assert_eq!(reports[0].points_earned, 50);
        let balance = store.balance("user-1").expect("read").expect("row");
        assert_eq!(balance.points, 50);
    }

    #[test]
    fn unknown_quest_activation_reports_not_found() {
        let engine = engine_with(
            Vec::new(),
            Arc::new(MemoryRewardStore::new()),
            Arc::new(FailingSink),
        );
        assert!(matches!(
            engine.set_quest_active("q-missing", true),
            Err(RewardError::QuestNotFound { .. })
        ));
    }
}

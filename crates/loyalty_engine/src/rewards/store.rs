//! Persistence seam for the reward engine.
//!
//! The store owns the four row families (balance cache, quest progress,
//! badges, the append-only ledger) and exposes one atomic commit operation
//! covering a progress write and/or a ledger append with its balance/tier
//! cache update. Writes are conditional on the row versions they were
//! computed from; a mismatch is reported as a conflict and the caller
//! re-reads and retries. That conditional commit is what serializes all
//! balance movement for a given user.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::badge::UserBadge;
use super::error::RewardError;
use super::ledger::{RewardSource, RewardTransaction, TransactionKind};
use super::progress::QuestProgress;
use super::types::{Metadata, TransactionId, UnixMillis};

/// Cached balance row for one user. `points` always equals the newest
/// ledger entry's `balance_after` and `tier_id` its derived tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub user_id: String,
    pub points: i64,
    pub tier_id: String,
    pub version: u64,
}

/// Versioned quest progress row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRow {
    pub progress: QuestProgress,
    pub version: u64,
}

/// A progress write conditional on the version it was computed from.
/// `expected_version = 0` means the row must not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressCommit {
    pub row: QuestProgress,
    pub expected_version: u64,
}

/// A ledger append plus the balance/tier cache update it implies,
/// conditional on the balance version the append was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerCommit {
    pub user_id: String,
    pub expected_balance_version: u64,
    pub kind: TransactionKind,
    pub source: RewardSource,
    pub points: u64,
    pub balance_after: i64,
    pub new_tier_id: String,
    pub occurred_at: UnixMillis,
    pub description: String,
    pub metadata: Metadata,
}

impl LedgerCommit {
    fn signed_points(&self) -> i64 {
        let magnitude = i64::try_from(self.points).unwrap_or(i64::MAX);
        match self.kind {
            TransactionKind::Credit => magnitude,
            TransactionKind::Debit => -magnitude,
        }
    }
}

/// Storage operations required by the reward engine. Implementations must be
/// safe to share across request-handling threads.
pub trait RewardStore: Send + Sync {
    fn balance(&self, user_id: &str) -> Result<Option<BalanceRow>, RewardError>;

    fn progress(&self, user_id: &str, quest_id: &str) -> Result<Option<ProgressRow>, RewardError>;

    fn progress_for_user(&self, user_id: &str) -> Result<Vec<ProgressRow>, RewardError>;

    /// Apply a progress write and/or a ledger append as one atomic unit.
    /// Both version checks pass or nothing is applied. Returns the appended
    /// transaction, if any.
    fn commit(
        &self,
        progress: Option<ProgressCommit>,
        credit: Option<LedgerCommit>,
    ) -> Result<Option<RewardTransaction>, RewardError>;

    /// Insert a badge grant if absent. Returns `false` when the user already
    /// holds the badge; repeat grants never error.
    fn grant_badge(&self, badge: UserBadge) -> Result<bool, RewardError>;

    fn badges_for_user(&self, user_id: &str) -> Result<Vec<UserBadge>, RewardError>;

    /// Newest-first ledger page for display, ordered `(occurred_at, id)`
    /// descending.
    fn recent_transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<RewardTransaction>, RewardError>;

    /// Full ledger for one user in `(occurred_at, id)` ascending order.
    fn transactions_for_user(&self, user_id: &str) -> Result<Vec<RewardTransaction>, RewardError>;

    /// Every user id known to any row family.
    fn user_ids(&self) -> Result<Vec<String>, RewardError>;
}

/// Serializable dump of the in-memory store, used by snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    pub next_transaction_id: TransactionId,
    #[serde(default)]
    pub balances: BTreeMap<String, BalanceRow>,
    #[serde(default)]
    pub progress_by_user: BTreeMap<String, BTreeMap<String, ProgressRow>>,
    #[serde(default)]
    pub badges_by_user: BTreeMap<String, BTreeMap<String, UserBadge>>,
    #[serde(default)]
    pub transactions: Vec<RewardTransaction>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            next_transaction_id: 1,
            balances: BTreeMap::new(),
            progress_by_user: BTreeMap::new(),
            badges_by_user: BTreeMap::new(),
            transactions: Vec::new(),
        }
    }
}

/// In-process store implementation backing tests and single-node
/// deployments. One mutex guards the whole state, so every commit is a
/// transaction.
#[derive(Debug, Clone, Default)]
pub struct MemoryRewardStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryRewardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state_snapshot(&self) -> StoreState {
        self.state.lock().expect("lock store state").clone()
    }

    pub fn transaction_count(&self) -> usize {
        self.state.lock().expect("lock store state").transactions.len()
    }
}

impl RewardStore for MemoryRewardStore {
    fn balance(&self, user_id: &str) -> Result<Option<BalanceRow>, RewardError> {
        let state = self.state.lock().expect("lock store state");
        Ok(state.balances.get(user_id).cloned())
    }

    fn progress(&self, user_id: &str, quest_id: &str) -> Result<Option<ProgressRow>, RewardError> {
        let state = self.state.lock().expect("lock store state");
        Ok(state
            .progress_by_user
            .get(user_id)
            .and_then(|rows| rows.get(quest_id))
            .cloned())
    }

    fn progress_for_user(&self, user_id: &str) -> Result<Vec<ProgressRow>, RewardError> {
        let state = self.state.lock().expect("lock store state");
        Ok(state
            .progress_by_user
            .get(user_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    fn commit(
        &self,
        progress: Option<ProgressCommit>,
        credit: Option<LedgerCommit>,
    ) -> Result<Option<RewardTransaction>, RewardError> {
        let mut state = self.state.lock().expect("lock store state");

        if let Some(commit) = &progress {
            let found_version = state
                .progress_by_user
                .get(&commit.row.user_id)
                .and_then(|rows| rows.get(&commit.row.quest_id))
                .map(|row| row.version)
                .unwrap_or(0);
            if found_version != commit.expected_version {
                return Err(RewardError::StoreConflict {
                    user_id: commit.row.user_id.clone(),
                    expected_version: commit.expected_version,
                    found_version,
                });
            }
        }

        if let Some(commit) = &credit {
            if commit.points == 0 {
                return Err(RewardError::EntryPointsZero {
                    user_id: commit.user_id.clone(),
                });
            }
            let current = state.balances.get(&commit.user_id);
            let found_version = current.map(|row| row.version).unwrap_or(0);
            if found_version != commit.expected_balance_version {
                return Err(RewardError::StoreConflict {
                    user_id: commit.user_id.clone(),
                    expected_version: commit.expected_balance_version,
                    found_version,
                });
            }
            let current_points = current.map(|row| row.points).unwrap_or(0);
            let expected_after = current_points.saturating_add(commit.signed_points());
            if expected_after != commit.balance_after {
                return Err(RewardError::BalanceMismatch {
                    user_id: commit.user_id.clone(),
                    expected: expected_after,
                    found: commit.balance_after,
                });
            }
        }

        if let Some(commit) = progress {
            let version = commit.expected_version.saturating_add(1);
            state
                .progress_by_user
                .entry(commit.row.user_id.clone())
                .or_default()
                .insert(commit.row.quest_id.clone(), ProgressRow {
                    progress: commit.row,
                    version,
                });
        }

        let mut appended = None;
        if let Some(commit) = credit {
            let transaction_id = state.next_transaction_id;
            state.next_transaction_id = state.next_transaction_id.saturating_add(1);
            // Stamps are clamped to be non-decreasing per user, so the
            // `(occurred_at, id)` replay order always equals commit order
            // even when concurrent callers carry skewed clocks.
            let occurred_at = state
                .transactions
                .iter()
                .rev()
                .find(|transaction| transaction.user_id == commit.user_id)
                .map(|transaction| commit.occurred_at.max(transaction.occurred_at))
                .unwrap_or(commit.occurred_at);
            let transaction = RewardTransaction {
                id: transaction_id,
                user_id: commit.user_id.clone(),
                kind: commit.kind,
                source: commit.source,
                points: commit.points,
                balance_after: commit.balance_after,
                occurred_at,
                description: commit.description,
                metadata: commit.metadata,
            };
            state.transactions.push(transaction.clone());
            state.balances.insert(commit.user_id.clone(), BalanceRow {
                user_id: commit.user_id,
                points: commit.balance_after,
                tier_id: commit.new_tier_id,
                version: commit.expected_balance_version.saturating_add(1),
            });
            appended = Some(transaction);
        }

        Ok(appended)
    }

    fn grant_badge(&self, badge: UserBadge) -> Result<bool, RewardError> {
        let mut state = self.state.lock().expect("lock store state");
        let badges = state
            .badges_by_user
            .entry(badge.user_id.clone())
            .or_default();
        if badges.contains_key(&badge.badge_id) {
            return Ok(false);
        }
        badges.insert(badge.badge_id.clone(), badge);
        Ok(true)
    }

    fn badges_for_user(&self, user_id: &str) -> Result<Vec<UserBadge>, RewardError> {
        let state = self.state.lock().expect("lock store state");
        Ok(state
            .badges_by_user
            .get(user_id)
            .map(|badges| badges.values().cloned().collect())
            .unwrap_or_default())
    }

    fn recent_transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<RewardTransaction>, RewardError> {
        let mut transactions = self.transactions_for_user(user_id)?;
        transactions.reverse();
        transactions.truncate(limit);
        Ok(transactions)
    }

    fn transactions_for_user(&self, user_id: &str) -> Result<Vec<RewardTransaction>, RewardError> {
        let state = self.state.lock().expect("lock store state");
        let mut transactions = state
            .transactions
            .iter()
            .filter(|transaction| transaction.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();
        transactions.sort_by(|left, right| left.ledger_order(right));
        Ok(transactions)
    }

    fn user_ids(&self) -> Result<Vec<String>, RewardError> {
        let state = self.state.lock().expect("lock store state");
        let mut ids = state.balances.keys().cloned().collect::<Vec<_>>();
        for user_id in state.progress_by_user.keys() {
            if !ids.contains(user_id) {
                ids.push(user_id.clone());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

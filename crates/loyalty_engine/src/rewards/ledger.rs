//! Append-only reward transaction ledger types and invariant verification.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::types::{Metadata, TransactionId, UnixMillis};

/// Direction of a ledger entry. `points` always carries the positive
/// magnitude; the sign is implied by the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Credit,
    Debit,
}

/// Where a ledger entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardSource {
    Quest,
    Membership,
    Booking,
    Redemption,
    Adjustment,
}

/// Human-readable label for a ledger source, used by read views.
pub fn source_label(source: RewardSource) -> &'static str {
    match source {
        RewardSource::Quest => "quest reward",
        RewardSource::Membership => "membership bonus",
        RewardSource::Booking => "booking reward",
        RewardSource::Redemption => "points redemption",
        RewardSource::Adjustment => "manual adjustment",
    }
}

/// One immutable ledger entry with a post-transaction balance snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardTransaction {
    pub id: TransactionId,
    pub user_id: String,
    pub kind: TransactionKind,
    pub source: RewardSource,
    pub points: u64,
    pub balance_after: i64,
    pub occurred_at: UnixMillis,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl RewardTransaction {
    pub fn signed_points(&self) -> i64 {
        let magnitude = i64::try_from(self.points).unwrap_or(i64::MAX);
        match self.kind {
            TransactionKind::Credit => magnitude,
            TransactionKind::Debit => -magnitude,
        }
    }

    /// Canonical ledger order: `(occurred_at, id)` ascending.
    pub fn ledger_order(&self, other: &Self) -> Ordering {
        self.occurred_at
            .cmp(&other.occurred_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LedgerInvariantViolation {
    pub code: String,
    pub user_id: String,
    pub message: String,
}

/// Result of replaying the ledger against cached balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LedgerInvariantReport {
    pub total_users: usize,
    pub total_transactions: usize,
    pub violations: Vec<LedgerInvariantViolation>,
}

impl LedgerInvariantReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Replay one user's transactions in ledger order and check the running
/// balance chain plus the cached balance. Returns the violations found and
/// the replayed final balance.
pub fn verify_user_chain(
    user_id: &str,
    transactions: &mut [RewardTransaction],
    cached_points: i64,
    violations: &mut Vec<LedgerInvariantViolation>,
) -> i64 {
    transactions.sort_by(|left, right| left.ledger_order(right));
    let mut running = 0_i64;
    for transaction in transactions.iter() {
        running = running.saturating_add(transaction.signed_points());
        if transaction.balance_after != running {
            violations.push(LedgerInvariantViolation {
                code: "balance_chain_broken".to_string(),
                user_id: user_id.to_string(),
                message: format!(
                    "transaction {} recorded balance_after={} but replay gives {}",
                    transaction.id, transaction.balance_after, running
                ),
            });
            running = transaction.balance_after;
        }
        if transaction.points == 0 {
            violations.push(LedgerInvariantViolation {
                code: "zero_magnitude".to_string(),
                user_id: user_id.to_string(),
                message: format!("transaction {} has zero point magnitude", transaction.id),
            });
        }
    }
    if running != cached_points {
        violations.push(LedgerInvariantViolation {
            code: "cached_balance_stale".to_string(),
            user_id: user_id.to_string(),
            message: format!("ledger replays to {running} but cached balance is {cached_points}"),
        });
    }
    running
}

#[cfg(test)]
mod tests {
    use super::{
        verify_user_chain, RewardSource, RewardTransaction, TransactionKind,
    };
    use std::collections::BTreeMap;

    fn transaction(id: u64, kind: TransactionKind, points: u64, balance_after: i64) -> RewardTransaction {
        RewardTransaction {
            id,
            user_id: "user-1".to_string(),
            kind,
            source: RewardSource::Quest,
            points,
            balance_after,
            occurred_at: id as i64 * 1_000,
            description: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn signed_points_follow_kind() {
        assert_eq!(transaction(1, TransactionKind::Credit, 50, 50).signed_points(), 50);
        assert_eq!(transaction(2, TransactionKind::Debit, 30, 20).signed_points(), -30);
    }

    #[test]
    fn intact_chain_verifies_clean() {
        let mut entries = vec![
            transaction(1, TransactionKind::Credit, 100, 100),
            transaction(2, TransactionKind::Debit, 40, 60),
            transaction(3, TransactionKind::Credit, 10, 70),
        ];
        let mut violations = Vec::new();
        let replayed = verify_user_chain("user-1", &mut entries, 70, &mut violations);
        assert_eq!(replayed, 70);
        assert!(violations.is_empty());
    }

    #[test]
    fn broken_chain_and_stale_cache_are_reported() {
        let mut entries = vec![
            transaction(1, TransactionKind::Credit, 100, 100),
            transaction(2, TransactionKind::Credit, 10, 90),
        ];
        let mut violations = Vec::new();
        verify_user_chain("user-1", &mut entries, 200, &mut violations);
        let codes = violations
            .iter()
            .map(|violation| violation.code.as_str())
            .collect::<Vec<_>>();
        assert!(codes.contains(&"balance_chain_broken"));
        assert!(codes.contains(&"cached_balance_stale"));
    }

    #[test]
    fn replay_uses_occurred_at_then_id_order() {
        let mut late_id_early_time = transaction(9, TransactionKind::Credit, 5, 5);
        late_id_early_time.occurred_at = 0;
        let mut entries = vec![
            transaction(1, TransactionKind::Credit, 10, 15),
            late_id_early_time,
        ];
        let mut violations = Vec::new();
        let replayed = verify_user_chain("user-1", &mut entries, 15, &mut violations);
        assert_eq!(replayed, 15);
        assert!(violations.is_empty(), "violations: {violations:?}");
    }
}

//! Loyalty tier table and the pure point-to-tier mapping.

use serde::{Deserialize, Serialize};

use super::error::RewardError;

/// One loyalty tier. `min_points` is inclusive; the upper bound is implied by
/// the next tier's `min_points`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardTier {
    pub tier_id: String,
    pub name: String,
    pub min_points: i64,
    #[serde(default)]
    pub benefits: Vec<String>,
    pub multiplier: f64,
}

/// Remaining distance to the next tier, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierProgress {
    pub next_tier_id: String,
    pub points_remaining: i64,
}

/// Validated, ascending-ordered tier configuration. Static and read-only to
/// the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    tiers: Vec<RewardTier>,
}

impl TierTable {
    /// Build a table from tiers sorted ascending by `min_points`. An empty
    /// table is a configuration error, never silently defaulted.
    pub fn new(mut tiers: Vec<RewardTier>) -> Result<Self, RewardError> {
        if tiers.is_empty() {
            return Err(RewardError::TierTableEmpty);
        }
        tiers.sort_by(|left, right| {
            left.min_points
                .cmp(&right.min_points)
                .then_with(|| left.tier_id.cmp(&right.tier_id))
        });
        for pair in tiers.windows(2) {
            if pair[0].min_points == pair[1].min_points {
                return Err(RewardError::ConfigInvalid {
                    reason: format!(
                        "tiers {} and {} share min_points={}",
                        pair[0].tier_id, pair[1].tier_id, pair[0].min_points
                    ),
                });
            }
            if pair[0].tier_id == pair[1].tier_id {
                return Err(RewardError::ConfigInvalid {
                    reason: format!("duplicate tier id: {}", pair[0].tier_id),
                });
            }
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[RewardTier] {
        &self.tiers
    }

    /// The highest tier whose `min_points <= points`. Balances below the
    /// lowest threshold clamp to the lowest tier.
    pub fn tier_for(&self, points: i64) -> &RewardTier {
        self.tiers
            .iter()
            .rev()
            .find(|tier| tier.min_points <= points)
            .unwrap_or(&self.tiers[0])
    }

    /// Distance to the next tier, or `None` when already at the top.
    pub fn progress_to_next(&self, points: i64) -> Option<TierProgress> {
        let current_index = self
            .tiers
            .iter()
            .rposition(|tier| tier.min_points <= points)
            .unwrap_or(0);
        let next = self.tiers.get(current_index + 1)?;
        Some(TierProgress {
            next_tier_id: next.tier_id.clone(),
            points_remaining: (next.min_points - points).max(0),
        })
    }
}

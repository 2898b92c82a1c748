//! Error types for the rewards module.

use std::io;

/// Errors that can occur in reward engine operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    ConfigInvalid { reason: String },
    TierTableEmpty,
    QuestNotFound { quest_id: String },
    QuestInvalid { quest_id: String, reason: String },
    StoreConflict { user_id: String, expected_version: u64, found_version: u64 },
    CreditRetriesExhausted { user_id: String, attempts: u32 },
    BalanceMismatch { user_id: String, expected: i64, found: i64 },
    InsufficientBalance { user_id: String, requested: u64, available: i64 },
    EntryPointsZero { user_id: String },
    SnapshotHashMismatch { expected: String, found: String },
    Io(String),
    Serde(String),
}

impl From<serde_json::Error> for RewardError {
    fn from(error: serde_json::Error) -> Self {
        RewardError::Serde(error.to_string())
    }
}

impl From<io::Error> for RewardError {
    fn from(error: io::Error) -> Self {
        RewardError::Io(error.to_string())
    }
}

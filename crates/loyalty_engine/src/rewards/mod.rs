//! Rewards module - the loyalty quest and point ledger engine.
//!
//! This module contains the RewardEngine and all supporting types for:
//! - Quest catalog and per-user progress tracking
//! - Recurrence window (epoch) resets
//! - Atomic, per-user-serialized reward crediting into an append-only ledger
//! - Tier derivation from the cached point balance
//! - Idempotent badge grants and outbound reward events
//! - Read views, snapshot persistence, and ledger invariant verification

mod badge;
mod cache;
mod catalog;
mod engine;
mod epoch;
mod error;
mod events;
mod ledger;
mod progress;
mod snapshot;
mod store;
mod tier;
mod types;
mod util;
mod views;

// Re-export all public types

// Types
pub use types::{Metadata, TransactionId, UnixMillis};

// Error
pub use error::RewardError;

// Catalog
pub use catalog::{Quest, QuestCatalog, QuestRecurrence, TriggerCategory};

// Epoch arithmetic
pub use epoch::{epoch_duration_ms, should_reset, DAILY_EPOCH_MS, WEEKLY_EPOCH_MS};

// Tiers
pub use tier::{RewardTier, TierProgress, TierTable};

// Ledger
pub use ledger::{
    source_label, verify_user_chain, LedgerInvariantReport, LedgerInvariantViolation,
    RewardSource, RewardTransaction, TransactionKind,
};

// Progress
pub use progress::{
    advance_progress, progress_percent, ProgressAdvance, QuestProgress, QuestTriggerReport,
};

// Badges
pub use badge::UserBadge;

// Store
pub use store::{
    BalanceRow, LedgerCommit, MemoryRewardStore, ProgressCommit, ProgressRow, RewardStore,
    StoreState,
};

// Events
pub use events::{BufferedNotifications, NotificationSink, RewardEvent};

// Engine
pub use engine::{EngineConfig, RewardEngine};

// Views
pub use views::{LedgerEntryView, QuestBoardEntry, UserRewardsSummary};

// Cache
pub use cache::TtlCache;

// Snapshot
pub use snapshot::EngineSnapshot;

// Utilities
pub use util::{hash_json, read_json_from_path, sha256_hex, write_json_to_path};

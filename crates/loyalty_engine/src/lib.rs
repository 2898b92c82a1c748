pub mod rewards;

pub use rewards::{
    advance_progress, epoch_duration_ms, hash_json, progress_percent, sha256_hex, should_reset,
    source_label, verify_user_chain, BalanceRow, BufferedNotifications,
    EngineConfig, EngineSnapshot, LedgerCommit, LedgerEntryView, LedgerInvariantReport,
    LedgerInvariantViolation, MemoryRewardStore, Metadata, NotificationSink, ProgressAdvance,
    ProgressCommit, ProgressRow, Quest, QuestBoardEntry, QuestCatalog, QuestProgress,
    QuestRecurrence, QuestTriggerReport, RewardEngine, RewardError, RewardEvent, RewardSource,
    RewardStore, RewardTier, RewardTransaction, StoreState, TierProgress, TierTable,
    TransactionId, TransactionKind, TriggerCategory, TtlCache, UnixMillis, UserBadge,
    UserRewardsSummary, DAILY_EPOCH_MS, WEEKLY_EPOCH_MS,
};

//! Recurrence window arithmetic. Pure and infallible.

use super::catalog::QuestRecurrence;
use super::types::UnixMillis;

pub const DAILY_EPOCH_MS: i64 = 24 * 60 * 60 * 1000;
pub const WEEKLY_EPOCH_MS: i64 = 7 * DAILY_EPOCH_MS;

/// Window length for a recurrence, `None` for one-shot quests.
pub fn epoch_duration_ms(recurrence: QuestRecurrence) -> Option<i64> {
    match recurrence {
        QuestRecurrence::None => None,
        QuestRecurrence::Daily => Some(DAILY_EPOCH_MS),
        QuestRecurrence::Weekly => Some(WEEKLY_EPOCH_MS),
    }
}

/// Whether a quest's progress window has elapsed and the next trigger starts
/// a fresh count. Windows roll from `last_reset_at`; they are not
/// calendar-aligned. Clock skew that makes `now` earlier than `last_reset_at`
/// never resets.
pub fn should_reset(
    recurrence: QuestRecurrence,
    last_reset_at: UnixMillis,
    now: UnixMillis,
) -> bool {
    let Some(window_ms) = epoch_duration_ms(recurrence) else {
        return false;
    };
    now.saturating_sub(last_reset_at) >= window_ms
}

#[cfg(test)]
mod tests {
    use super::{should_reset, DAILY_EPOCH_MS, WEEKLY_EPOCH_MS};
    use crate::rewards::catalog::QuestRecurrence;

    #[test]
    fn one_shot_quests_never_reset() {
        assert!(!should_reset(QuestRecurrence::None, 0, i64::MAX));
    }

    #[test]
    fn daily_resets_at_exactly_24_hours() {
        let start = 1_000_000;
        assert!(!should_reset(
            QuestRecurrence::Daily,
            start,
            start + DAILY_EPOCH_MS - 1
        ));
        assert!(should_reset(
            QuestRecurrence::Daily,
            start,
            start + DAILY_EPOCH_MS
        ));
    }

    #[test]
    fn weekly_resets_on_rolling_168_hour_window() {
        let start = 5_000;
        assert!(!should_reset(
            QuestRecurrence::Weekly,
            start,
            start + WEEKLY_EPOCH_MS - 1
        ));
        assert!(should_reset(
            QuestRecurrence::Weekly,
            start,
            start + WEEKLY_EPOCH_MS
        ));
    }

    #[test]
    fn backwards_clock_never_resets() {
        assert!(!should_reset(QuestRecurrence::Daily, 10_000, 9_000));
    }
}

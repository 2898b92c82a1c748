//! Per-user quest progress state and the trigger advance logic.

use serde::{Deserialize, Serialize};

use super::catalog::{Quest, QuestRecurrence};
use super::epoch::should_reset;
use super::types::UnixMillis;

/// Mutable progress for one `(user, quest)` pair. Created lazily on the
/// first matching trigger, overwritten in place each epoch, never deleted.
/// The ledger, not this row, is the durable history of repeat completions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestProgress {
    pub user_id: String,
    pub quest_id: String,
    pub current_count: u32,
    pub is_completed: bool,
    #[serde(default)]
    pub completed_at: Option<UnixMillis>,
    pub last_reset_at: UnixMillis,
}

impl QuestProgress {
    pub fn new(user_id: impl Into<String>, quest_id: impl Into<String>, now: UnixMillis) -> Self {
        Self {
            user_id: user_id.into(),
            quest_id: quest_id.into(),
            current_count: 0,
            is_completed: false,
            completed_at: None,
            last_reset_at: now,
        }
    }
}

/// Outcome of applying one trigger to one progress row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressAdvance {
    pub did_reset: bool,
    pub just_completed: bool,
    /// One-shot quest already done: no increment happened and the row needs
    /// no write.
    pub already_completed: bool,
}

/// Apply one qualifying trigger to a progress row. A trigger always counts
/// exactly one unit of progress. Completion fires when the post-increment
/// count reaches the target and the row was not already completed in this
/// epoch; that flag is the sole signal that reaches reward crediting.
pub fn advance_progress(
    quest: &Quest,
    progress: &mut QuestProgress,
    now: UnixMillis,
) -> ProgressAdvance {
    let mut did_reset = false;
    if should_reset(quest.recurrence, progress.last_reset_at, now) {
        progress.current_count = 0;
        progress.is_completed = false;
        progress.completed_at = None;
        progress.last_reset_at = now;
        did_reset = true;
    }

    if progress.is_completed && quest.recurrence == QuestRecurrence::None {
        return ProgressAdvance {
            did_reset,
            just_completed: false,
            already_completed: true,
        };
    }

    let was_completed = progress.is_completed;
    progress.current_count = progress.current_count.saturating_add(1);
    let just_completed = !was_completed && progress.current_count >= quest.target_count;
    if just_completed {
        progress.is_completed = true;
        progress.completed_at = Some(now);
    }

    ProgressAdvance {
        did_reset,
        just_completed,
        already_completed: false,
    }
}

/// Display percentage, clamped to 100.
pub fn progress_percent(current_count: u32, target_count: u32) -> f64 {
    if target_count == 0 {
        return 100.0;
    }
    (current_count as f64 / target_count as f64 * 100.0).min(100.0)
}

/// Per-quest result reported back to the trigger caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestTriggerReport {
    pub quest_id: String,
    pub current_count: u32,
    pub target_count: u32,
    pub is_completed: bool,
    pub progress_percent: f64,
    pub points_earned: u64,
    pub just_completed: bool,
}

#[cfg(test)]
mod tests {
    use super::{advance_progress, progress_percent, QuestProgress};
    use crate::rewards::catalog::{Quest, QuestRecurrence, TriggerCategory};
    use crate::rewards::epoch::DAILY_EPOCH_MS;

    fn quest(recurrence: QuestRecurrence, target_count: u32) -> Quest {
        Quest {
            quest_id: "q-1".to_string(),
            title: "quest".to_string(),
            description: String::new(),
            trigger_category: TriggerCategory::Booking,
            target_count,
            reward_points: 100,
            recurrence,
            reward_badge_id: None,
            is_active: true,
        }
    }

    #[test]
    fn counts_up_and_completes_at_target() {
        let quest = quest(QuestRecurrence::None, 3);
        let mut progress = QuestProgress::new("user-1", "q-1", 0);

        let first = advance_progress(&quest, &mut progress, 10);
        assert_eq!(progress.current_count, 1);
        assert!(!first.just_completed);

        let second = advance_progress(&quest, &mut progress, 20);
        assert_eq!(progress.current_count, 2);
        assert!(!second.just_completed);

        let third = advance_progress(&quest, &mut progress, 30);
        assert_eq!(progress.current_count, 3);
        assert!(third.just_completed);
        assert!(progress.is_completed);
        assert_eq!(progress.completed_at, Some(30));
    }

    #[test]
    fn completed_one_shot_short_circuits() {
        let quest = quest(QuestRecurrence::None, 1);
        let mut progress = QuestProgress::new("user-1", "q-1", 0);
        assert!(advance_progress(&quest, &mut progress, 10).just_completed);

        let again = advance_progress(&quest, &mut progress, 20);
        assert!(again.already_completed);
        assert!(!again.just_completed);
        assert_eq!(progress.current_count, 1, "short-circuit must not increment");
    }

    #[test]
    fn daily_quest_resets_and_completes_again() {
        let quest = quest(QuestRecurrence::Daily, 1);
        let mut progress = QuestProgress::new("user-1", "q-1", 0);
        assert!(advance_progress(&quest, &mut progress, 100).just_completed);

        let next_day = 100 + DAILY_EPOCH_MS;
        let outcome = advance_progress(&quest, &mut progress, next_day);
        assert!(outcome.did_reset);
        assert!(outcome.just_completed);
        assert_eq!(progress.current_count, 1, "count restarts at 1, not 2");
        assert_eq!(progress.last_reset_at, next_day);
        assert_eq!(progress.completed_at, Some(next_day));
    }

    #[test]
    fn repeat_trigger_within_epoch_earns_nothing() {
        let quest = quest(QuestRecurrence::Daily, 1);
        let mut progress = QuestProgress::new("user-1", "q-1", 0);
        assert!(advance_progress(&quest, &mut progress, 100).just_completed);

        let same_day = advance_progress(&quest, &mut progress, 200);
        assert!(!same_day.just_completed);
        assert!(!same_day.already_completed);
        assert_eq!(progress.current_count, 2);
        assert!(progress.is_completed);
    }

    #[test]
    fn percent_clamps_at_100() {
        assert_eq!(progress_percent(1, 3), 100.0 / 3.0);
        assert_eq!(progress_percent(5, 3), 100.0);
        assert_eq!(progress_percent(0, 3), 0.0);
    }
}

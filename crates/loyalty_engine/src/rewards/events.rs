//! Outbound reward events and the notification dispatch seam.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use super::ledger::{RewardSource, TransactionKind};
use super::types::{TransactionId, UnixMillis};

/// Events emitted after a successful commit. Delivery is fire-and-forget;
/// the ledger is authoritative whether or not anyone hears about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RewardEvent {
    LedgerAppended {
        user_id: String,
        transaction_id: TransactionId,
        kind: TransactionKind,
        source: RewardSource,
        points: u64,
        balance_after: i64,
        occurred_at: UnixMillis,
    },
    QuestCompleted {
        user_id: String,
        quest_id: String,
        reward_points: u64,
        completed_at: UnixMillis,
    },
    TierChanged {
        user_id: String,
        previous_tier_id: String,
        new_tier_id: String,
        points: i64,
    },
    BadgeGranted {
        user_id: String,
        badge_id: String,
        granted_at: UnixMillis,
    },
}

/// Notification collaborator seam. Errors are reported back only so the
/// engine can log them; they never fail the operation that emitted the
/// event.
pub trait NotificationSink: Send + Sync {
    fn dispatch(&self, event: &RewardEvent) -> Result<(), String>;
}

/// In-process sink that buffers events, used by tests and single-node
/// deployments that poll for outbound work.
#[derive(Debug, Default)]
pub struct BufferedNotifications {
    events: Mutex<Vec<RewardEvent>>,
}

impl BufferedNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RewardEvent> {
        self.events.lock().expect("lock event buffer").clone()
    }

    pub fn drain(&self) -> Vec<RewardEvent> {
        std::mem::take(&mut *self.events.lock().expect("lock event buffer"))
    }
}

impl NotificationSink for BufferedNotifications {
    fn dispatch(&self, event: &RewardEvent) -> Result<(), String> {
        self.events
            .lock()
            .expect("lock event buffer")
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferedNotifications, NotificationSink, RewardEvent};

    #[test]
    fn buffered_sink_records_and_drains() {
        let sink = BufferedNotifications::new();
        let event = RewardEvent::BadgeGranted {
            user_id: "user-1".to_string(),
            badge_id: "badge-1".to_string(),
            granted_at: 42,
        };
        sink.dispatch(&event).expect("dispatch");
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.drain().len(), 1);
        assert!(sink.events().is_empty());
    }
}

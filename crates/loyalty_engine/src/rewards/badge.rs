//! Badge grant records.

use serde::{Deserialize, Serialize};

use super::types::{Metadata, UnixMillis};

/// One badge held by one user. Keyed by `(user_id, badge_id)`; granting is
/// idempotent and repeat grants are no-ops, so crediting retries can call it
/// redundantly without creating duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBadge {
    pub user_id: String,
    pub badge_id: String,
    pub granted_at: UnixMillis,
    #[serde(default)]
    pub metadata: Metadata,
}

impl UserBadge {
    pub fn new(
        user_id: impl Into<String>,
        badge_id: impl Into<String>,
        granted_at: UnixMillis,
        metadata: Metadata,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            badge_id: badge_id.into(),
            granted_at,
            metadata,
        }
    }
}

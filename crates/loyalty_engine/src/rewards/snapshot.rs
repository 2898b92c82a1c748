//! Engine state snapshots for persistence and recovery.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::RewardError;
use super::store::{MemoryRewardStore, StoreState};
use super::util::{hash_json, read_json_from_path, write_json_to_path};

/// A complete dump of the store state with a checkpoint hash. The hash is
/// recomputed and checked on load, so a tampered or truncated snapshot is
/// rejected instead of silently seeding a broken ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub state: StoreState,
    pub checkpoint_hash: String,
}

impl EngineSnapshot {
    pub fn capture(store: &MemoryRewardStore) -> Result<Self, RewardError> {
        let state = store.state_snapshot();
        let checkpoint_hash = hash_json(&state)?;
        Ok(Self {
            state,
            checkpoint_hash,
        })
    }

    pub fn verify(&self) -> Result<(), RewardError> {
        let found = hash_json(&self.state)?;
        if found != self.checkpoint_hash {
            return Err(RewardError::SnapshotHashMismatch {
                expected: self.checkpoint_hash.clone(),
                found,
            });
        }
        Ok(())
    }

    /// Verify the checkpoint hash and rebuild a store from the snapshot.
    pub fn restore(&self) -> Result<MemoryRewardStore, RewardError> {
        self.verify()?;
        Ok(MemoryRewardStore::from_state(self.state.clone()))
    }

    pub fn to_json(&self) -> Result<String, RewardError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(input: &str) -> Result<Self, RewardError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), RewardError> {
        write_json_to_path(self, path.as_ref())
    }

    /// Load a snapshot file and verify its checkpoint hash.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, RewardError> {
        let snapshot: Self = read_json_from_path(path.as_ref())?;
        snapshot.verify()?;
        Ok(snapshot)
    }
}

//! Type aliases and basic type definitions for the rewards module.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Wall-clock instant in unix milliseconds. Callers supply it on every
/// mutating entry point so recurrence windows are testable with simulated
/// time.
pub type UnixMillis = i64;

/// Monotonically increasing ledger transaction id, assigned by the store.
pub type TransactionId = u64;

/// Opaque key/value bag attached to ledger rows and badge grants. Engine
/// logic never interprets it.
pub type Metadata = BTreeMap<String, JsonValue>;

//! Journal events emitted by the kernel on every observable state change.
//!
//! The event log is the kernel's diagnostic surface: feedback effects,
//! deterministic denials, and consistency-check failures all land here and
//! are queryable through the API (and persisted by the sqlite journal).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EntityId, PlayerId, SCHEMA_VERSION_V1};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    LockDeployed,
    DeployDenied,
    LockRemoved,
    AccessGranted,
    AccessDenied,
    LockAutoUnlocked,
    ReskinDetached,
    ReskinTransferred,
    ReskinRolledBack,
    OrphanLockDestroyed,
    OwnershipChanged,
    CommandApplied,
    ConsistencyCheckFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub schema_version: String,
    pub tick: u64,
    /// Monotonic sequence across the whole journal; disambiguates events
    /// within one tick.
    pub sequence: u64,
    pub event_type: EventType,
    pub entity_id: Option<EntityId>,
    pub player_id: Option<PlayerId>,
    pub payload: Option<Value>,
}

impl Event {
    pub fn new(
        tick: u64,
        sequence: u64,
        event_type: EventType,
        entity_id: Option<EntityId>,
        player_id: Option<PlayerId>,
        payload: Option<Value>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            tick,
            sequence,
            event_type,
            entity_id,
            player_id,
            payload,
        }
    }
}

//! Journal event emission. Every observable kernel decision lands here.

use contracts::{EntityId, Event, EventType, PlayerId};
use serde_json::{json, Value};

use super::VehicleWorld;

impl VehicleWorld {
    pub(crate) fn push_event(
        &mut self,
        event_type: EventType,
        entity_id: Option<EntityId>,
        player_id: Option<PlayerId>,
        payload: Option<Value>,
    ) {
        let tick = self.current_tick();
        let sequence = self.next_event_sequence();
        self.event_log_mut().push(Event::new(
            tick, sequence, event_type, entity_id, player_id, payload,
        ));
    }

    /// Category-(e) failures: the commit aborted after validation because the
    /// world shifted underneath it. Not surfaced to the requester, but it
    /// must be diagnosable.
    pub(crate) fn push_consistency_failure(&mut self, context: &str, entity_id: Option<EntityId>) {
        self.push_event(
            EventType::ConsistencyCheckFailed,
            entity_id,
            None,
            Some(json!({ "context": context })),
        );
    }

    /// Events since a given sequence number, for incremental API reads.
    pub fn events_since(&self, sequence: u64) -> &[Event] {
        let start = self
            .events()
            .partition_point(|event| event.sequence <= sequence);
        &self.events()[start..]
    }
}

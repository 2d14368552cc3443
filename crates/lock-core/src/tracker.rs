//! Live set of locked vehicles, partitioned by vehicle type for efficient
//! periodic scanning.
//!
//! The tracker holds no authority of its own: the lock's existence on the
//! vehicle is the sole source of truth, and the world rebuilds the tracker
//! from a full scan at startup.

use std::collections::{BTreeMap, BTreeSet};

use contracts::EntityId;

#[derive(Debug, Clone, Default)]
pub struct LockedVehicleTracker {
    by_type: BTreeMap<String, BTreeSet<EntityId>>,
}

impl LockedVehicleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vehicle under its type partition. A vehicle lives in at most
    /// one partition: any stale membership elsewhere is dropped first.
    pub fn add(&mut self, type_key: &str, vehicle_id: EntityId) {
        self.remove_everywhere(vehicle_id);
        self.by_type
            .entry(type_key.to_string())
            .or_default()
            .insert(vehicle_id);
    }

    pub fn remove(&mut self, type_key: &str, vehicle_id: EntityId) {
        if let Some(entries) = self.by_type.get_mut(type_key) {
            entries.remove(&vehicle_id);
            if entries.is_empty() {
                self.by_type.remove(type_key);
            }
        }
    }

    fn remove_everywhere(&mut self, vehicle_id: EntityId) {
        self.by_type.retain(|_, entries| {
            entries.remove(&vehicle_id);
            !entries.is_empty()
        });
    }

    pub fn contains(&self, vehicle_id: EntityId) -> bool {
        self.by_type.values().any(|entries| entries.contains(&vehicle_id))
    }

    pub fn type_of(&self, vehicle_id: EntityId) -> Option<&str> {
        self.by_type
            .iter()
            .find(|(_, entries)| entries.contains(&vehicle_id))
            .map(|(key, _)| key.as_str())
    }

    pub fn clear(&mut self) {
        self.by_type.clear();
    }

    pub fn len(&self) -> usize {
        self.by_type.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// All tracked vehicles with their type keys, in stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, EntityId)> + '_ {
        self.by_type
            .iter()
            .flat_map(|(key, entries)| entries.iter().map(move |&id| (key.as_str(), id)))
    }
}

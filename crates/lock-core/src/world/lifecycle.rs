//! Entity lifecycle: spawning, destruction, the driver-module relocation
//! path, and the reskin transfer flow.
//!
//! Destruction races are expected here (a lock or vehicle may already be
//! gone when a deferred task fires); they resolve as benign no-ops, never as
//! errors.

use std::collections::BTreeSet;

use contracts::{EntityId, EventType, PlayerId, Vec3};
use serde_json::json;

use super::{DeferredTask, Entity, Parent, VehicleWorld};
use crate::reskin::PendingTransfer;

impl VehicleWorld {
    // -----------------------------------------------------------------------
    // Spawning
    // -----------------------------------------------------------------------

    pub fn spawn_vehicle(&mut self, prefab: &str, position: Vec3) -> EntityId {
        let entity_id = self.take_entity_id();
        self.entities_mut()
            .insert(entity_id, Entity::new(entity_id, prefab, position));
        entity_id
    }

    // -----------------------------------------------------------------------
    // Destruction
    // -----------------------------------------------------------------------

    /// Locks physically parented to the given entity.
    fn attached_locks(&self, entity_id: EntityId) -> Vec<EntityId> {
        self.entities()
            .values()
            .filter(|entity| {
                entity.lock.is_some()
                    && entity
                        .parent
                        .as_ref()
                        .is_some_and(|parent| parent.entity_id == entity_id)
            })
            .map(|entity| entity.entity_id)
            .collect()
    }

    /// Remove an entity from the world. A driver-seat module dying under a
    /// surviving car detaches the car's lock for next-tick relocation; every
    /// other attached lock dies with its host. Modules die with their
    /// vehicle.
    pub fn destroy_entity(&mut self, entity_id: EntityId) {
        let Some(snapshot) = self.entity(entity_id).cloned() else {
            return;
        };

        let mut relocated: BTreeSet<EntityId> = BTreeSet::new();
        if snapshot.driver_seat {
            if let Some(car_id) = snapshot.parent.as_ref().map(|parent| parent.entity_id) {
                let car_survives = self
                    .entity(car_id)
                    .is_some_and(|car| car.modules.contains(&entity_id));
                if car_survives {
                    for lock_id in self.attached_locks(entity_id) {
                        self.set_parent(lock_id, None);
                        let due = self.current_tick() + 1;
                        self.deferred.push_back((
                            due,
                            DeferredTask::RelocateDetachedLock {
                                car: car_id,
                                lock: lock_id,
                            },
                        ));
                        relocated.insert(lock_id);
                    }
                }
            }
        }

        for lock_id in self.attached_locks(entity_id) {
            if !relocated.contains(&lock_id) {
                self.destroy_lock(lock_id);
            }
        }
        if let Some(lock_id) = snapshot.lock_slot {
            if !relocated.contains(&lock_id) {
                self.destroy_lock(lock_id);
            }
        }

        // Remove before tearing down modules so their teardown does not see
        // a surviving vehicle.
        self.entities_mut().remove(&entity_id);
        self.untrack_vehicle(entity_id);
        for module_id in snapshot.modules {
            self.destroy_entity(module_id);
        }

        for entity in self.entities_mut().values_mut() {
            entity.modules.retain(|id| *id != entity_id);
            entity.docked.retain(|id| *id != entity_id);
        }
    }

    /// Destroy a lock entity: frees the slot, untracks the vehicle, and
    /// notifies observers. Already-gone locks are a benign no-op.
    pub(crate) fn destroy_lock(&mut self, lock_id: EntityId) {
        if !self.entities().contains_key(&lock_id) {
            return;
        }
        let holder = self
            .entities()
            .values()
            .find(|entity| entity.lock_slot == Some(lock_id))
            .map(|entity| entity.entity_id);
        if let Some(vehicle_id) = holder {
            if let Some(vehicle) = self.entity_mut(vehicle_id) {
                vehicle.lock_slot = None;
            }
            self.untrack_vehicle(vehicle_id);
        }
        self.entities_mut().remove(&lock_id);
        self.push_event(
            EventType::LockRemoved,
            holder,
            None,
            Some(json!({ "lock_id": lock_id })),
        );
        for hook in self.hooks().lock_removed().to_vec() {
            hook(self, lock_id);
        }
    }

    /// Deferred half of the driver-module removal: reattach the detached
    /// lock to the first surviving driver module, or destroy it with the
    /// car.
    pub(crate) fn relocate_detached_lock(&mut self, car_id: EntityId, lock_id: EntityId) {
        if !self.entities().contains_key(&lock_id) {
            return;
        }
        if self.entity(car_id).is_none() {
            self.destroy_lock(lock_id);
            return;
        }
        match self.first_driver_module(car_id) {
            Some(module_id) => {
                self.set_parent(
                    lock_id,
                    Some(Parent {
                        entity_id: module_id,
                        bone: None,
                    }),
                );
            }
            None => self.destroy_lock(lock_id),
        }
    }

    // -----------------------------------------------------------------------
    // Reskin transfer
    // -----------------------------------------------------------------------

    /// Pre-replacement notification. Vetoes the whole replacement (returns
    /// false) when the vehicle carries an engaged lock the requester cannot
    /// bypass; otherwise detaches the lock and queues a position-keyed
    /// transfer event for the replacement to claim.
    pub fn begin_reskin(&mut self, vehicle_id: EntityId, player_id: PlayerId) -> bool {
        let Some(lock_id) = self.vehicle_lock(vehicle_id) else {
            return true;
        };
        if self.is_lock_engaged(lock_id) && !self.can_bypass_lock(player_id, lock_id) {
            return false;
        }
        let Some(position) = self.entity(vehicle_id).map(|vehicle| vehicle.position) else {
            return true;
        };

        self.set_parent(lock_id, None);
        if let Some(vehicle) = self.entity_mut(vehicle_id) {
            vehicle.lock_slot = None;
        }
        self.untrack_vehicle(vehicle_id);

        let announced_tick = self.current_tick();
        self.reskins.announce(PendingTransfer {
            vehicle_id,
            lock_id,
            position,
            announced_tick,
        });
        self.push_event(
            EventType::ReskinDetached,
            Some(vehicle_id),
            Some(player_id),
            Some(json!({ "lock_id": lock_id })),
        );
        true
    }

    /// Post-replacement notification: claim the pending transfer whose
    /// recorded position matches the new vehicle, then reattach, re-slot,
    /// re-track, and reposition the lock per the new vehicle's descriptor.
    pub fn complete_reskin(&mut self, new_vehicle_id: EntityId) {
        let Some(position) = self.entity(new_vehicle_id).map(|vehicle| vehicle.position) else {
            return;
        };
        let Some(pending) = self.reskins.take_match(position) else {
            return;
        };
        if !self.entities().contains_key(&pending.lock_id) {
            return;
        }

        let descriptor = self.registry().resolve(self, new_vehicle_id).cloned();
        let attachment = descriptor
            .as_ref()
            .and_then(|descriptor| (descriptor.resolve_attachment)(self, new_vehicle_id));
        let (Some(descriptor), Some(attachment_id)) = (descriptor, attachment) else {
            // Unattachable replacement: leave the event for the cleanup
            // pass to roll back.
            self.reskins.announce(pending);
            return;
        };

        let attachment_position = self
            .entity(attachment_id)
            .map(|entity| entity.position)
            .unwrap_or(position);
        self.set_parent(
            pending.lock_id,
            Some(Parent {
                entity_id: attachment_id,
                bone: descriptor.parent_bone.clone(),
            }),
        );
        if let Some(lock_entity) = self.entity_mut(pending.lock_id) {
            lock_entity.position = attachment_position + descriptor.lock_position;
            lock_entity.rotation = descriptor.lock_rotation;
        }
        if let Some(vehicle) = self.entity_mut(new_vehicle_id) {
            vehicle.lock_slot = Some(pending.lock_id);
        }
        self.track_vehicle(new_vehicle_id);
        self.push_event(
            EventType::ReskinTransferred,
            Some(new_vehicle_id),
            None,
            Some(json!({
                "lock_id": pending.lock_id,
                "previous_vehicle": pending.vehicle_id,
            })),
        );
    }

    /// Cleanup for a transfer whose replacement never arrived: reattach to
    /// the surviving original, or destroy the orphan lock when the original
    /// is gone too. Guarantees a detached lock never survives indefinitely
    /// ownerless.
    pub(crate) fn resolve_expired_transfer(&mut self, pending: PendingTransfer) {
        if !self.entities().contains_key(&pending.lock_id) {
            return;
        }
        let adopted = self
            .entity(pending.lock_id)
            .is_some_and(|lock| lock.parent.is_some());
        if adopted {
            return;
        }

        if self.entities().contains_key(&pending.vehicle_id) {
            let descriptor = self.registry().resolve(self, pending.vehicle_id).cloned();
            let attachment_id = descriptor
                .as_ref()
                .and_then(|descriptor| (descriptor.resolve_attachment)(self, pending.vehicle_id))
                .unwrap_or(pending.vehicle_id);
            let bone = descriptor.and_then(|descriptor| descriptor.parent_bone);
            self.set_parent(
                pending.lock_id,
                Some(Parent {
                    entity_id: attachment_id,
                    bone,
                }),
            );
            if let Some(vehicle) = self.entity_mut(pending.vehicle_id) {
                vehicle.lock_slot = Some(pending.lock_id);
            }
            self.track_vehicle(pending.vehicle_id);
            self.push_event(
                EventType::ReskinRolledBack,
                Some(pending.vehicle_id),
                None,
                Some(json!({ "lock_id": pending.lock_id })),
            );
        } else {
            self.push_event(
                EventType::OrphanLockDestroyed,
                None,
                None,
                Some(json!({ "lock_id": pending.lock_id })),
            );
            self.destroy_lock(pending.lock_id);
        }
    }

    /// Convenience host flow for a full reskin: veto check, destroy the
    /// original, spawn the cosmetically different replacement at the same
    /// pose, then deliver the post-replacement notification. Returns the
    /// replacement id, or `None` when the reskin was vetoed.
    pub fn reskin_vehicle(
        &mut self,
        vehicle_id: EntityId,
        new_prefab: &str,
        player_id: PlayerId,
    ) -> Option<EntityId> {
        if !self.begin_reskin(vehicle_id, player_id) {
            return None;
        }
        let (position, owner_id) = match self.entity(vehicle_id) {
            Some(vehicle) => (vehicle.position, vehicle.owner_id),
            None => return None,
        };
        self.destroy_entity(vehicle_id);
        let replacement = self.spawn_vehicle(new_prefab, position);
        if let Some(vehicle) = self.entity_mut(replacement) {
            vehicle.owner_id = owner_id;
        }
        self.complete_reskin(replacement);
        Some(replacement)
    }
}

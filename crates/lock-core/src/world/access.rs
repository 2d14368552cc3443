//! Lock authorization: who may interact with a locked vehicle, and the
//! interaction surface that consults it.
//!
//! Bypass resolution order is fixed: external override, configured NPC
//! bypass, authorized principal, owner's sharing policy, master key. Any
//! grant on an engaged lock emits the success feedback; any denial emits the
//! denial feedback plus the user-facing locked notice.

use contracts::{EntityId, EventType, PlayerId, PERMISSION_MASTER_KEY, UNOWNED};
use serde_json::json;

use super::VehicleWorld;

impl VehicleWorld {
    // -----------------------------------------------------------------------
    // Bypass resolution
    // -----------------------------------------------------------------------

    /// The lock's own authorized principal: key possession for key locks,
    /// whitelist or guest entry for code locks.
    pub fn is_authorized_to_lock(&self, player_id: PlayerId, lock_id: EntityId) -> bool {
        let Some(lock) = self.lock_state(lock_id) else {
            return false;
        };
        match lock.kind {
            contracts::LockKind::Key => lock.key_holders.contains(&player_id),
            contracts::LockKind::Code => {
                lock.whitelist.contains(&player_id) || lock.guests.contains(&player_id)
            }
        }
    }

    /// Sharing-policy coverage through the lock owner's relationships.
    /// Evaluated only while the owner is still authorized on its own lock,
    /// so a since-revoked owner's stale ownership record cannot grant
    /// access transitively.
    fn is_lock_shared_with(&self, player_id: PlayerId, lock_id: EntityId) -> bool {
        let Some(owner_id) = self.entity(lock_id).map(|lock| lock.owner_id) else {
            return false;
        };
        if owner_id == UNOWNED || owner_id == player_id {
            return false;
        }
        if !self.is_authorized_to_lock(owner_id, lock_id) {
            return false;
        }

        let sharing = self.config.sharing;
        if sharing.team && self.same_team(player_id, owner_id) {
            return true;
        }
        if sharing.friends {
            if let Some(friends) = self.friends() {
                if friends.are_mutual_friends(owner_id, player_id) {
                    return true;
                }
            }
        }
        if sharing.clan || sharing.clan_or_ally {
            if let Some(clans) = self.clans() {
                let related = if sharing.clan_or_ally {
                    clans.is_member_or_ally(owner_id, player_id)
                } else {
                    clans.same_clan(owner_id, player_id)
                };
                if related {
                    return true;
                }
            }
        }
        false
    }

    /// Whether the requester may act despite the lock. An explicit verdict
    /// from an override hook is authoritative and short-circuits everything,
    /// including the configured NPC bypass.
    pub fn can_bypass_lock(&self, player_id: PlayerId, lock_id: EntityId) -> bool {
        for hook in self.hooks().bypass_overrides() {
            if let Some(verdict) = hook(self, player_id, lock_id) {
                return verdict;
            }
        }

        if self.config.npc_bypass
            && self
                .player(player_id)
                .is_some_and(|player| player.is_npc)
        {
            return true;
        }

        self.is_authorized_to_lock(player_id, lock_id)
            || self.is_lock_shared_with(player_id, lock_id)
            || self.has_permission(player_id, PERMISSION_MASTER_KEY)
    }

    // -----------------------------------------------------------------------
    // Interaction gate
    // -----------------------------------------------------------------------

    /// Core interaction ruling. `None` means the lock does not restrict this
    /// interaction (no lock, disengaged, or bypass granted); `Some(false)`
    /// means denied.
    pub fn player_can_interact_with_vehicle(
        &mut self,
        player_id: PlayerId,
        vehicle_id: EntityId,
        provide_feedback: bool,
    ) -> Option<bool> {
        let lock_id = self.vehicle_lock(vehicle_id)?;
        if !self.is_lock_engaged(lock_id) {
            return None;
        }

        if !self.can_bypass_lock(player_id, lock_id) {
            if provide_feedback {
                self.push_event(
                    EventType::AccessDenied,
                    Some(vehicle_id),
                    Some(player_id),
                    Some(json!({
                        "lock_id": lock_id,
                        "message": "That vehicle is locked.",
                    })),
                );
            }
            return Some(false);
        }

        if provide_feedback {
            self.push_event(
                EventType::AccessGranted,
                Some(vehicle_id),
                Some(player_id),
                Some(json!({ "lock_id": lock_id })),
            );
        }
        None
    }

    /// Exposed access query: true unless an engaged lock denies the
    /// requester.
    pub fn can_access_vehicle(&mut self, player_id: PlayerId, vehicle_id: EntityId) -> bool {
        self.player_can_interact_with_vehicle(player_id, vehicle_id, true)
            .is_none()
    }

    // -----------------------------------------------------------------------
    // Vehicle resolution
    // -----------------------------------------------------------------------

    /// Walk from a child entity (seat, container, turret) to the vehicle
    /// whose lock governs it.
    pub fn parent_vehicle(&self, entity_id: EntityId) -> Option<EntityId> {
        let parent_id = self.entity(entity_id)?.parent.as_ref()?.entity_id;
        let parent = self.entity(parent_id)?;

        // Child of a module: the module's vehicle governs.
        if let Some(grandparent_id) = parent.parent.as_ref().map(|p| p.entity_id) {
            if self
                .entity(grandparent_id)
                .is_some_and(|grandparent| grandparent.modules.contains(&parent_id))
            {
                return Some(grandparent_id);
            }
        }

        if self.registry().resolve(self, parent_id).is_some() {
            return Some(parent_id);
        }
        self.registry().custom_attachment_parent(self, entity_id)
    }

    fn resolve_interaction_vehicle(&self, entity_id: EntityId) -> Option<EntityId> {
        if self.registry().resolve(self, entity_id).is_some() {
            return Some(entity_id);
        }
        self.parent_vehicle(entity_id)
    }

    /// Resolve a command/deploy target entity to the vehicle it stands for:
    /// a socketed module maps to its vehicle, a dock or berth maps to the
    /// held vehicle nearest the requester, anything else stands for itself.
    pub fn vehicle_from_entity(
        &self,
        entity_id: EntityId,
        player_id: PlayerId,
    ) -> Option<EntityId> {
        let entity = self.entity(entity_id)?;

        if let Some(parent) = &entity.parent {
            if self
                .entity(parent.entity_id)
                .is_some_and(|p| p.modules.contains(&entity_id))
            {
                return Some(parent.entity_id);
            }
        }

        if !entity.docked.is_empty() {
            let player_position = self.player(player_id)?.position;
            return entity
                .docked
                .iter()
                .copied()
                .filter_map(|id| {
                    self.entity(id)
                        .map(|held| (id, held.position.distance(&player_position)))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(id, _)| id);
        }

        Some(entity_id)
    }

    // -----------------------------------------------------------------------
    // Interaction surface
    // -----------------------------------------------------------------------

    /// Mount gate. Seats flagged non-lockable (taxi modules) pass through.
    pub fn can_mount(&mut self, player_id: PlayerId, seat_id: EntityId) -> Option<bool> {
        if !self.entity(seat_id).is_some_and(|seat| seat.lockable) {
            return None;
        }
        let vehicle_id = self.resolve_interaction_vehicle(seat_id)?;
        self.player_can_interact_with_vehicle(player_id, vehicle_id, true)
    }

    /// Loot gate for storage mounted on (or being) a vehicle.
    pub fn can_loot(&mut self, player_id: PlayerId, container_id: EntityId) -> Option<bool> {
        if !self
            .entity(container_id)
            .is_some_and(|container| container.lockable)
        {
            return None;
        }
        let vehicle_id = self.resolve_interaction_vehicle(container_id)?;
        self.player_can_interact_with_vehicle(player_id, vehicle_id, true)
    }

    /// Loot gate for a dock/lift with a vehicle on its platform. The
    /// carve-out allows editing a locked car while locked out of it.
    pub fn can_loot_dock(&mut self, player_id: PlayerId, dock_id: EntityId) -> Option<bool> {
        if self.config.modular_car.allow_editing_while_locked_out {
            return None;
        }
        let occupant = self.entity(dock_id)?.docked.first().copied()?;
        self.player_can_interact_with_vehicle(player_id, occupant, true)
    }

    /// Seat-switch gate: same ruling as mounting but without feedback, since
    /// swapping fires repeatedly.
    pub fn can_swap_seat(&mut self, player_id: PlayerId, seat_id: EntityId) -> Option<bool> {
        if !self.entity(seat_id).is_some_and(|seat| seat.lockable) {
            return None;
        }
        let vehicle_id = self.resolve_interaction_vehicle(seat_id)?;
        self.player_can_interact_with_vehicle(player_id, vehicle_id, false)
    }

    /// Toggle gate for a switch wired to a vehicle-mounted turret.
    pub fn can_toggle_switch(&mut self, player_id: PlayerId, switch_id: EntityId) -> Option<bool> {
        let turret_id = self.entity(switch_id)?.parent.as_ref()?.entity_id;
        let vehicle_id = self.parent_vehicle(turret_id)?;
        self.player_can_interact_with_vehicle(player_id, vehicle_id, true)
    }

    pub fn can_authorize_turret(
        &mut self,
        player_id: PlayerId,
        turret_id: EntityId,
    ) -> Option<bool> {
        let vehicle_id = self.parent_vehicle(turret_id)?;
        self.player_can_interact_with_vehicle(player_id, vehicle_id, true)
    }

    /// A vehicle-mounted turret should not fire at players who can bypass
    /// the vehicle's lock. `Some(false)` suppresses targeting.
    pub fn turret_should_target(&self, turret_id: EntityId, player_id: PlayerId) -> Option<bool> {
        let vehicle_id = self.parent_vehicle(turret_id)?;
        let lock_id = self.vehicle_lock(vehicle_id)?;
        if self.can_bypass_lock(player_id, lock_id) {
            Some(false)
        } else {
            None
        }
    }

    /// Lead gate (horses and other walkable vehicles).
    pub fn can_lead(&mut self, player_id: PlayerId, vehicle_id: EntityId) -> Option<bool> {
        self.player_can_interact_with_vehicle(player_id, vehicle_id, true)
    }

    // -----------------------------------------------------------------------
    // Principal management (host primitives used by integrations and tests)
    // -----------------------------------------------------------------------

    pub fn add_to_whitelist(&mut self, lock_id: EntityId, player_id: PlayerId) {
        if let Some(lock) = self.lock_state_mut(lock_id) {
            lock.whitelist.insert(player_id);
        }
    }

    pub fn remove_from_whitelist(&mut self, lock_id: EntityId, player_id: PlayerId) {
        if let Some(lock) = self.lock_state_mut(lock_id) {
            lock.whitelist.remove(&player_id);
        }
    }

    pub fn add_guest(&mut self, lock_id: EntityId, player_id: PlayerId) {
        if let Some(lock) = self.lock_state_mut(lock_id) {
            lock.guests.insert(player_id);
        }
    }

    pub fn give_key(&mut self, lock_id: EntityId, player_id: PlayerId) {
        if let Some(lock) = self.lock_state_mut(lock_id) {
            lock.key_holders.insert(player_id);
        }
    }

    pub fn take_key(&mut self, lock_id: EntityId, player_id: PlayerId) {
        if let Some(lock) = self.lock_state_mut(lock_id) {
            lock.key_holders.remove(&player_id);
        }
    }
}

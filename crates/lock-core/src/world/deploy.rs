//! Deployment: the ordered eligibility pipeline and the transactional
//! commit that follows it.
//!
//! Validation is strictly side-effect free; payment and cooldown mutations
//! happen only in the commit. Stage order is load-bearing: the requester is
//! always told the *first* failing reason, deterministically.

use contracts::{DenyReason, EntityId, EventType, LockKind, PayMethod, PlayerId, UNOWNED};
use serde_json::json;

use super::{Entity, LockState, Parent, VehicleWorld};
use crate::cooldown::CooldownTracker;
use crate::MAX_DEPLOY_DISTANCE;

impl VehicleWorld {
    pub(crate) fn cooldowns(&self, kind: LockKind) -> &CooldownTracker {
        match kind {
            LockKind::Code => &self.code_lock_cooldowns,
            LockKind::Key => &self.key_lock_cooldowns,
        }
    }

    pub(crate) fn cooldowns_mut(&mut self, kind: LockKind) -> &mut CooldownTracker {
        match kind {
            LockKind::Code => &mut self.code_lock_cooldowns,
            LockKind::Key => &mut self.key_lock_cooldowns,
        }
    }

    /// Resolve how this attempt would be paid. Never re-resolved
    /// mid-transaction.
    pub fn resolve_pay_method(&self, player_id: PlayerId, kind: LockKind) -> PayMethod {
        if self.has_permission(player_id, &kind.permission_free()) {
            PayMethod::Free
        } else if self.item_count(player_id, kind.item_name()) > 0 {
            PayMethod::Item
        } else {
            PayMethod::Resources
        }
    }

    // -----------------------------------------------------------------------
    // Validation pipeline
    // -----------------------------------------------------------------------

    /// Run every deployment check in canonical order. Pure: no payment, no
    /// cooldown update, no event. Returns the resolved pay method on
    /// success.
    pub fn verify_can_deploy(
        &self,
        player_id: PlayerId,
        vehicle_id: EntityId,
        kind: LockKind,
    ) -> Result<PayMethod, DenyReason> {
        let Some(descriptor) = self.registry().resolve(self, vehicle_id) else {
            return Err(DenyReason::NoVehicleFound);
        };
        let type_permission = descriptor.permission_for(kind);
        let resolve_attachment = descriptor.resolve_attachment;

        // 1. Permission: universal grant or the type-specific grant.
        let all_vehicles = kind.permission_all_vehicles();
        if !self.has_any_permission(player_id, &[all_vehicles.as_str(), type_permission.as_str()])
        {
            return Err(DenyReason::NoPermission);
        }

        // 2. Vehicle alive.
        if self.is_dead(vehicle_id) {
            return Err(DenyReason::VehicleDead);
        }

        let Some(vehicle) = self.entity(vehicle_id) else {
            return Err(DenyReason::NoVehicleFound);
        };
        let owner_id = vehicle.owner_id;
        let vehicle_position = vehicle.position;

        // 3. Not offered for a competing transaction.
        if vehicle.for_sale {
            return Err(DenyReason::ForSale);
        }

        // 4. Ownership admissibility.
        if owner_id == UNOWNED && !self.config.allow_if_no_owner {
            return Err(DenyReason::NoOwner);
        }
        if owner_id != UNOWNED
            && owner_id != player_id
            && !self.config.allow_if_different_owner
        {
            return Err(DenyReason::DifferentOwner);
        }

        // 5. Building privilege at both the player and the vehicle.
        let player_position = self
            .player(player_id)
            .map(|player| player.position)
            .unwrap_or(vehicle_position);
        if owner_id == UNOWNED && self.config.require_privilege_if_no_owner {
            if !self.has_building_privilege(player_id, &player_position)
                || !self.has_building_privilege(player_id, &vehicle_position)
            {
                return Err(DenyReason::NoBuildingPrivilege);
            }
        } else if self.is_building_blocked(player_id, &player_position)
            || self.is_building_blocked(player_id, &vehicle_position)
        {
            return Err(DenyReason::BuildingBlocked);
        }

        // 6. Single lock slot must be empty.
        if self.vehicle_lock(vehicle_id).is_some() {
            return Err(DenyReason::AlreadyHasLock);
        }

        // 7. Attachment target resolvable.
        if resolve_attachment(self, vehicle_id).is_none() {
            return Err(DenyReason::NoSuitableAttachment);
        }

        // 8. Payment admissibility (checks only; charging is commit-side).
        let pay = self.resolve_pay_method(player_id, kind);
        if pay == PayMethod::Resources {
            if !self.can_craft(player_id, kind.item_name()) {
                return Err(DenyReason::InsufficientResources {
                    item: kind.item_name().to_string(),
                });
            }
            let seconds_remaining = self
                .cooldowns(kind)
                .seconds_remaining(player_id, self.current_tick());
            if seconds_remaining > 0 {
                return Err(DenyReason::Cooldown { seconds_remaining });
            }
        }

        // 9. Nobody aboard.
        if self.is_occupied(vehicle_id) {
            return Err(DenyReason::Occupied);
        }

        // 10. External veto.
        if self.deploy_vetoed(vehicle_id, player_id, kind) {
            return Err(DenyReason::Vetoed);
        }

        Ok(pay)
    }

    pub(crate) fn deploy_vetoed(
        &self,
        vehicle_id: EntityId,
        player_id: PlayerId,
        kind: LockKind,
    ) -> bool {
        self.hooks()
            .deploy_vetoes(kind)
            .iter()
            .any(|hook| hook(self, vehicle_id, player_id) == Some(false))
    }

    /// Exposed eligibility query: true when every validator stage passes.
    pub fn can_player_deploy(
        &self,
        player_id: PlayerId,
        vehicle_id: EntityId,
        kind: LockKind,
    ) -> bool {
        self.verify_can_deploy(player_id, vehicle_id, kind).is_ok()
    }

    // -----------------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------------

    /// Spawn and attach a lock per the vehicle's descriptor. Returns `None`
    /// when the attachment target disappeared since validation; nothing is
    /// mutated in that case.
    pub(crate) fn deploy_lock_internal(
        &mut self,
        vehicle_id: EntityId,
        kind: LockKind,
        owner_id: PlayerId,
    ) -> Option<EntityId> {
        let descriptor = self.registry().resolve(self, vehicle_id)?.clone();
        let attachment_id = (descriptor.resolve_attachment)(self, vehicle_id)?;
        let attachment_position = self.entity(attachment_id)?.position;

        let lock_id = self.take_entity_id();
        let mut state = LockState::new(kind);
        match kind {
            LockKind::Key => {
                state.key_code = self.next_key_code(lock_id);
                if owner_id != UNOWNED {
                    state.key_holders.insert(owner_id);
                }
            }
            LockKind::Code => {
                if owner_id != UNOWNED {
                    state.whitelist.insert(owner_id);
                }
            }
        }

        let mut lock_entity = Entity::new(
            lock_id,
            kind.prefab(),
            attachment_position + descriptor.lock_position,
        );
        lock_entity.rotation = descriptor.lock_rotation;
        lock_entity.owner_id = owner_id;
        lock_entity.parent = Some(Parent {
            entity_id: attachment_id,
            bone: descriptor.parent_bone.clone(),
        });
        lock_entity.lock = Some(state);
        self.entities_mut().insert(lock_id, lock_entity);

        if let Some(vehicle) = self.entity_mut(vehicle_id) {
            vehicle.lock_slot = Some(lock_id);
        }

        // Auto-engage owned key locks, parity with manually placed ones.
        if owner_id != UNOWNED && kind == LockKind::Key {
            self.set_lock_engaged(lock_id, true);
        }

        self.track_vehicle(vehicle_id);
        self.push_event(
            EventType::LockDeployed,
            Some(vehicle_id),
            (owner_id != UNOWNED).then_some(owner_id),
            Some(json!({
                "lock_id": lock_id,
                "kind": kind,
                "type_key": descriptor.type_key,
            })),
        );
        for hook in self.hooks().lock_deployed().to_vec() {
            hook(self, vehicle_id, lock_id);
        }
        Some(lock_id)
    }

    /// Full player commit: temporary-owner parity, lock spawn, item-level
    /// notification, configured ownership claim, then payment. A spawn
    /// failure reverts ownership and charges nothing.
    pub fn deploy_lock_for_player(
        &mut self,
        vehicle_id: EntityId,
        player_id: PlayerId,
        kind: LockKind,
        pay: PayMethod,
    ) -> Option<EntityId> {
        let original_owner = self.entity(vehicle_id)?.owner_id;

        // Integrations watching the deploy expect the requester to own the
        // vehicle at that moment; reverted below.
        if let Some(vehicle) = self.entity_mut(vehicle_id) {
            vehicle.owner_id = player_id;
        }

        let Some(lock_id) = self.deploy_lock_internal(vehicle_id, kind, player_id) else {
            if let Some(vehicle) = self.entity_mut(vehicle_id) {
                vehicle.owner_id = original_owner;
            }
            self.push_consistency_failure("attachment vanished between validation and commit", Some(vehicle_id));
            return None;
        };

        self.notify_item_deployed(player_id, vehicle_id, lock_id, kind);

        if let Some(vehicle) = self.entity_mut(vehicle_id) {
            vehicle.owner_id = original_owner;
        }
        if original_owner == UNOWNED && self.config.auto_claim_unowned {
            self.set_vehicle_owner(vehicle_id, player_id);
        } else if original_owner != UNOWNED
            && original_owner != player_id
            && self.config.auto_replace_owner
        {
            self.set_vehicle_owner(vehicle_id, player_id);
        }

        self.charge_for_lock(player_id, kind, pay);
        Some(lock_id)
    }

    /// API entry point. Skips the permission/ownership stages by design (the
    /// caller vouches for the request) but still refuses dead, already
    /// locked, unattachable, unaffordable, or vetoed deployments.
    pub fn deploy_lock_for_api(
        &mut self,
        vehicle_id: EntityId,
        player_id: Option<PlayerId>,
        kind: LockKind,
        free: bool,
    ) -> Option<EntityId> {
        if self.is_dead(vehicle_id) {
            return None;
        }
        let Some(descriptor) = self.registry().resolve(self, vehicle_id) else {
            return None;
        };
        let resolve_attachment = descriptor.resolve_attachment;
        if self.vehicle_lock(vehicle_id).is_some() {
            return None;
        }
        if resolve_attachment(self, vehicle_id).is_none() {
            return None;
        }

        let pay = match (free, player_id) {
            (true, _) | (_, None) => PayMethod::Free,
            (false, Some(player_id)) => {
                let pay = self.resolve_pay_method(player_id, kind);
                if pay == PayMethod::Resources {
                    if !self.can_craft(player_id, kind.item_name()) {
                        return None;
                    }
                    if !self.cooldowns(kind).is_ready(player_id, self.current_tick()) {
                        return None;
                    }
                }
                pay
            }
        };

        if self.deploy_vetoed(vehicle_id, player_id.unwrap_or(UNOWNED), kind) {
            return None;
        }

        match player_id {
            Some(player_id) => self.deploy_lock_for_player(vehicle_id, player_id, kind, pay),
            None => self.deploy_lock_internal(vehicle_id, kind, UNOWNED),
        }
    }

    // -----------------------------------------------------------------------
    // Command surface
    // -----------------------------------------------------------------------

    /// The user-invocable deploy action: operates on whatever the player is
    /// looking at within reach. `Ok(None)` is a transient commit failure —
    /// silent for the user, journaled as a consistency check.
    pub fn deploy_lock_command(
        &mut self,
        player_id: PlayerId,
        kind: LockKind,
    ) -> Result<Option<EntityId>, DenyReason> {
        let vehicle_id = self
            .look_entity(player_id, MAX_DEPLOY_DISTANCE)
            .and_then(|target| self.vehicle_from_entity(target, player_id))
            .ok_or_else(|| self.deny(None, player_id, kind, DenyReason::NoVehicleFound))?;

        let pay = self
            .verify_can_deploy(player_id, vehicle_id, kind)
            .map_err(|reason| self.deny(Some(vehicle_id), player_id, kind, reason))?;

        Ok(self.deploy_lock_for_player(vehicle_id, player_id, kind, pay))
    }

    /// Direct-equip deployment: the player swings a held lock item at the
    /// entity under their crosshair. `None` means the kernel does not handle
    /// this action (not a lock item, or not a known vehicle) and the host
    /// should proceed normally.
    pub fn on_deploy_item(
        &mut self,
        player_id: PlayerId,
        target: EntityId,
    ) -> Option<Result<Option<EntityId>, DenyReason>> {
        let kind = match self.active_item(player_id) {
            Some("lock.code") => LockKind::Code,
            Some("lock.key") => LockKind::Key,
            _ => return None,
        };

        let vehicle_id = self.vehicle_from_entity(target, player_id)?;
        self.registry().resolve(self, vehicle_id)?;

        let pay = match self.verify_can_deploy(player_id, vehicle_id, kind) {
            Ok(pay) => pay,
            Err(reason) => {
                return Some(Err(self.deny(Some(vehicle_id), player_id, kind, reason)))
            }
        };

        // The deployer's raycast can outreach the deploy range.
        let in_range = self
            .player_distance_to(player_id, vehicle_id)
            .is_some_and(|distance| distance <= MAX_DEPLOY_DISTANCE);
        if !in_range {
            return Some(Err(self.deny(
                Some(vehicle_id),
                player_id,
                kind,
                DenyReason::TooFar,
            )));
        }

        Some(Ok(self.deploy_lock_for_player(vehicle_id, player_id, kind, pay)))
    }

    // -----------------------------------------------------------------------
    // Commit-side effects
    // -----------------------------------------------------------------------

    fn deny(
        &mut self,
        vehicle_id: Option<EntityId>,
        player_id: PlayerId,
        kind: LockKind,
        reason: DenyReason,
    ) -> DenyReason {
        self.push_event(
            EventType::DeployDenied,
            vehicle_id,
            Some(player_id),
            Some(json!({
                "kind": kind,
                "reason": reason,
                "message": reason.to_string(),
            })),
        );
        reason
    }

    /// Fire the item-level notification with the deploying item observable
    /// in the player's inventory, granting it temporarily when the attempt
    /// is paid another way.
    fn notify_item_deployed(
        &mut self,
        player_id: PlayerId,
        vehicle_id: EntityId,
        lock_id: EntityId,
        kind: LockKind,
    ) {
        let had_item = self.item_count(player_id, kind.item_name()) > 0;
        if !had_item {
            self.give_item(player_id, kind.item_name(), 1);
        }
        for hook in self.hooks().item_deployed().to_vec() {
            hook(self, player_id, vehicle_id, lock_id);
        }
        if !had_item {
            self.take_item(player_id, kind.item_name(), 1);
        }
    }

    pub fn set_vehicle_owner(&mut self, vehicle_id: EntityId, new_owner: PlayerId) {
        let Some(previous) = self.entity(vehicle_id).map(|entity| entity.owner_id) else {
            return;
        };
        if previous == new_owner {
            return;
        }
        if let Some(vehicle) = self.entity_mut(vehicle_id) {
            vehicle.owner_id = new_owner;
        }
        self.push_event(
            EventType::OwnershipChanged,
            Some(vehicle_id),
            (new_owner != UNOWNED).then_some(new_owner),
            Some(json!({ "previous_owner": previous.to_string() })),
        );
        for hook in self.hooks().ownership_changed().to_vec() {
            hook(self, vehicle_id, previous, new_owner);
        }
    }

    fn charge_for_lock(&mut self, player_id: PlayerId, kind: LockKind, pay: PayMethod) {
        match pay {
            PayMethod::Free => {}
            PayMethod::Item => {
                if !self.take_item(player_id, kind.item_name(), 1) {
                    self.push_consistency_failure("lock item vanished before charge", None);
                }
            }
            PayMethod::Resources => {
                if self.consume_recipe(player_id, kind.item_name()) {
                    let tick = self.current_tick();
                    self.cooldowns_mut(kind).mark_used(player_id, tick);
                } else {
                    self.push_consistency_failure("craft resources vanished before charge", None);
                }
            }
        }
    }
}

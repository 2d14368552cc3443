//! Extension points on the kernel boundary: veto and observation hooks
//! registered by external integrations.
//!
//! Hooks are plain function pointers so the registry stays `Debug + Clone`
//! and calls stay free of shared mutable state; a hook observes the world
//! read-only at a well-defined point in the flow.

use contracts::{EntityId, LockKind, PlayerId};

use crate::world::VehicleWorld;

/// Pre-deployment veto. `Some(false)` blocks the deployment; anything else
/// is no opinion.
pub type DeployVetoHook = fn(&VehicleWorld, EntityId, PlayerId) -> Option<bool>;

/// Lock-bypass override. An explicit boolean is authoritative and
/// short-circuits every other authorization check.
pub type BypassOverrideHook = fn(&VehicleWorld, PlayerId, EntityId) -> Option<bool>;

/// Post-deployment notification: (vehicle, lock).
pub type LockDeployedHook = fn(&VehicleWorld, EntityId, EntityId);

/// Item-level deployment notification: (player, vehicle, lock). Fired while
/// the deploying item is observable in the player's inventory, granted
/// temporarily when the deployment was paid another way.
pub type ItemDeployedHook = fn(&VehicleWorld, PlayerId, EntityId, EntityId);

/// Post-removal notification: the destroyed lock's id.
pub type LockRemovedHook = fn(&VehicleWorld, EntityId);

/// Ownership-change notification: (vehicle, previous owner, new owner).
pub type OwnershipChangedHook = fn(&VehicleWorld, EntityId, PlayerId, PlayerId);

#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    code_deploy_vetoes: Vec<DeployVetoHook>,
    key_deploy_vetoes: Vec<DeployVetoHook>,
    bypass_overrides: Vec<BypassOverrideHook>,
    lock_deployed: Vec<LockDeployedHook>,
    item_deployed: Vec<ItemDeployedHook>,
    lock_removed: Vec<LockRemovedHook>,
    ownership_changed: Vec<OwnershipChangedHook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_deploy_veto(&mut self, kind: LockKind, hook: DeployVetoHook) {
        match kind {
            LockKind::Code => self.code_deploy_vetoes.push(hook),
            LockKind::Key => self.key_deploy_vetoes.push(hook),
        }
    }

    pub fn on_bypass_override(&mut self, hook: BypassOverrideHook) {
        self.bypass_overrides.push(hook);
    }

    pub fn on_lock_deployed(&mut self, hook: LockDeployedHook) {
        self.lock_deployed.push(hook);
    }

    pub fn on_item_deployed(&mut self, hook: ItemDeployedHook) {
        self.item_deployed.push(hook);
    }

    pub fn on_lock_removed(&mut self, hook: LockRemovedHook) {
        self.lock_removed.push(hook);
    }

    pub fn on_ownership_changed(&mut self, hook: OwnershipChangedHook) {
        self.ownership_changed.push(hook);
    }

    pub fn deploy_vetoes(&self, kind: LockKind) -> &[DeployVetoHook] {
        match kind {
            LockKind::Code => &self.code_deploy_vetoes,
            LockKind::Key => &self.key_deploy_vetoes,
        }
    }

    pub fn bypass_overrides(&self) -> &[BypassOverrideHook] {
        &self.bypass_overrides
    }

    pub fn lock_deployed(&self) -> &[LockDeployedHook] {
        &self.lock_deployed
    }

    pub fn item_deployed(&self) -> &[ItemDeployedHook] {
        &self.item_deployed
    }

    pub fn lock_removed(&self) -> &[LockRemovedHook] {
        &self.lock_removed
    }

    pub fn ownership_changed(&self) -> &[OwnershipChangedHook] {
        &self.ownership_changed
    }
}

//! The host world: entities, players, relationship graphs, and the policy
//! components that govern vehicle locks.
//!
//! Everything is owned by one [`VehicleWorld`] and mutated strictly
//! sequentially. Handlers, validator stages, and scheduler ticks run to
//! completion without preemption, so none of this state needs locking.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

mod access;
mod deploy;
mod events;
mod init;
mod lifecycle;
mod step;
#[cfg(test)]
mod tests;

pub use init::{
    HORSE_PREFAB, KAYAK_PREFAB, MINICOPTER_PREFAB, MODULAR_CAR_PREFAB, ROWBOAT_PREFAB,
};

use contracts::{
    EntityId, Event, KernelStatus, LockConfig, LockKind, LockedVehicleSummary, PlayerId, Vec3,
    SCHEMA_VERSION_V1, UNOWNED,
};

use crate::cooldown::CooldownTracker;
use crate::hooks::HookRegistry;
use crate::registry::VehicleTypeRegistry;
use crate::reskin::ReskinTransferCoordinator;
use crate::scheduler::AutoUnlockScheduler;
use crate::social::{ClanRegistry, FriendsRegistry};
use crate::tracker::LockedVehicleTracker;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parent {
    pub entity_id: EntityId,
    pub bone: Option<String>,
}

/// State carried by an entity that *is* a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockState {
    pub kind: LockKind,
    /// Engaged flag. A disengaged lock restricts nothing.
    pub locked: bool,
    /// Key locks only.
    pub key_code: u32,
    pub key_holders: BTreeSet<PlayerId>,
    /// Code locks only.
    pub whitelist: BTreeSet<PlayerId>,
    pub guests: BTreeSet<PlayerId>,
}

impl LockState {
    pub fn new(kind: LockKind) -> Self {
        Self {
            kind,
            locked: false,
            key_code: 0,
            key_holders: BTreeSet::new(),
            whitelist: BTreeSet::new(),
            guests: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub entity_id: EntityId,
    pub prefab: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub parent: Option<Parent>,
    pub owner_id: PlayerId,
    pub dead: bool,
    pub for_sale: bool,
    /// Seats flagged non-lockable (e.g. taxi modules) are never gated.
    pub lockable: bool,
    pub driver_seat: bool,
    pub mounted_by: BTreeSet<PlayerId>,
    /// Module sockets, for composite vehicles.
    pub modules: Vec<EntityId>,
    /// Vehicles currently docked/berthed at this entity (lifts, hitches).
    pub docked: Vec<EntityId>,
    /// The single lock slot.
    pub lock_slot: Option<EntityId>,
    /// Present when this entity is itself a lock.
    pub lock: Option<LockState>,
    pub last_used_tick: u64,
}

impl Entity {
    fn new(entity_id: EntityId, prefab: impl Into<String>, position: Vec3) -> Self {
        Self {
            entity_id,
            prefab: prefab.into(),
            position,
            rotation: Vec3::ZERO,
            parent: None,
            owner_id: UNOWNED,
            dead: false,
            for_sale: false,
            lockable: true,
            driver_seat: false,
            mounted_by: BTreeSet::new(),
            modules: Vec::new(),
            docked: Vec::new(),
            lock_slot: None,
            lock: None,
            last_used_tick: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Player {
    pub player_id: PlayerId,
    pub name: String,
    pub position: Vec3,
    pub is_npc: bool,
    /// Team id; zero means no team.
    pub team: u64,
    pub permissions: BTreeSet<String>,
    pub inventory: BTreeMap<String, i64>,
    pub active_item: Option<String>,
    /// What the player's view ray currently hits, if anything.
    pub look_target: Option<EntityId>,
}

impl Player {
    fn new(player_id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            player_id,
            name: name.into(),
            position: Vec3::ZERO,
            is_npc: false,
            team: 0,
            permissions: BTreeSet::new(),
            inventory: BTreeMap::new(),
            active_item: None,
            look_target: None,
        }
    }
}

/// A building-privilege area: players on the authorized list hold privilege
/// inside it, everyone else is building blocked there.
#[derive(Debug, Clone)]
pub struct PrivilegeZone {
    pub position: Vec3,
    pub radius: f32,
    pub authorized: BTreeSet<PlayerId>,
}

impl PrivilegeZone {
    fn covers(&self, position: &Vec3) -> bool {
        self.position.distance(position) <= self.radius
    }
}

// ---------------------------------------------------------------------------
// Deferred work
// ---------------------------------------------------------------------------

/// Work postponed by one scheduling quantum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeferredTask {
    /// A driver-seat module died with the car's lock attached: reattach the
    /// lock to a surviving driver module next tick, or destroy it.
    RelocateDetachedLock { car: EntityId, lock: EntityId },
}

// ---------------------------------------------------------------------------
// VehicleWorld
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct VehicleWorld {
    pub(crate) config: LockConfig,
    seed: u64,
    current_tick: u64,
    next_entity_id: EntityId,
    next_player_id: PlayerId,
    entities: BTreeMap<EntityId, Entity>,
    players: BTreeMap<PlayerId, Player>,
    friends: Option<FriendsRegistry>,
    clans: Option<ClanRegistry>,
    privilege_zones: Vec<PrivilegeZone>,
    registry: VehicleTypeRegistry,
    pub(crate) tracker: LockedVehicleTracker,
    pub(crate) code_lock_cooldowns: CooldownTracker,
    pub(crate) key_lock_cooldowns: CooldownTracker,
    pub(crate) auto_unlock: AutoUnlockScheduler,
    pub(crate) reskins: ReskinTransferCoordinator,
    hooks: HookRegistry,
    pub(crate) deferred: VecDeque<(u64, DeferredTask)>,
    event_log: Vec<Event>,
    event_sequence: u64,
}

impl VehicleWorld {
    pub fn new(config: LockConfig, seed: u64) -> Self {
        let cooldown = config.craft_cooldown_seconds;
        let first_scan = config.auto_unlock.scan_interval_seconds.max(1);
        Self {
            config,
            seed,
            current_tick: 0,
            next_entity_id: 1,
            next_player_id: 1001,
            entities: BTreeMap::new(),
            players: BTreeMap::new(),
            friends: None,
            clans: None,
            privilege_zones: Vec::new(),
            registry: VehicleTypeRegistry::with_builtin_types(),
            tracker: LockedVehicleTracker::new(),
            code_lock_cooldowns: CooldownTracker::new(cooldown),
            key_lock_cooldowns: CooldownTracker::new(cooldown),
            auto_unlock: AutoUnlockScheduler::new(first_scan),
            reskins: ReskinTransferCoordinator::new(),
            hooks: HookRegistry::new(),
            deferred: VecDeque::new(),
            event_log: Vec::new(),
            event_sequence: 0,
        }
    }

    // --- Basic accessors ---

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Swap in a freshly loaded configuration. Cooldown ledgers restart
    /// because their duration comes from the configuration.
    pub fn set_config(&mut self, config: LockConfig) {
        self.code_lock_cooldowns = CooldownTracker::new(config.craft_cooldown_seconds);
        self.key_lock_cooldowns = CooldownTracker::new(config.craft_cooldown_seconds);
        self.config = config;
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub(crate) fn advance_tick(&mut self) {
        self.current_tick += 1;
    }

    pub fn registry(&self) -> &VehicleTypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut VehicleTypeRegistry {
        &mut self.registry
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    pub fn tracker(&self) -> &LockedVehicleTracker {
        &self.tracker
    }

    pub fn events(&self) -> &[Event] {
        &self.event_log
    }

    pub(crate) fn event_log_mut(&mut self) -> &mut Vec<Event> {
        &mut self.event_log
    }

    pub(crate) fn next_event_sequence(&mut self) -> u64 {
        self.event_sequence += 1;
        self.event_sequence
    }

    pub fn entity(&self, entity_id: EntityId) -> Option<&Entity> {
        self.entities.get(&entity_id)
    }

    pub fn entity_mut(&mut self, entity_id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&entity_id)
    }

    pub(crate) fn entities(&self) -> &BTreeMap<EntityId, Entity> {
        &self.entities
    }

    pub(crate) fn entities_mut(&mut self) -> &mut BTreeMap<EntityId, Entity> {
        &mut self.entities
    }

    pub(crate) fn take_entity_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    pub(crate) fn take_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.get(&player_id)
    }

    pub fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&player_id)
    }

    pub(crate) fn insert_player(&mut self, player: Player) {
        self.players.insert(player.player_id, player);
    }

    pub fn status(&self) -> KernelStatus {
        KernelStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            current_tick: self.current_tick,
            entity_count: self.entities.len(),
            player_count: self.players.len(),
            locked_vehicle_count: self.tracker.len(),
            queue_depth: self.deferred.len()
                + self.reskins.pending_count()
                + self.auto_unlock.pending_check_count(),
        }
    }

    // --- Permissions ---

    pub fn has_permission(&self, player_id: PlayerId, permission: &str) -> bool {
        self.players
            .get(&player_id)
            .is_some_and(|player| player.permissions.contains(permission))
    }

    pub fn has_any_permission(&self, player_id: PlayerId, permissions: &[&str]) -> bool {
        permissions
            .iter()
            .any(|permission| self.has_permission(player_id, permission))
    }

    pub fn grant_permission(&mut self, player_id: PlayerId, permission: impl Into<String>) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.permissions.insert(permission.into());
        }
    }

    // --- Relationships ---

    pub fn set_team(&mut self, player_id: PlayerId, team: u64) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.team = team;
        }
    }

    pub fn same_team(&self, a: PlayerId, b: PlayerId) -> bool {
        match (self.players.get(&a), self.players.get(&b)) {
            (Some(pa), Some(pb)) => pa.team != 0 && pa.team == pb.team,
            _ => false,
        }
    }

    /// Install the friends integration. Absent entirely when not installed.
    pub fn install_friends(&mut self, friends: FriendsRegistry) {
        self.friends = Some(friends);
    }

    pub fn friends(&self) -> Option<&FriendsRegistry> {
        self.friends.as_ref()
    }

    pub fn friends_mut(&mut self) -> Option<&mut FriendsRegistry> {
        self.friends.as_mut()
    }

    pub fn install_clans(&mut self, clans: ClanRegistry) {
        self.clans = Some(clans);
    }

    pub fn clans(&self) -> Option<&ClanRegistry> {
        self.clans.as_ref()
    }

    pub fn clans_mut(&mut self) -> Option<&mut ClanRegistry> {
        self.clans.as_mut()
    }

    // --- Building privilege ---

    pub fn add_privilege_zone(
        &mut self,
        position: Vec3,
        radius: f32,
        authorized: impl IntoIterator<Item = PlayerId>,
    ) {
        self.privilege_zones.push(PrivilegeZone {
            position,
            radius,
            authorized: authorized.into_iter().collect(),
        });
    }

    /// The player holds building privilege covering `position`.
    pub fn has_building_privilege(&self, player_id: PlayerId, position: &Vec3) -> bool {
        self.privilege_zones
            .iter()
            .any(|zone| zone.covers(position) && zone.authorized.contains(&player_id))
    }

    /// The player is building blocked at `position` (inside someone else's
    /// privilege).
    pub fn is_building_blocked(&self, player_id: PlayerId, position: &Vec3) -> bool {
        self.privilege_zones
            .iter()
            .any(|zone| zone.covers(position) && !zone.authorized.contains(&player_id))
    }

    // --- Inventory ---

    pub fn item_count(&self, player_id: PlayerId, item: &str) -> i64 {
        self.players
            .get(&player_id)
            .and_then(|player| player.inventory.get(item).copied())
            .unwrap_or(0)
    }

    pub fn give_item(&mut self, player_id: PlayerId, item: &str, count: i64) {
        if let Some(player) = self.players.get_mut(&player_id) {
            *player.inventory.entry(item.to_string()).or_insert(0) += count;
        }
    }

    /// Remove `count` of `item`; returns false (taking nothing) when the
    /// player does not hold that many.
    pub fn take_item(&mut self, player_id: PlayerId, item: &str, count: i64) -> bool {
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        match player.inventory.get_mut(item) {
            Some(held) if *held >= count => {
                *held -= count;
                if *held == 0 {
                    player.inventory.remove(item);
                    if player.active_item.as_deref() == Some(item) {
                        player.active_item = None;
                    }
                }
                true
            }
            _ => false,
        }
    }

    pub fn set_active_item(&mut self, player_id: PlayerId, item: Option<&str>) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.active_item = item.map(str::to_string);
        }
    }

    pub fn active_item(&self, player_id: PlayerId) -> Option<&str> {
        self.players
            .get(&player_id)
            .and_then(|player| player.active_item.as_deref())
    }

    /// Whether the player's held resources cover the item's crafting cost.
    pub fn can_craft(&self, player_id: PlayerId, item: &str) -> bool {
        let Some(cost) = crate::recipe(item) else {
            return false;
        };
        cost.iter()
            .all(|(ingredient, amount)| self.item_count(player_id, ingredient) >= *amount)
    }

    /// Charge the item's full crafting cost. Caller has already checked
    /// affordability; a partial inventory charges nothing.
    pub(crate) fn consume_recipe(&mut self, player_id: PlayerId, item: &str) -> bool {
        if !self.can_craft(player_id, item) {
            return false;
        }
        let cost = crate::recipe(item).expect("checked by can_craft");
        for (ingredient, amount) in cost {
            self.take_item(player_id, ingredient, *amount);
        }
        true
    }

    // --- World primitives ---

    pub fn is_dead(&self, entity_id: EntityId) -> bool {
        match self.entities.get(&entity_id) {
            Some(entity) => entity.dead,
            None => true,
        }
    }

    pub fn set_dead(&mut self, entity_id: EntityId, dead: bool) {
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.dead = dead;
        }
    }

    pub fn set_for_sale(&mut self, entity_id: EntityId, for_sale: bool) {
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.for_sale = for_sale;
        }
    }

    pub fn mount(&mut self, player_id: PlayerId, entity_id: EntityId) {
        let tick = self.current_tick;
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.mounted_by.insert(player_id);
            entity.last_used_tick = tick;
        }
    }

    pub fn dismount(&mut self, player_id: PlayerId, entity_id: EntityId) {
        let tick = self.current_tick;
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.mounted_by.remove(&player_id);
            entity.last_used_tick = tick;
        }
    }

    pub fn mark_used(&mut self, entity_id: EntityId) {
        let tick = self.current_tick;
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.last_used_tick = tick;
        }
    }

    /// Seconds since the entity (or any of its modules) was last actively
    /// used.
    pub fn seconds_since_use(&self, entity_id: EntityId) -> Option<u64> {
        let entity = self.entities.get(&entity_id)?;
        let mut latest = entity.last_used_tick;
        for module_id in &entity.modules {
            if let Some(module) = self.entities.get(module_id) {
                latest = latest.max(module.last_used_tick);
            }
        }
        Some(self.current_tick.saturating_sub(latest))
    }

    /// The vehicle or any of its modules is currently mounted.
    pub fn is_occupied(&self, entity_id: EntityId) -> bool {
        let Some(entity) = self.entities.get(&entity_id) else {
            return false;
        };
        if !entity.mounted_by.is_empty() {
            return true;
        }
        entity.modules.iter().any(|module_id| {
            self.entities
                .get(module_id)
                .is_some_and(|module| !module.mounted_by.is_empty())
        })
    }

    pub fn first_driver_module(&self, entity_id: EntityId) -> Option<EntityId> {
        let entity = self.entities.get(&entity_id)?;
        entity
            .modules
            .iter()
            .copied()
            .find(|module_id| {
                self.entities
                    .get(module_id)
                    .is_some_and(|module| module.driver_seat && !module.dead)
            })
    }

    /// Reparent an entity, optionally under a named bone.
    pub fn set_parent(&mut self, entity_id: EntityId, parent: Option<Parent>) {
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.parent = parent;
        }
    }

    pub fn set_look_target(&mut self, player_id: PlayerId, target: Option<EntityId>) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.look_target = target;
        }
    }

    /// Raycast stand-in: the player's current look target, if it still
    /// exists and is within `max_distance`.
    pub fn look_entity(&self, player_id: PlayerId, max_distance: f32) -> Option<EntityId> {
        let player = self.players.get(&player_id)?;
        let target_id = player.look_target?;
        let target = self.entities.get(&target_id)?;
        (player.position.distance(&target.position) <= max_distance).then_some(target_id)
    }

    pub fn player_distance_to(&self, player_id: PlayerId, entity_id: EntityId) -> Option<f32> {
        let player = self.players.get(&player_id)?;
        let entity = self.entities.get(&entity_id)?;
        Some(player.position.distance(&entity.position))
    }

    // --- Locks ---

    /// The lock occupying the vehicle's single lock slot, if it still
    /// exists.
    pub fn vehicle_lock(&self, vehicle_id: EntityId) -> Option<EntityId> {
        let lock_id = self.entities.get(&vehicle_id)?.lock_slot?;
        self.entities.contains_key(&lock_id).then_some(lock_id)
    }

    pub fn lock_state(&self, lock_id: EntityId) -> Option<&LockState> {
        self.entities.get(&lock_id)?.lock.as_ref()
    }

    pub(crate) fn lock_state_mut(&mut self, lock_id: EntityId) -> Option<&mut LockState> {
        self.entities.get_mut(&lock_id)?.lock.as_mut()
    }

    pub fn is_lock_engaged(&self, lock_id: EntityId) -> bool {
        self.lock_state(lock_id).is_some_and(|lock| lock.locked)
    }

    /// Host primitive: flip the engaged flag.
    pub fn set_lock_engaged(&mut self, lock_id: EntityId, engaged: bool) {
        if let Some(lock) = self.lock_state_mut(lock_id) {
            lock.locked = engaged;
        }
    }

    /// Deterministic key-code derivation; the world carries no ambient RNG.
    pub(crate) fn next_key_code(&self, lock_id: EntityId) -> u32 {
        let salt = self.current_tick.rotate_left(17) ^ lock_id;
        (crate::mix_seed(self.seed, salt) % 99_999 + 1) as u32
    }

    // --- Tracker maintenance ---

    /// Register a locked vehicle with the tracker. A registry miss is a
    /// no-op, not an error.
    pub(crate) fn track_vehicle(&mut self, vehicle_id: EntityId) {
        let type_key = self
            .registry
            .resolve(self, vehicle_id)
            .map(|descriptor| descriptor.type_key.clone());
        if let Some(type_key) = type_key {
            self.tracker.add(&type_key, vehicle_id);
        }
    }

    pub(crate) fn untrack_vehicle(&mut self, vehicle_id: EntityId) {
        let type_key = self.tracker.type_of(vehicle_id).map(str::to_string);
        if let Some(type_key) = type_key {
            self.tracker.remove(&type_key, vehicle_id);
        }
    }

    /// One-time startup scan: rebuild tracker state from locks that already
    /// exist in the world. The lock's existence on the vehicle is the sole
    /// source of truth after a restart.
    pub fn rebuild_tracker(&mut self) {
        self.tracker.clear();
        let locked: Vec<EntityId> = self
            .entities
            .values()
            .filter(|entity| {
                entity
                    .lock_slot
                    .is_some_and(|lock_id| self.entities.contains_key(&lock_id))
            })
            .map(|entity| entity.entity_id)
            .collect();
        for vehicle_id in locked {
            self.track_vehicle(vehicle_id);
        }
    }

    /// Inspection snapshot of every tracked locked vehicle.
    pub fn locked_vehicles(&self) -> Vec<LockedVehicleSummary> {
        self.tracker
            .iter()
            .filter_map(|(type_key, vehicle_id)| {
                let lock_id = self.vehicle_lock(vehicle_id)?;
                let lock = self.lock_state(lock_id)?;
                let owner_id = self.entity(lock_id).map(|e| e.owner_id).unwrap_or(UNOWNED);
                Some(LockedVehicleSummary {
                    vehicle_id,
                    type_key: type_key.to_string(),
                    lock_id,
                    kind: lock.kind,
                    owner_id,
                    locked: lock.locked,
                })
            })
            .collect()
    }
}

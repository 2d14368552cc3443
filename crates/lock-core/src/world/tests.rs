use super::*;

use contracts::{
    Command, CommandPayload, CommandType, DenyReason, EventType, LockConfig, LockKind, PayMethod,
    Vec3, UNOWNED,
};

fn count_events(world: &VehicleWorld, event_type: EventType) -> usize {
    world
        .events()
        .iter()
        .filter(|event| event.event_type == event_type)
        .count()
}

/// Player with the universal deploy grants, one code lock item, looking at a
/// minicopter within reach.
fn deploy_ready_world() -> (VehicleWorld, contracts::PlayerId, EntityId) {
    deploy_ready_world_with(LockConfig::default())
}

fn deploy_ready_world_with(config: LockConfig) -> (VehicleWorld, contracts::PlayerId, EntityId) {
    let mut world = VehicleWorld::new(config, 42);
    let player = world.spawn_player("avery");
    world.grant_permission(player, LockKind::Code.permission_all_vehicles());
    world.grant_permission(player, LockKind::Key.permission_all_vehicles());
    world.give_item(player, "lock.code", 1);
    let minicopter = world.spawn_vehicle(MINICOPTER_PREFAB, Vec3::new(1.0, 0.0, 0.0));
    world.set_look_target(player, Some(minicopter));
    (world, player, minicopter)
}

fn deploy_code_lock(world: &mut VehicleWorld, player: contracts::PlayerId) -> EntityId {
    world
        .deploy_lock_command(player, LockKind::Code)
        .expect("deploy accepted")
        .expect("lock created")
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

#[test]
fn command_deploys_code_lock_end_to_end() {
    let (mut world, player, minicopter) = deploy_ready_world();

    let command = Command::new(
        "cmd_1",
        0,
        CommandType::DeployCodeLock,
        CommandPayload::DeployCodeLock { player_id: player },
    );
    let result = world.apply_command(&command);

    assert!(result.accepted);
    let lock_id = result.deployed_lock.expect("lock deployed");
    assert_eq!(world.vehicle_lock(minicopter), Some(lock_id));

    let lock = world.lock_state(lock_id).expect("lock state");
    assert_eq!(lock.kind, LockKind::Code);
    assert!(lock.whitelist.contains(&player));
    assert!(!lock.locked, "code locks start disengaged");

    // Paid with the held item, so no cooldown started and no resources
    // touched.
    assert_eq!(world.item_count(player, "lock.code"), 0);
    assert!(world.cooldowns(LockKind::Code).is_ready(player, 0));

    assert!(world.tracker().contains(minicopter));
    assert_eq!(count_events(&world, EventType::LockDeployed), 1);

    // Default configuration never claims ownership.
    assert_eq!(world.entity(minicopter).map(|v| v.owner_id), Some(UNOWNED));
}

#[test]
fn key_lock_auto_engages_for_owner() {
    let (mut world, player, minicopter) = deploy_ready_world();
    world.give_item(player, "lock.key", 1);

    let lock_id = world
        .deploy_lock_for_api(minicopter, Some(player), LockKind::Key, false)
        .expect("api deploy");

    let lock = world.lock_state(lock_id).expect("lock state");
    assert_eq!(lock.kind, LockKind::Key);
    assert!(lock.locked, "owned key locks auto-engage");
    assert!((1..=99_999).contains(&lock.key_code));
    assert!(lock.key_holders.contains(&player));
}

#[test]
fn second_deployment_fails_at_already_locked() {
    let (mut world, player, _minicopter) = deploy_ready_world();
    deploy_code_lock(&mut world, player);

    world.give_item(player, "lock.code", 1);
    let reason = world
        .deploy_lock_command(player, LockKind::Code)
        .expect_err("second deploy denied");
    assert_eq!(reason, DenyReason::AlreadyHasLock);
    // Nothing was charged for the denied attempt.
    assert_eq!(world.item_count(player, "lock.code"), 1);
}

#[test]
fn reported_reason_is_the_first_failing_stage() {
    let (mut world, player, minicopter) = deploy_ready_world();
    world.set_dead(minicopter, true);
    world.set_for_sale(minicopter, true);
    world.mount(player, minicopter);

    assert_eq!(
        world.verify_can_deploy(player, minicopter, LockKind::Code),
        Err(DenyReason::VehicleDead)
    );

    world.set_dead(minicopter, false);
    assert_eq!(
        world.verify_can_deploy(player, minicopter, LockKind::Code),
        Err(DenyReason::ForSale)
    );

    world.set_for_sale(minicopter, false);
    assert_eq!(
        world.verify_can_deploy(player, minicopter, LockKind::Code),
        Err(DenyReason::Occupied)
    );

    world.dismount(player, minicopter);
    assert!(world.verify_can_deploy(player, minicopter, LockKind::Code).is_ok());
}

#[test]
fn permission_stage_runs_before_everything_else() {
    let mut world = VehicleWorld::new(LockConfig::default(), 42);
    let player = world.spawn_player("avery");
    let minicopter = world.spawn_vehicle(MINICOPTER_PREFAB, Vec3::ZERO);
    world.set_dead(minicopter, true);

    assert_eq!(
        world.verify_can_deploy(player, minicopter, LockKind::Code),
        Err(DenyReason::NoPermission)
    );
}

#[test]
fn type_specific_permission_is_sufficient() {
    let mut world = VehicleWorld::new(LockConfig::default(), 42);
    let player = world.spawn_player("avery");
    world.grant_permission(player, "vehiclelocks.codelock.minicopter");
    world.give_item(player, "lock.code", 1);
    let minicopter = world.spawn_vehicle(MINICOPTER_PREFAB, Vec3::ZERO);

    assert_eq!(
        world.verify_can_deploy(player, minicopter, LockKind::Code),
        Ok(PayMethod::Item)
    );
}

#[test]
fn ownership_admissibility_follows_configuration() {
    let mut config = LockConfig::default();
    config.allow_if_no_owner = false;
    let (mut world, player, minicopter) = deploy_ready_world_with(config);

    assert_eq!(
        world.verify_can_deploy(player, minicopter, LockKind::Code),
        Err(DenyReason::NoOwner)
    );

    let stranger = world.spawn_player("stranger");
    if let Some(vehicle) = world.entity_mut(minicopter) {
        vehicle.owner_id = stranger;
    }
    assert_eq!(
        world.verify_can_deploy(player, minicopter, LockKind::Code),
        Err(DenyReason::DifferentOwner)
    );

    if let Some(vehicle) = world.entity_mut(minicopter) {
        vehicle.owner_id = player;
    }
    assert!(world.verify_can_deploy(player, minicopter, LockKind::Code).is_ok());
}

#[test]
fn unowned_vehicle_can_require_building_privilege() {
    let mut config = LockConfig::default();
    config.require_privilege_if_no_owner = true;
    let (mut world, player, minicopter) = deploy_ready_world_with(config);

    assert_eq!(
        world.verify_can_deploy(player, minicopter, LockKind::Code),
        Err(DenyReason::NoBuildingPrivilege)
    );

    world.add_privilege_zone(Vec3::ZERO, 20.0, [player]);
    assert!(world.verify_can_deploy(player, minicopter, LockKind::Code).is_ok());
}

#[test]
fn building_blocked_denies_deployment() {
    let (mut world, player, minicopter) = deploy_ready_world();
    let rival = world.spawn_player("rival");
    world.add_privilege_zone(Vec3::ZERO, 20.0, [rival]);

    assert_eq!(
        world.verify_can_deploy(player, minicopter, LockKind::Code),
        Err(DenyReason::BuildingBlocked)
    );
}

#[test]
fn resource_payment_charges_cost_and_starts_cooldown() {
    let (mut world, player, _minicopter) = deploy_ready_world();
    world.take_item(player, "lock.code", 1);
    world.give_item(player, "metal.fragments", 150);

    assert_eq!(
        world.verify_can_deploy(player, _minicopter, LockKind::Code),
        Ok(PayMethod::Resources)
    );
    deploy_code_lock(&mut world, player);

    assert_eq!(world.item_count(player, "metal.fragments"), 50);
    assert!(!world.cooldowns(LockKind::Code).is_ready(player, world.current_tick()));

    // A second resource-paid attempt inside the window reports the
    // cooldown, not a resource failure.
    let kayak = world.spawn_vehicle(KAYAK_PREFAB, Vec3::new(1.0, 0.0, 0.0));
    world.give_item(player, "metal.fragments", 100);
    let reason = world
        .verify_can_deploy(player, kayak, LockKind::Code)
        .expect_err("on cooldown");
    assert!(matches!(reason, DenyReason::Cooldown { seconds_remaining } if seconds_remaining > 0));
}

#[test]
fn insufficient_resources_denied_without_charge() {
    let (mut world, player, minicopter) = deploy_ready_world();
    world.take_item(player, "lock.code", 1);
    world.give_item(player, "metal.fragments", 40);

    assert_eq!(
        world.verify_can_deploy(player, minicopter, LockKind::Code),
        Err(DenyReason::InsufficientResources {
            item: "lock.code".to_string()
        })
    );
    assert_eq!(world.item_count(player, "metal.fragments"), 40);
}

#[test]
fn free_permission_skips_payment_entirely() {
    let (mut world, player, _minicopter) = deploy_ready_world();
    world.take_item(player, "lock.code", 1);
    world.grant_permission(player, LockKind::Code.permission_free());

    assert_eq!(
        world.verify_can_deploy(player, _minicopter, LockKind::Code),
        Ok(PayMethod::Free)
    );
    deploy_code_lock(&mut world, player);
    assert!(world.cooldowns(LockKind::Code).is_ready(player, world.current_tick()));
}

#[test]
fn veto_hook_blocks_at_the_last_stage() {
    fn veto(_: &VehicleWorld, _: EntityId, _: contracts::PlayerId) -> Option<bool> {
        Some(false)
    }

    let (mut world, player, minicopter) = deploy_ready_world();
    world.hooks_mut().on_deploy_veto(LockKind::Code, veto);

    assert_eq!(
        world.verify_can_deploy(player, minicopter, LockKind::Code),
        Err(DenyReason::Vetoed)
    );
    // The other variant is untouched.
    world.give_item(player, "lock.key", 1);
    assert!(world.verify_can_deploy(player, minicopter, LockKind::Key).is_ok());
}

#[test]
fn modular_car_without_cockpit_is_unattachable() {
    let mut world = VehicleWorld::new(LockConfig::default(), 42);
    let player = world.spawn_player("avery");
    world.grant_permission(player, LockKind::Code.permission_all_vehicles());
    world.give_item(player, "lock.code", 1);
    let car = world.spawn_modular_car(Vec3::ZERO, 0);

    assert_eq!(
        world.verify_can_deploy(player, car, LockKind::Code),
        Err(DenyReason::NoSuitableAttachment)
    );

    world.attach_driver_module(car);
    assert!(world.verify_can_deploy(player, car, LockKind::Code).is_ok());
}

#[test]
fn commit_aborts_cleanly_when_attachment_vanishes() {
    let mut world = VehicleWorld::new(LockConfig::default(), 42);
    let player = world.spawn_player("avery");
    world.grant_permission(player, LockKind::Code.permission_all_vehicles());
    world.give_item(player, "lock.code", 1);
    let car = world.spawn_modular_car(Vec3::ZERO, 1);

    let pay = world
        .verify_can_deploy(player, car, LockKind::Code)
        .expect("valid");

    // The cockpit disappears between validation and commit.
    let module = world.first_driver_module(car).expect("cockpit");
    world.destroy_entity(module);

    assert_eq!(world.deploy_lock_for_player(car, player, LockKind::Code, pay), None);
    assert_eq!(world.item_count(player, "lock.code"), 1, "no charge on abort");
    assert_eq!(world.entity(car).map(|c| c.owner_id), Some(UNOWNED));
    assert_eq!(count_events(&world, EventType::ConsistencyCheckFailed), 1);
}

#[test]
fn direct_equip_deploys_and_checks_distance() {
    let (mut world, player, minicopter) = deploy_ready_world();
    world.set_active_item(player, Some("lock.code"));

    // Out of deploy range: the raycast outreaches the deploy distance.
    if let Some(vehicle) = world.entity_mut(minicopter) {
        vehicle.position = Vec3::new(5.0, 0.0, 0.0);
    }
    let outcome = world
        .on_deploy_item(player, minicopter)
        .expect("handled as lock deploy");
    assert_eq!(outcome, Err(DenyReason::TooFar));

    if let Some(vehicle) = world.entity_mut(minicopter) {
        vehicle.position = Vec3::new(1.0, 0.0, 0.0);
    }
    let outcome = world
        .on_deploy_item(player, minicopter)
        .expect("handled as lock deploy");
    let lock_id = outcome.expect("accepted").expect("deployed");
    assert_eq!(world.vehicle_lock(minicopter), Some(lock_id));
    assert_eq!(world.item_count(player, "lock.code"), 0);
}

#[test]
fn non_lock_item_is_not_handled() {
    let (mut world, player, minicopter) = deploy_ready_world();
    world.set_active_item(player, Some("rifle.ak"));
    assert!(world.on_deploy_item(player, minicopter).is_none());
}

#[test]
fn auto_claim_assigns_ownership_when_configured() {
    let mut config = LockConfig::default();
    config.auto_claim_unowned = true;
    let (mut world, player, minicopter) = deploy_ready_world_with(config);

    deploy_code_lock(&mut world, player);
    assert_eq!(world.entity(minicopter).map(|v| v.owner_id), Some(player));
    assert_eq!(count_events(&world, EventType::OwnershipChanged), 1);
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

/// Owner with an engaged code lock on a minicopter with a seat; sharing
/// settings per config.
fn locked_minicopter_world(
    config: LockConfig,
) -> (
    VehicleWorld,
    contracts::PlayerId,
    EntityId,
    EntityId,
    EntityId,
) {
    let (mut world, owner, minicopter) = deploy_ready_world_with(config);
    let lock_id = deploy_code_lock(&mut world, owner);
    world.set_lock_engaged(lock_id, true);
    let seat = world.attach_seat(minicopter);
    (world, owner, minicopter, lock_id, seat)
}

#[test]
fn principal_bypasses_with_all_sharing_disabled() {
    let (mut world, owner, _minicopter, lock_id, seat) =
        locked_minicopter_world(LockConfig::default());

    assert!(world.can_bypass_lock(owner, lock_id));
    assert_eq!(world.can_mount(owner, seat), None);
    assert_eq!(count_events(&world, EventType::AccessGranted), 1);

    let stranger = world.spawn_player("stranger");
    assert!(!world.can_bypass_lock(stranger, lock_id));
    assert_eq!(world.can_mount(stranger, seat), Some(false));
    assert_eq!(count_events(&world, EventType::AccessDenied), 1);
}

#[test]
fn guests_and_key_holders_are_authorized_principals() {
    let (mut world, _owner, _minicopter, lock_id, seat) =
        locked_minicopter_world(LockConfig::default());

    let visitor = world.spawn_player("visitor");
    assert_eq!(world.can_mount(visitor, seat), Some(false));

    world.add_guest(lock_id, visitor);
    assert_eq!(world.can_mount(visitor, seat), None, "guest entry grants bypass");
}

#[test]
fn teammate_bypasses_when_team_sharing_enabled() {
    let mut config = LockConfig::default();
    config.sharing.team = true;
    let (mut world, owner, _minicopter, _lock_id, seat) = locked_minicopter_world(config);

    let teammate = world.spawn_player("teammate");
    world.set_team(owner, 9);
    world.set_team(teammate, 9);

    assert_eq!(world.can_mount(teammate, seat), None, "bypass granted");
    assert_eq!(count_events(&world, EventType::AccessDenied), 0);
    assert_eq!(count_events(&world, EventType::AccessGranted), 1);
}

#[test]
fn revoking_owner_authorization_stops_sharing() {
    let mut config = LockConfig::default();
    config.sharing.team = true;
    let (mut world, owner, _minicopter, lock_id, seat) = locked_minicopter_world(config);

    let teammate = world.spawn_player("teammate");
    world.set_team(owner, 9);
    world.set_team(teammate, 9);
    assert_eq!(world.can_mount(teammate, seat), None);

    // The owner loses their own authorization; ownerID is unchanged but
    // sharing must stop flowing through them.
    world.remove_from_whitelist(lock_id, owner);
    assert_eq!(world.can_mount(teammate, seat), Some(false));
}

#[test]
fn mutual_friendship_is_required_for_friend_sharing() {
    let mut config = LockConfig::default();
    config.sharing.friends = true;
    let (mut world, owner, _minicopter, lock_id, _seat) = locked_minicopter_world(config);

    let buddy = world.spawn_player("buddy");
    world.install_friends(crate::social::FriendsRegistry::new());

    world.friends_mut().expect("installed").add_friend(owner, buddy);
    assert!(!world.can_bypass_lock(buddy, lock_id), "one-sided is not enough");

    world.friends_mut().expect("installed").add_friend(buddy, owner);
    assert!(world.can_bypass_lock(buddy, lock_id));
}

#[test]
fn clan_and_ally_sharing() {
    let mut config = LockConfig::default();
    config.sharing.clan_or_ally = true;
    let (mut world, owner, _minicopter, lock_id, _seat) = locked_minicopter_world(config);

    let allied = world.spawn_player("allied");
    let mut clans = crate::social::ClanRegistry::new();
    clans.set_clan(owner, "north");
    clans.set_clan(allied, "south");
    clans.ally("north", "south");
    world.install_clans(clans);

    assert!(world.can_bypass_lock(allied, lock_id));
}

#[test]
fn master_key_bypasses_everything() {
    let (mut world, _owner, _minicopter, lock_id, _seat) =
        locked_minicopter_world(LockConfig::default());
    let admin = world.spawn_player("admin");
    world.grant_permission(admin, contracts::PERMISSION_MASTER_KEY);
    assert!(world.can_bypass_lock(admin, lock_id));
}

#[test]
fn npc_bypass_follows_configuration() {
    let (mut world, _owner, _minicopter, lock_id, _seat) =
        locked_minicopter_world(LockConfig::default());
    let wanderer = world.spawn_npc("wanderer");
    assert!(!world.can_bypass_lock(wanderer, lock_id));

    let mut config = LockConfig::default();
    config.npc_bypass = true;
    let (mut world, _owner, _minicopter, lock_id, _seat) = locked_minicopter_world(config);
    let wanderer = world.spawn_npc("wanderer");
    assert!(world.can_bypass_lock(wanderer, lock_id));
}

#[test]
fn override_hook_is_authoritative_even_against_the_owner() {
    fn deny_all(_: &VehicleWorld, _: contracts::PlayerId, _: EntityId) -> Option<bool> {
        Some(false)
    }

    let (mut world, owner, _minicopter, lock_id, _seat) =
        locked_minicopter_world(LockConfig::default());
    world.hooks_mut().on_bypass_override(deny_all);
    assert!(!world.can_bypass_lock(owner, lock_id));
}

#[test]
fn dock_loot_honors_the_editing_carveout() {
    let (mut world, owner, minicopter, lock_id, _seat) =
        locked_minicopter_world(LockConfig::default());
    let _ = (owner, lock_id);
    let dock = world.spawn_dock(Vec3::new(3.0, 0.0, 0.0));
    world.dock_vehicle(dock, minicopter);
    let stranger = world.spawn_player("stranger");

    // Default carve-out allows editing a locked-out car.
    assert_eq!(world.can_loot_dock(stranger, dock), None);

    world.config.modular_car.allow_editing_while_locked_out = false;
    assert_eq!(world.can_loot_dock(stranger, dock), Some(false));
}

#[test]
fn switch_and_turret_are_gated_through_the_parent_vehicle() {
    let (mut world, owner, minicopter, _lock_id, _seat) =
        locked_minicopter_world(LockConfig::default());
    let turret = world.attach_turret(minicopter);
    let switch = world.attach_switch(turret);
    let stranger = world.spawn_player("stranger");

    assert_eq!(world.can_toggle_switch(stranger, switch), Some(false));
    assert_eq!(world.can_toggle_switch(owner, switch), None);
    assert_eq!(world.can_authorize_turret(stranger, turret), Some(false));

    // The turret will not target anyone who could bypass the lock.
    assert_eq!(world.turret_should_target(turret, owner), Some(false));
    assert_eq!(world.turret_should_target(turret, stranger), None);
}

#[test]
fn non_lockable_seat_is_never_gated() {
    let (mut world, _owner, minicopter, _lock_id, seat) =
        locked_minicopter_world(LockConfig::default());
    let _ = minicopter;
    if let Some(entity) = world.entity_mut(seat) {
        entity.lockable = false;
    }
    let stranger = world.spawn_player("stranger");
    assert_eq!(world.can_mount(stranger, seat), None);
}

// ---------------------------------------------------------------------------
// Auto-unlock
// ---------------------------------------------------------------------------

fn auto_unlock_config(idle: u64, interval: u64) -> LockConfig {
    let mut config = LockConfig::default();
    config.auto_unlock.enabled = true;
    config.auto_unlock.idle_seconds = idle;
    config.auto_unlock.scan_interval_seconds = interval;
    config
}

#[test]
fn idle_vehicles_unlock_after_the_threshold() {
    let (mut world, owner, minicopter, lock_id, _seat) =
        locked_minicopter_world(auto_unlock_config(100, 50));
    let _ = (owner, minicopter);

    world.step(50);
    assert!(world.is_lock_engaged(lock_id), "idle 50 < threshold 100");

    world.step(50);
    assert!(!world.is_lock_engaged(lock_id), "idle 100 unlocks at the scan");
    assert!(world.entity(lock_id).is_some(), "auto-unlock never destroys the lock");
    assert_eq!(count_events(&world, EventType::LockAutoUnlocked), 1);
}

#[test]
fn recent_use_resets_the_idle_clock() {
    let (mut world, _owner, minicopter, lock_id, _seat) =
        locked_minicopter_world(auto_unlock_config(100, 50));

    world.step(80);
    world.mark_used(minicopter);
    world.step(60);
    assert!(world.is_lock_engaged(lock_id), "used 60s ago, threshold 100");

    world.step(60);
    assert!(!world.is_lock_engaged(lock_id));
}

#[test]
fn owned_vehicles_can_be_exempted() {
    let mut config = auto_unlock_config(100, 50);
    config.auto_unlock.exempt_owned = true;
    let (mut world, owner, minicopter, lock_id, _seat) = locked_minicopter_world(config);
    if let Some(vehicle) = world.entity_mut(minicopter) {
        vehicle.owner_id = owner;
    }

    world.step(300);
    assert!(world.is_lock_engaged(lock_id), "owned vehicles stay locked");
}

#[test]
fn privilege_check_defers_and_respects_owner_privilege() {
    let mut config = auto_unlock_config(100, 50);
    config.auto_unlock.check_building_privilege = true;
    config.auto_unlock.max_privilege_checks_per_tick = 1;
    let (mut world, owner, minicopter, lock_id, _seat) = locked_minicopter_world(config);

    // Parked inside the lock owner's privilege: stays locked.
    world.add_privilege_zone(Vec3::new(1.0, 0.0, 0.0), 10.0, [owner]);
    world.step(200);
    assert!(world.is_lock_engaged(lock_id));

    // Moved into the open: the deferred pass eventually unlocks it.
    if let Some(vehicle) = world.entity_mut(minicopter) {
        vehicle.position = Vec3::new(500.0, 0.0, 0.0);
    }
    world.step(60);
    assert!(!world.is_lock_engaged(lock_id));
}

// ---------------------------------------------------------------------------
// Structural changes
// ---------------------------------------------------------------------------

fn locked_car_world() -> (VehicleWorld, contracts::PlayerId, EntityId, EntityId, EntityId) {
    let mut world = VehicleWorld::new(LockConfig::default(), 42);
    let player = world.spawn_player("avery");
    world.grant_permission(player, LockKind::Code.permission_all_vehicles());
    world.give_item(player, "lock.code", 1);
    let car = world.spawn_modular_car(Vec3::new(1.0, 0.0, 0.0), 1);
    world.set_look_target(player, Some(car));
    let lock_id = deploy_code_lock(&mut world, player);
    let cockpit = world.first_driver_module(car).expect("cockpit");
    (world, player, car, cockpit, lock_id)
}

#[test]
fn lock_attaches_to_the_driver_module() {
    let (world, _player, _car, cockpit, lock_id) = locked_car_world();
    let parent = world
        .entity(lock_id)
        .and_then(|lock| lock.parent.as_ref().map(|p| p.entity_id));
    assert_eq!(parent, Some(cockpit));
}

#[test]
fn cockpit_removal_relocates_the_lock_to_another_driver_module() {
    let (mut world, _player, car, cockpit, lock_id) = locked_car_world();
    let spare = world.attach_driver_module(car);

    world.destroy_entity(cockpit);
    assert!(world.entity(lock_id).is_some(), "detached, not destroyed");
    world.step(1);

    let parent = world
        .entity(lock_id)
        .and_then(|lock| lock.parent.as_ref().map(|p| p.entity_id));
    assert_eq!(parent, Some(spare));
    assert_eq!(world.vehicle_lock(car), Some(lock_id));
}

#[test]
fn cockpit_removal_destroys_the_lock_when_no_driver_module_remains() {
    let (mut world, _player, car, cockpit, lock_id) = locked_car_world();

    world.destroy_entity(cockpit);
    world.step(1);

    assert!(world.entity(lock_id).is_none());
    assert_eq!(world.vehicle_lock(car), None);
    assert!(!world.tracker().contains(car));
}

#[test]
fn destroying_the_vehicle_destroys_its_lock() {
    let (mut world, _player, minicopter, lock_id, _seat) =
        locked_minicopter_world(LockConfig::default());

    world.destroy_entity(minicopter);
    assert!(world.entity(lock_id).is_none());
    assert!(world.tracker().is_empty());
    assert_eq!(count_events(&world, EventType::LockRemoved), 1);
}

#[test]
fn rebuild_tracker_recovers_from_restart() {
    let (mut world, _owner, minicopter, _lock_id, _seat) =
        locked_minicopter_world(LockConfig::default());

    // Simulate a process restart: tracker state is gone, locks persist.
    world.tracker.clear();
    assert!(!world.tracker().contains(minicopter));

    world.rebuild_tracker();
    assert!(world.tracker().contains(minicopter));
    assert_eq!(world.tracker().type_of(minicopter), Some("minicopter"));
}

// ---------------------------------------------------------------------------
// Reskin transfer
// ---------------------------------------------------------------------------

#[test]
fn reskin_preserves_the_lock_across_replacement() {
    let (mut world, owner, minicopter, lock_id, _seat) =
        locked_minicopter_world(LockConfig::default());
    let code_before = world.lock_state(lock_id).map(|l| l.whitelist.clone());

    let replacement = world
        .reskin_vehicle(minicopter, ROWBOAT_PREFAB, owner)
        .expect("reskin allowed");

    assert!(world.entity(minicopter).is_none());
    assert_eq!(world.vehicle_lock(replacement), Some(lock_id));
    assert!(world.is_lock_engaged(lock_id), "engaged state preserved");
    assert_eq!(
        world.lock_state(lock_id).map(|l| l.whitelist.clone()),
        code_before
    );
    assert_eq!(world.entity(lock_id).map(|l| l.owner_id), Some(owner));
    assert_eq!(world.tracker().type_of(replacement), Some("rowboat"));

    // Repositioned to the new type's canonical offset.
    let descriptor = world.registry().get("rowboat").expect("builtin").clone();
    let expected = world.entity(replacement).map(|v| v.position).expect("alive")
        + descriptor.lock_position;
    let lock_position = world.entity(lock_id).map(|l| l.position).expect("alive");
    assert!(lock_position.distance(&expected) < 1e-4);

    assert_eq!(count_events(&world, EventType::ReskinTransferred), 1);
    world.step(2);
    assert_eq!(count_events(&world, EventType::ReskinRolledBack), 0);
}

#[test]
fn reskin_is_vetoed_for_a_locked_out_requester() {
    let (mut world, _owner, minicopter, lock_id, _seat) =
        locked_minicopter_world(LockConfig::default());
    let stranger = world.spawn_player("stranger");

    assert_eq!(world.reskin_vehicle(minicopter, ROWBOAT_PREFAB, stranger), None);
    assert!(world.entity(minicopter).is_some(), "replacement vetoed");
    assert_eq!(world.vehicle_lock(minicopter), Some(lock_id));
}

#[test]
fn unmatched_reskin_rolls_back_to_the_original() {
    let (mut world, owner, minicopter, lock_id, _seat) =
        locked_minicopter_world(LockConfig::default());

    assert!(world.begin_reskin(minicopter, owner));
    assert_eq!(world.vehicle_lock(minicopter), None);

    // No replacement arrives; cleanup runs one tick later.
    world.step(1);
    assert_eq!(world.vehicle_lock(minicopter), Some(lock_id));
    assert!(world.tracker().contains(minicopter));
    assert_eq!(count_events(&world, EventType::ReskinRolledBack), 1);
}

#[test]
fn orphaned_lock_is_destroyed_when_the_original_is_gone() {
    let (mut world, owner, minicopter, lock_id, _seat) =
        locked_minicopter_world(LockConfig::default());

    assert!(world.begin_reskin(minicopter, owner));
    world.destroy_entity(minicopter);
    world.step(1);

    assert!(world.entity(lock_id).is_none());
    assert_eq!(count_events(&world, EventType::OrphanLockDestroyed), 1);
}

#[test]
fn reskin_far_away_does_not_claim_the_transfer() {
    let (mut world, owner, minicopter, _lock_id, _seat) =
        locked_minicopter_world(LockConfig::default());

    assert!(world.begin_reskin(minicopter, owner));
    let far_spawn = world.spawn_vehicle(ROWBOAT_PREFAB, Vec3::new(100.0, 0.0, 0.0));
    world.complete_reskin(far_spawn);

    assert_eq!(world.vehicle_lock(far_spawn), None);
    // The unclaimed transfer still rolls back to the original.
    world.step(1);
    assert_eq!(count_events(&world, EventType::ReskinRolledBack), 1);
}

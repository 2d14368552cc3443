//! Scenario construction: spawn helpers used by hosts and tests, and the
//! ready-made demo scene for the CLI.

use contracts::{EntityId, LockConfig, LockKind, PlayerId, Vec3};

use super::{Entity, Parent, Player, VehicleWorld};

pub const MINICOPTER_PREFAB: &str = "assets/content/vehicles/minicopter/minicopter.entity.prefab";
pub const ROWBOAT_PREFAB: &str = "assets/content/vehicles/boats/rowboat/rowboat.prefab";
pub const KAYAK_PREFAB: &str = "assets/content/vehicles/boats/kayak/kayak.prefab";
pub const HORSE_PREFAB: &str = "assets/rust.ai/nextai/testridablehorse.prefab";
pub const MODULAR_CAR_PREFAB: &str =
    "assets/content/vehicles/modularcar/car_chassis_2module.entity.prefab";

const SEAT_PREFAB: &str = "assets/prefabs/vehicle/seats/standardseat.prefab";
const STORAGE_PREFAB: &str = "assets/prefabs/deployable/woodenbox/woodbox_deployed.prefab";
const TURRET_PREFAB: &str = "assets/prefabs/npc/autoturret/autoturret_deployed.prefab";
const SWITCH_PREFAB: &str = "assets/prefabs/deployable/playerioents/simpleswitch/switch.prefab";
const DOCK_PREFAB: &str = "assets/prefabs/deployable/carlift/carlift.deployed.prefab";
const DRIVER_MODULE_PREFAB: &str =
    "assets/content/vehicles/modularcar/module_entities/1module_cockpit.prefab";
const CARGO_MODULE_PREFAB: &str =
    "assets/content/vehicles/modularcar/module_entities/1module_storage.prefab";

impl VehicleWorld {
    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    pub fn spawn_player(&mut self, name: &str) -> PlayerId {
        self.spawn_player_at(name, Vec3::ZERO)
    }

    pub fn spawn_player_at(&mut self, name: &str, position: Vec3) -> PlayerId {
        let player_id = self.take_player_id();
        let mut player = Player::new(player_id, name);
        player.position = position;
        self.insert_player(player);
        player_id
    }

    pub fn spawn_npc(&mut self, name: &str) -> PlayerId {
        let player_id = self.spawn_player(name);
        if let Some(player) = self.player_mut(player_id) {
            player.is_npc = true;
        }
        player_id
    }

    // -----------------------------------------------------------------------
    // Vehicles and attachments
    // -----------------------------------------------------------------------

    fn attach_child(&mut self, parent_id: EntityId, prefab: &str) -> EntityId {
        let position = self
            .entity(parent_id)
            .map(|parent| parent.position)
            .unwrap_or(Vec3::ZERO);
        let child_id = self.take_entity_id();
        let mut child = Entity::new(child_id, prefab, position);
        child.parent = Some(Parent {
            entity_id: parent_id,
            bone: None,
        });
        self.entities_mut().insert(child_id, child);
        child_id
    }

    /// Socket a module into a composite vehicle.
    pub fn attach_module(&mut self, vehicle_id: EntityId, driver_seat: bool) -> EntityId {
        let prefab = if driver_seat {
            DRIVER_MODULE_PREFAB
        } else {
            CARGO_MODULE_PREFAB
        };
        let module_id = self.attach_child(vehicle_id, prefab);
        if let Some(module) = self.entity_mut(module_id) {
            module.driver_seat = driver_seat;
        }
        if let Some(vehicle) = self.entity_mut(vehicle_id) {
            vehicle.modules.push(module_id);
        }
        module_id
    }

    pub fn attach_driver_module(&mut self, vehicle_id: EntityId) -> EntityId {
        self.attach_module(vehicle_id, true)
    }

    pub fn spawn_modular_car(&mut self, position: Vec3, driver_modules: usize) -> EntityId {
        let car_id = self.spawn_vehicle(MODULAR_CAR_PREFAB, position);
        for _ in 0..driver_modules {
            self.attach_driver_module(car_id);
        }
        car_id
    }

    /// A mountable seat child of the vehicle (or of one of its modules).
    pub fn attach_seat(&mut self, parent_id: EntityId) -> EntityId {
        self.attach_child(parent_id, SEAT_PREFAB)
    }

    pub fn attach_storage(&mut self, parent_id: EntityId) -> EntityId {
        self.attach_child(parent_id, STORAGE_PREFAB)
    }

    pub fn attach_turret(&mut self, parent_id: EntityId) -> EntityId {
        self.attach_child(parent_id, TURRET_PREFAB)
    }

    pub fn attach_switch(&mut self, turret_id: EntityId) -> EntityId {
        self.attach_child(turret_id, SWITCH_PREFAB)
    }

    pub fn spawn_dock(&mut self, position: Vec3) -> EntityId {
        self.spawn_vehicle(DOCK_PREFAB, position)
    }

    pub fn dock_vehicle(&mut self, dock_id: EntityId, vehicle_id: EntityId) {
        if let Some(dock) = self.entity_mut(dock_id) {
            dock.docked.push(vehicle_id);
        }
    }

    // -----------------------------------------------------------------------
    // Demo scene
    // -----------------------------------------------------------------------

    /// Small ready-made scene for the CLI `simulate` command: two teamed
    /// players, a few vehicles, aggressive auto-unlock settings so something
    /// happens within a short run.
    pub fn demo_world(seed: u64) -> Self {
        let mut config = LockConfig::default();
        config.auto_unlock.enabled = true;
        config.auto_unlock.idle_seconds = 120;
        config.auto_unlock.scan_interval_seconds = 30;
        config.sharing.team = true;
        let mut world = VehicleWorld::new(config, seed);

        let avery = world.spawn_player_at("avery", Vec3::ZERO);
        world.grant_permission(avery, LockKind::Code.permission_all_vehicles());
        world.grant_permission(avery, LockKind::Key.permission_all_vehicles());
        world.give_item(avery, "lock.code", 1);
        world.give_item(avery, "metal.fragments", 200);
        world.give_item(avery, "wood", 150);

        let blair = world.spawn_player_at("blair", Vec3::new(2.0, 0.0, 0.0));
        world.set_team(avery, 7);
        world.set_team(blair, 7);

        let minicopter = world.spawn_vehicle(MINICOPTER_PREFAB, Vec3::new(1.5, 0.0, 0.0));
        world.spawn_vehicle(ROWBOAT_PREFAB, Vec3::new(40.0, 0.0, 12.0));
        let car = world.spawn_modular_car(Vec3::new(-8.0, 0.0, 3.0), 1);
        world.attach_seat(car);
        world.set_look_target(avery, Some(minicopter));

        world
    }
}

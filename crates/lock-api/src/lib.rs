//! In-process API facade over the lock kernel: command validation, journal
//! persistence, and the HTTP inspection server.

mod persistence;
mod server;

use std::path::Path;

use contracts::{
    ApiError, Command, CommandPayload, CommandResult, CommandType, EntityId, ErrorCode, Event,
    KernelStatus, LockConfig, LockKind, LockedVehicleSummary, PlayerId, SCHEMA_VERSION_V1,
};
use lock_core::registry::{RegistryError, VehicleTypeDescriptor};
use lock_core::world::VehicleWorld;

use persistence::SqliteJournal;
pub use persistence::PersistenceError;
pub use server::{serve, ServerError};

#[derive(Debug)]
struct PersistenceState {
    journal: SqliteJournal,
    persisted_event_count: usize,
}

#[derive(Debug)]
pub struct EngineApi {
    world: VehicleWorld,
    command_audit: Vec<CommandResult>,
    persistence: Option<PersistenceState>,
    last_persistence_error: Option<String>,
}

impl EngineApi {
    pub fn from_config(config: LockConfig) -> Self {
        Self::with_world(VehicleWorld::new(config, 1337))
    }

    /// Wrap an existing world. Performs the one-time startup scan so the
    /// tracker reflects locks that already exist (restart recovery).
    pub fn with_world(mut world: VehicleWorld) -> Self {
        world.rebuild_tracker();
        Self {
            world,
            command_audit: Vec::new(),
            persistence: None,
            last_persistence_error: None,
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn attach_sqlite_store(&mut self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let journal = SqliteJournal::open(path)?;
        self.persistence = Some(PersistenceState {
            journal,
            persisted_event_count: 0,
        });
        Ok(())
    }

    pub fn flush_persistence_checked(&mut self) -> Result<(), PersistenceError> {
        let Some(state) = self.persistence.as_mut() else {
            return Err(PersistenceError::NotAttached);
        };
        let new_events = &self.world.events()[state.persisted_event_count..];
        state.journal.append_events(new_events)?;
        state.persisted_event_count = self.world.events().len();
        self.last_persistence_error = None;
        Ok(())
    }

    fn flush_persistence_if_enabled(&mut self) {
        if self.persistence.is_none() {
            return;
        }
        if let Err(err) = self.flush_persistence_checked() {
            self.last_persistence_error = Some(err.to_string());
        }
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.last_persistence_error.as_deref()
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    pub fn status(&self) -> KernelStatus {
        self.world.status()
    }

    pub fn step(&mut self, ticks: u64) -> KernelStatus {
        self.world.step(ticks);
        self.flush_persistence_if_enabled();
        self.world.status()
    }

    /// Validate and apply a command. Application is synchronous: the result
    /// carries the deployed lock id or the deterministic deny reason.
    pub fn submit_command(&mut self, command: Command) -> CommandResult {
        let result = match self.validate_command(&command) {
            Some(error) => CommandResult::rejected(&command, error),
            None => self.world.apply_command(&command),
        };
        self.command_audit.push(result.clone());
        self.flush_persistence_if_enabled();
        result
    }

    fn validate_command(&self, command: &Command) -> Option<ApiError> {
        if command.schema_version != SCHEMA_VERSION_V1 {
            return Some(ApiError::new(
                ErrorCode::ContractVersionUnsupported,
                "Unsupported schema_version",
                Some(format!(
                    "got={} expected={}",
                    command.schema_version, SCHEMA_VERSION_V1
                )),
            ));
        }
        if !command_type_matches_payload(command.command_type, &command.payload) {
            return Some(ApiError::new(
                ErrorCode::InvalidCommand,
                "command_type does not match payload variant",
                None,
            ));
        }
        let player_id = command.payload.player_id();
        if self.world.player(player_id).is_none() {
            return Some(ApiError::new(
                ErrorCode::PlayerNotFound,
                "unknown player_id",
                Some(format!("player_id={player_id}")),
            ));
        }
        None
    }

    // -----------------------------------------------------------------------
    // Queries and integration surface
    // -----------------------------------------------------------------------

    pub fn events(&self) -> &[Event] {
        self.world.events()
    }

    pub fn events_since(&self, sequence: u64) -> &[Event] {
        self.world.events_since(sequence)
    }

    pub fn locked_vehicles(&self) -> Vec<LockedVehicleSummary> {
        self.world.locked_vehicles()
    }

    pub fn can_access(&mut self, player_id: PlayerId, vehicle_id: EntityId) -> bool {
        self.world.can_access_vehicle(player_id, vehicle_id)
    }

    pub fn can_deploy(&self, player_id: PlayerId, vehicle_id: EntityId, kind: LockKind) -> bool {
        self.world.can_player_deploy(player_id, vehicle_id, kind)
    }

    pub fn deploy_code_lock(
        &mut self,
        vehicle_id: EntityId,
        player_id: Option<PlayerId>,
        free: bool,
    ) -> Option<EntityId> {
        let lock = self
            .world
            .deploy_lock_for_api(vehicle_id, player_id, LockKind::Code, free);
        self.flush_persistence_if_enabled();
        lock
    }

    pub fn deploy_key_lock(
        &mut self,
        vehicle_id: EntityId,
        player_id: Option<PlayerId>,
        free: bool,
    ) -> Option<EntityId> {
        let lock = self
            .world
            .deploy_lock_for_api(vehicle_id, player_id, LockKind::Key, free);
        self.flush_persistence_if_enabled();
        lock
    }

    pub fn register_vehicle_type(
        &mut self,
        descriptor: VehicleTypeDescriptor,
    ) -> Result<(), RegistryError> {
        self.world.registry_mut().register(descriptor)
    }

    pub fn command_audit(&self) -> &[CommandResult] {
        &self.command_audit
    }

    /// Direct access to the underlying world, for hosts embedding the
    /// kernel.
    pub fn world(&self) -> &VehicleWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut VehicleWorld {
        &mut self.world
    }
}

fn command_type_matches_payload(command_type: CommandType, payload: &CommandPayload) -> bool {
    matches!(
        (command_type, payload),
        (
            CommandType::DeployCodeLock,
            CommandPayload::DeployCodeLock { .. }
        ) | (
            CommandType::DeployKeyLock,
            CommandPayload::DeployKeyLock { .. }
        )
    )
}

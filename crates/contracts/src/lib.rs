//! Cross-boundary contracts for the vehicle lock kernel: lock kinds, deny
//! reasons, persisted configuration, commands, and API error shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod events;
pub mod serde_u64_string;

pub use events::{Event, EventType};

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// 64-bit player identity. Zero means "nobody" (unowned).
pub type PlayerId = u64;

/// 64-bit world entity identity.
pub type EntityId = u64;

pub const UNOWNED: PlayerId = 0;

/// Master-override grant: bypasses any lock regardless of sharing settings.
pub const PERMISSION_MASTER_KEY: &str = "vehiclelocks.masterkey";

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Local- or world-space vector; also used for Euler rotations in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;

    fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

// ---------------------------------------------------------------------------
// Lock kinds and payment
// ---------------------------------------------------------------------------

/// The two lock variants. A code lock authorizes via whitelist/guest entry;
/// a key lock authorizes via key possession.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    Code,
    Key,
}

impl LockKind {
    /// Inventory item consumed (or granted temporarily) when deploying.
    pub fn item_name(&self) -> &'static str {
        match self {
            LockKind::Code => "lock.code",
            LockKind::Key => "lock.key",
        }
    }

    /// Prefab spawned for the lock entity itself.
    pub fn prefab(&self) -> &'static str {
        match self {
            LockKind::Code => "assets/prefabs/locks/keypad/lock.code.prefab",
            LockKind::Key => "assets/prefabs/locks/keylock/lock.key.prefab",
        }
    }

    pub fn permission_prefix(&self) -> &'static str {
        match self {
            LockKind::Code => "vehiclelocks.codelock",
            LockKind::Key => "vehiclelocks.keylock",
        }
    }

    /// Grant covering every vehicle type for this lock kind.
    pub fn permission_all_vehicles(&self) -> String {
        format!("{}.allvehicles", self.permission_prefix())
    }

    /// Grant that waives payment for this lock kind.
    pub fn permission_free(&self) -> String {
        format!("{}.free", self.permission_prefix())
    }

    pub fn label(&self) -> &'static str {
        match self {
            LockKind::Code => "code lock",
            LockKind::Key => "key lock",
        }
    }
}

/// How a deployment is paid for. Resolved once per attempt, never re-resolved
/// mid-transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayMethod {
    /// Consume one already-crafted lock item.
    Item,
    /// Charge the full crafting-resource cost (subject to cooldown).
    Resources,
    /// No charge (free-deploy grant or API caller said so).
    Free,
}

// ---------------------------------------------------------------------------
// Deterministic deny reasons
// ---------------------------------------------------------------------------

/// Stable failure reasons reported to the requester. Validation is ordered,
/// so the reason is always the first failing stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenyReason {
    NoPermission,
    NoVehicleFound,
    VehicleDead,
    ForSale,
    NoOwner,
    DifferentOwner,
    NoBuildingPrivilege,
    BuildingBlocked,
    AlreadyHasLock,
    NoSuitableAttachment,
    InsufficientResources { item: String },
    Cooldown { seconds_remaining: u64 },
    Occupied,
    Vetoed,
    TooFar,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::NoPermission => write!(f, "You don't have permission to do that."),
            DenyReason::NoVehicleFound => write!(f, "Error: No vehicle found."),
            DenyReason::VehicleDead => write!(f, "Error: That vehicle is dead."),
            DenyReason::ForSale => write!(f, "Error: That vehicle is currently for sale."),
            DenyReason::NoOwner => write!(f, "Error: You do not own that vehicle."),
            DenyReason::DifferentOwner => write!(f, "Error: Someone else owns that vehicle."),
            DenyReason::NoBuildingPrivilege => write!(
                f,
                "Error: Locking unowned vehicles requires building privilege."
            ),
            DenyReason::BuildingBlocked => {
                write!(f, "Error: Cannot do that while building blocked.")
            }
            DenyReason::AlreadyHasLock => write!(f, "Error: That vehicle already has a lock."),
            DenyReason::NoSuitableAttachment => write!(
                f,
                "Error: That vehicle needs a driver module to receive a lock."
            ),
            DenyReason::InsufficientResources { item } => {
                write!(f, "Error: Not enough resources to craft a {item}.")
            }
            DenyReason::Cooldown { seconds_remaining } => {
                write!(f, "Please wait {seconds_remaining}s and try again.")
            }
            DenyReason::Occupied => write!(f, "Error: That vehicle is currently occupied."),
            DenyReason::Vetoed => write!(f, "Error: Another system prevented that."),
            DenyReason::TooFar => write!(f, "Error: Too far away."),
        }
    }
}

// ---------------------------------------------------------------------------
// Persisted configuration
// ---------------------------------------------------------------------------

/// Which relationship graphs grant bypass to a lock owner's lock.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SharingConfig {
    pub team: bool,
    pub friends: bool,
    pub clan: bool,
    pub clan_or_ally: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModularCarConfig {
    /// Allow lifting/editing a locked car even when locked out of it.
    pub allow_editing_while_locked_out: bool,
}

impl Default for ModularCarConfig {
    fn default() -> Self {
        Self {
            allow_editing_while_locked_out: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutoUnlockConfig {
    pub enabled: bool,
    /// Idle threshold before an engaged lock becomes eligible.
    pub idle_seconds: u64,
    /// How often the tracker is scanned.
    pub scan_interval_seconds: u64,
    /// Owned vehicles are never auto-unlocked.
    pub exempt_owned: bool,
    /// Keep vehicles locked while parked inside the owner's building
    /// privilege. Expensive, so deferred into a bounded secondary pass.
    pub check_building_privilege: bool,
    pub max_privilege_checks_per_tick: usize,
}

impl Default for AutoUnlockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            idle_seconds: 3600,
            scan_interval_seconds: 300,
            exempt_owned: false,
            check_building_privilege: false,
            max_privilege_checks_per_tick: 4,
        }
    }
}

/// Persisted configuration, loaded externally and consumed as plain data.
/// Every field has a default so a partial (or older) file loads cleanly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LockConfig {
    pub allow_if_no_owner: bool,
    pub allow_if_different_owner: bool,
    pub require_privilege_if_no_owner: bool,
    pub craft_cooldown_seconds: u64,
    pub modular_car: ModularCarConfig,
    pub sharing: SharingConfig,
    pub auto_unlock: AutoUnlockConfig,
    /// Non-player (NPC) identities bypass locks automatically.
    pub npc_bypass: bool,
    /// Deploying onto an unowned vehicle claims it for the requester.
    pub auto_claim_unowned: bool,
    /// Deploying also replaces an existing different owner.
    pub auto_replace_owner: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            allow_if_no_owner: true,
            allow_if_different_owner: false,
            require_privilege_if_no_owner: false,
            craft_cooldown_seconds: 10,
            modular_car: ModularCarConfig::default(),
            sharing: SharingConfig::default(),
            auto_unlock: AutoUnlockConfig::default(),
            npc_bypass: false,
            auto_claim_unowned: false,
            auto_replace_owner: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    DeployCodeLock,
    DeployKeyLock,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandPayload {
    DeployCodeLock {
        #[serde(with = "serde_u64_string")]
        player_id: PlayerId,
    },
    DeployKeyLock {
        #[serde(with = "serde_u64_string")]
        player_id: PlayerId,
    },
}

impl CommandPayload {
    pub fn player_id(&self) -> PlayerId {
        match self {
            CommandPayload::DeployCodeLock { player_id }
            | CommandPayload::DeployKeyLock { player_id } => *player_id,
        }
    }

    pub fn lock_kind(&self) -> LockKind {
        match self {
            CommandPayload::DeployCodeLock { .. } => LockKind::Code,
            CommandPayload::DeployKeyLock { .. } => LockKind::Key,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    pub schema_version: String,
    pub command_id: String,
    pub issued_at_tick: u64,
    pub command_type: CommandType,
    pub payload: CommandPayload,
}

impl Command {
    pub fn new(
        command_id: impl Into<String>,
        issued_at_tick: u64,
        command_type: CommandType,
        payload: CommandPayload,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            command_id: command_id.into(),
            issued_at_tick,
            command_type,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// API errors and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidCommand,
    InvalidQuery,
    PlayerNotFound,
    EntityNotFound,
    ContractVersionUnsupported,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}

/// Outcome of a submitted command. A command either deploys a lock
/// (`deployed_lock` set), is denied with a deterministic reason, or is
/// rejected before reaching the kernel (`error` set).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandResult {
    pub schema_version: String,
    pub command_id: String,
    pub accepted: bool,
    pub deployed_lock: Option<EntityId>,
    pub deny_reason: Option<DenyReason>,
    pub error: Option<ApiError>,
}

impl CommandResult {
    /// Accepted, but nothing observable happened (transient commit no-op).
    pub fn accepted(command: &Command) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            command_id: command.command_id.clone(),
            accepted: true,
            deployed_lock: None,
            deny_reason: None,
            error: None,
        }
    }

    pub fn deployed(command: &Command, lock_id: EntityId) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            command_id: command.command_id.clone(),
            accepted: true,
            deployed_lock: Some(lock_id),
            deny_reason: None,
            error: None,
        }
    }

    pub fn denied(command: &Command, reason: DenyReason) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            command_id: command.command_id.clone(),
            accepted: false,
            deployed_lock: None,
            deny_reason: Some(reason),
            error: None,
        }
    }

    pub fn rejected(command: &Command, error: ApiError) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            command_id: command.command_id.clone(),
            accepted: false,
            deployed_lock: None,
            deny_reason: None,
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// Kernel status and lock summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KernelStatus {
    pub schema_version: String,
    pub current_tick: u64,
    pub entity_count: usize,
    pub player_count: usize,
    pub locked_vehicle_count: usize,
    pub queue_depth: usize,
}

impl fmt::Display for KernelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick={} entities={} players={} locked={} queue_depth={}",
            self.current_tick,
            self.entity_count,
            self.player_count,
            self.locked_vehicle_count,
            self.queue_depth
        )
    }
}

/// One tracked locked vehicle, as exposed by the inspection API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockedVehicleSummary {
    pub vehicle_id: EntityId,
    pub type_key: String,
    pub lock_id: EntityId,
    pub kind: LockKind,
    #[serde(with = "serde_u64_string")]
    pub owner_id: PlayerId,
    pub locked: bool,
}

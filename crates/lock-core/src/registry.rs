//! Vehicle type registry: maps an entity's prefab identity to the metadata
//! needed to place and manage a lock on that vehicle type.
//!
//! Per-type behavior (attachment geometry, attachment target, idle-time
//! source) is modeled as data-carrying descriptors rather than subclassing.
//! New types are added by inserting a descriptor, including at runtime for
//! externally contributed types.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use contracts::{EntityId, LockKind, Vec3};

use crate::world::VehicleWorld;

/// Resolves the entity a lock actually attaches to. Defaults to the vehicle
/// itself; composite vehicles resolve to a required sub-module, which may be
/// absent.
pub type AttachmentResolver = fn(&VehicleWorld, EntityId) -> Option<EntityId>;

/// Seconds since the vehicle was last actively used, or `None` when the
/// vehicle no longer exists.
pub type IdleAccessor = fn(&VehicleWorld, EntityId) -> Option<u64>;

fn attach_to_self(world: &VehicleWorld, entity_id: EntityId) -> Option<EntityId> {
    world.entity(entity_id).map(|_| entity_id)
}

fn attach_to_first_driver_module(world: &VehicleWorld, entity_id: EntityId) -> Option<EntityId> {
    world.first_driver_module(entity_id)
}

fn idle_since_last_use(world: &VehicleWorld, entity_id: EntityId) -> Option<u64> {
    world.seconds_since_use(entity_id)
}

// ---------------------------------------------------------------------------
// VehicleTypeDescriptor
// ---------------------------------------------------------------------------

/// Immutable metadata for one vehicle type. Built once, registered, never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct VehicleTypeDescriptor {
    pub type_key: String,
    /// Static prefab identities for the O(1) index. Empty for custom types
    /// whose identity cannot be statically enumerated.
    pub prefabs: Vec<String>,
    /// Local-space attachment offset.
    pub lock_position: Vec3,
    /// Local-space attachment rotation, Euler degrees.
    pub lock_rotation: Vec3,
    /// Named sub-part the lock parents under, when the model requires one.
    pub parent_bone: Option<String>,
    pub resolve_attachment: AttachmentResolver,
    pub idle_seconds: IdleAccessor,
}

impl VehicleTypeDescriptor {
    pub fn new(type_key: impl Into<String>, prefabs: &[&str], lock_position: Vec3) -> Self {
        Self {
            type_key: type_key.into(),
            prefabs: prefabs.iter().map(|p| p.to_string()).collect(),
            lock_position,
            lock_rotation: Vec3::ZERO,
            parent_bone: None,
            resolve_attachment: attach_to_self,
            idle_seconds: idle_since_last_use,
        }
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.lock_rotation = rotation;
        self
    }

    pub fn with_parent_bone(mut self, bone: impl Into<String>) -> Self {
        self.parent_bone = Some(bone.into());
        self
    }

    pub fn with_attachment_resolver(mut self, resolver: AttachmentResolver) -> Self {
        self.resolve_attachment = resolver;
        self
    }

    pub fn with_idle_accessor(mut self, accessor: IdleAccessor) -> Self {
        self.idle_seconds = accessor;
        self
    }

    /// Type-specific deploy grant for the given lock kind, e.g.
    /// `vehiclelocks.codelock.minicopter`.
    pub fn permission_for(&self, kind: LockKind) -> String {
        format!("{}.{}", kind.permission_prefix(), self.type_key)
    }
}

// ---------------------------------------------------------------------------
// VehicleTypeRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Built-in type keys cannot be replaced by runtime registrations.
    BuiltinReserved(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::BuiltinReserved(key) => {
                write!(f, "vehicle type {key} is built in and cannot be replaced")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Descriptor index: a fast prefab-identity map plus a fallback list for
/// custom types, probed in registration order by invoking each descriptor's
/// attachment resolver speculatively.
#[derive(Debug, Clone, Default)]
pub struct VehicleTypeRegistry {
    descriptors: Vec<VehicleTypeDescriptor>,
    by_key: BTreeMap<String, usize>,
    prefab_index: BTreeMap<String, usize>,
    fallback: Vec<usize>,
    builtin_keys: BTreeSet<String>,
}

impl VehicleTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every built-in vehicle type.
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        for descriptor in builtin_descriptors() {
            registry.register_builtin(descriptor);
        }
        registry
    }

    fn register_builtin(&mut self, descriptor: VehicleTypeDescriptor) {
        let index = self.descriptors.len();
        self.builtin_keys.insert(descriptor.type_key.clone());
        self.by_key.insert(descriptor.type_key.clone(), index);
        for prefab in &descriptor.prefabs {
            self.prefab_index.insert(prefab.clone(), index);
        }
        self.descriptors.push(descriptor);
    }

    /// Register a custom vehicle type. Re-registering the same custom key
    /// silently overwrites (the previous fallback position is kept); a key
    /// colliding with a built-in type is rejected so an integration cannot
    /// silently change core geometry.
    pub fn register(&mut self, descriptor: VehicleTypeDescriptor) -> Result<(), RegistryError> {
        if self.builtin_keys.contains(&descriptor.type_key) {
            return Err(RegistryError::BuiltinReserved(descriptor.type_key));
        }

        let index = match self.by_key.get(&descriptor.type_key) {
            Some(&existing) => {
                self.prefab_index.retain(|_, idx| *idx != existing);
                self.descriptors[existing] = descriptor.clone();
                existing
            }
            None => {
                let index = self.descriptors.len();
                self.by_key.insert(descriptor.type_key.clone(), index);
                self.descriptors.push(descriptor.clone());
                self.fallback.push(index);
                index
            }
        };

        for prefab in &descriptor.prefabs {
            self.prefab_index.insert(prefab.clone(), index);
        }
        Ok(())
    }

    pub fn get(&self, type_key: &str) -> Option<&VehicleTypeDescriptor> {
        self.by_key.get(type_key).map(|&idx| &self.descriptors[idx])
    }

    pub fn is_builtin(&self, type_key: &str) -> bool {
        self.builtin_keys.contains(type_key)
    }

    pub fn type_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Resolve the descriptor for an entity: prefab index first, then the
    /// fallback list in registration order (first match wins — overlapping
    /// fallback descriptors are an open ambiguity; keep them disjoint).
    pub fn resolve(&self, world: &VehicleWorld, entity_id: EntityId) -> Option<&VehicleTypeDescriptor> {
        let entity = world.entity(entity_id)?;
        if let Some(&index) = self.prefab_index.get(&entity.prefab) {
            return Some(&self.descriptors[index]);
        }

        self.fallback
            .iter()
            .map(|&index| &self.descriptors[index])
            .find(|descriptor| (descriptor.resolve_attachment)(world, entity_id).is_some())
    }

    /// For entities belonging to a custom vehicle type, the entity the lock
    /// would attach to. Used when walking from a child entity back to its
    /// lockable parent.
    pub fn custom_attachment_parent(
        &self,
        world: &VehicleWorld,
        entity_id: EntityId,
    ) -> Option<EntityId> {
        self.fallback
            .iter()
            .find_map(|&index| (self.descriptors[index].resolve_attachment)(world, entity_id))
    }
}

// ---------------------------------------------------------------------------
// Built-in types
// ---------------------------------------------------------------------------

/// The built-in vehicle table. Geometry is the canonical lock placement for
/// each hull; the modular car resolves its attachment to the first
/// driver-seat module, which may be absent.
pub fn builtin_descriptors() -> Vec<VehicleTypeDescriptor> {
    vec![
        VehicleTypeDescriptor::new(
            "chinook",
            &["assets/prefabs/npc/ch47/ch47.entity.prefab"],
            Vec3::new(-1.175, 2.0, 6.5),
        ),
        VehicleTypeDescriptor::new(
            "duosub",
            &["assets/content/vehicles/submarine/submarineduo.entity.prefab"],
            Vec3::new(-0.455, 1.29, 0.75),
        )
        .with_rotation(Vec3::new(0.0, 180.0, 10.0)),
        VehicleTypeDescriptor::new(
            "hotairballoon",
            &["assets/prefabs/deployable/hot air balloon/hotairballoon.prefab"],
            Vec3::new(1.45, 0.9, 0.0),
        ),
        VehicleTypeDescriptor::new(
            "kayak",
            &["assets/content/vehicles/boats/kayak/kayak.prefab"],
            Vec3::new(-0.43, 0.2, 0.2),
        )
        .with_rotation(Vec3::new(0.0, 90.0, 90.0)),
        VehicleTypeDescriptor::new(
            "magnetcrane",
            &["assets/content/vehicles/crane_magnet/magnetcrane.entity.prefab"],
            Vec3::new(-1.735, -1.445, 0.79),
        )
        .with_rotation(Vec3::new(0.0, 0.0, 90.0))
        .with_parent_bone("Top"),
        VehicleTypeDescriptor::new(
            "minicopter",
            &["assets/content/vehicles/minicopter/minicopter.entity.prefab"],
            Vec3::new(-0.15, 0.7, -0.1),
        ),
        VehicleTypeDescriptor::new(
            "modularcar",
            &[
                "assets/content/vehicles/modularcar/car_chassis_2module.entity.prefab",
                "assets/content/vehicles/modularcar/car_chassis_3module.entity.prefab",
                "assets/content/vehicles/modularcar/car_chassis_4module.entity.prefab",
                "assets/content/vehicles/modularcar/2module_car_spawned.entity.prefab",
                "assets/content/vehicles/modularcar/3module_car_spawned.entity.prefab",
                "assets/content/vehicles/modularcar/4module_car_spawned.entity.prefab",
            ],
            Vec3::new(-0.9, 0.35, -0.5),
        )
        .with_attachment_resolver(attach_to_first_driver_module),
        VehicleTypeDescriptor::new(
            "rhib",
            &["assets/content/vehicles/boats/rhib/rhib.prefab"],
            Vec3::new(-0.68, 2.0, 0.7),
        ),
        VehicleTypeDescriptor::new(
            "ridablehorse",
            &["assets/rust.ai/nextai/testridablehorse.prefab"],
            Vec3::new(-0.6, 0.35, -0.1),
        )
        .with_rotation(Vec3::new(0.0, 95.0, 90.0))
        .with_parent_bone("Horse_RootBone"),
        VehicleTypeDescriptor::new(
            "rowboat",
            &["assets/content/vehicles/boats/rowboat/rowboat.prefab"],
            Vec3::new(-0.83, 0.51, -0.57),
        ),
        VehicleTypeDescriptor::new(
            "scraptransport",
            &["assets/content/vehicles/scrap heli carrier/scraptransporthelicopter.prefab"],
            Vec3::new(-1.25, 1.22, 1.99),
        ),
        VehicleTypeDescriptor::new(
            "sedan",
            &["assets/content/vehicles/sedan_a/sedantest.entity.prefab"],
            Vec3::new(-1.09, 0.79, 0.5),
        ),
        VehicleTypeDescriptor::new(
            "solosub",
            &["assets/content/vehicles/submarine/submarinesolo.entity.prefab"],
            Vec3::new(0.0, 1.85, 0.0),
        )
        .with_rotation(Vec3::new(0.0, 90.0, 90.0)),
        VehicleTypeDescriptor::new(
            "workcart",
            &["assets/content/vehicles/workcart/workcart.entity.prefab"],
            Vec3::new(-0.2, 2.35, 2.7),
        ),
    ]
}

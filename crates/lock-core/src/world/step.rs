//! The single-threaded tick loop: deferred tasks, reskin cleanup, the
//! auto-unlock scheduler, and synchronous command application.

use contracts::{Command, CommandResult, EntityId, EventType, UNOWNED};
use serde_json::json;

use super::{DeferredTask, VehicleWorld};
use crate::scheduler::{evaluate, UnlockDecision};

impl VehicleWorld {
    /// Advance the world by `ticks` one-second quanta.
    pub fn step(&mut self, ticks: u64) {
        for _ in 0..ticks.max(1) {
            self.tick();
        }
    }

    fn tick(&mut self) {
        self.advance_tick();
        let now = self.current_tick();

        // Work deferred to this tick (driver-module lock relocations).
        let queued: Vec<(u64, DeferredTask)> = self.deferred.drain(..).collect();
        let mut due = Vec::new();
        for (due_tick, task) in queued {
            if due_tick <= now {
                due.push(task);
            } else {
                self.deferred.push_back((due_tick, task));
            }
        }
        for task in due {
            match task {
                DeferredTask::RelocateDetachedLock { car, lock } => {
                    self.relocate_detached_lock(car, lock)
                }
            }
        }

        // Reskin cleanup runs one tick after the announcement, so a paired
        // replacement notification gets to arrive first.
        let expired = self.reskins.take_expired(now.saturating_sub(1));
        for pending in expired {
            self.resolve_expired_transfer(pending);
        }

        self.auto_unlock_tick(now);
    }

    // -----------------------------------------------------------------------
    // Auto-unlock
    // -----------------------------------------------------------------------

    fn auto_unlock_tick(&mut self, now: u64) {
        let config = self.config.auto_unlock;
        if !config.enabled {
            return;
        }

        // Bounded secondary pass: privilege checks deferred by earlier
        // scans, spread across ticks rather than evaluated synchronously.
        let due_checks = self
            .auto_unlock
            .take_due_checks(config.max_privilege_checks_per_tick.max(1));
        for vehicle_id in due_checks {
            self.finish_privilege_check(vehicle_id);
        }

        if !self.auto_unlock.scan_due(now) {
            return;
        }
        self.auto_unlock
            .schedule_next_scan(now, config.scan_interval_seconds);

        let tracked: Vec<EntityId> = self.tracker.iter().map(|(_, id)| id).collect();
        for vehicle_id in tracked {
            let Some(lock_id) = self.vehicle_lock(vehicle_id) else {
                continue;
            };
            if !self.is_lock_engaged(lock_id) {
                continue;
            }
            let owned = self
                .entity(vehicle_id)
                .is_some_and(|vehicle| vehicle.owner_id != UNOWNED);
            match evaluate(&config, owned, self.idle_seconds_for(vehicle_id)) {
                UnlockDecision::Skip => {}
                UnlockDecision::Unlock => self.auto_unlock_vehicle(vehicle_id, lock_id),
                UnlockDecision::DeferPrivilegeCheck => self.auto_unlock.defer(vehicle_id),
            }
        }
    }

    /// Idle time through the type's accessor.
    pub fn idle_seconds_for(&self, vehicle_id: EntityId) -> Option<u64> {
        let accessor = self.registry().resolve(self, vehicle_id)?.idle_seconds;
        accessor(self, vehicle_id)
    }

    /// The expensive half, run off the deferred queue: a vehicle parked
    /// inside its lock owner's building privilege stays locked. The cheap
    /// checks re-run because the world may have moved on since deferral.
    fn finish_privilege_check(&mut self, vehicle_id: EntityId) {
        let Some(lock_id) = self.vehicle_lock(vehicle_id) else {
            return;
        };
        if !self.is_lock_engaged(lock_id) {
            return;
        }

        let config = self.config.auto_unlock;
        let owned = self
            .entity(vehicle_id)
            .is_some_and(|vehicle| vehicle.owner_id != UNOWNED);
        if config.exempt_owned && owned {
            return;
        }
        let idle_ok = self
            .idle_seconds_for(vehicle_id)
            .is_some_and(|idle| idle >= config.idle_seconds);
        if !idle_ok {
            return;
        }

        let lock_owner = self
            .entity(lock_id)
            .map(|lock| lock.owner_id)
            .unwrap_or(UNOWNED);
        let position = match self.entity(vehicle_id) {
            Some(vehicle) => vehicle.position,
            None => return,
        };
        if lock_owner != UNOWNED && self.has_building_privilege(lock_owner, &position) {
            return;
        }

        self.auto_unlock_vehicle(vehicle_id, lock_id);
    }

    /// Disengage only; the lock entity itself always survives auto-unlock.
    fn auto_unlock_vehicle(&mut self, vehicle_id: EntityId, lock_id: EntityId) {
        self.set_lock_engaged(lock_id, false);
        self.push_event(
            EventType::LockAutoUnlocked,
            Some(vehicle_id),
            None,
            Some(json!({ "lock_id": lock_id })),
        );
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Apply a submitted command. Requests complete synchronously with an
    /// accept/deny outcome; there is no in-flight cancellation.
    pub fn apply_command(&mut self, command: &Command) -> CommandResult {
        let player_id = command.payload.player_id();
        let kind = command.payload.lock_kind();

        let result = match self.deploy_lock_command(player_id, kind) {
            Ok(Some(lock_id)) => CommandResult::deployed(command, lock_id),
            Ok(None) => CommandResult::accepted(command),
            Err(reason) => CommandResult::denied(command, reason),
        };

        self.push_event(
            EventType::CommandApplied,
            result.deployed_lock,
            Some(player_id),
            Some(json!({
                "command_id": command.command_id,
                "command_type": command.command_type,
                "accepted": result.accepted,
            })),
        );
        result
    }
}

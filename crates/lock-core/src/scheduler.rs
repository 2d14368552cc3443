//! Auto-unlock scheduler: periodically disengages locks on idle vehicles.
//!
//! The scan itself is cheap (config gates plus the per-type idle accessor).
//! The optional building-privilege proximity check is not, so vehicles that
//! pass the cheap checks are deferred into a queue drained at a bounded rate
//! across subsequent world ticks instead of being evaluated synchronously in
//! one scan.

use std::collections::VecDeque;

use contracts::{AutoUnlockConfig, EntityId};

/// What the cheap pass decided for one tracked vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockDecision {
    /// Below threshold, exempt, or disabled.
    Skip,
    /// Eligible; disengage now.
    Unlock,
    /// Eligible, but the privilege proximity check must run first.
    DeferPrivilegeCheck,
}

/// Cheap per-vehicle eligibility decision. `idle_seconds` is `None` when the
/// vehicle disappeared between tracking and scanning (benign race).
pub fn evaluate(config: &AutoUnlockConfig, owned: bool, idle_seconds: Option<u64>) -> UnlockDecision {
    if !config.enabled {
        return UnlockDecision::Skip;
    }
    if config.exempt_owned && owned {
        return UnlockDecision::Skip;
    }
    let idle = match idle_seconds {
        Some(idle) => idle,
        None => return UnlockDecision::Skip,
    };
    if idle < config.idle_seconds {
        return UnlockDecision::Skip;
    }
    if config.check_building_privilege {
        UnlockDecision::DeferPrivilegeCheck
    } else {
        UnlockDecision::Unlock
    }
}

#[derive(Debug, Clone)]
pub struct AutoUnlockScheduler {
    next_scan_tick: u64,
    pending_checks: VecDeque<EntityId>,
}

impl AutoUnlockScheduler {
    pub fn new(first_scan_tick: u64) -> Self {
        Self {
            next_scan_tick: first_scan_tick,
            pending_checks: VecDeque::new(),
        }
    }

    pub fn scan_due(&self, now_tick: u64) -> bool {
        now_tick >= self.next_scan_tick
    }

    pub fn schedule_next_scan(&mut self, now_tick: u64, interval_seconds: u64) {
        self.next_scan_tick = now_tick + interval_seconds.max(1);
    }

    /// Queue a vehicle for the deferred privilege pass. Already-queued
    /// vehicles are not duplicated.
    pub fn defer(&mut self, vehicle_id: EntityId) {
        if !self.pending_checks.contains(&vehicle_id) {
            self.pending_checks.push_back(vehicle_id);
        }
    }

    /// Take up to `max` deferred vehicles for this tick's bounded pass.
    pub fn take_due_checks(&mut self, max: usize) -> Vec<EntityId> {
        let count = max.min(self.pending_checks.len());
        self.pending_checks.drain(..count).collect()
    }

    pub fn pending_check_count(&self) -> usize {
        self.pending_checks.len()
    }
}

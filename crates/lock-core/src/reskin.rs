//! Reskin transfer coordinator: carries a lock across the destroy-and-replace
//! boundary of a vehicle reskin.
//!
//! Each transfer is a tiny state machine: `Announced -> Completed` when the
//! replacement arrives, or `Announced -> RolledBack` when the cleanup pass
//! (one tick after the announcement) finds it unconsumed. Pending transfers
//! live in a small fixed pool with an overflow list, and the replacement is
//! correlated by approximate world position.

use contracts::{EntityId, Vec3};

/// Concurrent transfers expected in a single tick under normal load; beyond
/// this they spill into the overflow list.
pub const TRANSFER_POOL_SLOTS: usize = 4;

/// Position tolerance when pairing a replacement with its announcement.
/// Two transfers sharing a position within one tick are ambiguous; that
/// fragility is inherent to position keying and deliberately not papered
/// over with a stronger correlation scheme.
pub const POSITION_MATCH_RADIUS: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransfer {
    pub vehicle_id: EntityId,
    pub lock_id: EntityId,
    pub position: Vec3,
    pub announced_tick: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ReskinTransferCoordinator {
    slots: [Option<PendingTransfer>; TRANSFER_POOL_SLOTS],
    overflow: Vec<PendingTransfer>,
}

impl ReskinTransferCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announce(&mut self, transfer: PendingTransfer) {
        for slot in &mut self.slots {
            if slot.is_none() {
                *slot = Some(transfer);
                return;
            }
        }
        self.overflow.push(transfer);
    }

    /// Consume the pending transfer whose recorded position is closest to
    /// `position` within [`POSITION_MATCH_RADIUS`].
    pub fn take_match(&mut self, position: Vec3) -> Option<PendingTransfer> {
        let mut best: Option<(f32, usize)> = None;
        for (index, slot) in self
            .slots
            .iter()
            .map(Option::as_ref)
            .chain(self.overflow.iter().map(Some))
            .enumerate()
        {
            let Some(pending) = slot else { continue };
            let distance = pending.position.distance(&position);
            if distance <= POSITION_MATCH_RADIUS
                && best.map_or(true, |(best_distance, _)| distance < best_distance)
            {
                best = Some((distance, index));
            }
        }

        let (_, index) = best?;
        Some(self.remove_at(index))
    }

    /// Drain transfers announced at or before `tick` that were never
    /// completed, for the deferred cleanup pass.
    pub fn take_expired(&mut self, tick: u64) -> Vec<PendingTransfer> {
        let mut expired = Vec::new();
        for slot in &mut self.slots {
            if slot
                .as_ref()
                .is_some_and(|pending| pending.announced_tick <= tick)
            {
                expired.push(slot.take().expect("checked above"));
            }
        }

        let mut index = 0;
        while index < self.overflow.len() {
            if self.overflow[index].announced_tick <= tick {
                expired.push(self.overflow.remove(index));
            } else {
                index += 1;
            }
        }
        expired
    }

    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count() + self.overflow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_count() == 0
    }

    fn remove_at(&mut self, index: usize) -> PendingTransfer {
        if index < TRANSFER_POOL_SLOTS {
            self.slots[index].take().expect("occupied slot")
        } else {
            self.overflow.remove(index - TRANSFER_POOL_SLOTS)
        }
    }
}

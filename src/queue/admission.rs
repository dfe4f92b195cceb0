//! Slot accounting for concurrent encodes.
//!
//! The controller tracks how many encodes are in flight against a fixed
//! capacity and keeps queue positions in the registry consistent with that
//! count. A [`SlotGuard`] releases its slot on drop, so a panicking or
//! cancelled worker can never leak one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::registry::TaskRegistry;

#[derive(Debug)]
pub struct AdmissionController {
    capacity: usize,
    active: AtomicUsize,
    registry: Arc<TaskRegistry>,
}

impl AdmissionController {
    pub fn new(capacity: usize, registry: Arc<TaskRegistry>) -> Self {
        Self {
            capacity: capacity.max(1),
            active: AtomicUsize::new(0),
            registry,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn slots_free(&self) -> usize {
        self.capacity.saturating_sub(self.active())
    }

    /// Record a newly queued task and assign positions to every waiter.
    pub fn on_enqueue(&self) {
        self.registry.recompute_positions(self.slots_free());
    }

    /// Claim a slot for a task a worker is about to run.
    ///
    /// Workers are spawned one per slot, so the count can never exceed
    /// capacity; this is accounting, not gating.
    pub fn acquire(self: &Arc<Self>) -> SlotGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.registry.recompute_positions(self.slots_free());
        SlotGuard {
            admission: Arc::clone(self),
        }
    }
}

/// Holds one encode slot; releasing happens on drop.
#[derive(Debug)]
pub struct SlotGuard {
    admission: Arc<AdmissionController>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.admission.active.fetch_sub(1, Ordering::SeqCst);
        self.admission
            .registry
            .recompute_positions(self.admission.slots_free());
    }
}

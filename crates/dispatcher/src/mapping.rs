//! Assigns each instance to a worker shard on first observation and pins it
//! there for the run's lifetime — the invariant that keeps per-instance
//! state strictly single-owner (§4.4 of the design this crate implements).

use std::collections::HashMap;

use protocol::InstanceKey;
use rand::Rng;

/// `InstanceKey -> worker index` mapping, grown incrementally as new
/// instances are first observed. Touched only by the dispatcher's data
/// task; never shared across tasks.
pub(crate) struct InstanceMapping {
    assignments: HashMap<InstanceKey, usize>,
    num_workers: usize,
}

impl InstanceMapping {
    pub(crate) fn new(num_workers: usize) -> Self {
        assert!(num_workers > 0, "a dispatcher needs at least one worker");
        Self {
            assignments: HashMap::new(),
            num_workers,
        }
    }

    /// Returns the worker index that owns `key`, drawing a uniformly random
    /// one the first time `key` is seen and reusing it on every later call.
    pub(crate) fn worker_for(&mut self, key: InstanceKey) -> usize {
        *self
            .assignments
            .entry(key)
            .or_insert_with(|| rand::thread_rng().gen_range(0..self.num_workers))
    }

    /// Total number of instances ever assigned a worker.
    pub(crate) fn instance_count(&self) -> usize {
        self.assignments.len()
    }
}

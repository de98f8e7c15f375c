//! The per-zone switch-to-switch topology, built once from the first
//! snapshot that carries link records.

use std::collections::{BTreeSet, HashMap};

use crate::instance::Zone;
use crate::snapshot::MeasurementSnapshot;

/// Per-zone directed graph of switch-to-switch links, keyed by source
/// switch id.
///
/// Built once, from the first snapshot observed that contains link records,
/// and immutable afterwards. Rebuilding it is a programming error: the
/// original implementation asserts this ("topology re-declaration") and so
/// does this port, via [`Topology::build`] panicking if called twice.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    links: HashMap<Zone, HashMap<u64, BTreeSet<u64>>>,
    built: bool,
}

impl Topology {
    /// Creates an empty, not-yet-built topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once [`Topology::build`] has been called.
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Builds the topology from a snapshot carrying link records. Panics if
    /// the topology was already built: a topology re-declaration is an
    /// invariant violation, not a recoverable error.
    pub fn build(&mut self, snapshot: &MeasurementSnapshot) {
        assert!(!self.built, "topology must be built exactly once");
        let zone = snapshot
            .zone
            .expect("snapshot must be zone-tagged before it can seed the topology");

        let zone_links = self.links.entry(zone).or_default();
        for &(src, dst) in snapshot.links.keys() {
            let _ = zone_links.entry(src).or_default().insert(dst);
        }
        self.built = true;
    }

    /// Returns the destinations reachable from `src` in `zone`, if any.
    pub fn neighbors(&self, zone: Zone, src: u64) -> Option<&BTreeSet<u64>> {
        self.links.get(&zone)?.get(&src)
    }
}

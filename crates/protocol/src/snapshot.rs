//! Measurement snapshots as handed from the transport adapter to the IO
//! bridge, and the per-instance records the dispatcher explodes them into.

use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::instance::{InstanceId, InstanceKey, InstanceKind, Zone};
use crate::payload::{LinkPayload, Payload, ServerPayload, SfciPayload, SwitchPayload, VnfiPayload};

/// A switch's reported state for one measurement tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchRecord {
    /// Whether the switch reported itself active this tick.
    pub active: bool,
}

/// A server's reported state for one measurement tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerRecord {
    /// Whether the server reported itself active this tick.
    pub active: bool,
    /// Per-core CPU utilization samples.
    pub cpu_util: Vec<f64>,
    /// DRAM usage percentage.
    pub dram_usage_pct: f64,
}

/// A link's reported state for one measurement tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkRecord {
    /// Whether the link reported itself active this tick.
    pub active: bool,
    /// Count of NSH packets.
    pub nsh_num: u64,
    /// Count of SYN packets.
    pub syn_num: u64,
    /// Count of DNS packets.
    pub dns_num: u64,
    /// Link utilization ratio.
    pub utilization: f64,
}

/// An SFCI's reported state. SFCI records carry no `active` flag in the
/// original wire shape and are always treated as active.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SfciRecord {
    /// Opaque numeric attributes.
    pub attributes: BTreeMap<String, f64>,
}

/// A VNFI's reported state for one measurement tick.
#[derive(Debug, Clone, PartialEq)]
pub struct VnfiRecord {
    /// Whether the VNFI reported itself active this tick.
    pub active: bool,
    /// Opaque numeric attributes.
    pub attributes: BTreeMap<String, f64>,
}

/// A measurement snapshot for a single zone, as produced by one poll of the
/// transport adapter. Every field is a mapping from instance id to the
/// per-kind record reported for that instance this tick.
#[derive(Debug, Clone, Default)]
pub struct MeasurementSnapshot {
    /// The zone this snapshot was measured in.
    pub zone: Option<Zone>,
    /// Switch records keyed by switch id.
    pub switches: BTreeMap<u64, SwitchRecord>,
    /// Server records keyed by server id.
    pub servers: BTreeMap<u64, ServerRecord>,
    /// Link records keyed by (source, destination) switch id.
    pub links: BTreeMap<(u64, u64), LinkRecord>,
    /// SFCI records keyed by instance id.
    pub sfcis: BTreeMap<u64, SfciRecord>,
    /// VNFI records keyed by instance id.
    pub vnfis: BTreeMap<u64, VnfiRecord>,
}

impl MeasurementSnapshot {
    /// Creates an empty snapshot for the given zone.
    pub fn new(zone: Zone) -> Self {
        Self {
            zone: Some(zone),
            ..Default::default()
        }
    }

    /// Explodes this snapshot into one `InstanceRecord` per monitored
    /// instance, stamped with `observed_at`. Every instance kind present in
    /// the snapshot contributes exactly one record.
    pub fn explode(&self, observed_at: SystemTime) -> Vec<InstanceRecord> {
        let zone = self.zone.expect("snapshot must be zone-tagged before it can be exploded");
        let mut records = Vec::with_capacity(
            self.switches.len() + self.servers.len() + self.links.len() + self.sfcis.len() + self.vnfis.len(),
        );

        for (&id, record) in &self.switches {
            records.push(InstanceRecord {
                key: InstanceKey::new(zone, InstanceKind::Switch, InstanceId::Node(id)),
                observed_at,
                active: record.active,
                payload: Payload::Switch(SwitchPayload),
            });
        }
        for (&id, record) in &self.servers {
            records.push(InstanceRecord {
                key: InstanceKey::new(zone, InstanceKind::Server, InstanceId::Node(id)),
                observed_at,
                active: record.active,
                payload: Payload::Server(ServerPayload {
                    cpu_util: record.cpu_util.clone(),
                    dram_usage_pct: record.dram_usage_pct,
                }),
            });
        }
        for (&(src, dst), record) in &self.links {
            records.push(InstanceRecord {
                key: InstanceKey::new(zone, InstanceKind::Link, InstanceId::Link(src, dst)),
                observed_at,
                active: record.active,
                payload: Payload::Link(LinkPayload {
                    nsh_num: record.nsh_num,
                    syn_num: record.syn_num,
                    dns_num: record.dns_num,
                    utilization: record.utilization,
                }),
            });
        }
        for (&id, record) in &self.sfcis {
            records.push(InstanceRecord {
                key: InstanceKey::new(zone, InstanceKind::Sfci, InstanceId::Node(id)),
                observed_at,
                active: true,
                payload: Payload::Sfci(SfciPayload {
                    attributes: record.attributes.clone(),
                }),
            });
        }
        for (&id, record) in &self.vnfis {
            records.push(InstanceRecord {
                key: InstanceKey::new(zone, InstanceKind::Vnfi, InstanceId::Node(id)),
                observed_at,
                active: record.active,
                payload: Payload::Vnfi(VnfiPayload {
                    attributes: record.attributes.clone(),
                }),
            });
        }

        records
    }

    /// Returns true if this snapshot contains any link records, i.e. it can
    /// be used to (re)build the topology.
    pub fn has_links(&self) -> bool {
        !self.links.is_empty()
    }
}

/// A single monitored instance's state for one measurement tick, as routed
/// by the dispatcher to its owning worker.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
    /// The instance this record describes.
    pub key: InstanceKey,
    /// When the transport adapter observed this record.
    pub observed_at: SystemTime,
    /// Whether the instance reported itself active.
    pub active: bool,
    /// The per-kind payload.
    pub payload: Payload,
}

//! Zones, instance kinds, and the key identifying one monitored instance.

use std::fmt;

/// A measurement domain: the physical fabric, or its simulated twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Zone {
    /// The physical turbonet fabric.
    Turbonet,
    /// The simulator zone.
    Simulator,
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Turbonet => f.write_str("turbonet"),
            Zone::Simulator => f.write_str("simulator"),
        }
    }
}

/// The kind of a monitored instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum InstanceKind {
    /// A network switch.
    Switch,
    /// A compute server.
    Server,
    /// A link between two switches.
    Link,
    /// A service-function-chain instance.
    Sfci,
    /// A virtual-network-function instance.
    Vnfi,
}

impl fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceKind::Switch => "switch",
            InstanceKind::Server => "server",
            InstanceKind::Link => "link",
            InstanceKind::Sfci => "sfci",
            InstanceKind::Vnfi => "vnfi",
        };
        f.write_str(s)
    }
}

/// The opaque identifier of a monitored instance: a plain numeric id for
/// nodes, an ordered (src, dst) pair for links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstanceId {
    /// Identifier of a switch, server, SFCI, or VNFI.
    Node(u64),
    /// Identifier of a link, as the (source, destination) switch pair.
    Link(u64, u64),
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceId::Node(id) => write!(f, "{id}"),
            InstanceId::Link(src, dst) => write!(f, "({src},{dst})"),
        }
    }
}

/// The globally unique key of a monitored instance: its zone, kind and id.
///
/// Exactly one worker owns the state for a given `InstanceKey` for the
/// lifetime of the run; ownership is fixed on first observation by the
/// dispatcher and never rebalanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceKey {
    /// The measurement domain this instance was observed in.
    pub zone: Zone,
    /// The kind of instance.
    pub kind: InstanceKind,
    /// The instance identifier.
    pub id: InstanceId,
}

impl InstanceKey {
    /// Builds a new instance key.
    pub fn new(zone: Zone, kind: InstanceKind, id: InstanceId) -> Self {
        Self { zone, kind, id }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zone, self.kind, self.id)
    }
}

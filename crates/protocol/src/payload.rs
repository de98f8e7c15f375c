//! Per-kind payloads carried by a measurement record.
//!
//! The original source branches on attribute lookups (`obj.NSH_num`,
//! `obj.getCpuUtil()`) to decide how to interpret a record depending on its
//! instance kind. Here the kind is encoded up front as a tagged variant, and
//! the detector rules switch on the tag instead of probing for attributes.

use std::collections::BTreeMap;

/// Payload carried by a switch record. Switches have no metric rule in the
/// core detection scope; only their liveness is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwitchPayload;

/// Payload carried by a server record.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerPayload {
    /// Per-core CPU utilization samples; averaged (ignoring NaNs) to a
    /// single value before being fed to the CPU `TimeSeries`.
    pub cpu_util: Vec<f64>,
    /// DRAM usage percentage.
    pub dram_usage_pct: f64,
}

/// Payload carried by a link record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkPayload {
    /// Count of NSH packets observed on the link in the current tick.
    pub nsh_num: u64,
    /// Count of SYN packets observed on the link in the current tick.
    pub syn_num: u64,
    /// Count of DNS packets observed on the link in the current tick.
    pub dns_num: u64,
    /// Link utilization ratio in [0, 1].
    pub utilization: f64,
}

/// Payload carried by an SFCI record. SFCI records are passed through whole
/// and logged into the history ring; no anomaly rule is applied to them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SfciPayload {
    /// Opaque numeric attributes, kept verbatim for history/dashboard use.
    pub attributes: BTreeMap<String, f64>,
}

/// Payload carried by a VNFI record. Like switches, VNFIs have no metric
/// rule in the core detection scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VnfiPayload {
    /// Opaque numeric attributes, kept verbatim for history/dashboard use.
    pub attributes: BTreeMap<String, f64>,
}

/// The per-kind payload of a measurement record, tagged by instance kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A switch payload.
    Switch(SwitchPayload),
    /// A server payload.
    Server(ServerPayload),
    /// A link payload.
    Link(LinkPayload),
    /// An SFCI payload.
    Sfci(SfciPayload),
    /// A VNFI payload.
    Vnfi(VnfiPayload),
}

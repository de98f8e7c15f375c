//! Alert records emitted by workers and deduplicated in the IO bridge.

use crate::instance::Zone;

/// The class of alert: a statistical deviation on an active instance, or an
/// instance reporting itself inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlertKind {
    /// A metric-based statistical deviation on an active instance.
    Abnormal,
    /// An instance reporting itself inactive.
    Failure,
}

/// A single alert, naming exactly one of `switch_id`, `server_id`, or
/// `link_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertRecord {
    /// The zone the alerted instance lives in.
    pub zone: Zone,
    /// The alert class.
    pub kind: AlertKind,
    /// Set when the alerted instance is a switch.
    pub switch_id: Option<u64>,
    /// Set when the alerted instance is a server.
    pub server_id: Option<u64>,
    /// Set when the alerted instance is a link.
    pub link_id: Option<(u64, u64)>,
}

impl AlertRecord {
    /// Builds an alert for a switch. Panics if called with anything but a
    /// bare id, since exactly one of the three id fields must be populated.
    pub fn switch(zone: Zone, kind: AlertKind, switch_id: u64) -> Self {
        Self {
            zone,
            kind,
            switch_id: Some(switch_id),
            server_id: None,
            link_id: None,
        }
    }

    /// Builds an alert for a server.
    pub fn server(zone: Zone, kind: AlertKind, server_id: u64) -> Self {
        Self {
            zone,
            kind,
            switch_id: None,
            server_id: Some(server_id),
            link_id: None,
        }
    }

    /// Builds an alert for a link.
    pub fn link(zone: Zone, kind: AlertKind, link_id: (u64, u64)) -> Self {
        Self {
            zone,
            kind,
            switch_id: None,
            server_id: None,
            link_id: Some(link_id),
        }
    }
}

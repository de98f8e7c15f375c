//! The shape of a single worker's answer to a dashboard query, before the
//! IO bridge's fan-in merges every worker's partial result into one report.

use crate::instance::InstanceKey;
use crate::payload::Payload;

/// One instance's answer to a `Command::Query`: its last observed payload
/// (absent if the instance was never observed), and its current
/// abnormal/failure flags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResultEntry {
    /// The most recently observed payload for this instance, if any.
    pub payload: Option<Payload>,
    /// Whether the instance has ever been flagged abnormal.
    pub abnormal: bool,
    /// Whether the instance's most recent record reported it inactive.
    pub failure: bool,
}

/// A single worker's contribution to a `Command::Query` reply: every
/// instance it owns within the requested zone. Possibly empty, since a
/// worker must always respond so the IO bridge can fan-in by counting.
pub type PartialQueryResult = Vec<(InstanceKey, QueryResultEntry)>;

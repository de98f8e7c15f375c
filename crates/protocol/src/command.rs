//! Commands broadcast from the dashboard, through the IO bridge and
//! dispatcher, to every worker.

use crate::instance::Zone;

/// Identifier correlating a `Command::Query` with the partial results each
/// worker eventually produces for it, and with the single merged reply the
/// IO bridge ships back to the dashboard.
pub type CmdId = u64;

/// The sub-kind of dashboard query being asked for.
///
/// The original implementation's standalone core distinguished a richer set
/// of query types (`history_value`, `anomaly_record`, `failure_record`,
/// `instance_id_list`) than the single QUERY(zone) contract the canonical,
/// wired-in worker path implements. `All` — last payload, abnormal flag and
/// failure flag — is that canonical contract and the only one this crate
/// carries; it is also the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryKind {
    /// Last payload, abnormal flag and failure flag, the canonical reply
    /// shape every literal end-to-end scenario exercises.
    #[default]
    All,
}

/// A command broadcast by the dispatcher to every worker's command channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Ask every worker to report on every instance it owns within `zone`.
    Query {
        /// Correlates this query's partial results and final reply.
        cmd_id: CmdId,
        /// The zone to restrict the reply to.
        zone: Zone,
        /// The sub-kind of information requested.
        kind: QueryKind,
    },
    /// Ask every worker to reset every `TimeSeries` it owns, restarting
    /// warm-up. Workers debounce repeated resets.
    Reset,
}

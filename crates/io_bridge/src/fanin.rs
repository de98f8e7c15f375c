//! Dashboard query fan-in: a `CmdId` completes once every worker's partial
//! result has arrived, and its entry is forgotten either way — on
//! completion by merging, or on staleness by the timeout sweep.
//!
//! **[SUPPLEMENT]** the timeout sweep itself resolves an Open Question the
//! original implementation leaves unaddressed (a worker that never replies
//! leaks its `cmdId` entry forever); see DESIGN.md.

use std::collections::BTreeMap;
use std::time::Instant;

use protocol::{CmdId, PartialQueryResult};
use transport::DashboardReport;

/// The partial results collected so far for one in-flight `cmdId`.
struct PendingQuery {
    partials: Vec<PartialQueryResult>,
    first_seen: Instant,
}

/// Accumulates partial query results per `cmdId` until every worker has
/// answered, then yields the merged report; independently tracks age so a
/// worker that never answers doesn't leak its entry forever.
#[derive(Default)]
pub(crate) struct QueryFanIn {
    pending: BTreeMap<CmdId, PendingQuery>,
}

impl QueryFanIn {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Folds in one worker's partial result for `cmd_id`. Returns the
    /// merged report once `num_workers` partials have arrived for it.
    pub(crate) fn record(&mut self, cmd_id: CmdId, partial: PartialQueryResult, num_workers: usize, now: Instant) -> Option<DashboardReport> {
        let pending = self.pending.entry(cmd_id).or_insert_with(|| PendingQuery {
            partials: Vec::new(),
            first_seen: now,
        });
        pending.partials.push(partial);

        if pending.partials.len() < num_workers {
            return None;
        }

        let pending = self.pending.remove(&cmd_id).expect("just inserted above");
        let mut report = DashboardReport::new();
        for partial in pending.partials {
            for (key, entry) in partial {
                report.insert(key, entry);
            }
        }
        Some(report)
    }

    /// Removes and returns the `cmdId`s that have been incomplete for at
    /// least `timeout`, so the caller can log and drop them.
    pub(crate) fn sweep_stale(&mut self, timeout: std::time::Duration, now: Instant) -> Vec<CmdId> {
        let stale: Vec<CmdId> = self
            .pending
            .iter()
            .filter(|(_, pending)| now.duration_since(pending.first_seen) >= timeout)
            .map(|(cmd_id, _)| *cmd_id)
            .collect();
        for cmd_id in &stale {
            let _ = self.pending.remove(cmd_id);
        }
        stale
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use protocol::{InstanceId, InstanceKey, InstanceKind, QueryResultEntry, Zone};

    use super::QueryFanIn;

    fn key(id: u64) -> InstanceKey {
        InstanceKey::new(Zone::Turbonet, InstanceKind::Server, InstanceId::Node(id))
    }

    #[test]
    fn merges_once_every_worker_has_answered() {
        let mut fanin = QueryFanIn::new();
        let now = Instant::now();

        assert!(fanin.record(1, vec![(key(1), QueryResultEntry::default())], 2, now).is_none());
        let merged = fanin.record(1, vec![(key(2), QueryResultEntry::default())], 2, now);
        assert!(merged.is_some());
        assert!(!merged.unwrap().is_empty());
    }

    #[test]
    fn sweep_drops_entries_older_than_timeout() {
        let mut fanin = QueryFanIn::new();
        let start = Instant::now();
        let _ = fanin.record(1, vec![(key(1), QueryResultEntry::default())], 2, start);

        let later = start + Duration::from_secs(10);
        let stale = fanin.sweep_stale(Duration::from_secs(5), later);
        assert_eq!(stale, vec![1]);

        // Swept entries are gone: a late-arriving partial starts fresh.
        assert!(fanin.record(1, vec![(key(1), QueryResultEntry::default())], 2, later).is_none());
    }

    #[test]
    fn sweep_leaves_fresh_entries_alone() {
        let mut fanin = QueryFanIn::new();
        let start = Instant::now();
        let _ = fanin.record(1, vec![(key(1), QueryResultEntry::default())], 2, start);

        let soon = start + Duration::from_millis(100);
        assert!(fanin.sweep_stale(Duration::from_secs(5), soon).is_empty());
    }
}

//! The mutable state owned by one worker: its `instances` map, the reset
//! debounce clock, and the processed-record counter the heartbeat task
//! reports. Guarded by a single mutex so the worker's three tasks can share
//! it without any other worker ever touching it — the one-owner-per-key
//! invariant only requires that no *other* worker's task reaches in, not
//! that a single task exclusively owns it within a worker.

use std::collections::HashMap;
use std::time::Instant;

use detector::{observe, DetectorConfig, InstanceState};
use protocol::{AlertKind, InstanceKey, InstanceRecord, PartialQueryResult, QueryResultEntry, Zone};
use tracing::warn;

/// Per-worker state: every instance it owns, keyed by `InstanceKey`.
pub(crate) struct WorkerState {
    instances: HashMap<InstanceKey, InstanceState>,
    last_reset: Option<Instant>,
    processed: u64,
}

impl WorkerState {
    pub(crate) fn new() -> Self {
        Self {
            instances: HashMap::new(),
            last_reset: None,
            processed: 0,
        }
    }

    /// Number of records processed since the worker started.
    pub(crate) fn processed(&self) -> u64 {
        self.processed
    }

    /// Feeds one record through the detector rules, returning the alert to
    /// emit, if any. A single bad record can never poison the worker: the
    /// detector rules are pure functions over the record's own fields and
    /// never panic on malformed numeric input (NaN is filtered, zero
    /// totals default ratios to zero), so no `catch` is needed here to
    /// satisfy §7's "one bad record must never stall the channels".
    pub(crate) fn observe(&mut self, record: &InstanceRecord, cfg: &DetectorConfig, now: Instant) -> Option<AlertKind> {
        let state = self.instances.entry(record.key).or_insert_with(InstanceState::new);
        self.processed += 1;
        observe(state, record, cfg, now)
    }

    /// Builds this worker's partial answer to `Command::Query { zone, .. }`.
    pub(crate) fn query(&self, zone: Zone) -> PartialQueryResult {
        self.instances
            .iter()
            .filter(|(key, _)| key.zone == zone)
            .map(|(key, state)| {
                (
                    *key,
                    QueryResultEntry {
                        payload: state.last_payload().cloned(),
                        abnormal: state.is_abnormal(),
                        failure: state.failure_state,
                    },
                )
            })
            .collect()
    }

    /// Resets every owned time series, restarting warm-up. Debounced: a
    /// reset within `debounce` of the previous one is a no-op.
    pub(crate) fn reset(&mut self, now: Instant, debounce: std::time::Duration) {
        if let Some(last) = self.last_reset {
            if now.duration_since(last) < debounce {
                warn!("reset debounced, ignoring duplicate RESET command");
                return;
            }
        }
        self.last_reset = Some(now);
        for state in self.instances.values_mut() {
            state.reset_time_series();
        }
    }
}

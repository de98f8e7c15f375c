//! Periodic dispatcher throughput logging.
//!
//! **[SUPPLEMENT]** grounded on `util/dispatcher.py`'s `_print_desc` loop:
//! every `stats_interval` the dispatcher logs, per worker, its current
//! inbound queue depth and the average time spent exploding and routing a
//! snapshot, plus the total number of distinct instances seen so far.

use std::time::Duration;

use tracing::info;
use worker::WorkerHandle;

/// Accumulates dispatch timings and the latest known instance count
/// between two stats log lines, then resets the timings. Instance count is
/// carried here rather than read back out of the dispatcher's
/// `InstanceMapping` — that map stays task-local to the data task, touched
/// by no one else.
#[derive(Default)]
pub(crate) struct DispatchStats {
    batches: u64,
    total_dispatch_time: Duration,
    instance_count: usize,
}

impl DispatchStats {
    pub(crate) fn record(&mut self, elapsed: Duration, instance_count: usize) {
        self.batches += 1;
        self.total_dispatch_time += elapsed;
        self.instance_count = instance_count;
    }

    fn average(&self) -> Duration {
        if self.batches == 0 {
            Duration::ZERO
        } else {
            self.total_dispatch_time / self.batches as u32
        }
    }

    fn reset(&mut self) {
        self.batches = 0;
        self.total_dispatch_time = Duration::ZERO;
    }
}

/// Logs one line per worker with its current inbound depth, then a summary
/// line with the average snapshot-dispatch latency and total instance
/// count, and clears the accumulated timings for the next interval.
pub(crate) fn log_and_reset(workers: &[WorkerHandle], stats: &mut DispatchStats) {
    for worker in workers {
        info!(worker = worker.index(), depth = worker.inbound_depth(), "worker inbound queue depth");
    }
    info!(
        avg_dispatch_time_us = stats.average().as_micros() as u64,
        instance_count = stats.instance_count,
        "dispatcher throughput"
    );
    stats.reset();
}

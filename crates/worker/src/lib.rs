#![deny(
    trivial_numeric_casts,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    unused_results
)]
#![warn(rust_2021_compatibility, unreachable_pub)]

//! A worker owns a disjoint subset of monitored instances and runs three
//! cooperating tasks against them: a data task applying detector rules and
//! emitting alerts, a command task answering dashboard queries and handling
//! resets, and a heartbeat task logging a running processed-record count.
//!
//! The three tasks share one worker's state through [`state::WorkerState`]
//! behind a single `std::sync::Mutex`, never held across an `.await` point.
//! No two workers ever touch the same state: the dispatcher pins every
//! `InstanceKey` to exactly one worker for the run's lifetime (§4.4), so the
//! mutex here only ever arbitrates between one worker's own three tasks.

mod state;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use detector::DetectorConfig;
use protocol::{AlertRecord, CmdId, Command, InstanceRecord, PartialQueryResult, QueryKind};
use state::WorkerState;
use task::{labels::TaskLabels, TaskCleaner, TaskManager};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Detector thresholds plus the worker-specific timing knobs that are not
/// part of the k-sigma rule itself.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Thresholds and cooldown shared by every per-kind detector rule.
    pub detector: DetectorConfig,
    /// Minimum interval between two honored RESET commands.
    pub reset_debounce: Duration,
    /// Period of the heartbeat task's processed-count log line.
    pub heartbeat_interval: Duration,
}

/// The channels the dispatcher uses to route work to one worker. Cheaply
/// cloneable; every clone refers to the same underlying worker.
#[derive(Clone)]
pub struct WorkerHandle {
    index: usize,
    data_tx: mpsc::Sender<Vec<InstanceRecord>>,
    cmd_tx: mpsc::Sender<Command>,
}

impl WorkerHandle {
    /// This worker's index in the pool, `0..num_workers`.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Hands `batch` to this worker without blocking. Returns `false` (and
    /// drops the batch) if the worker's inbound channel is still full from
    /// a previous batch — the overload guard of §5: "discards a new batch
    /// ... if the previous batch for the same worker is still in flight."
    pub fn try_dispatch(&self, batch: Vec<InstanceRecord>) -> bool {
        self.data_tx.try_send(batch).is_ok()
    }

    /// Approximate number of batches currently queued for this worker,
    /// used by the dispatcher's periodic depth log.
    pub fn inbound_depth(&self) -> usize {
        self.data_tx.max_capacity() - self.data_tx.capacity()
    }

    /// Broadcasts `command` to this worker. Awaits channel capacity:
    /// commands are rare and must never be silently dropped the way an
    /// overloaded data batch may be.
    pub async fn send_command(&self, command: Command) -> Result<(), mpsc::error::SendError<Command>> {
        self.cmd_tx.send(command).await
    }
}

/// Spawns a worker's three tasks and returns the handle the dispatcher uses
/// to route work to it.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    index: usize,
    cfg: WorkerConfig,
    data_channel_size: usize,
    cmd_channel_size: usize,
    anom_tx: mpsc::Sender<AlertRecord>,
    res_tx: mpsc::Sender<(CmdId, PartialQueryResult)>,
    task_manager: &mut TaskManager,
) -> WorkerHandle {
    let (data_tx, data_rx) = mpsc::channel(data_channel_size);
    let (cmd_tx, cmd_rx) = mpsc::channel(cmd_channel_size);
    let shared = Arc::new(Mutex::new(WorkerState::new()));
    let process_labels = task_manager.process_labels();

    let data_labels = TaskLabels::new("worker", &format!("worker/{index}/data"), "dispatcher");
    let data_handle = tokio::spawn(run_data_task(
        shared.clone(),
        cfg.detector,
        data_rx,
        anom_tx,
        process_labels.clone(),
        data_labels.clone(),
    ));
    task_manager.register(data_handle, &data_labels);

    let cmd_labels = TaskLabels::new("worker", &format!("worker/{index}/command"), "dispatcher");
    let cmd_handle = tokio::spawn(run_command_task(
        shared.clone(),
        cfg.reset_debounce,
        cmd_rx,
        res_tx,
        process_labels.clone(),
        cmd_labels.clone(),
    ));
    task_manager.register(cmd_handle, &cmd_labels);

    let heartbeat_labels = TaskLabels::new("worker", &format!("worker/{index}/heartbeat"), "internal");
    let heartbeat_handle = tokio::spawn(run_heartbeat_task(
        index,
        shared,
        cfg.heartbeat_interval,
        process_labels,
        heartbeat_labels.clone(),
    ));
    task_manager.register(heartbeat_handle, &heartbeat_labels);

    WorkerHandle { index, data_tx, cmd_tx }
}

async fn run_data_task(
    shared: Arc<Mutex<WorkerState>>,
    detector_cfg: DetectorConfig,
    mut data_rx: mpsc::Receiver<Vec<InstanceRecord>>,
    anom_tx: mpsc::Sender<AlertRecord>,
    process_labels: task::labels::ProcessLabels,
    task_labels: TaskLabels,
) -> Box<dyn TaskCleaner> {
    while let Some(batch) = data_rx.recv().await {
        let now = Instant::now();
        for record in &batch {
            let alert_kind = {
                let mut state = shared.lock().expect("worker state mutex poisoned");
                state.observe(record, &detector_cfg, now)
            };
            let Some(kind) = alert_kind else { continue };

            let alert = match record.key.id {
                protocol::InstanceId::Node(id) => match record.key.kind {
                    protocol::InstanceKind::Server => Some(AlertRecord::server(record.key.zone, kind, id)),
                    protocol::InstanceKind::Switch => Some(AlertRecord::switch(record.key.zone, kind, id)),
                    _ => None,
                },
                protocol::InstanceId::Link(src, dst) => Some(AlertRecord::link(record.key.zone, kind, (src, dst))),
            };

            if let Some(alert) = alert {
                if anom_tx.send(alert).await.is_err() {
                    warn!("anomaly channel closed, dropping alert");
                }
            }
        }
    }
    TaskManager::no_task_cleaner(process_labels, task_labels)
}

async fn run_command_task(
    shared: Arc<Mutex<WorkerState>>,
    reset_debounce: Duration,
    mut cmd_rx: mpsc::Receiver<Command>,
    res_tx: mpsc::Sender<(CmdId, PartialQueryResult)>,
    process_labels: task::labels::ProcessLabels,
    task_labels: TaskLabels,
) -> Box<dyn TaskCleaner> {
    while let Some(command) = cmd_rx.recv().await {
        match command {
            Command::Query { cmd_id, zone, kind: QueryKind::All } => {
                let partial = {
                    let state = shared.lock().expect("worker state mutex poisoned");
                    state.query(zone)
                };
                if res_tx.send((cmd_id, partial)).await.is_err() {
                    warn!(%cmd_id, "query response channel closed, dropping partial result");
                }
            }
            Command::Reset => {
                let mut state = shared.lock().expect("worker state mutex poisoned");
                state.reset(Instant::now(), reset_debounce);
            }
        }
    }
    TaskManager::no_task_cleaner(process_labels, task_labels)
}

async fn run_heartbeat_task(
    index: usize,
    shared: Arc<Mutex<WorkerState>>,
    interval: Duration,
    process_labels: task::labels::ProcessLabels,
    task_labels: TaskLabels,
) -> Box<dyn TaskCleaner> {
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; skip it so the first log happens
    // after a full interval has elapsed, not at startup.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let processed = shared.lock().expect("worker state mutex poisoned").processed();
        debug!(worker = index, %processed, "worker heartbeat");
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use detector::DetectorConfig;
    use protocol::{Command, InstanceId, InstanceKey, InstanceKind, InstanceRecord, Payload, QueryKind, ServerPayload, Zone};
    use task::TaskManager;
    use tokio::sync::mpsc;

    use super::{spawn, WorkerConfig};

    fn detector_cfg() -> DetectorConfig {
        DetectorConfig {
            k: 3.0,
            normal_window_length: 5,
            abnormal_window_length: 2,
            cooldown: Duration::from_secs(30),
            cpu_jitter_sigma: 0.0,
            mem_jitter_sigma: 0.0,
            link_util_thres: 0.5,
            link_packet_num_thres: 10_000,
            history_len_limit: 30,
        }
    }

    fn record(id: u64, cpu: f64) -> InstanceRecord {
        InstanceRecord {
            key: InstanceKey::new(Zone::Turbonet, InstanceKind::Server, InstanceId::Node(id)),
            observed_at: std::time::SystemTime::now(),
            active: true,
            payload: Payload::Server(ServerPayload {
                cpu_util: vec![cpu],
                dram_usage_pct: 0.0,
            }),
        }
    }

    #[tokio::test]
    async fn sustained_shift_emits_exactly_one_alert() {
        let mut task_manager = TaskManager::new();
        let (anom_tx, mut anom_rx) = mpsc::channel(16);
        let (res_tx, _res_rx) = mpsc::channel(16);

        let handle = spawn(
            0,
            WorkerConfig {
                detector: detector_cfg(),
                reset_debounce: Duration::from_secs(10),
                heartbeat_interval: Duration::from_secs(15),
            },
            16,
            16,
            anom_tx,
            res_tx,
            &mut task_manager,
        );

        for _ in 0..7 {
            assert!(handle.try_dispatch(vec![record(1, 10.0)]));
        }
        for _ in 0..2 {
            assert!(handle.try_dispatch(vec![record(1, 50.0)]));
        }

        let alert = tokio::time::timeout(Duration::from_secs(1), anom_rx.recv())
            .await
            .expect("alert arrives")
            .expect("channel open");
        assert_eq!(alert.server_id, Some(1));

        let no_more = tokio::time::timeout(Duration::from_millis(200), anom_rx.recv()).await;
        assert!(no_more.is_err(), "no second alert expected");
    }

    #[tokio::test]
    async fn query_returns_a_partial_result_even_when_empty() {
        let mut task_manager = TaskManager::new();
        let (anom_tx, _anom_rx) = mpsc::channel(16);
        let (res_tx, mut res_rx) = mpsc::channel(16);

        let handle = spawn(
            0,
            WorkerConfig {
                detector: detector_cfg(),
                reset_debounce: Duration::from_secs(10),
                heartbeat_interval: Duration::from_secs(15),
            },
            16,
            16,
            anom_tx,
            res_tx,
            &mut task_manager,
        );

        handle
            .send_command(Command::Query {
                cmd_id: 42,
                zone: Zone::Turbonet,
                kind: QueryKind::All,
            })
            .await
            .expect("command delivered");

        let (cmd_id, partial) = tokio::time::timeout(Duration::from_secs(1), res_rx.recv())
            .await
            .expect("reply arrives")
            .expect("channel open");
        assert_eq!(cmd_id, 42);
        assert!(partial.is_empty());
    }
}

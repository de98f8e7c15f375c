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

//! Explodes measurement snapshots into per-instance records and routes each
//! to the worker shard that owns its `InstanceKey`, pinning new instances to
//! a uniformly random worker on first sight. Broadcasts commands unchanged
//! to every worker. Builds the per-zone link topology once, from the first
//! snapshot that carries link records.

mod mapping;
mod stats;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mapping::InstanceMapping;
use protocol::{Command, MeasurementSnapshot, Topology};
use stats::DispatchStats;
use task::labels::TaskLabels;
use task::{TaskCleaner, TaskManager};
use tokio::sync::mpsc;
use tracing::warn;
use worker::WorkerHandle;

/// Dispatcher timing knobs.
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Number of workers in the pool; must equal `workers.len()` at spawn
    /// time.
    pub num_workers: usize,
    /// Period of the throughput/queue-depth log line.
    pub stats_interval: Duration,
}

/// Spawns the dispatcher's three tasks: snapshot explode-and-route, command
/// broadcast, and periodic stats logging. Consumes `data_rx`/`cmd_rx`,
/// which the IO bridge's outbound ends feed.
pub fn spawn(
    cfg: DispatcherConfig,
    workers: Vec<WorkerHandle>,
    topology: Arc<Mutex<Topology>>,
    data_rx: mpsc::Receiver<MeasurementSnapshot>,
    cmd_rx: mpsc::Receiver<Command>,
    task_manager: &mut TaskManager,
) {
    assert_eq!(workers.len(), cfg.num_workers, "worker pool size must match DispatcherConfig::num_workers");

    let dispatch_stats = Arc::new(Mutex::new(DispatchStats::default()));
    let process_labels = task_manager.process_labels();

    let data_labels = TaskLabels::new("dispatcher", "dispatcher/data", "io_bridge");
    let data_handle = tokio::spawn(run_data_task(
        workers.clone(),
        topology,
        data_rx,
        dispatch_stats.clone(),
        process_labels.clone(),
        data_labels.clone(),
    ));
    task_manager.register(data_handle, &data_labels);

    let cmd_labels = TaskLabels::new("dispatcher", "dispatcher/command", "io_bridge");
    let cmd_handle = tokio::spawn(run_command_task(workers.clone(), cmd_rx, process_labels.clone(), cmd_labels.clone()));
    task_manager.register(cmd_handle, &cmd_labels);

    let stats_labels = TaskLabels::new("dispatcher", "dispatcher/stats", "internal");
    let stats_handle = tokio::spawn(run_stats_task(
        workers,
        dispatch_stats,
        cfg.stats_interval,
        process_labels,
        stats_labels.clone(),
    ));
    task_manager.register(stats_handle, &stats_labels);
}

async fn run_data_task(
    workers: Vec<WorkerHandle>,
    topology: Arc<Mutex<Topology>>,
    mut data_rx: mpsc::Receiver<MeasurementSnapshot>,
    dispatch_stats: Arc<Mutex<DispatchStats>>,
    process_labels: task::labels::ProcessLabels,
    task_labels: TaskLabels,
) -> Box<dyn TaskCleaner> {
    let mut mapping = InstanceMapping::new(workers.len());

    while let Some(snapshot) = data_rx.recv().await {
        let start = Instant::now();

        if snapshot.has_links() {
            let mut topology = topology.lock().expect("topology mutex poisoned");
            if !topology.is_built() {
                topology.build(&snapshot);
            }
        }

        let observed_at = std::time::SystemTime::now();
        let records = snapshot.explode(observed_at);

        let mut batches: Vec<Vec<protocol::InstanceRecord>> = (0..workers.len()).map(|_| Vec::new()).collect();
        for record in records {
            let worker_index = mapping.worker_for(record.key);
            batches[worker_index].push(record);
        }

        for (worker_index, batch) in batches.into_iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            if !workers[worker_index].try_dispatch(batch) {
                warn!(worker = worker_index, "worker inbound channel full, dropping batch");
            }
        }

        dispatch_stats.lock().expect("dispatch stats mutex poisoned").record(start.elapsed(), mapping.instance_count());
    }

    TaskManager::no_task_cleaner(process_labels, task_labels)
}

async fn run_command_task(
    workers: Vec<WorkerHandle>,
    mut cmd_rx: mpsc::Receiver<Command>,
    process_labels: task::labels::ProcessLabels,
    task_labels: TaskLabels,
) -> Box<dyn TaskCleaner> {
    while let Some(command) = cmd_rx.recv().await {
        for worker in &workers {
            if worker.send_command(command.clone()).await.is_err() {
                warn!(worker = worker.index(), "worker command channel closed, command not delivered");
            }
        }
    }
    TaskManager::no_task_cleaner(process_labels, task_labels)
}

async fn run_stats_task(
    workers: Vec<WorkerHandle>,
    dispatch_stats: Arc<Mutex<DispatchStats>>,
    interval: Duration,
    process_labels: task::labels::ProcessLabels,
    task_labels: TaskLabels,
) -> Box<dyn TaskCleaner> {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let mut stats = dispatch_stats.lock().expect("dispatch stats mutex poisoned");
        stats::log_and_reset(&workers, &mut stats);
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use detector::DetectorConfig;
    use protocol::{Command, MeasurementSnapshot, Payload, QueryKind, ServerRecord, Zone};
    use task::TaskManager;
    use tokio::sync::mpsc;
    use worker::WorkerConfig;

    use super::{spawn, DispatcherConfig};

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

    fn worker_cfg() -> WorkerConfig {
        WorkerConfig {
            detector: detector_cfg(),
            reset_debounce: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(15),
        }
    }

    #[tokio::test]
    async fn routes_a_snapshot_and_answers_a_query() {
        let mut task_manager = TaskManager::new();
        let (anom_tx, _anom_rx) = mpsc::channel(16);
        let (res_tx, mut res_rx) = mpsc::channel(16);

        let workers: Vec<_> = (0..3)
            .map(|i| worker::spawn(i, worker_cfg(), 16, 16, anom_tx.clone(), res_tx.clone(), &mut task_manager))
            .collect();

        let (data_tx, data_rx) = mpsc::channel(16);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let topology = std::sync::Arc::new(std::sync::Mutex::new(protocol::Topology::new()));

        spawn(
            DispatcherConfig {
                num_workers: 3,
                stats_interval: Duration::from_secs(20),
            },
            workers,
            topology,
            data_rx,
            cmd_rx,
            &mut task_manager,
        );

        let mut snapshot = MeasurementSnapshot::new(Zone::Turbonet);
        let _ = snapshot.servers.insert(
            1,
            ServerRecord {
                active: true,
                cpu_util: vec![10.0],
                dram_usage_pct: 20.0,
            },
        );
        data_tx.send(snapshot).await.expect("send succeeds");

        cmd_tx
            .send(Command::Query {
                cmd_id: 7,
                zone: Zone::Turbonet,
                kind: QueryKind::All,
            })
            .await
            .expect("command delivered");

        let mut replies = Vec::new();
        for _ in 0..3 {
            let (cmd_id, partial) = tokio::time::timeout(Duration::from_secs(1), res_rx.recv())
                .await
                .expect("reply arrives")
                .expect("channel open");
            assert_eq!(cmd_id, 7);
            replies.push(partial);
        }

        let total_entries: usize = replies.iter().map(|partial| partial.len()).sum();
        assert_eq!(total_entries, 1, "exactly one worker owns the single server instance");

        let (_, entry) = replies.into_iter().find(|partial| !partial.is_empty()).unwrap().remove(0);
        assert!(matches!(entry.payload, Some(Payload::Server(_))));
    }

    #[tokio::test]
    async fn builds_topology_once_from_first_link_snapshot() {
        let mut task_manager = TaskManager::new();
        let (anom_tx, _anom_rx) = mpsc::channel(16);
        let (res_tx, _res_rx) = mpsc::channel(16);

        let workers: Vec<_> = (0..2)
            .map(|i| worker::spawn(i, worker_cfg(), 16, 16, anom_tx.clone(), res_tx.clone(), &mut task_manager))
            .collect();

        let (data_tx, data_rx) = mpsc::channel(16);
        let (_cmd_tx, cmd_rx) = mpsc::channel(16);
        let topology = std::sync::Arc::new(std::sync::Mutex::new(protocol::Topology::new()));

        spawn(
            DispatcherConfig {
                num_workers: 2,
                stats_interval: Duration::from_secs(20),
            },
            workers,
            topology.clone(),
            data_rx,
            cmd_rx,
            &mut task_manager,
        );

        let mut snapshot = MeasurementSnapshot::new(Zone::Turbonet);
        let _ = snapshot.links.insert(
            (1, 2),
            protocol::LinkRecord {
                active: true,
                nsh_num: 0,
                syn_num: 0,
                dns_num: 0,
                utilization: 0.1,
            },
        );
        data_tx.send(snapshot).await.expect("send succeeds");

        tokio::time::sleep(Duration::from_millis(50)).await;
        let topology = topology.lock().expect("topology mutex poisoned");
        assert!(topology.is_built());
        assert_eq!(topology.neighbors(Zone::Turbonet, 1).map(|s| s.contains(&2)), Some(true));
    }
}

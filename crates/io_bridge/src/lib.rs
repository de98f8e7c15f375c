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

//! Owns the four bounded channels between the transport adapter and the
//! detection core (§4.5): `data`/`cmd` carry inbound snapshots and commands
//! out to the dispatcher, `anom`/`res` carry alerts and query replies back
//! in from the worker pool. Four tasks implement the bridge's
//! responsibilities: outbound polling, inbound demux, alert draining, and
//! dashboard query fan-in.

mod fanin;

use std::sync::Arc;
use std::time::{Duration, Instant};

use fanin::QueryFanIn;
use protocol::{AlertRecord, CmdId, Command, PartialQueryResult};
use task::labels::TaskLabels;
use task::{TaskCleaner, TaskManager};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use transport::{AnomalyReport, Endpoint, InboundMessage, OutboundMessage, Transport};

/// Timing and sizing knobs for the IO bridge's four tasks.
#[derive(Debug, Clone, Copy)]
pub struct IoBridgeConfig {
    /// Poll period `I` for the outbound `GET_DCN_INFO` requests.
    pub poll_interval: Duration,
    /// How often the alert-drain task ships a batched anomaly report,
    /// provided it is non-empty.
    pub alert_flush_interval: Duration,
    /// How long an in-flight query may go without every worker answering
    /// before its partial results are dropped.
    pub query_timeout: Duration,
    /// Expected number of workers; a query completes once this many
    /// partial results have arrived for its `cmdId`.
    pub num_workers: usize,
    /// If false, alerts are logged but never shipped to the regulator —
    /// §6's `send_reports` knob.
    pub send_reports: bool,
}

/// Spawns the IO bridge's four tasks.
///
/// `data_tx`/`cmd_tx` are the dispatcher's inbound ends; `anom_rx`/`res_rx`
/// are the receiving ends of the channels every worker's `anom_tx`/`res_tx`
/// were cloned from. The bridge does not construct the worker pool or the
/// dispatcher itself — it only owns the channel endpoints that connect them
/// to the transport.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    transport: Arc<dyn Transport>,
    cfg: IoBridgeConfig,
    data_tx: mpsc::Sender<protocol::MeasurementSnapshot>,
    cmd_tx: mpsc::Sender<Command>,
    anom_rx: mpsc::Receiver<AlertRecord>,
    res_rx: mpsc::Receiver<(CmdId, PartialQueryResult)>,
    task_manager: &mut TaskManager,
) {
    let process_labels = task_manager.process_labels();

    let poll_labels = TaskLabels::new("io_bridge", "io_bridge/poll", "transport");
    let poll_handle = tokio::spawn(run_poll_task(
        transport.clone(),
        cfg.poll_interval,
        process_labels.clone(),
        poll_labels.clone(),
    ));
    task_manager.register(poll_handle, &poll_labels);

    let demux_labels = TaskLabels::new("io_bridge", "io_bridge/demux", "transport");
    let demux_handle = tokio::spawn(run_demux_task(
        transport.clone(),
        data_tx,
        cmd_tx,
        process_labels.clone(),
        demux_labels.clone(),
    ));
    task_manager.register(demux_handle, &demux_labels);

    let alert_labels = TaskLabels::new("io_bridge", "io_bridge/alert_drain", "worker");
    let alert_handle = tokio::spawn(run_alert_drain_task(
        transport.clone(),
        anom_rx,
        cfg.alert_flush_interval,
        cfg.send_reports,
        process_labels.clone(),
        alert_labels.clone(),
    ));
    task_manager.register(alert_handle, &alert_labels);

    let fanin_labels = TaskLabels::new("io_bridge", "io_bridge/query_fanin", "worker");
    let fanin_handle = tokio::spawn(run_query_fanin_task(
        transport,
        res_rx,
        cfg.num_workers,
        cfg.query_timeout,
        process_labels,
        fanin_labels.clone(),
    ));
    task_manager.register(fanin_handle, &fanin_labels);
}

/// Outbound poll loop (§4.5.1): every `poll_interval`, submits a
/// `GET_DCN_INFO` request to the measurer and the simulator. Sleeps for
/// `interval - elapsed` to hold a steady period; if processing already
/// exceeded the interval, skips the sleep entirely rather than drifting
/// further behind.
async fn run_poll_task(
    transport: Arc<dyn Transport>,
    poll_interval: Duration,
    process_labels: task::labels::ProcessLabels,
    task_labels: TaskLabels,
) -> Box<dyn TaskCleaner> {
    loop {
        let tick_start = Instant::now();

        for endpoint in [Endpoint::Measurer, Endpoint::Simulator] {
            if let Err(err) = transport.send(endpoint, OutboundMessage::GetDcnInfo).await {
                warn!(?endpoint, %err, "get-dcn-info request skipped this cycle");
                if matches!(err, transport::Error::Closed) {
                    return TaskManager::no_task_cleaner(process_labels, task_labels);
                }
            }
        }

        let elapsed = tick_start.elapsed();
        if let Some(remaining) = poll_interval.checked_sub(elapsed) {
            tokio::time::sleep(remaining).await;
        }
    }
}

/// Inbound demux loop (§4.5.2): blocks on the transport, classifies each
/// message by type, and hands snapshots to the dispatcher's `data` channel
/// or commands to its `cmd` channel. A transport error is logged and the
/// loop simply tries again; a closed transport ends the task rather than
/// busy-looping on an endpoint that will never produce another message.
async fn run_demux_task(
    transport: Arc<dyn Transport>,
    data_tx: mpsc::Sender<protocol::MeasurementSnapshot>,
    cmd_tx: mpsc::Sender<Command>,
    process_labels: task::labels::ProcessLabels,
    task_labels: TaskLabels,
) -> Box<dyn TaskCleaner> {
    loop {
        match transport.recv().await {
            Ok(InboundMessage::Reply(snapshot) | InboundMessage::SimulatorCmdReply(snapshot)) => {
                // A defensive check against a malformed message keeps it
                // from poisoning the rest of the pipeline; a real
                // REPLY/SIMULATOR_CMD_REPLY always carries its zone.
                if snapshot.zone.is_none() {
                    warn!("inbound snapshot missing zone tag, dropping");
                    continue;
                }
                if data_tx.send(snapshot).await.is_err() {
                    warn!("dispatcher data channel closed, dropping snapshot");
                }
            }
            Ok(InboundMessage::AbnormalDetectorCmd(command)) => {
                if cmd_tx.send(command).await.is_err() {
                    warn!("dispatcher command channel closed, dropping command");
                }
            }
            Err(transport::Error::Closed) => {
                warn!("transport closed, demux task stopping");
                return TaskManager::no_task_cleaner(process_labels, task_labels);
            }
            Err(err) => {
                warn!(%err, "transport receive failed, current cycle skipped");
            }
        }
    }
}

/// Alert-drain loop (§4.5.3): continuously drains alerts from the worker
/// pool, merges them into a deduplicating [`AnomalyReport`], and ships a
/// single batched report roughly every `flush_interval`, provided it is
/// non-empty and `send_reports` is enabled.
async fn run_alert_drain_task(
    transport: Arc<dyn Transport>,
    mut anom_rx: mpsc::Receiver<AlertRecord>,
    flush_interval: Duration,
    send_reports: bool,
    process_labels: task::labels::ProcessLabels,
    task_labels: TaskLabels,
) -> Box<dyn TaskCleaner> {
    let mut report = AnomalyReport::new();
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            alert = anom_rx.recv() => {
                match alert {
                    Some(alert) => report.record(alert),
                    None => {
                        warn!("anomaly channel closed, alert drain task stopping");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                if report.is_empty() {
                    continue;
                }
                let shipped = std::mem::replace(&mut report, AnomalyReport::new());
                if !send_reports {
                    debug!("send_reports disabled, anomaly report logged but not shipped");
                    continue;
                }
                if let Err(err) = transport.send(Endpoint::Regulator, OutboundMessage::HandleFailureAbnormal(shipped)).await {
                    warn!(%err, "anomaly report not delivered this cycle");
                }
            }
        }
    }

    TaskManager::no_task_cleaner(process_labels, task_labels)
}

/// Dashboard query fan-in loop (§4.5.4): accumulates per-worker partial
/// results by `cmdId`, ships the merged report once every worker has
/// answered, and periodically sweeps `cmdId`s that have been incomplete for
/// longer than `query_timeout` (a worker that never answers must not leak
/// its entry forever — see DESIGN.md).
async fn run_query_fanin_task(
    transport: Arc<dyn Transport>,
    mut res_rx: mpsc::Receiver<(CmdId, PartialQueryResult)>,
    num_workers: usize,
    query_timeout: Duration,
    process_labels: task::labels::ProcessLabels,
    task_labels: TaskLabels,
) -> Box<dyn TaskCleaner> {
    let mut fanin = QueryFanIn::new();
    let mut sweep_ticker = tokio::time::interval(query_timeout);
    sweep_ticker.tick().await;

    loop {
        tokio::select! {
            partial = res_rx.recv() => {
                match partial {
                    Some((cmd_id, partial)) => {
                        if let Some(report) = fanin.record(cmd_id, partial, num_workers, Instant::now()) {
                            if let Err(err) = transport.send(Endpoint::Dashboard, OutboundMessage::DashboardReply { cmd_id, report }).await {
                                warn!(%cmd_id, %err, "dashboard reply not delivered");
                            }
                        }
                    }
                    None => {
                        warn!("query response channel closed, query fan-in task stopping");
                        break;
                    }
                }
            }
            _ = sweep_ticker.tick() => {
                for cmd_id in fanin.sweep_stale(query_timeout, Instant::now()) {
                    warn!(%cmd_id, "query timed out waiting for all workers to answer, dropping");
                }
            }
        }
    }

    TaskManager::no_task_cleaner(process_labels, task_labels)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use protocol::{Command, MeasurementSnapshot, QueryKind, Zone};
    use task::TaskManager;
    use tokio::sync::mpsc;
    use transport::{mock, Endpoint, InboundMessage, OutboundMessage};

    use super::{spawn, IoBridgeConfig};

    fn cfg() -> IoBridgeConfig {
        IoBridgeConfig {
            poll_interval: Duration::from_millis(30),
            alert_flush_interval: Duration::from_millis(20),
            query_timeout: Duration::from_secs(5),
            num_workers: 1,
            send_reports: true,
        }
    }

    #[tokio::test]
    async fn polls_measurer_and_simulator_every_interval() {
        let mut task_manager = TaskManager::new();
        let (transport, driver) = mock::channel();
        let (data_tx, _data_rx) = mpsc::channel(16);
        let (cmd_tx, _cmd_rx) = mpsc::channel(16);
        let (_anom_tx, anom_rx) = mpsc::channel(16);
        let (_res_tx, res_rx) = mpsc::channel(16);

        spawn(std::sync::Arc::new(transport), cfg(), data_tx, cmd_tx, anom_rx, res_rx, &mut task_manager);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..2 {
            let (endpoint, message) = tokio::time::timeout(Duration::from_secs(1), driver.next_outbound())
                .await
                .expect("poll happens")
                .expect("driver open");
            assert!(matches!(message, OutboundMessage::GetDcnInfo));
            let _ = seen.insert(endpoint);
        }
        assert!(seen.contains(&Endpoint::Measurer));
        assert!(seen.contains(&Endpoint::Simulator));
    }

    #[tokio::test]
    async fn demuxes_snapshot_to_data_and_command_to_cmd() {
        let mut task_manager = TaskManager::new();
        let (transport, driver) = mock::channel();
        let (data_tx, mut data_rx) = mpsc::channel(16);
        let (cmd_tx, mut cmd_rx) = mpsc::channel(16);
        let (_anom_tx, anom_rx) = mpsc::channel(16);
        let (_res_tx, res_rx) = mpsc::channel(16);

        spawn(std::sync::Arc::new(transport), cfg(), data_tx, cmd_tx, anom_rx, res_rx, &mut task_manager);

        driver.push_inbound(InboundMessage::Reply(MeasurementSnapshot::new(Zone::Turbonet)));
        let snapshot = tokio::time::timeout(Duration::from_secs(1), data_rx.recv())
            .await
            .expect("snapshot arrives")
            .expect("channel open");
        assert_eq!(snapshot.zone, Some(Zone::Turbonet));

        driver.push_inbound(InboundMessage::AbnormalDetectorCmd(Command::Reset));
        let command = tokio::time::timeout(Duration::from_secs(1), cmd_rx.recv())
            .await
            .expect("command arrives")
            .expect("channel open");
        assert_eq!(command, Command::Reset);
    }

    #[tokio::test]
    async fn ships_a_merged_anomaly_report_once_non_empty() {
        let mut task_manager = TaskManager::new();
        let (transport, driver) = mock::channel();
        let (data_tx, _data_rx) = mpsc::channel(16);
        let (cmd_tx, _cmd_rx) = mpsc::channel(16);
        let (anom_tx, anom_rx) = mpsc::channel(16);
        let (_res_tx, res_rx) = mpsc::channel(16);

        spawn(std::sync::Arc::new(transport), cfg(), data_tx, cmd_tx, anom_rx, res_rx, &mut task_manager);

        anom_tx
            .send(protocol::AlertRecord::server(Zone::Turbonet, protocol::AlertKind::Abnormal, 1))
            .await
            .expect("send succeeds");

        loop {
            let (_endpoint, message) = tokio::time::timeout(Duration::from_secs(1), driver.next_outbound())
                .await
                .expect("message observed")
                .expect("driver open");
            if let OutboundMessage::HandleFailureAbnormal(report) = message {
                assert!(!report.is_empty());
                break;
            }
        }
    }

    #[tokio::test]
    async fn ships_a_dashboard_reply_once_every_worker_answers() {
        let mut task_manager = TaskManager::new();
        let (transport, driver) = mock::channel();
        let (data_tx, _data_rx) = mpsc::channel(16);
        let (cmd_tx, _cmd_rx) = mpsc::channel(16);
        let (_anom_tx, anom_rx) = mpsc::channel(16);
        let (res_tx, res_rx) = mpsc::channel(16);

        let mut config = cfg();
        config.num_workers = 2;
        spawn(std::sync::Arc::new(transport), config, data_tx, cmd_tx, anom_rx, res_rx, &mut task_manager);

        res_tx.send((9, vec![])).await.expect("send succeeds");
        res_tx.send((9, vec![])).await.expect("send succeeds");

        loop {
            let (_endpoint, message) = tokio::time::timeout(Duration::from_secs(1), driver.next_outbound())
                .await
                .expect("message observed")
                .expect("driver open");
            if let OutboundMessage::DashboardReply { cmd_id, .. } = message {
                assert_eq!(cmd_id, 9);
                break;
            }
        }
    }

    #[test]
    fn query_kind_all_is_default() {
        assert_eq!(QueryKind::default(), QueryKind::All);
    }
}

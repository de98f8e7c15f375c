//! Wires the dispatcher, worker pool and IO bridge into one running
//! pipeline (§2), given any [`transport::Transport`] implementation and a
//! resolved [`config::Settings`].
//!
//! This is the application-specific assembly the reference pipeline
//! library's own generic engine does not need to know about: the topology
//! here is fixed (exactly one dispatcher, one worker pool, one IO bridge),
//! not a configurable DAG of named receivers/processors/exporters, so it is
//! wired directly with `tokio::sync::mpsc` channels rather than through a
//! generic processor-chain abstraction.

use std::sync::{Arc, Mutex};

use config::Settings;
use protocol::Topology;
use task::TaskManager;
use tokio::sync::mpsc;
use transport::Transport;
use worker::WorkerHandle;

/// A running pipeline's handles, kept alive only to prevent the channels
/// they own from being dropped; the pipeline itself runs entirely in
/// spawned tasks owned by `task_manager`.
pub struct Pipeline {
    /// The pool of worker handles, in `0..num_workers` order.
    pub workers: Vec<WorkerHandle>,
    /// The per-zone link topology, built once by the dispatcher from the
    /// first snapshot carrying link records.
    pub topology: Arc<Mutex<Topology>>,
}

/// Spawns every task of the detection pipeline: `settings.num_workers`
/// workers, the dispatcher, and the IO bridge, connected by the
/// `data`/`cmd`/`anom`/`res` channels of §4.5.
pub fn spawn(transport: Arc<dyn Transport>, settings: &Settings, task_manager: &mut TaskManager) -> Pipeline {
    let (anom_tx, anom_rx) = mpsc::channel(settings.anom_channel_size);
    let (res_tx, res_rx) = mpsc::channel(settings.res_channel_size);

    let worker_cfg = settings.worker_config();
    let workers: Vec<WorkerHandle> = (0..settings.num_workers)
        .map(|index| {
            worker::spawn(
                index,
                worker_cfg,
                settings.data_channel_size,
                settings.cmd_channel_size,
                anom_tx.clone(),
                res_tx.clone(),
                task_manager,
            )
        })
        .collect();
    // The IO bridge only ever receives on anom_rx/res_rx; dropping these
    // local senders once every worker holds its own clone lets those
    // channels close naturally if every worker ever exits.
    drop(anom_tx);
    drop(res_tx);

    let topology = Arc::new(Mutex::new(Topology::new()));
    let (data_tx, data_rx) = mpsc::channel(settings.data_channel_size);
    let (cmd_tx, cmd_rx) = mpsc::channel(settings.cmd_channel_size);

    dispatcher::spawn(settings.dispatcher_config(), workers.clone(), topology.clone(), data_rx, cmd_rx, task_manager);

    io_bridge::spawn(transport, settings.io_bridge_config(), data_tx, cmd_tx, anom_rx, res_rx, task_manager);

    Pipeline { workers, topology }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use config::Settings;
    use protocol::{Command, MeasurementSnapshot, QueryKind, ServerRecord, Zone};
    use task::TaskManager;
    use transport::{mock, InboundMessage, OutboundMessage};

    use super::spawn;

    fn fast_settings() -> Settings {
        Settings {
            interval_secs: 3600,
            num_workers: 2,
            alert_flush_interval_secs: 1,
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn end_to_end_query_round_trip() {
        let mut task_manager = TaskManager::new();
        let (transport, driver) = mock::channel();
        let settings = fast_settings();

        let _pipeline = spawn(std::sync::Arc::new(transport), &settings, &mut task_manager);

        let mut snapshot = MeasurementSnapshot::new(Zone::Turbonet);
        let _ = snapshot.servers.insert(
            1,
            ServerRecord {
                active: true,
                cpu_util: vec![10.0],
                dram_usage_pct: 10.0,
            },
        );
        driver.push_inbound(InboundMessage::Reply(snapshot));
        // Give the snapshot time to flow through demux -> dispatcher ->
        // worker before the query is issued; the data and command paths are
        // independent channels with no cross-ordering guarantee (§5).
        tokio::time::sleep(Duration::from_millis(50)).await;

        driver.push_inbound(InboundMessage::AbnormalDetectorCmd(Command::Query {
            cmd_id: 1,
            zone: Zone::Turbonet,
            kind: QueryKind::All,
        }));

        loop {
            let (_endpoint, message) = tokio::time::timeout(Duration::from_secs(2), driver.next_outbound())
                .await
                .expect("a dashboard reply eventually arrives")
                .expect("driver open");
            if let OutboundMessage::DashboardReply { cmd_id, report } = message {
                assert_eq!(cmd_id, 1);
                assert!(!report.is_empty(), "the single server instance should be in the merged report");
                break;
            }
        }
    }
}

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

//! The boundary between the detection core and the message bus.
//!
//! Everything in §6 of the specification this crate implements — the
//! inbound `REPLY`/`SIMULATOR_CMD_REPLY`/`ABNORMAL_DETECTOR_CMD` messages and
//! the outbound `REQUEST`/`ABNORMAL_DETECTOR_CMD`/`ABNORMAL_DETECTOR_CMD_REPLY`
//! messages — is captured here as the [`Transport`] trait plus the message
//! types it exchanges. The wire encoding and the RPC stack that actually
//! moves bytes are out of scope; a real deployment provides its own
//! `Transport` impl backed by a message bus. [`mock::MockTransport`] is a
//! channel-backed stand-in used for local simulation and for this
//! workspace's own integration tests, mirroring the role of the original
//! implementation's `netio/mock/sender.py` and `netio/mock/receiver.py`.

pub mod mock;
pub mod report;

use protocol::{Command, CmdId, MeasurementSnapshot};

pub use report::{AnomalyReport, DashboardReport};

/// The four RPC peers the detection core talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// The physical fabric's measurement endpoint.
    Measurer,
    /// The simulator's measurement endpoint.
    Simulator,
    /// The downstream alert regulator.
    Regulator,
    /// The dashboard that issues queries and receives replies.
    Dashboard,
}

/// A message the core hands to the transport adapter for delivery.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// `REQUEST` of type `GET_DCN_INFO`, sent to [`Endpoint::Measurer`] or
    /// [`Endpoint::Simulator`] every poll interval.
    GetDcnInfo,
    /// `ABNORMAL_DETECTOR_CMD` of type `HANDLE_FAILURE_ABNORMAL`, sent to
    /// [`Endpoint::Regulator`].
    HandleFailureAbnormal(AnomalyReport),
    /// `ABNORMAL_DETECTOR_CMD_REPLY` tagged `SUCCESSFUL`, sent to
    /// [`Endpoint::Dashboard`] once a query's partial results have all
    /// arrived.
    DashboardReply {
        /// The `cmdId` this reply answers.
        cmd_id: CmdId,
        /// The merged report.
        report: DashboardReport,
    },
}

/// A message the transport adapter hands to the core after receiving it
/// from the message bus.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// `REPLY`: a measurement snapshot from the physical fabric.
    Reply(MeasurementSnapshot),
    /// `SIMULATOR_CMD_REPLY`: a measurement snapshot from the simulator.
    SimulatorCmdReply(MeasurementSnapshot),
    /// `ABNORMAL_DETECTOR_CMD`: a dashboard query or a reset request.
    AbnormalDetectorCmd(Command),
}

/// Errors a `Transport` implementation can surface. Every variant is
/// recovered locally by the IO bridge per §7's error taxonomy: a
/// transport error logs a warning and the current poll cycle is skipped,
/// it never aborts the process.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The named endpoint could not be reached this cycle.
    #[error("transport endpoint unreachable (endpoint: {endpoint:?}, reason: {reason})")]
    Unreachable {
        /// The endpoint that could not be reached.
        endpoint: Endpoint,
        /// Why the endpoint could not be reached.
        reason: String,
    },
    /// The transport was closed and will never produce another message.
    #[error("transport closed")]
    Closed,
}

/// The boundary between the core and the message bus: submit outbound
/// messages, block for the next inbound one. Implementations must not hold
/// any lock shared with the rest of the pipeline across a `recv` call —
/// §5 confines blocking I/O to this trait's own call sites.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Submits `message` for delivery to `endpoint`. `maxRetry = 0` in the
    /// original: a single attempt, no retry within this call.
    async fn send(&self, endpoint: Endpoint, message: OutboundMessage) -> Result<(), Error>;

    /// Blocks until the next inbound message is available.
    async fn recv(&self) -> Result<InboundMessage, Error>;
}

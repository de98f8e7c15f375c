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

//! Data model shared by every stage of the detection pipeline: the zones and
//! instance kinds a snapshot can describe, the per-kind payloads carried by a
//! measurement snapshot, the commands and query replies exchanged with the
//! dashboard, and the alert records shipped to the regulator.
//!
//! None of the types here know about channels, tasks, or transport; they are
//! plain data, so the dispatcher, worker and IO bridge crates can share one
//! vocabulary without depending on each other.

pub mod alert;
pub mod command;
pub mod instance;
pub mod payload;
pub mod query;
pub mod snapshot;
pub mod topology;

pub use alert::{AlertKind, AlertRecord};
pub use command::{Command, CmdId, QueryKind};
pub use instance::{InstanceId, InstanceKey, InstanceKind, Zone};
pub use payload::{LinkPayload, Payload, ServerPayload, SfciPayload, SwitchPayload, VnfiPayload};
pub use query::{PartialQueryResult, QueryResultEntry};
pub use snapshot::{InstanceRecord, LinkRecord, MeasurementSnapshot, ServerRecord, SfciRecord, SwitchRecord, VnfiRecord};
pub use topology::Topology;

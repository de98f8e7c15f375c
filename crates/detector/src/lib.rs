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

//! Per-kind anomaly rules (SERVER/LINK/SFCI/SWITCH/VNFI) and the per-instance
//! detection state they mutate.
//!
//! This crate knows how to turn one [`protocol::InstanceRecord`] into an
//! optional alert, given the detection state accumulated for that instance
//! so far. It does not know about channels, tasks, or workers — the `worker`
//! crate owns the `instances` map and calls [`observe`] once per record.

mod config;
mod rules;
mod state;

pub use config::DetectorConfig;
pub use rules::observe;
pub use state::{InstanceState, METRIC_CPU_UTILIZATION, METRIC_DNS_RATIO, METRIC_MEMORY_UTILIZATION, METRIC_SYN_RATIO};

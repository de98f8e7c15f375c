#![deny(
    trivial_numeric_casts,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    unused_results,
    variant_size_differences
)]
#![warn(rust_2021_compatibility, unreachable_pub)]

//! An online anomaly detector for a data-center network fabric.
//!
//! A transport adapter polls (or is pushed) periodic measurement snapshots
//! of every monitored server, link, fabric port, switch and VNFI. The
//! dispatcher explodes each snapshot into per-instance records and routes
//! every record to the one worker that owns that instance's key. Each
//! worker keeps a lagging k-sigma time series per metric, applies the
//! kind-specific detector rule, and debounces the alerts it emits. Workers
//! also answer dashboard queries fanned out by the IO bridge and merged
//! back into one report per query.
//!
//! This crate wires the pieces together: [`pipeline::spawn`] starts the
//! dispatcher, worker pool and IO bridge behind any [`transport::Transport`]
//! implementation, driven by a [`config::Settings`].

mod pipeline;

pub use config;
pub use detector;
pub use dispatcher;
pub use io_bridge;
pub use pipeline::{spawn, Pipeline};
pub use protocol;
pub use stats;
pub use task;
pub use transport;
pub use worker;

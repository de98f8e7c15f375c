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

//! Incremental rolling mean/variance (`StatWindow`) and the lagging,
//! k-sigma `TimeSeries` built on top of it. Pure numeric state: no
//! channels, no tasks, no knowledge of instance kinds.

mod series;
mod window;

pub use series::{TimeSeries, TimeSeriesParams};
pub use window::StatWindow;

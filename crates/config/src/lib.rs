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

//! Loads and validates the YAML configuration of the detection pipeline
//! (§6) and resolves it into the typed config structs every crate in the
//! pipeline actually takes: [`detector::DetectorConfig`],
//! [`worker::WorkerConfig`], [`dispatcher::DispatcherConfig`], and
//! [`io_bridge::IoBridgeConfig`], plus the four channel sizes the launcher
//! uses to build the `data`/`cmd`/`anom`/`res` channels.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Errors loading or validating a configuration file.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The config file could not be opened or parsed.
    #[error("invalid configuration file `{file}` - {message}")]
    InvalidConfig {
        /// The path to the config file.
        file: String,
        /// The error message.
        message: String,
    },
    /// The config file parsed but failed field validation.
    #[error("configuration file `{file}` failed validation - {message}")]
    Invalid {
        /// The path to the config file.
        file: String,
        /// The validation error message.
        message: String,
    },
}

/// The pipeline's full configuration, as loaded from YAML (§6). Every field
/// has a default matching the spec's documented default, so a config file
/// only needs to override the knobs a deployment actually changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    /// Poll period `I`, in seconds, for outbound `GET_DCN_INFO` requests.
    #[validate(range(min = 1))]
    pub interval_secs: u64,
    /// Number of workers in the pool.
    #[validate(range(min = 1, max = 4096))]
    pub num_workers: usize,
    /// Sigma multiplier for the k-sigma anomaly predicate.
    #[validate(range(min = 0.1))]
    pub k: f64,
    /// Warm-up length (samples) before any `TimeSeries` can flag an
    /// anomaly.
    #[validate(range(min = 1))]
    pub normal_window_length: usize,
    /// Consecutive-outlier length (samples) required to flag an anomaly.
    #[validate(range(min = 1))]
    pub abnormal_window_length: usize,
    /// Minimum interval, in seconds, between two alerts of the same kind
    /// for the same instance.
    pub cooldown_secs: u64,
    /// Length of the bounded per-instance history ring.
    #[validate(range(min = 1))]
    pub history_len_limit: usize,
    /// Link utilization threshold below which no link alert fires.
    #[validate(range(min = 0.0, max = 1.0))]
    pub link_util_thres: f64,
    /// Packet-count threshold a link's SYN or DNS traffic must clear
    /// before it can be flagged.
    pub link_packet_num_thres: u64,
    /// Jitter floor for the server CPU-utilization time series, in the
    /// metric's own units.
    #[validate(range(min = 0.0))]
    pub cpu_jitter_sigma: f64,
    /// Jitter floor for the server memory-utilization time series.
    #[validate(range(min = 0.0))]
    pub mem_jitter_sigma: f64,
    /// If false, alerts are logged but never shipped to the regulator.
    pub send_reports: bool,
    /// Period, in seconds, of each worker's heartbeat log line.
    pub heartbeat_interval_secs: u64,
    /// Period, in seconds, of the dispatcher's throughput/queue-depth log
    /// line.
    pub dispatcher_stats_interval_secs: u64,
    /// How long, in seconds, an in-flight dashboard query may go without
    /// every worker answering before its partial results are dropped.
    pub query_timeout_secs: u64,
    /// Minimum interval, in seconds, between two honored RESET commands.
    pub reset_debounce_secs: u64,
    /// How often, in seconds, the alert-drain task ships a batched
    /// anomaly report.
    pub alert_flush_interval_secs: u64,
    /// Capacity of the dispatcher-to-worker `data` channel.
    #[validate(range(min = 1))]
    pub data_channel_size: usize,
    /// Capacity of the dispatcher-to-worker `cmd` channel.
    #[validate(range(min = 1))]
    pub cmd_channel_size: usize,
    /// Capacity of the worker-to-bridge `anom` channel.
    #[validate(range(min = 1))]
    pub anom_channel_size: usize,
    /// Capacity of the worker-to-bridge `res` channel.
    #[validate(range(min = 1))]
    pub res_channel_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_secs: 3,
            num_workers: 18,
            k: 3.0,
            normal_window_length: 5,
            abnormal_window_length: 2,
            cooldown_secs: 30,
            history_len_limit: 30,
            link_util_thres: 0.6,
            link_packet_num_thres: 10_000,
            cpu_jitter_sigma: 10.0,
            mem_jitter_sigma: 5.0,
            send_reports: true,
            heartbeat_interval_secs: 15,
            dispatcher_stats_interval_secs: 20,
            query_timeout_secs: 5,
            reset_debounce_secs: 10,
            alert_flush_interval_secs: 1,
            data_channel_size: 100,
            cmd_channel_size: 100,
            anom_channel_size: 100,
            res_channel_size: 100,
        }
    }
}

impl Settings {
    /// Loads and validates a YAML configuration file, falling back to
    /// [`Settings::default`] for every field the file does not set.
    pub fn load<P: AsRef<Path>>(config_file_path: P) -> Result<Self, Error> {
        let config_file_name = config_file_path.as_ref().display().to_string();

        tracing::debug!("loading {}", config_file_name);

        let config_file = File::open(config_file_path).map_err(|err| Error::InvalidConfig {
            file: config_file_name.clone(),
            message: err.to_string(),
        })?;
        let reader = BufReader::new(config_file);
        let settings: Settings = serde_yaml::from_reader(reader).map_err(|err| Error::InvalidConfig {
            file: config_file_name.clone(),
            message: err.to_string(),
        })?;

        settings.validate().map_err(|err| Error::Invalid {
            file: config_file_name.clone(),
            message: err.to_string(),
        })?;

        tracing::debug!("{} loaded", config_file_name);

        Ok(settings)
    }

    /// Resolves the detector thresholds (§4.1-4.3) shared by every
    /// per-kind rule.
    pub fn detector_config(&self) -> detector::DetectorConfig {
        detector::DetectorConfig {
            k: self.k,
            normal_window_length: self.normal_window_length,
            abnormal_window_length: self.abnormal_window_length,
            cooldown: Duration::from_secs(self.cooldown_secs),
            cpu_jitter_sigma: self.cpu_jitter_sigma,
            mem_jitter_sigma: self.mem_jitter_sigma,
            link_util_thres: self.link_util_thres,
            link_packet_num_thres: self.link_packet_num_thres,
            history_len_limit: self.history_len_limit,
        }
    }

    /// Resolves a worker's timing knobs (§4.3).
    pub fn worker_config(&self) -> worker::WorkerConfig {
        worker::WorkerConfig {
            detector: self.detector_config(),
            reset_debounce: Duration::from_secs(self.reset_debounce_secs),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
        }
    }

    /// Resolves the dispatcher's timing knobs (§4.4).
    pub fn dispatcher_config(&self) -> dispatcher::DispatcherConfig {
        dispatcher::DispatcherConfig {
            num_workers: self.num_workers,
            stats_interval: Duration::from_secs(self.dispatcher_stats_interval_secs),
        }
    }

    /// Resolves the IO bridge's timing knobs (§4.5).
    pub fn io_bridge_config(&self) -> io_bridge::IoBridgeConfig {
        io_bridge::IoBridgeConfig {
            poll_interval: Duration::from_secs(self.interval_secs),
            alert_flush_interval: Duration::from_secs(self.alert_flush_interval_secs),
            query_timeout: Duration::from_secs(self.query_timeout_secs),
            num_workers: self.num_workers,
            send_reports: self.send_reports,
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::Settings;

    #[test]
    fn defaults_match_the_documented_knobs() {
        let settings = Settings::default();
        assert_eq!(settings.interval_secs, 3);
        assert_eq!(settings.num_workers, 18);
        assert_eq!(settings.cooldown_secs, 30);
        assert_eq!(settings.history_len_limit, 30);
    }

    #[test]
    fn loads_a_partial_override_and_keeps_remaining_defaults() {
        let mut file = tempfile_with("num_workers: 4\nk: 5.0\n");
        let settings = Settings::load(file.path()).expect("config loads");
        assert_eq!(settings.num_workers, 4);
        assert_eq!(settings.k, 5.0);
        assert_eq!(settings.interval_secs, 3, "unset fields keep their default");
        let _ = file.flush();
    }

    #[test]
    fn rejects_a_zero_interval() {
        let file = tempfile_with("interval_secs: 0\n");
        let result = Settings::load(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn rejects_a_missing_file() {
        let result = Settings::load("/nonexistent/path/to/config.yaml");
        assert!(result.is_err());
    }

    fn tempfile_with(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile created");
        file.write_all(contents.as_bytes()).expect("write succeeds");
        file
    }
}

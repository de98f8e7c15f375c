//! Launches the anomaly detection pipeline: loads a YAML configuration,
//! wires it to a transport and runs until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use config::Settings;
use task::labels::ProcessLabels;
use task::TaskManager;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use transport::mock;

/// Command-line arguments of the detector process.
#[derive(Debug, Parser)]
#[command(name = "anomaly-detector", about = "Online anomaly detector for a data-center network fabric")]
struct Args {
    /// Path to the YAML configuration file. When omitted, every knob takes
    /// its documented default.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init()?;

    let args = Args::parse();
    let settings = match args.config {
        Some(path) => Settings::load(&path)?,
        None => Settings::default(),
    };

    // No production message-bus transport ships with this crate; the
    // channel-backed mock stands in for it so the pipeline has something
    // to poll and reply to when run standalone.
    let (transport, driver) = mock::channel();
    let _driver = driver;

    let mut task_manager = TaskManager::with_process_labels(ProcessLabels::new("anomaly-detector"));
    let _pipeline = dcn_anomaly_detector::spawn(Arc::new(transport), &settings, &mut task_manager);

    task_manager.join().await;

    Ok(())
}

/// Initializes logging and error reporting.
fn init() -> Result<()> {
    color_eyre::install()?;

    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    Ok(())
}

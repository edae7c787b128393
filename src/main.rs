//! `sdalink` binary: run a workflow job against simulated devices.
//!
//! Loads the job JSON, runs it against the demonstration device (or the
//! addresses given on the command line) and prints every device run log as
//! JSON. Ctrl-C cancels the run; devices not yet reached stay pending.

mod cli;

use std::{error::Error, time::Duration};

use clap::Parser;
use sdalink::{
    device::ScannedDevice,
    job::{FsAssetStore, Job, JobRunner, LogSink},
    session::SessionConfig,
    transport::{SimulatedDevice, SimulatedFleet, simulated::DUMMY_ADDRESS},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Also captures the library's `log` records.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let job: Job = serde_json::from_slice(&tokio::fs::read(&cli.job).await?)?;

    let addresses = if cli.devices.is_empty() {
        vec![DUMMY_ADDRESS.to_owned()]
    } else {
        cli.devices
    };
    let devices: Vec<ScannedDevice> = addresses.into_iter().map(ScannedDevice::new).collect();

    let config = SessionConfig::default()
        .connect_timeout(Duration::from_secs(cli.connect_timeout_secs))
        .response_timeout(Duration::from_secs(cli.response_timeout_secs))
        .write_interval(Duration::from_millis(cli.write_interval_ms));
    let token = CancellationToken::new();
    let runner = JobRunner::new(
        SimulatedFleet::new().with_device(SimulatedDevice::dummy()),
        FsAssetStore::new(cli.assets),
        LogSink,
    )
    .session_config(config)
    .cancellation_token(token.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling job");
            token.cancel();
        }
    });

    let report = runner.run(&job, &devices).await?;
    info!(
        succeeded = report.succeeded(),
        with_failures = report.with_failures(),
        unreachable = report.unreachable(),
        not_run = report.not_run(),
        "job finished"
    );
    let logs: Vec<_> = report.run_logs().collect();
    println!("{}", serde_json::to_string_pretty(&logs)?);
    Ok(())
}

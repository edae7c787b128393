//! Log records emitted while running jobs.
//!
//! Captured through the shared `logtest` logger; tests touching it run
//! serially so records never leak between them.

use std::time::Duration;

use rstest::rstest;
use sdalink::{
    device::ScannedDevice,
    job::{Audience, Job, JobRunner, Task},
    transport::{SimulatedDevice, SimulatedFleet},
};
use sdalink_testing::{LoggerHandle, MemoryAssetStore, RecordingSink, echo, logger, silent};
use serial_test::serial;

fn run(device: SimulatedDevice, audience: &[&str], tasks: Vec<Task>) {
    let address = device.address().clone();
    let runner = JobRunner::new(
        SimulatedFleet::new().with_device(device),
        MemoryAssetStore::new(),
        RecordingSink::new(),
    );
    let job = Job::new("wf-log", Audience::from_endpoints(audience), tasks);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime");
    runtime
        .block_on(runner.run(&job, &[ScannedDevice::new(address)]))
        .expect("job runs");
}

fn quick(address: &str, endpoint: &str) -> SimulatedDevice {
    SimulatedDevice::new(address, endpoint).ack_delay(Duration::ZERO)
}

#[rstest]
#[serial(job_logs)]
fn audience_mismatch_is_warned(mut logger: LoggerHandle) {
    logger.clear();
    run(
        quick("AA:10", "ep-other").respond_with(echo()),
        &["ep-expected"],
        vec![Task::read_file("t1", "/a")],
    );
    assert!(logger.contains("which is not in the audience"));
}

#[rstest]
#[serial(job_logs)]
fn failed_task_is_warned(mut logger: LoggerHandle) {
    logger.clear();
    run(
        quick("AA:11", "ep-1").respond_with(silent()),
        &["ep-1"],
        vec![Task::read_file("t1", "/a")],
    );
    assert!(logger.contains("task t1 failed on ep-1"));
}

#[rstest]
#[serial(job_logs)]
fn job_start_is_logged_with_scope(mut logger: LoggerHandle) {
    logger.clear();
    run(
        quick("AA:12", "ep-1").respond_with(echo()),
        &["ep-1"],
        vec![Task::read_file("t1", "/a"), Task::write_file("t2", "/b", "x")],
    );
    assert!(logger.contains("scope=read-data configure"));
}

#![cfg(feature = "metrics")]
//! Tests for the `sdalink` metric helpers and the metrics a job run emits.
//!
//! Values are read back with `metrics_util::debugging::DebuggingRecorder`
//! installed as a thread-local recorder.

use std::time::Duration;

use rstest::rstest;
use sdalink::{
    device::{DeviceAddress, ScannedDevice},
    job::{Audience, Job, JobRunner, Task},
    metrics::{
        self as sdametrics,
        DEVICE_OUTCOMES,
        NOTIFICATIONS_RECEIVED,
        SESSIONS_ACTIVE,
        TASK_OUTCOMES,
        UNITS_WRITTEN,
    },
    session::{SessionConfig, TransportSession},
    transport::{SimulatedDevice, SimulatedFleet, simulated::Fault},
};
use sdalink_testing::{
    MemoryAssetStore,
    RecordingSink,
    counter_value,
    debugging_recorder_setup,
    echo,
    gauge_value,
};

#[rstest]
#[case("succeeded")]
#[case("failed")]
#[case("skipped")]
fn task_outcome_counter_is_labelled(#[case] outcome: &'static str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || sdametrics::inc_task_outcome(outcome));

    assert_eq!(
        counter_value(&snapshotter, TASK_OUTCOMES, Some(("outcome", outcome))),
        1
    );
}

#[test]
fn session_gauge_tracks_open_sessions() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        sdametrics::inc_sessions();
        sdametrics::inc_sessions();
        sdametrics::dec_sessions();
    });

    assert!((gauge_value(&snapshotter, SESSIONS_ACTIVE) - 1.0).abs() < f64::EPSILON);
}

#[test]
fn exchange_counts_units_and_notifications() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let device = SimulatedDevice::new("AA:00", "ep-1")
        .ack_delay(Duration::ZERO)
        .respond_with(echo());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime");

    metrics::with_local_recorder(&recorder, || {
        runtime.block_on(async {
            let mut session = TransportSession::new(
                device.transport(),
                DeviceAddress::new("AA:00"),
                SessionConfig::default(),
            );
            session.connect().await.expect("connect");
            session.request_preferred_mtu().await.expect("mtu");
            session.send_message(&[7_u8; 600]).await.expect("exchange");
            session.disconnect().await;
        });
    });

    assert!(counter_value(&snapshotter, UNITS_WRITTEN, None) >= 3);
    assert!(counter_value(&snapshotter, NOTIFICATIONS_RECEIVED, None) >= 3);
    assert!(gauge_value(&snapshotter, SESSIONS_ACTIVE).abs() < f64::EPSILON);
}

#[test]
fn job_run_counts_device_outcomes() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let fleet = SimulatedFleet::new()
        .with_device(
            SimulatedDevice::new("AA:01", "ep-1")
                .ack_delay(Duration::ZERO)
                .respond_with(echo()),
        )
        .with_device(SimulatedDevice::new("AA:02", "ep-2").with_fault(Fault::RefuseConnect));
    let job = Job::new(
        "wf-m",
        Audience::from_endpoints(["ep-1", "ep-2"]),
        vec![Task::read_file("t1", "/a"), Task::new("t2", "Reboot")],
    );
    let devices = [ScannedDevice::new("AA:01"), ScannedDevice::new("AA:02")];
    let runner = JobRunner::new(fleet, MemoryAssetStore::new(), RecordingSink::new());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime");

    metrics::with_local_recorder(&recorder, || {
        runtime
            .block_on(runner.run(&job, &devices))
            .expect("job runs");
    });

    assert_eq!(
        counter_value(&snapshotter, DEVICE_OUTCOMES, Some(("outcome", "has_failures"))),
        1
    );
    assert_eq!(
        counter_value(&snapshotter, DEVICE_OUTCOMES, Some(("outcome", "connect_failed"))),
        1
    );
    assert_eq!(
        counter_value(&snapshotter, TASK_OUTCOMES, Some(("outcome", "succeeded"))),
        1
    );
    assert_eq!(
        counter_value(&snapshotter, TASK_OUTCOMES, Some(("outcome", "failed"))),
        1
    );
}

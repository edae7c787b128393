//! Helpers for asserting on metrics recorded through a local recorder.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// Create a debugging recorder and the snapshotter that reads it.
#[must_use]
pub fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn find(snapshotter: &Snapshotter, name: &str, label: Option<(&str, &str)>) -> Option<DebugValue> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find(|(key, _, _, _)| {
            key.key().name() == name
                && label.is_none_or(|(k, v)| {
                    key.key()
                        .labels()
                        .any(|l| l.key() == k && l.value() == v)
                })
        })
        .map(|(_, _, _, value)| value)
}

/// Current value of counter `name`, optionally filtered by one label.
#[must_use]
pub fn counter_value(snapshotter: &Snapshotter, name: &str, label: Option<(&str, &str)>) -> u64 {
    match find(snapshotter, name, label) {
        Some(DebugValue::Counter(value)) => value,
        _ => 0,
    }
}

/// Current value of gauge `name`.
#[must_use]
pub fn gauge_value(snapshotter: &Snapshotter, name: &str) -> f64 {
    match find(snapshotter, name, None) {
        Some(DebugValue::Gauge(value)) => value.into_inner(),
        _ => 0.0,
    }
}

//! Metric helpers for `sdalink`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking open device sessions.
pub const SESSIONS_ACTIVE: &str = "sdalink_sessions_active";
/// Name of the counter tracking transport units written and acknowledged.
pub const UNITS_WRITTEN: &str = "sdalink_units_written_total";
/// Name of the counter tracking notifications received.
pub const NOTIFICATIONS_RECEIVED: &str = "sdalink_notifications_received_total";
/// Name of the counter tracking task outcomes.
pub const TASK_OUTCOMES: &str = "sdalink_task_outcomes_total";
/// Name of the counter tracking device dispositions.
pub const DEVICE_OUTCOMES: &str = "sdalink_device_outcomes_total";

/// Increment the open sessions gauge.
pub fn inc_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

/// Decrement the open sessions gauge.
pub fn dec_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

/// Record an acknowledged transport unit.
pub fn inc_units_written() {
    #[cfg(feature = "metrics")]
    counter!(UNITS_WRITTEN).increment(1);
}

/// Record an inbound notification.
pub fn inc_notifications() {
    #[cfg(feature = "metrics")]
    counter!(NOTIFICATIONS_RECEIVED).increment(1);
}

/// Record a task outcome, labelled with its name.
pub fn inc_task_outcome(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(TASK_OUTCOMES, "outcome" => outcome).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record a device disposition, labelled with its name.
pub fn inc_device_outcome(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(DEVICE_OUTCOMES, "outcome" => outcome).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

//! Test doubles and fixtures for exercising `sdalink` without hardware.
//!
//! The doubles here stand in for the collaborators a
//! [`JobRunner`](sdalink::job::JobRunner) talks to: an in-memory asset store,
//! a sink that records everything it is given, and responders that make a
//! [`SimulatedDevice`](sdalink::transport::SimulatedDevice) behave like a
//! device with a small file system.
//!
//! ```rust
//! use sdalink::transport::SimulatedDevice;
//! use sdalink_testing::FileDevice;
//!
//! let files = FileDevice::default().with_file("app.log", "ok");
//! let device = SimulatedDevice::new("AA:00", "ep-1").respond_with(files.responder());
//! # let _ = device;
//! ```

pub mod logging;
pub mod metrics;
pub mod responders;
pub mod stores;

pub use logging::{LoggerHandle, logger};
pub use metrics::{counter_value, debugging_recorder_setup, gauge_value};
pub use responders::{FileDevice, command_responder, echo, silent};
pub use stores::{MemoryAssetStore, RecordingSink};

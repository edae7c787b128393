//! Convenience imports for running jobs against devices.
//!
//! Only the types most callers touch live here. Lower-level pieces such as
//! the packet codec or the fragmenter are imported from their own modules.
//!
//! # Examples
//!
//! ```rust,no_run
//! use sdalink::prelude::*;
//!
//! # async fn run(job: Job, devices: Vec<ScannedDevice>) -> Result<(), JobError> {
//! let fleet = SimulatedFleet::default();
//! let runner = JobRunner::new(fleet, FsAssetStore::new("assets"), LogSink);
//! let report = runner.run(&job, &devices).await?;
//! println!("{} devices succeeded", report.succeeded());
//! # Ok(())
//! # }
//! ```

pub use crate::{
    device::{DeviceAddress, Endpoint, ScannedDevice},
    job::{
        AssetStore,
        Audience,
        FsAssetStore,
        Job,
        JobError,
        JobReport,
        JobRunner,
        LogSink,
        RunSink,
        Task,
    },
    message::Message,
    session::{SessionConfig, SessionError, TransportSession},
    transport::{SimulatedDevice, SimulatedFleet, Transport, TransportFactory},
};

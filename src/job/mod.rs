//! Jobs: named tasks run against every admitted device.
//!
//! A [`Job`] carries its audience and an ordered task list. The
//! [`JobRunner`] walks scanned devices one at a time, opening a
//! [`TransportSession`](crate::session::TransportSession) for each, checking
//! the reported endpoint against the audience and then sending one
//! [`DeviceCommand`] per task. Results go to a [`RunSink`] as a
//! [`DeviceRunLog`] per device, and read outputs are written to the
//! [`AssetStore`].

mod command;
pub mod error;
mod model;
mod run_log;
mod runner;
mod store;

pub use command::{
    CONFIGURE_SEPARATOR,
    CommandParam,
    CommandResolver,
    DeviceCommand,
    FileCommandResolver,
    Operation,
    ResolveError,
    asset_path,
};
pub use error::{JobError, TaskError};
pub use model::{
    Audience,
    CONFIGURE_SCOPE,
    FILE_PARAM,
    FILE_PATH_PARAM,
    Job,
    ParamType,
    READ_SCOPE,
    READ_TASK,
    Task,
    TaskKind,
    TaskParam,
    WRITE_TASK,
};
pub use run_log::{
    CLEAN_RUN_SUMMARY,
    DeviceOutcome,
    DeviceRunLog,
    DeviceState,
    TaskOutcome,
    TaskRunLog,
};
pub use runner::{
    DeviceDisposition,
    DeviceReport,
    JobReport,
    JobRunner,
    OUTPUT_FILE_NAME,
    output_path,
};
pub use store::{AssetStore, FsAssetStore, LogSink, RunSink, SinkError, StoreError};

#[cfg(test)]
mod tests;

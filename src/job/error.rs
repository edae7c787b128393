//! Job and task failures.

use bincode::error::EncodeError;
use thiserror::Error;

use super::{command::ResolveError, store::StoreError};
use crate::session::SessionError;

/// Stable numeric codes written to [`TaskRunLog::error_code`](super::TaskRunLog::error_code).
pub mod code {
    /// The device answered with an empty response.
    pub const EMPTY_RESPONSE: u32 = 1;
    /// No response arrived in time.
    pub const RESPONSE_TIMEOUT: u32 = 2;
    /// The exchange failed on framing, fragmentation or a malformed response.
    pub const PROTOCOL: u32 = 3;
    /// The link dropped during the command.
    pub const LINK_LOST: u32 = 4;
    /// The task could not be turned into a command.
    pub const UNRESOLVED: u32 = 5;
    /// The read output could not be stored.
    pub const STORE: u32 = 6;
}

/// Why a single task failed.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("command encoding failed: {0}")]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("device returned an empty response")]
    EmptyResponse,
    #[error("output could not be stored: {0}")]
    Store(#[source] StoreError),
}

impl TaskError {
    /// Code recorded in the task's run log.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            Self::Resolve(_) => code::UNRESOLVED,
            Self::Encode(_) => code::PROTOCOL,
            Self::EmptyResponse => code::EMPTY_RESPONSE,
            Self::Store(_) => code::STORE,
            Self::Session(err) if err.is_link_lost() => code::LINK_LOST,
            Self::Session(SessionError::ResponseTimeout(_)) => code::RESPONSE_TIMEOUT,
            Self::Session(_) => code::PROTOCOL,
        }
    }

    /// Whether the device can take no further commands.
    #[must_use]
    pub fn is_link_lost(&self) -> bool { matches!(self, Self::Session(err) if err.is_link_lost()) }
}

/// Errors that stop a job before any device is contacted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    /// The job has nothing to run.
    #[error("job {0} has no tasks")]
    NoTasks(String),
    /// No device could ever match.
    #[error("job {0} has an empty audience")]
    EmptyAudience(String),
}

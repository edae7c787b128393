//! Errors raised by a transport session.

use std::time::Duration;

use derive_more::Display;
use thiserror::Error;

use super::SessionState;
use crate::{
    fragment::{FragmentationError, ReassemblyError},
    serial::SerialError,
    transport::TransportError,
};

/// Step of the connect sequence that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum ConnectStage {
    #[display("connect")]
    Link,
    #[display("service discovery")]
    Discovery,
    #[display("notification subscribe")]
    Subscribe,
}

/// Errors emitted by [`TransportSession`](super::TransportSession).
#[derive(Debug, Error)]
pub enum SessionError {
    /// A connect stage failed.
    #[error("{stage} failed: {source}")]
    Connect {
        stage: ConnectStage,
        #[source]
        source: TransportError,
    },
    /// A connect stage did not finish in time.
    #[error("{stage} timed out after {timeout:?}")]
    ConnectTimeout {
        stage: ConnectStage,
        timeout: Duration,
    },
    /// The operation is not allowed in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    /// MTU negotiation failed.
    #[error("mtu negotiation failed: {0}")]
    Mtu(#[source] TransportError),
    /// The endpoint characteristic could not be read.
    #[error("endpoint read failed: {0}")]
    Endpoint(#[source] TransportError),
    /// The message could not be fragmented.
    #[error(transparent)]
    Fragmentation(#[from] FragmentationError),
    /// The message could not be framed.
    #[error(transparent)]
    Serial(#[from] SerialError),
    /// An inbound response was malformed.
    #[error(transparent)]
    Reassembly(#[from] ReassemblyError),
    /// No complete response arrived in time.
    #[error("no response within {0:?}")]
    ResponseTimeout(Duration),
    /// A write was not acknowledged in time.
    #[error("write not acknowledged within {0:?}")]
    WriteTimeout(Duration),
    /// The notification stream ended; the link is gone.
    #[error("device disconnected")]
    Disconnected,
    /// The transport failed mid-command.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),
}

impl SessionError {
    /// Whether the error means the device could not be reached at all.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectTimeout { .. })
    }

    /// Whether the session can no longer carry commands. Any transport
    /// failure mid-command counts, as does an unacknowledged write.
    #[must_use]
    pub fn is_link_lost(&self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::WriteTimeout(_) | Self::Transport(_)
        )
    }
}

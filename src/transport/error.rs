//! Transport error types.

use derive_more::Display;
use thiserror::Error;
use uuid::Uuid;

/// GATT operation a transport error arose from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum TransportOp {
    #[display("connect")]
    Connect,
    #[display("service discovery")]
    Discover,
    #[display("mtu request")]
    RequestMtu,
    #[display("read")]
    Read,
    #[display("write")]
    Write,
    #[display("subscribe")]
    Subscribe,
    #[display("unsubscribe")]
    Unsubscribe,
    #[display("disconnect")]
    Disconnect,
}

/// Errors reported by a [`Transport`](super::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The operation needs an open link.
    #[error("not connected")]
    NotConnected,
    /// The link dropped while the operation was in flight.
    #[error("link lost during {0}")]
    LinkLost(TransportOp),
    /// The peripheral does not expose the service.
    #[error("service {0} not found")]
    ServiceNotFound(Uuid),
    /// The service does not expose the characteristic.
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
    /// The peripheral or stack refused the operation.
    #[error("{op} rejected: {reason}")]
    Rejected { op: TransportOp, reason: String },
    /// Error raised by the underlying BLE stack.
    #[error("{op} failed")]
    Backend {
        op: TransportOp,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TransportError {
    /// Whether the error means the link is gone.
    #[must_use]
    pub fn is_link_lost(&self) -> bool { matches!(self, Self::LinkLost(_) | Self::NotConnected) }
}

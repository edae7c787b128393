//! Session lifecycle states.

use derive_more::Display;

/// Where a [`TransportSession`](super::TransportSession) is in its lifecycle.
///
/// ```text
/// Disconnected -> Connecting -> Connected -> (Running <-> Idle)
///     -> Completed | Failed -> Disconnected
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display)]
pub enum SessionState {
    #[default]
    #[display("disconnected")]
    Disconnected,
    #[display("connecting")]
    Connecting,
    #[display("connected")]
    Connected,
    /// A command is in flight.
    #[display("running")]
    Running,
    /// Ready for the next command.
    #[display("idle")]
    Idle,
    /// Every command has been sent.
    #[display("completed")]
    Completed,
    /// An I/O error or link loss ended the session.
    #[display("failed")]
    Failed,
}

impl SessionState {
    /// Whether commands may be sent.
    #[must_use]
    pub const fn accepts_commands(self) -> bool { matches!(self, Self::Connected | Self::Idle) }

    /// Whether the link is believed to be up.
    #[must_use]
    pub const fn is_linked(self) -> bool {
        matches!(
            self,
            Self::Connected | Self::Running | Self::Idle | Self::Completed
        )
    }
}

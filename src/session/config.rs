//! Timing and sizing knobs for a [`TransportSession`](super::TransportSession).

use std::time::Duration;

use crate::fragment::{FragmentationConfig, Mtu};

/// Configuration for one device session.
///
/// # Default Values
/// - `connect_timeout`: 10 seconds per connect stage
/// - `write_timeout`: 5 seconds per acknowledged write
/// - `response_timeout`: 20 seconds per command
/// - `write_interval`: 200 milliseconds between writes
/// - `preferred_mtu`: [`Mtu::PREFERRED`]
///
/// # Invariants
/// - every duration is at least 1 millisecond once normalized
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bound on each of connect, service discovery and subscribe.
    pub connect_timeout: Duration,
    /// Bound on each write acknowledgement.
    pub write_timeout: Duration,
    /// Bound on waiting for a complete response after the last write.
    pub response_timeout: Duration,
    /// Minimum spacing between consecutive writes.
    pub write_interval: Duration,
    /// MTU asked for when the caller does not name one.
    pub preferred_mtu: Mtu,
    /// Inbound reassembly limits.
    pub fragmentation: FragmentationConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(20),
            write_interval: Duration::from_millis(200),
            preferred_mtu: Mtu::PREFERRED,
            fragmentation: FragmentationConfig::default(),
        }
    }
}

const MIN_DURATION: Duration = Duration::from_millis(1);

impl SessionConfig {
    /// Set the per-stage connect bound.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-write acknowledgement bound.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the per-command response bound.
    #[must_use]
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the spacing between writes.
    #[must_use]
    pub fn write_interval(mut self, interval: Duration) -> Self {
        self.write_interval = interval;
        self
    }

    /// Set the MTU requested by default.
    #[must_use]
    pub fn preferred_mtu(mut self, mtu: Mtu) -> Self {
        self.preferred_mtu = mtu;
        self
    }

    /// Set the inbound reassembly limits.
    #[must_use]
    pub fn fragmentation(mut self, config: FragmentationConfig) -> Self {
        self.fragmentation = config;
        self
    }

    /// Raise zero durations to one millisecond.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use sdalink::session::SessionConfig;
    ///
    /// let config = SessionConfig::default().write_interval(Duration::ZERO).normalized();
    /// assert_eq!(config.write_interval, Duration::from_millis(1));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for duration in [
            &mut self.connect_timeout,
            &mut self.write_timeout,
            &mut self.response_timeout,
            &mut self.write_interval,
        ] {
            *duration = (*duration).max(MIN_DURATION);
        }
        self
    }
}

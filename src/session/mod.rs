//! Per-device protocol session.
//!
//! [`TransportSession`] drives one device through
//! connect, MTU negotiation, endpoint read, command exchange and disconnect
//! over any [`Transport`]. Commands are framed with [`serial::frame`], split
//! by the session's [`Fragmenter`] and written one transport unit at a time:
//! each write future resolves on the peripheral's acknowledgement and writes
//! are spaced by a leaky-bucket limiter. The response is read from the
//! notification stream and stitched together by a [`Reassembler`].

use std::{fmt, future::Future, time::Duration};

use bytes::Bytes;
use futures::{FutureExt, StreamExt};
use leaky_bucket::RateLimiter;
use log::{debug, info, warn};

use crate::{
    device::{DeviceAddress, Endpoint},
    fragment::{Fragmenter, Mtu, Reassembler, WriteQueue},
    serial,
    transport::{CharacteristicId, Notifications, Transport, TransportError, TransportOp},
};

mod config;
mod error;
mod state;

pub use config::SessionConfig;
pub use error::{ConnectStage, SessionError};
pub use state::SessionState;

/// Callback fired once when a session disconnects.
pub type DisconnectHook = Box<dyn FnOnce(&DeviceAddress) + Send>;

/// One device's protocol session over a [`Transport`].
///
/// # Examples
///
/// ```
/// use sdalink::{
///     session::{SessionConfig, SessionState, TransportSession},
///     transport::SimulatedDevice,
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let device = SimulatedDevice::dummy();
/// let mut session =
///     TransportSession::new(device.transport(), device.address().clone(), SessionConfig::default());
/// session.connect().await?;
/// session.request_preferred_mtu().await?;
/// let response = session.send_message(b"operation").await?;
/// assert!(!response.is_empty());
/// session.disconnect().await;
/// assert_eq!(session.state(), SessionState::Disconnected);
/// # Ok(())
/// # }
/// ```
pub struct TransportSession<T> {
    transport: T,
    address: DeviceAddress,
    config: SessionConfig,
    state: SessionState,
    mtu: Mtu,
    endpoint: Option<Endpoint>,
    fragmenter: Fragmenter,
    reassembler: Reassembler,
    notifications: Option<Notifications>,
    limiter: RateLimiter,
    on_disconnect: Option<DisconnectHook>,
}

impl<T> fmt::Debug for TransportSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSession")
            .field("address", &self.address)
            .field("state", &self.state)
            .field("mtu", &self.mtu)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

async fn connect_stage<R>(
    stage: ConnectStage,
    timeout: Duration,
    fut: impl Future<Output = Result<R, TransportError>>,
) -> Result<R, SessionError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(SessionError::Connect { stage, source }),
        Err(_) => Err(SessionError::ConnectTimeout { stage, timeout }),
    }
}

async fn bounded<R>(
    op: TransportOp,
    timeout: Duration,
    fut: impl Future<Output = Result<R, TransportError>>,
) -> Result<R, TransportError> {
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or_else(|_| {
            Err(TransportError::Rejected {
                op,
                reason: format!("timed out after {timeout:?}"),
            })
        })
}

impl<T: Transport> TransportSession<T> {
    /// Create a disconnected session for the device at `address`.
    #[must_use]
    pub fn new(transport: T, address: impl Into<DeviceAddress>, config: SessionConfig) -> Self {
        let config = config.normalized();
        let limiter = RateLimiter::builder()
            .initial(1)
            .refill(1)
            .interval(config.write_interval)
            .max(1)
            .build();
        Self {
            transport,
            address: address.into(),
            config,
            state: SessionState::Disconnected,
            mtu: Mtu::MIN,
            endpoint: None,
            fragmenter: Fragmenter::new(),
            reassembler: Reassembler::new(config.fragmentation),
            notifications: None,
            limiter,
            on_disconnect: None,
        }
    }

    /// Register the callback fired when the session disconnects.
    #[must_use]
    pub fn on_disconnect<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&DeviceAddress) + Send + 'static,
    {
        self.on_disconnect = Some(Box::new(hook));
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState { self.state }

    /// Negotiated MTU, [`Mtu::MIN`] until negotiation succeeds.
    #[must_use]
    pub fn mtu(&self) -> Mtu { self.mtu }

    /// Endpoint read from the device, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<&Endpoint> { self.endpoint.as_ref() }

    /// Address of the device.
    #[must_use]
    pub fn address(&self) -> &DeviceAddress { &self.address }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig { &self.config }

    fn invalid_state(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// Connect, discover services and subscribe to SDA notifications.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is
    /// disconnected, and [`SessionError::Connect`] or
    /// [`SessionError::ConnectTimeout`] naming the stage that failed. A
    /// failed attempt leaves the session [`SessionState::Failed`].
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Disconnected {
            return Err(self.invalid_state("connect"));
        }
        self.state = SessionState::Connecting;
        info!("connecting to {}", self.address);
        match self.open_link().await {
            Ok(notifications) => {
                self.notifications = Some(notifications);
                self.mtu = Mtu::MIN;
                self.state = SessionState::Connected;
                crate::metrics::inc_sessions();
                info!("connected to {}", self.address);
                Ok(())
            }
            Err(err) => {
                warn!("connection to {} failed: {err}", self.address);
                self.state = SessionState::Failed;
                Err(err)
            }
        }
    }

    async fn open_link(&mut self) -> Result<Notifications, SessionError> {
        let timeout = self.config.connect_timeout;
        connect_stage(
            ConnectStage::Link,
            timeout,
            self.transport.connect(&self.address),
        )
        .await?;
        connect_stage(
            ConnectStage::Discovery,
            timeout,
            self.transport.discover_services(),
        )
        .await?;
        connect_stage(
            ConnectStage::Subscribe,
            timeout,
            self.transport.subscribe(CharacteristicId::SDA),
        )
        .await
    }

    /// Ask the device for an MTU of `size` bytes and keep what it grants,
    /// clamped to the supported range.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is connected
    /// and idle, and [`SessionError::Mtu`] when negotiation fails, which also
    /// fails the session.
    pub async fn request_higher_mtu(&mut self, size: u16) -> Result<Mtu, SessionError> {
        if !self.state.accepts_commands() {
            return Err(self.invalid_state("negotiate the mtu"));
        }
        let timeout = self.config.connect_timeout;
        match bounded(
            TransportOp::RequestMtu,
            timeout,
            self.transport.request_mtu(size),
        )
        .await
        {
            Ok(granted) => {
                self.mtu = Mtu::clamped(granted);
                info!(
                    "mtu negotiated with {}: requested={size}, granted={granted}, using={}",
                    self.address, self.mtu
                );
                Ok(self.mtu)
            }
            Err(err) => {
                self.state = SessionState::Failed;
                Err(SessionError::Mtu(err))
            }
        }
    }

    /// [`request_higher_mtu`](Self::request_higher_mtu) with the configured
    /// preferred MTU.
    ///
    /// # Errors
    ///
    /// See [`request_higher_mtu`](Self::request_higher_mtu).
    pub async fn request_preferred_mtu(&mut self) -> Result<Mtu, SessionError> {
        self.request_higher_mtu(self.config.preferred_mtu.get())
            .await
    }

    /// Read the endpoint from the device information service.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is connected
    /// and idle, and [`SessionError::Endpoint`] when the read fails, which
    /// also fails the session.
    pub async fn read_endpoint(&mut self) -> Result<Endpoint, SessionError> {
        if !self.state.accepts_commands() {
            return Err(self.invalid_state("read the endpoint"));
        }
        let timeout = self.config.connect_timeout;
        match bounded(
            TransportOp::Read,
            timeout,
            self.transport.read(CharacteristicId::SERIAL_NUMBER),
        )
        .await
        {
            Ok(raw) => {
                let endpoint = Endpoint::from_characteristic(&raw);
                info!("{} reports endpoint {endpoint}", self.address);
                self.endpoint = Some(endpoint.clone());
                Ok(endpoint)
            }
            Err(err) => {
                self.state = SessionState::Failed;
                Err(SessionError::Endpoint(err))
            }
        }
    }

    /// Send one operation message and wait for the device's response.
    ///
    /// The session is [`SessionState::Running`] while the command is in
    /// flight and returns to [`SessionState::Idle`] afterwards, including
    /// after a timeout or a malformed response. Errors for which
    /// [`SessionError::is_link_lost`] holds leave it
    /// [`SessionState::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is connected
    /// and idle, framing and fragmentation errors before anything is written,
    /// [`SessionError::WriteTimeout`] or [`SessionError::Transport`] when a
    /// write fails, [`SessionError::ResponseTimeout`] when no complete
    /// response arrives in time, [`SessionError::Reassembly`] for malformed
    /// notifications and [`SessionError::Disconnected`] when the notification
    /// stream ends.
    pub async fn send_message(&mut self, message: &[u8]) -> Result<Bytes, SessionError> {
        if !self.state.accepts_commands() {
            return Err(self.invalid_state("send a message"));
        }
        let framed = serial::frame(message)?;
        let batch = self.fragmenter.fragment(framed, self.mtu)?;
        debug!(
            "sending message to {}: sequence={}, packets={}, units={}",
            self.address,
            batch.sequence(),
            batch.len(),
            batch.write_queue().len()
        );
        self.reassembler.reset();
        self.state = SessionState::Running;
        let result = self.exchange(batch.into_write_queue()).await;
        self.state = match &result {
            Err(err) if err.is_link_lost() => SessionState::Failed,
            _ => SessionState::Idle,
        };
        if let Err(err) = &result {
            warn!("command to {} failed: {err}", self.address);
        }
        result
    }

    async fn exchange(&mut self, mut queue: WriteQueue) -> Result<Bytes, SessionError> {
        let Some(notifications) = self.notifications.as_mut() else {
            return Err(SessionError::Disconnected);
        };
        loop {
            match notifications.next().now_or_never() {
                Some(Some(stale)) => debug!("discarding stale notification: len={}", stale.len()),
                Some(None) => return Err(SessionError::Disconnected),
                None => break,
            }
        }

        let write_timeout = self.config.write_timeout;
        while let Some(unit) = queue.pop() {
            self.limiter.acquire(1).await;
            let len = unit.len();
            match tokio::time::timeout(
                write_timeout,
                self.transport.write(CharacteristicId::SDA, unit),
            )
            .await
            {
                Ok(Ok(())) => {
                    crate::metrics::inc_units_written();
                    debug!("unit acknowledged: len={len}, remaining={}", queue.len());
                }
                Ok(Err(err)) => return Err(SessionError::Transport(err)),
                Err(_) => return Err(SessionError::WriteTimeout(write_timeout)),
            }
        }

        let response_timeout = self.config.response_timeout;
        let reassembler = &mut self.reassembler;
        let response = async {
            while let Some(raw) = notifications.next().await {
                crate::metrics::inc_notifications();
                let response = match reassembler.push(&raw) {
                    Ok(Some(response)) => response,
                    Ok(None) => continue,
                    Err(err) => return Err(SessionError::Reassembly(err)),
                };
                debug!(
                    "response complete: sequence={}, fragments={}, len={}",
                    response.sequence(),
                    response.fragments(),
                    response.payload().len()
                );
                return Ok(response.into_payload());
            }
            Err(SessionError::Disconnected)
        };
        tokio::time::timeout(response_timeout, response)
            .await
            .unwrap_or(Err(SessionError::ResponseTimeout(response_timeout)))
    }

    /// Mark the command sequence complete.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is connected
    /// and idle.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        if !self.state.accepts_commands() {
            return Err(self.invalid_state("finish"));
        }
        self.state = SessionState::Completed;
        Ok(())
    }

    /// Tear the session down from any state.
    ///
    /// Unsubscribing and disconnecting are best effort; failures are logged.
    /// The session always ends [`SessionState::Disconnected`] and the
    /// disconnect hook fires on the first call only.
    pub async fn disconnect(&mut self) {
        let timeout = self.config.connect_timeout;
        if self.notifications.take().is_some() {
            crate::metrics::dec_sessions();
            if self.state.is_linked() {
                if let Err(err) = bounded(
                    TransportOp::Unsubscribe,
                    timeout,
                    self.transport.unsubscribe(CharacteristicId::SDA),
                )
                .await
                {
                    debug!("unsubscribe from {} failed: {err}", self.address);
                }
            }
        }
        if self.state != SessionState::Disconnected {
            if let Err(err) = bounded(
                TransportOp::Disconnect,
                timeout,
                self.transport.disconnect(),
            )
            .await
            {
                warn!("disconnect from {} failed: {err}", self.address);
            }
            info!("disconnected from {}", self.address);
        }
        self.state = SessionState::Disconnected;
        self.reassembler.reset();
        if let Some(hook) = self.on_disconnect.take() {
            hook(&self.address);
        }
    }
}

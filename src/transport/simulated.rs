//! A virtual SDA peripheral.
//!
//! [`SimulatedDevice`] describes a device: its address, the endpoint it
//! reports, how it answers operation messages, and which faults to inject.
//! [`SimulatedTransport`] is the [`Transport`] a session drives against it.
//! Written units are parsed with [`PacketCodec`], reassembled, stripped of
//! the serial envelope and handed to the device's [`Responder`]; replies are
//! notified back as firmware-style packets, each followed by a trailer byte.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use futures::{StreamExt, channel::mpsc};
use log::{debug, info, warn};
use tokio_util::codec::Decoder;

use super::{
    CharacteristicId,
    Notifications,
    Transport,
    TransportError,
    TransportFactory,
    TransportOp,
};
use crate::{
    device::{DeviceAddress, Endpoint},
    fragment::{
        FragmentationError,
        Fragmenter,
        Mtu,
        NONCE_REQUEST_LEN,
        Reassembler,
        SINGLE_UNIT_BUFFER_LEN,
    },
    packet::{Packet, PacketCodec},
    serial,
};

/// Trailer byte appended to every notified packet.
pub const NOTIFICATION_TRAILER: u8 = 0x00;

/// Address of the canned demonstration device.
pub const DUMMY_ADDRESS: &str = "DD:7E:7E:BD:AB:78";

/// Endpoint reported by the canned demonstration device.
pub const DUMMY_ENDPOINT: &str = "016eead293eb926ca57ba92703c00000";

/// Nonce response notified by the demonstration device.
pub const DUMMY_NONCE_RESPONSE: [u8; 25] = [
    0x00, 0x49, 0x10, 0x10, 0x00, 0x00, 0x00, 0x00, 0xbf, 0x03, 0x1b, 0x71, 0x0e, 0x73, 0xe7, 0xc4,
    0xd1, 0x14, 0xcb, 0x01, 0x02, 0x02, 0x00, 0xff, 0x00,
];

/// Operation response ("File Write Complete") notified by the demonstration
/// device.
pub const DUMMY_OPERATION_RESPONSE: [u8; 36] = [
    0x01, 0x91, 0x1b, 0x1b, 0x00, 0x00, 0x00, 0x00, 0xbf, 0x04, 0x53, 0x46, 0x69, 0x6c, 0x65, 0x20,
    0x57, 0x72, 0x69, 0x74, 0x65, 0x20, 0x43, 0x6f, 0x6d, 0x70, 0x6c, 0x65, 0x74, 0x65, 0x01, 0x04,
    0x02, 0x00, 0xff, 0x83,
];

/// How a simulated device answers one operation message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Send nothing.
    Silence,
    /// Packetise the payload and notify it.
    Payload(Bytes),
    /// Notify these raw buffers verbatim.
    Frames(Vec<Bytes>),
}

impl Reply {
    /// Reply with a payload.
    #[must_use]
    pub fn payload(bytes: impl Into<Bytes>) -> Self { Self::Payload(bytes.into()) }
}

/// Maps a received operation message to the device's reply.
pub type Responder = Arc<dyn Fn(&[u8]) -> Reply + Send + Sync>;

/// Fault a simulated device can be told to exhibit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Refuse connection attempts.
    RefuseConnect,
    /// Never complete a connection attempt.
    StallConnect,
    /// Fail service discovery.
    FailDiscovery,
    /// Fail enabling notifications.
    FailSubscribe,
    /// Fail MTU negotiation.
    FailMtu,
    /// Fail reading the serial number characteristic.
    FailEndpointRead,
    /// Drop the link instead of acknowledging the write after this many
    /// successful writes.
    DropLinkAfterWrites(usize),
}

/// Counters and captured traffic shared by every transport of one device.
#[derive(Debug, Default)]
pub struct DeviceActivity {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    writes: AtomicUsize,
    messages: Mutex<Vec<Bytes>>,
}

impl DeviceActivity {
    /// Successful connections.
    #[must_use]
    pub fn connects(&self) -> usize { self.connects.load(Ordering::SeqCst) }

    /// Disconnections, requested or not.
    #[must_use]
    pub fn disconnects(&self) -> usize { self.disconnects.load(Ordering::SeqCst) }

    /// Acknowledged writes.
    #[must_use]
    pub fn writes(&self) -> usize { self.writes.load(Ordering::SeqCst) }

    /// Operation messages received, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<Bytes> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    fn record_message(&self, message: Bytes) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}

/// Description of a virtual SDA peripheral.
///
/// # Examples
///
/// ```
/// use sdalink::transport::{SimulatedDevice, simulated::Reply};
///
/// let device = SimulatedDevice::new("AA:BB:CC:DD:EE:FF", "ep-1")
///     .max_mtu(185)
///     .respond_with(|message| Reply::payload(message.to_vec()));
/// assert_eq!(device.address().as_str(), "AA:BB:CC:DD:EE:FF");
/// ```
#[derive(Clone)]
pub struct SimulatedDevice {
    address: DeviceAddress,
    serial_number: Bytes,
    max_mtu: Mtu,
    link_latency: Duration,
    ack_delay: Duration,
    response_delay: Duration,
    responder: Responder,
    faults: Vec<Fault>,
    activity: Arc<DeviceActivity>,
}

impl fmt::Debug for SimulatedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedDevice")
            .field("address", &self.address)
            .field("serial_number", &self.serial_number)
            .field("max_mtu", &self.max_mtu)
            .field("faults", &self.faults)
            .finish_non_exhaustive()
    }
}

impl SimulatedDevice {
    /// Default delay before each write is acknowledged.
    pub const DEFAULT_ACK_DELAY: Duration = Duration::from_millis(200);

    /// Describe a device that echoes nothing until a responder is set.
    #[must_use]
    pub fn new(address: impl Into<DeviceAddress>, endpoint: impl Into<Endpoint>) -> Self {
        let endpoint: Endpoint = endpoint.into();
        Self {
            address: address.into(),
            serial_number: Bytes::copy_from_slice(endpoint.as_str().as_bytes()),
            max_mtu: Mtu::PREFERRED,
            link_latency: Duration::ZERO,
            ack_delay: Self::DEFAULT_ACK_DELAY,
            response_delay: Duration::ZERO,
            responder: Arc::new(|_| Reply::Silence),
            faults: Vec::new(),
            activity: Arc::new(DeviceActivity::default()),
        }
    }

    /// The canned demonstration device: answers a nonce request with a nonce
    /// and every other operation with "File Write Complete".
    #[must_use]
    pub fn dummy() -> Self {
        Self::new(DUMMY_ADDRESS, DUMMY_ENDPOINT)
            .link_latency(Duration::from_millis(200))
            .respond_with(|message| {
                let frame = if message.len() + serial::ENVELOPE_OVERHEAD == NONCE_REQUEST_LEN {
                    Bytes::from_static(&DUMMY_NONCE_RESPONSE)
                } else {
                    Bytes::from_static(&DUMMY_OPERATION_RESPONSE)
                };
                Reply::Frames(vec![frame])
            })
    }

    /// Largest MTU the device accepts.
    #[must_use]
    pub fn max_mtu(mut self, mtu: u16) -> Self {
        self.max_mtu = Mtu::clamped(mtu);
        self
    }

    /// Delay applied to connect, MTU and read operations.
    #[must_use]
    pub fn link_latency(mut self, latency: Duration) -> Self {
        self.link_latency = latency;
        self
    }

    /// Delay before each write is acknowledged.
    #[must_use]
    pub fn ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = delay;
        self
    }

    /// Delay between receiving a message and notifying the reply.
    #[must_use]
    pub fn response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// Override the raw serial number characteristic value.
    #[must_use]
    pub fn serial_number(mut self, raw: impl Into<Bytes>) -> Self {
        self.serial_number = raw.into();
        self
    }

    /// Set how the device answers operation messages.
    #[must_use]
    pub fn respond_with<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[u8]) -> Reply + Send + Sync + 'static,
    {
        self.responder = Arc::new(responder);
        self
    }

    /// Inject a fault.
    #[must_use]
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Device address.
    #[must_use]
    pub fn address(&self) -> &DeviceAddress { &self.address }

    /// Activity shared by every transport created for this device.
    #[must_use]
    pub fn activity(&self) -> Arc<DeviceActivity> { Arc::clone(&self.activity) }

    /// Create a transport connected to nothing yet.
    #[must_use]
    pub fn transport(&self) -> SimulatedTransport { SimulatedTransport::new(Some(self.clone())) }

    fn has_fault(&self, fault: Fault) -> bool { self.faults.contains(&fault) }

    fn drop_after(&self) -> Option<usize> {
        self.faults.iter().find_map(|fault| match fault {
            Fault::DropLinkAfterWrites(n) => Some(*n),
            _ => None,
        })
    }
}

/// A set of simulated devices addressed by [`DeviceAddress`].
///
/// Creating a transport for an unknown address yields one that refuses to
/// connect, as if the device had gone out of range.
#[derive(Clone, Debug, Default)]
pub struct SimulatedFleet {
    devices: HashMap<DeviceAddress, SimulatedDevice>,
}

impl SimulatedFleet {
    /// Create an empty fleet.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Add a device, replacing any with the same address.
    #[must_use]
    pub fn with_device(mut self, device: SimulatedDevice) -> Self {
        self.insert(device);
        self
    }

    /// Add a device, replacing any with the same address.
    pub fn insert(&mut self, device: SimulatedDevice) {
        self.devices.insert(device.address.clone(), device);
    }

    /// Look up a device.
    #[must_use]
    pub fn get(&self, address: &DeviceAddress) -> Option<&SimulatedDevice> {
        self.devices.get(address)
    }
}

impl TransportFactory for SimulatedFleet {
    type Transport = SimulatedTransport;

    fn create(&self, address: &DeviceAddress) -> SimulatedTransport {
        SimulatedTransport::new(self.devices.get(address).cloned())
    }
}

/// [`Transport`] backed by a [`SimulatedDevice`].
pub struct SimulatedTransport {
    device: Option<SimulatedDevice>,
    connected: bool,
    discovered: bool,
    mtu: Mtu,
    inbound: BytesMut,
    reassembler: Reassembler,
    replies: Fragmenter,
    writes: usize,
    notify_tx: Option<mpsc::UnboundedSender<Bytes>>,
}

impl fmt::Debug for SimulatedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedTransport")
            .field("device", &self.device)
            .field("connected", &self.connected)
            .field("mtu", &self.mtu)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

impl SimulatedTransport {
    fn new(device: Option<SimulatedDevice>) -> Self {
        Self {
            device,
            connected: false,
            discovered: false,
            mtu: Mtu::MIN,
            inbound: BytesMut::new(),
            reassembler: Reassembler::default(),
            replies: Fragmenter::new(),
            writes: 0,
            notify_tx: None,
        }
    }

    fn connected_device(&self) -> Result<&SimulatedDevice, TransportError> {
        match &self.device {
            Some(device) if self.connected => Ok(device),
            _ => Err(TransportError::NotConnected),
        }
    }

    fn link_latency(&self) -> Duration {
        self.device
            .as_ref()
            .map_or(Duration::ZERO, |device| device.link_latency)
    }

    fn drop_link(&mut self) {
        self.connected = false;
        self.notify_tx = None;
        self.inbound.clear();
        self.reassembler.reset();
        if let Some(device) = &self.device {
            device.activity.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Feed a written unit through the packet parser.
    fn ingest(&mut self, unit: &[u8]) {
        self.inbound.extend_from_slice(unit);
        loop {
            match PacketCodec.decode(&mut self.inbound) {
                Ok(Some(packet)) => match self.reassembler.push_packet(packet) {
                    Ok(Some(response)) => self.on_message(response.payload()),
                    Ok(None) => {}
                    Err(err) => warn!("simulated device dropped fragment: {err}"),
                },
                Ok(None) => break,
                Err(err) => {
                    warn!("simulated device discarded malformed write: {err}");
                    self.inbound.clear();
                    self.reassembler.reset();
                    break;
                }
            }
        }
    }

    fn on_message(&mut self, framed: &[u8]) {
        let Some(device) = self.device.clone() else {
            return;
        };
        let message = match serial::unframe(framed) {
            Ok(message) => message,
            Err(err) => {
                warn!("simulated device rejected serial message: {err}");
                return;
            }
        };
        debug!(
            "simulated device {} received operation message: len={}",
            device.address,
            message.len()
        );
        device.activity.record_message(message.clone());
        let frames = match (device.responder)(&message) {
            Reply::Silence => return,
            Reply::Frames(frames) => frames,
            Reply::Payload(payload) => match self.packetise(payload) {
                Ok(frames) => frames,
                Err(err) => {
                    warn!("simulated device cannot packetise reply: {err}");
                    return;
                }
            },
        };
        self.notify(frames, device.response_delay);
    }

    fn packetise(&mut self, payload: Bytes) -> Result<Vec<Bytes>, FragmentationError> {
        let packets = if payload.is_empty() {
            let sequence = self.replies.peek_sequence();
            vec![Packet::encode(sequence, 1, false, 0, false, payload)?]
        } else {
            self.replies.fragment(payload, self.mtu)?.packets().to_vec()
        };
        Ok(packets
            .iter()
            .map(|packet| {
                let mut frame = BytesMut::with_capacity(packet.encoded_len() + 1);
                packet.write_to(&mut frame);
                frame.put_u8(NOTIFICATION_TRAILER);
                frame.freeze()
            })
            .collect())
    }

    fn notify(&self, frames: Vec<Bytes>, delay: Duration) {
        let Some(tx) = self.notify_tx.clone() else {
            return;
        };
        if delay.is_zero() {
            for frame in frames {
                let _ = tx.unbounded_send(frame);
            }
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                for frame in frames {
                    let _ = tx.unbounded_send(frame);
                }
            });
        }
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn connect(&mut self, address: &DeviceAddress) -> Result<(), TransportError> {
        let Some(device) = self.device.clone() else {
            return Err(TransportError::Rejected {
                op: TransportOp::Connect,
                reason: format!("no device at {address}"),
            });
        };
        pause(self.link_latency()).await;
        if device.has_fault(Fault::StallConnect) {
            std::future::pending::<()>().await;
        }
        if device.has_fault(Fault::RefuseConnect) {
            return Err(TransportError::Rejected {
                op: TransportOp::Connect,
                reason: "connection refused".to_owned(),
            });
        }
        self.connected = true;
        self.discovered = false;
        self.mtu = Mtu::MIN;
        self.writes = 0;
        device.activity.connects.fetch_add(1, Ordering::SeqCst);
        info!("simulated device {address} connected");
        Ok(())
    }

    async fn discover_services(&mut self) -> Result<(), TransportError> {
        let device = self.connected_device()?;
        if device.has_fault(Fault::FailDiscovery) {
            return Err(TransportError::ServiceNotFound(super::SDA_SERVICE));
        }
        self.discovered = true;
        Ok(())
    }

    async fn request_mtu(&mut self, size: u16) -> Result<u16, TransportError> {
        let device = self.connected_device()?;
        let fail = device.has_fault(Fault::FailMtu);
        let max = device.max_mtu;
        pause(self.link_latency()).await;
        if fail {
            return Err(TransportError::Rejected {
                op: TransportOp::RequestMtu,
                reason: "mtu exchange failed".to_owned(),
            });
        }
        self.mtu = Mtu::clamped(size).min(max);
        Ok(self.mtu.get())
    }

    async fn read(&mut self, characteristic: CharacteristicId) -> Result<Bytes, TransportError> {
        let device = self.connected_device()?;
        if characteristic != CharacteristicId::SERIAL_NUMBER {
            return Err(TransportError::CharacteristicNotFound(
                characteristic.characteristic,
            ));
        }
        let fail = device.has_fault(Fault::FailEndpointRead);
        let value = device.serial_number.clone();
        pause(self.link_latency()).await;
        if fail {
            return Err(TransportError::Rejected {
                op: TransportOp::Read,
                reason: "read not permitted".to_owned(),
            });
        }
        Ok(value)
    }

    async fn write(
        &mut self,
        characteristic: CharacteristicId,
        data: Bytes,
    ) -> Result<(), TransportError> {
        let device = self.connected_device()?.clone();
        if characteristic != CharacteristicId::SDA {
            return Err(TransportError::CharacteristicNotFound(
                characteristic.characteristic,
            ));
        }
        let limit = self.mtu.write_unit_len();
        if data.len() > limit && data.len() != SINGLE_UNIT_BUFFER_LEN {
            return Err(TransportError::Rejected {
                op: TransportOp::Write,
                reason: format!("{} bytes exceed the {limit}-byte write size", data.len()),
            });
        }
        if device.drop_after() == Some(self.writes) {
            warn!("simulated device {} dropping link", device.address);
            self.drop_link();
            return Err(TransportError::LinkLost(TransportOp::Write));
        }
        pause(device.ack_delay).await;
        self.writes += 1;
        device.activity.writes.fetch_add(1, Ordering::SeqCst);
        self.ingest(&data);
        Ok(())
    }

    async fn subscribe(
        &mut self,
        characteristic: CharacteristicId,
    ) -> Result<Notifications, TransportError> {
        let device = self.connected_device()?;
        if characteristic != CharacteristicId::SDA {
            return Err(TransportError::CharacteristicNotFound(
                characteristic.characteristic,
            ));
        }
        if device.has_fault(Fault::FailSubscribe) || !self.discovered {
            return Err(TransportError::Rejected {
                op: TransportOp::Subscribe,
                reason: "notifications unavailable".to_owned(),
            });
        }
        let (tx, rx) = mpsc::unbounded();
        self.notify_tx = Some(tx);
        Ok(rx.boxed())
    }

    async fn unsubscribe(
        &mut self,
        _characteristic: CharacteristicId,
    ) -> Result<(), TransportError> {
        self.connected_device()?;
        self.notify_tx = None;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.connected {
            self.drop_link();
        }
        Ok(())
    }
}

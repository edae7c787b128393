//! The BLE capability a session runs over.
//!
//! [`Transport`] is the seam between the protocol engine and a concrete radio
//! stack. Each method suspends until the peripheral answers: `write` resolves
//! on the write acknowledgement, and `subscribe` hands back the notification
//! stream the session reads responses from.
//!
//! The crate ships [`SimulatedTransport`], a virtual SDA peripheral, and (with
//! the `btleplug` feature) an adapter over `btleplug` peripherals.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::device::DeviceAddress;

mod error;
pub mod simulated;

#[cfg(feature = "btleplug")]
pub mod ble;

#[cfg(feature = "btleplug")]
pub use ble::BtleplugTransport;
pub use error::{TransportError, TransportOp};
pub use simulated::{Responder, SimulatedDevice, SimulatedFleet, SimulatedTransport};

/// Primary service carrying SDA traffic.
pub const SDA_SERVICE: Uuid = Uuid::from_u128(0x6e40_0001_b5a3_f393_e0a9_e50e_24dc_ca9e);
/// Characteristic SDA packets are written to and notified on.
pub const SDA_CHARACTERISTIC: Uuid = Uuid::from_u128(0x6e40_0002_b5a3_f393_e0a9_e50e_24dc_ca9e);
/// Standard device information service.
pub const DEVICE_INFORMATION_SERVICE: Uuid =
    Uuid::from_u128(0x0000_180a_0000_1000_8000_0080_5f9b_34fb);
/// Serial number string characteristic, which carries the endpoint name.
pub const SERIAL_NUMBER_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x0000_2a25_0000_1000_8000_0080_5f9b_34fb);

/// A characteristic addressed by its service and characteristic UUIDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CharacteristicId {
    /// Owning service.
    pub service: Uuid,
    /// Characteristic within the service.
    pub characteristic: Uuid,
}

impl CharacteristicId {
    /// The SDA write/notify characteristic.
    pub const SDA: Self = Self::new(SDA_SERVICE, SDA_CHARACTERISTIC);
    /// The serial number characteristic holding the endpoint name.
    pub const SERIAL_NUMBER: Self =
        Self::new(DEVICE_INFORMATION_SERVICE, SERIAL_NUMBER_CHARACTERISTIC);

    /// Pair a service with one of its characteristics.
    #[must_use]
    pub const fn new(service: Uuid, characteristic: Uuid) -> Self {
        Self {
            service,
            characteristic,
        }
    }
}

/// Stream of raw notification buffers. The stream ends when the link drops.
pub type Notifications = BoxStream<'static, Bytes>;

/// Asynchronous GATT client operations needed by a session.
#[async_trait]
pub trait Transport: Send {
    /// Open a link to the peripheral at `address`.
    async fn connect(&mut self, address: &DeviceAddress) -> Result<(), TransportError>;

    /// Discover the peripheral's services and characteristics.
    async fn discover_services(&mut self) -> Result<(), TransportError>;

    /// Ask for a larger MTU, returning the size actually negotiated.
    async fn request_mtu(&mut self, size: u16) -> Result<u16, TransportError>;

    /// Read a characteristic value.
    async fn read(&mut self, characteristic: CharacteristicId) -> Result<Bytes, TransportError>;

    /// Write one unit, resolving once the peripheral acknowledges it.
    async fn write(
        &mut self,
        characteristic: CharacteristicId,
        data: Bytes,
    ) -> Result<(), TransportError>;

    /// Enable notifications and return the stream they arrive on.
    async fn subscribe(
        &mut self,
        characteristic: CharacteristicId,
    ) -> Result<Notifications, TransportError>;

    /// Disable notifications.
    async fn unsubscribe(&mut self, characteristic: CharacteristicId)
    -> Result<(), TransportError>;

    /// Close the link.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Creates one transport per device in a job.
pub trait TransportFactory: Send + Sync {
    /// Transport type produced.
    type Transport: Transport + 'static;

    /// Build a transport for the device at `address`.
    fn create(&self, address: &DeviceAddress) -> Self::Transport;
}

impl<F, T> TransportFactory for F
where
    F: Fn(&DeviceAddress) -> T + Send + Sync,
    T: Transport + 'static,
{
    type Transport = T;

    fn create(&self, address: &DeviceAddress) -> T { self(address) }
}

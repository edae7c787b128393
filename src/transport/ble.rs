//! [`Transport`] over a `btleplug` peripheral.
//!
//! The platform stack negotiates the ATT MTU on its own and `btleplug` does
//! not expose the result, so [`BtleplugTransport::request_mtu`] grants the
//! smaller of the requested size and an assumed link MTU. The assumption
//! defaults to [`Mtu::MIN`], which every BLE link supports.

use async_trait::async_trait;
use btleplug::{
    api::{Central, Characteristic, Peripheral as _, WriteType},
    platform::{Adapter, Peripheral},
};
use bytes::Bytes;
use futures::StreamExt;
use log::{debug, info};

use super::{CharacteristicId, Notifications, Transport, TransportError, TransportOp};
use crate::{device::DeviceAddress, fragment::Mtu};

/// Transport driving one peripheral through a `btleplug` adapter.
#[derive(Debug)]
pub struct BtleplugTransport {
    adapter: Adapter,
    peripheral: Option<Peripheral>,
    assumed_mtu: Mtu,
}

/// MTU reported for a request of `requested` bytes on a link assumed to
/// negotiate `assumed`.
fn granted_mtu(requested: u16, assumed: Mtu) -> u16 { Mtu::clamped(requested).min(assumed).get() }

fn backend(op: TransportOp) -> impl FnOnce(btleplug::Error) -> TransportError {
    move |err| TransportError::Backend {
        op,
        source: Box::new(err),
    }
}

impl BtleplugTransport {
    /// Use `adapter` to reach peripherals. Devices must already have been
    /// seen by a scan on this adapter.
    #[must_use]
    pub fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            peripheral: None,
            assumed_mtu: Mtu::MIN,
        }
    }

    /// Assume the platform stack negotiates `mtu` with each peripheral.
    ///
    /// Only raise this when the platform is known to grant it; writes larger
    /// than the real link MTU are rejected by the stack.
    #[must_use]
    pub fn assume_mtu(mut self, mtu: Mtu) -> Self {
        self.assumed_mtu = mtu;
        self
    }

    fn peripheral(&self) -> Result<&Peripheral, TransportError> {
        self.peripheral.as_ref().ok_or(TransportError::NotConnected)
    }

    fn characteristic(&self, id: CharacteristicId) -> Result<Characteristic, TransportError> {
        self.peripheral()?
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == id.service && c.uuid == id.characteristic)
            .ok_or(TransportError::CharacteristicNotFound(id.characteristic))
    }
}

#[async_trait]
impl Transport for BtleplugTransport {
    async fn connect(&mut self, address: &DeviceAddress) -> Result<(), TransportError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(backend(TransportOp::Connect))?;
        let peripheral = peripherals
            .into_iter()
            .find(|p| p.address().to_string().eq_ignore_ascii_case(address.as_str()))
            .ok_or_else(|| TransportError::Rejected {
                op: TransportOp::Connect,
                reason: format!("{address} has not been discovered"),
            })?;
        peripheral
            .connect()
            .await
            .map_err(backend(TransportOp::Connect))?;
        info!("connected to {address}");
        self.peripheral = Some(peripheral);
        Ok(())
    }

    async fn discover_services(&mut self) -> Result<(), TransportError> {
        self.peripheral()?
            .discover_services()
            .await
            .map_err(backend(TransportOp::Discover))
    }

    async fn request_mtu(&mut self, size: u16) -> Result<u16, TransportError> {
        self.peripheral()?;
        let granted = granted_mtu(size, self.assumed_mtu);
        debug!("mtu {size} requested, assuming {granted} from the platform stack");
        Ok(granted)
    }

    async fn read(&mut self, characteristic: CharacteristicId) -> Result<Bytes, TransportError> {
        let target = self.characteristic(characteristic)?;
        let value = self
            .peripheral()?
            .read(&target)
            .await
            .map_err(backend(TransportOp::Read))?;
        Ok(Bytes::from(value))
    }

    async fn write(
        &mut self,
        characteristic: CharacteristicId,
        data: Bytes,
    ) -> Result<(), TransportError> {
        let target = self.characteristic(characteristic)?;
        self.peripheral()?
            .write(&target, &data, WriteType::WithResponse)
            .await
            .map_err(backend(TransportOp::Write))
    }

    async fn subscribe(
        &mut self,
        characteristic: CharacteristicId,
    ) -> Result<Notifications, TransportError> {
        let target = self.characteristic(characteristic)?;
        let peripheral = self.peripheral()?;
        peripheral
            .subscribe(&target)
            .await
            .map_err(backend(TransportOp::Subscribe))?;
        let wanted = target.uuid;
        let stream = peripheral
            .notifications()
            .await
            .map_err(backend(TransportOp::Subscribe))?;
        Ok(stream
            .filter_map(move |notification| {
                let value = (notification.uuid == wanted).then(|| Bytes::from(notification.value));
                futures::future::ready(value)
            })
            .boxed())
    }

    async fn unsubscribe(
        &mut self,
        characteristic: CharacteristicId,
    ) -> Result<(), TransportError> {
        let target = self.characteristic(characteristic)?;
        self.peripheral()?
            .unsubscribe(&target)
            .await
            .map_err(backend(TransportOp::Unsubscribe))
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(peripheral) = self.peripheral.take() {
            peripheral
                .disconnect()
                .await
                .map_err(backend(TransportOp::Disconnect))?;
        }
        Ok(())
    }
}

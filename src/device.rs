//! Device identity types.

use std::fmt::Write as _;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Link-layer address of a peripheral, usually a MAC such as
/// `DD:7E:7E:BD:AB:78`.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Wrap an address string.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self { Self(address.into()) }

    /// Borrow the address text.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for DeviceAddress {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}

/// Protocol-level identifier a device reports after connecting.
///
/// # Examples
///
/// ```
/// use sdalink::device::Endpoint;
///
/// let endpoint = Endpoint::from_characteristic(b"016eead293eb926ca57ba92703c00000\0");
/// assert_eq!(endpoint.as_str(), "016eead293eb926ca57ba92703c00000");
///
/// // Non-text values fall back to lowercase hex.
/// assert_eq!(Endpoint::from_characteristic(&[0xde, 0xad]).as_str(), "dead");
/// ```
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    /// Wrap an endpoint name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }

    /// Decode the raw serial-number characteristic value.
    ///
    /// UTF-8 text is trimmed of trailing NUL padding and whitespace; any other
    /// value is rendered as lowercase hex.
    #[must_use]
    pub fn from_characteristic(raw: &[u8]) -> Self {
        match std::str::from_utf8(raw) {
            Ok(text) => Self(text.trim_end_matches('\0').trim().to_owned()),
            Err(_) => {
                let mut hex = String::with_capacity(raw.len() * 2);
                for byte in raw {
                    let _ = write!(hex, "{byte:02x}");
                }
                Self(hex)
            }
        }
    }

    /// Borrow the endpoint name.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }

    /// Whether the endpoint is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<&str> for Endpoint {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}

/// A device found by scanning, in the order it was found.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedDevice {
    /// Address to connect to.
    pub address: DeviceAddress,
    /// Advertised name, if any.
    #[serde(default)]
    pub name: Option<String>,
}

impl ScannedDevice {
    /// Describe a device by address only.
    #[must_use]
    pub fn new(address: impl Into<DeviceAddress>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    /// Attach an advertised name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

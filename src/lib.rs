#![doc(html_root_url = "https://docs.rs/sdalink/latest")]
//! Public API for the `sdalink` library.
//!
//! This crate implements the host side of the SDA transport protocol spoken
//! by field devices over Bluetooth Low Energy: the packet format, the serial
//! message envelope, MTU-aware fragmentation and reassembly, a per-device
//! transport session, and a job runner that applies a workflow's tasks to
//! every admitted device in turn.
//!
//! The layers stack bottom-up:
//!
//! - [`splitter`] and [`packet`] handle raw chunking and the packet codec.
//! - [`serial`] frames whole operation messages.
//! - [`fragment`] maps messages onto packets and MTU-sized transport units.
//! - [`transport`] is the BLE seam; [`session`] drives one device over it.
//! - [`job`] runs workflows across scanned devices.

pub mod byte_order;
pub mod device;
pub mod fragment;
pub mod job;
pub mod message;
pub mod metrics;
pub mod packet;
pub mod prelude;
pub mod serial;
pub mod session;
pub mod splitter;
pub mod transport;

pub use device::{DeviceAddress, Endpoint, ScannedDevice};
pub use fragment::{
    FragmentBatch,
    FragmentationConfig,
    FragmentationError,
    Fragmenter,
    Mtu,
    Reassembler,
    ReassemblyError,
};
pub use job::{Job, JobError, JobReport, JobRunner};
pub use metrics::{
    DEVICE_OUTCOMES,
    NOTIFICATIONS_RECEIVED,
    SESSIONS_ACTIVE,
    TASK_OUTCOMES,
    UNITS_WRITTEN,
};
pub use packet::{Packet, PacketCodec, PacketError};
pub use session::{SessionConfig, SessionError, SessionState, TransportSession};
pub use transport::{Transport, TransportError, TransportFactory};

//! Fragmentation and reassembly of SDA messages.
//!
//! The outbound half splits framed messages into packets and MTU-sized
//! transport units; the inbound half stitches notification packets back into
//! complete responses. Both are free of I/O so the session and the simulated
//! device can share them.

pub mod config;
pub mod error;
pub mod fragmenter;
pub mod reassembler;

pub use config::{
    FragmentationConfig,
    Mtu,
    NONCE_REQUEST_LEN,
    PayloadBounds,
    SINGLE_UNIT_BUFFER_LEN,
    message_chunk_len,
    transport_unit_len,
};
pub use error::{FragmentationError, ReassemblyError};
pub use fragmenter::{FragmentBatch, Fragmenter, WriteQueue};
pub use reassembler::{ReassembledResponse, Reassembler};

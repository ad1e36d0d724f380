//! Wireless link: transport port, framing and channel demultiplexing.

pub mod demux;
pub mod framing;
pub mod transport;

pub use demux::{Demultiplexer, Inbound};
pub use framing::{MAX_TEXT_FRAME, TextReassembler, chunk_message, send_chunked};
pub use transport::{
    BleLink, Capabilities, Channel, Connection, DiscoveredDevice, Notification, WriteMode,
    WriteTarget,
};

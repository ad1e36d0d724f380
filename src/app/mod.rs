//! Application core.
//!
//! [`service`] holds the protocol and session rules with zero I/O;
//! [`client`] drives it over a [`BleLink`](crate::link::BleLink).  All
//! other interaction with the outside world happens through the
//! **port traits** defined in [`ports`], keeping the core fully testable
//! without a radio.

pub mod client;
pub mod events;
pub mod ports;
pub mod service;

pub use client::DeviceClient;
pub use events::{AppEvent, StopReason};
pub use ports::{
    BroadcastReceipt, EventSink, FileServerPort, LedgerPort, TimePort, TrainingServerPort,
};
pub use service::{Identity, ImuStats, LinkService};

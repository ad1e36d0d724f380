//! Step-to-Sign text command protocol.
//!
//! - [`command`]: outbound catalog and wire rendering
//! - [`message`]: inbound tag parsing
//! - [`address`]: address derivation from the device key
//! - [`state`]: signing-phase state machine
//! - [`pending`]: request/acknowledgement correlation

pub mod address;
pub mod command;
pub mod message;
pub mod pending;
pub mod state;

pub use address::derive_address;
pub use command::Command;
pub use message::{InboundMessage, SignedTransaction, parse_message};
pub use pending::{AckTag, PendingAcks};
pub use state::{SigningFlow, SystemState};

//! Outbound application events.
//!
//! The [`LinkService`](super::service::LinkService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide where they go.

use crate::error::{FramingError, ProtocolError, SessionError};
use crate::protocol::{AckTag, SignedTransaction, SystemState};
use crate::session::Progress;

use super::ports::LedgerError;

/// Why a stop was sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    Manual,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A device connected and its characteristics were verified.
    Connected { device_id: String },

    /// The link went away; `lost` is true when the caller did not ask for it.
    Disconnected { lost: bool },

    /// The device reported its public key.
    IdentityResolved { public_key: String, address: String },

    /// The signing flow moved between phases.
    SigningState { from: SystemState, to: SystemState },

    /// A signature arrived for the pending request.
    SignatureReceived(SignedTransaction),

    /// The ledger accepted the transaction.
    BroadcastCompleted { digest: String },

    /// The ledger call failed; the flow is back in `Idle` regardless.
    BroadcastFailed(LedgerError),

    /// A training session opened.
    SessionStarted { gesture: String, target: u32 },

    /// Per-sample progress of the active session.
    SessionProgress(Progress),

    /// A stop was sent; the session is waiting for `IMU_STOPPED`.
    StopRequested { gesture: String, reason: StopReason },

    /// The device confirmed the stop and the samples were archived.
    SessionCommitted { gesture: String, samples: usize },

    /// The session was dropped without archiving.
    SessionAbandoned { gesture: String, samples: usize },

    /// A decoded record was rejected.
    TelemetryRejected(SessionError),

    /// An inbound chunk could not be framed.
    FramingDropped(FramingError),

    /// A well-framed message violated the protocol.
    ProtocolViolation(ProtocolError),

    /// Result of a password check on the device.
    PasswordVerdict(bool),

    /// An expected reply never arrived.
    AckTimedOut(AckTag),
}

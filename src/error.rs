//! Unified error types for the Step-to-Sign link.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! driver and the demo binary handle failures uniformly.  Subsystem
//! enums are `Copy` and carry no heap data; details that do not fit are
//! logged at the point of failure.

use core::fmt;

use crate::protocol::pending::AckTag;
use crate::protocol::state::SystemState;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The wireless link failed or is absent.
    Transport(TransportError),
    /// An inbound chunk could not be framed.
    Framing(FramingError),
    /// A message violated the command protocol.
    Protocol(ProtocolError),
    /// A training-session precondition was violated.
    Session(SessionError),
    /// An HTTP collaborator failed.
    Http(HttpError),
    /// The ledger refused or never saw a signed transaction.
    Ledger(LedgerError),
    /// The training workflow rejected an operation.
    Workflow(WorkflowError),
    /// Configuration is invalid.
    Config(&'static str),
    /// A stored snapshot could not be encoded or decoded.
    Snapshot(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Framing(e) => write!(f, "framing: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Session(e) => write!(f, "session: {e}"),
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Ledger(e) => write!(f, "ledger: {e}"),
            Self::Workflow(e) => write!(f, "workflow: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Snapshot(msg) => write!(f, "snapshot: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No device is connected.
    NotConnected,
    /// The platform refused Bluetooth permissions.
    PermissionDenied,
    /// Scanning could not be started or was aborted.
    ScanFailed,
    /// The connection attempt failed.
    ConnectFailed,
    /// A required GATT characteristic was not discovered.
    CharacteristicMissing(&'static str),
    /// A characteristic write failed.
    WriteFailed,
    /// Enabling notifications failed.
    SubscribeFailed,
    /// The link dropped underneath an operation.
    LinkLost,
    /// A single write exceeded the transport ceiling.
    PayloadTooLarge,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "no device connected"),
            Self::PermissionDenied => write!(f, "bluetooth permission denied"),
            Self::ScanFailed => write!(f, "scan failed"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::CharacteristicMissing(name) => write!(f, "characteristic missing: {name}"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::LinkLost => write!(f, "link lost"),
            Self::PayloadTooLarge => write!(f, "write exceeds transport ceiling"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Framing errors
// ---------------------------------------------------------------------------

/// Non-fatal: the offending chunk is dropped and the channel keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    /// A telemetry notification was not exactly one record long.
    BadRecordLength(usize),
    /// The text accumulator hit its capacity without a complete message.
    BufferOverflow,
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRecordLength(len) => {
                write!(f, "telemetry record is {len} bytes, expected {}", crate::telemetry::RECORD_LEN)
            }
            Self::BufferOverflow => write!(f, "text buffer overflow"),
        }
    }
}

impl From<FramingError> for Error {
    fn from(e: FramingError) -> Self {
        Self::Framing(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// A public key did not decode to exactly 32 bytes.
    InvalidKeyLength(usize),
    /// A hex field contained non-hex characters or an odd length.
    InvalidHex,
    /// A `SIG:` payload had no `msg` separator.
    MalformedSignature,
    /// User text contained `<` or `>`, which the framing cannot carry.
    ReservedDelimiter,
    /// A signing request was made outside `Idle`.
    Busy(SystemState),
    /// A signature arrived while none was awaited.
    NoPendingSignature,
    /// The device did not answer within the configured timeout.
    AckTimedOut(AckTag),
    /// The command is owned by a state machine and has its own operation.
    DedicatedCommand(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyLength(len) => {
                write!(f, "invalid public key length {len}, expected 32 bytes")
            }
            Self::InvalidHex => write!(f, "invalid hex"),
            Self::MalformedSignature => write!(f, "signature payload missing 'msg' separator"),
            Self::ReservedDelimiter => write!(f, "text contains a reserved '<' or '>'"),
            Self::Busy(state) => write!(f, "cannot start signing while {state:?}"),
            Self::NoPendingSignature => write!(f, "no signature pending"),
            Self::AckTimedOut(tag) => write!(f, "device did not acknowledge {tag:?}"),
            Self::DedicatedCommand(name) => {
                write!(f, "'{name}' must be sent through its dedicated operation")
            }
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Sessions need a connected device.
    NotConnected,
    /// Only one session may be active at a time.
    AlreadyActive,
    /// Telemetry arrived (or a stop was acknowledged) with no session.
    NoActiveSession,
    /// Gesture name was blank.
    EmptyGestureName,
    /// Target sample count must be non-zero.
    InvalidTarget,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "device not connected"),
            Self::AlreadyActive => write!(f, "a training session is already active"),
            Self::NoActiveSession => write!(f, "no active training session"),
            Self::EmptyGestureName => write!(f, "gesture name is empty"),
            Self::InvalidTarget => write!(f, "target sample count must be non-zero"),
        }
    }
}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

// ---------------------------------------------------------------------------
// HTTP collaborator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// Server replied with a non-success status.
    Status(u16),
    /// Request exceeded its timeout.
    Timeout,
    /// Connection-level failure.
    Io,
    /// Response body could not be decoded.
    Decode,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP status {code}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Io => write!(f, "I/O error"),
            Self::Decode => write!(f, "undecodable response"),
        }
    }
}

impl From<HttpError> for Error {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// Ledger errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    /// The signature or message could not be decoded.
    InvalidTransaction,
    /// The network refused the transaction.
    Rejected,
    /// The node could not be reached.
    Unreachable,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransaction => write!(f, "invalid transaction"),
            Self::Rejected => write!(f, "rejected by network"),
            Self::Unreachable => write!(f, "ledger unreachable"),
        }
    }
}

impl From<LedgerError> for Error {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

// ---------------------------------------------------------------------------
// Training workflow errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowError {
    EmptyName,
    DuplicateGesture,
    NoGestures,
    UnknownGesture,
    /// Nothing has been collected yet, so there is nothing to export.
    NoSamples,
    /// Deploy was requested before a model was produced.
    NoArtifact,
    /// The operation is not valid in the current step.
    WrongStep,
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "gesture name required"),
            Self::DuplicateGesture => write!(f, "gesture already in the training list"),
            Self::NoGestures => write!(f, "add at least one gesture first"),
            Self::UnknownGesture => write!(f, "gesture not in the training list"),
            Self::NoSamples => write!(f, "no samples collected"),
            Self::NoArtifact => write!(f, "no trained model to deploy"),
            Self::WrongStep => write!(f, "operation not valid in the current step"),
        }
    }
}

impl From<WorkflowError> for Error {
    fn from(e: WorkflowError) -> Self {
        Self::Workflow(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

//! Transport abstraction: the wireless link to one Step-to-Sign device.
//!
//! Concrete implementations:
//! - In-memory simulated device (host tests, demo binary)
//! - `btleplug` BLE central (feature `btleplug`)
//!
//! The service and driver are generic over `BleLink`, so adding a new
//! transport requires zero changes to the protocol logic.
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                                   | Perms  |
//! |----------------|----------------------------------------|--------|
//! | Command (RX)   | `87654321-4321-4321-4321-cba987654321` | Write  |
//! | Text (TX)      | `11111111-2222-3333-4444-555555555555` | Notify |
//! | IMU (TX)       | `6e400004-b5a3-f393-e0a9-e50e24dcca9e` | Notify |
//! | File transfer  | `6e400005-b5a3-f393-e0a9-e50e24dcca9e` | Write  |
//! | Control        | `6e400006-b5a3-f393-e0a9-e50e24dcca9e` | Write  |

use core::time::Duration;

use crate::error::TransportError;

// ── Constants ────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x12345678_1234_1234_1234_123456789abc;
pub const CHAR_COMMAND_RX: u128 = 0x87654321_4321_4321_4321_cba987654321;
pub const CHAR_TEXT_TX: u128 = 0x11111111_2222_3333_4444_555555555555;
pub const CHAR_IMU_TX: u128 = 0x6e400004_b5a3_f393_e0a9_e50e24dcca9e;
pub const CHAR_FILE_TRANSFER: u128 = 0x6e400005_b5a3_f393_e0a9_e50e24dcca9e;
pub const CHAR_CONTROL: u128 = 0x6e400006_b5a3_f393_e0a9_e50e24dcca9e;

// ── Channels and targets ─────────────────────────────────────

/// Inbound notification stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// `<`…`>` framed UTF-8 control protocol.
    Text,
    /// Fixed-size binary IMU records.
    Telemetry,
}

impl Channel {
    pub const fn uuid(self) -> u128 {
        match self {
            Self::Text => CHAR_TEXT_TX,
            Self::Telemetry => CHAR_IMU_TX,
        }
    }

    pub fn from_uuid(uuid: u128) -> Option<Self> {
        match uuid {
            CHAR_TEXT_TX => Some(Self::Text),
            CHAR_IMU_TX => Some(Self::Telemetry),
            _ => None,
        }
    }
}

/// Writable characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteTarget {
    Command,
    Control,
    FileTransfer,
}

impl WriteTarget {
    pub const fn uuid(self) -> u128 {
        match self {
            Self::Command => CHAR_COMMAND_RX,
            Self::Control => CHAR_CONTROL,
            Self::FileTransfer => CHAR_FILE_TRANSFER,
        }
    }
}

/// Whether a write waits for the peer's ATT response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    WithoutResponse,
    WithResponse,
}

/// One notification as delivered by the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: Channel,
    pub payload: Vec<u8>,
}

impl Notification {
    pub fn text(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            channel: Channel::Text,
            payload: payload.into(),
        }
    }

    pub fn telemetry(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            channel: Channel::Telemetry,
            payload: payload.into(),
        }
    }
}

// ── Discovery and connection ─────────────────────────────────

/// A device seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Platform identifier (MAC on Linux, UUID on macOS).
    pub id: String,
    pub name: String,
    pub rssi: Option<i16>,
}

/// Bitmask of characteristics discovered on the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const COMMAND: u8 = 0b0000_0001;
    pub const TEXT: u8 = 0b0000_0010;
    pub const TELEMETRY: u8 = 0b0000_0100;
    pub const CONTROL: u8 = 0b0000_1000;
    pub const FILE_TRANSFER: u8 = 0b0001_0000;

    pub const fn all() -> Self {
        Self(Self::COMMAND | Self::TEXT | Self::TELEMETRY | Self::CONTROL | Self::FILE_TRANSFER)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Record a discovered characteristic by UUID; unknown UUIDs are ignored.
    pub fn insert_uuid(&mut self, uuid: u128) {
        self.0 |= match uuid {
            CHAR_COMMAND_RX => Self::COMMAND,
            CHAR_TEXT_TX => Self::TEXT,
            CHAR_IMU_TX => Self::TELEMETRY,
            CHAR_CONTROL => Self::CONTROL,
            CHAR_FILE_TRANSFER => Self::FILE_TRANSFER,
            _ => 0,
        };
    }

    pub const fn contains(self, mask: u8) -> bool {
        self.0 & mask == mask
    }

    /// The characteristics the protocol cannot run without.
    pub fn require_core(self) -> Result<(), TransportError> {
        if !self.contains(Self::COMMAND) {
            return Err(TransportError::CharacteristicMissing("command"));
        }
        if !self.contains(Self::TEXT) {
            return Err(TransportError::CharacteristicMissing("text"));
        }
        if !self.contains(Self::TELEMETRY) {
            return Err(TransportError::CharacteristicMissing("telemetry"));
        }
        Ok(())
    }
}

/// One paired device, as seen after discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub device_id: String,
    pub handle: u32,
    pub capabilities: Capabilities,
}

// ── Port trait ───────────────────────────────────────────────

/// Connection-oriented wireless link with a per-write size ceiling.
///
/// All methods are driven from a single task; implementations need not
/// be `Send`.
#[allow(async_fn_in_trait)]
pub trait BleLink {
    /// Scan for `duration` and return devices whose name contains `name_filter`.
    async fn scan(
        &mut self,
        name_filter: &str,
        duration: Duration,
    ) -> Result<Vec<DiscoveredDevice>, TransportError>;

    /// Connect and discover characteristics.
    async fn connect(&mut self, device_id: &str) -> Result<Connection, TransportError>;

    /// Drop the connection.  Succeeds when already disconnected.
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Enable notifications on `channel`.
    async fn subscribe(&mut self, channel: Channel) -> Result<(), TransportError>;

    /// Write one chunk (already sized to the transport ceiling).
    async fn write(
        &mut self,
        target: WriteTarget,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<(), TransportError>;

    /// Next pending notification, or `None` if nothing has arrived.
    /// Never blocks waiting for data.
    async fn next_notification(&mut self) -> Result<Option<Notification>, TransportError>;
}

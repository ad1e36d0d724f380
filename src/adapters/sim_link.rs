//! In-memory simulated Step-to-Sign device.
//!
//! Implements [`BleLink`] without a radio.  Command writes are
//! reassembled exactly as the firmware does, replies are chunked to the
//! transport ceiling, and while streaming every other poll yields a
//! synthetic IMU record.  Used by the demo binary and the integration
//! tests.
//!
//! | Command received | Reply                                  |
//! |------------------|----------------------------------------|
//! | `get_address`    | `<SUI:{public key hex}>`               |
//! | `msg{hex}`       | `<SIG:0x{signature hex}msg{hex}>`      |
//! | `start_imu`      | telemetry stream begins                |
//! | `stop_imu`       | stream ends, `<IMU_STOPPED>`           |
//! | `start_current_password_verification` | `<password_correct>` |

use core::time::Duration;

use blake2::digest::consts::U64;
use blake2::{Blake2b, Digest};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel as Queue;
use log::{debug, info};

use crate::error::TransportError;
use crate::link::framing::{TextReassembler, chunk_message};
use crate::link::transport::{
    BleLink, Capabilities, Channel, Connection, DiscoveredDevice, Notification, WriteMode,
    WriteTarget,
};
use crate::telemetry::{RawRecord, encode_record};

/// Depth of the device → host notification queue.
const NOTIFY_DEPTH: usize = 256;

/// Ed25519 scheme flag prefixed to serialized signatures.
const SIG_FLAG: u8 = 0x00;

// ── Configuration ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub device_id: String,
    pub name: String,
    pub rssi: i16,
    pub public_key: [u8; 32],
    pub capabilities: Capabilities,
    /// Notification payload ceiling (same as the host write ceiling).
    pub mtu_payload: usize,
    /// Never answer `stop_imu` / `get_address` / `msg` (timeout tests).
    pub drop_acks: bool,
    /// Answer password checks with `password_correct`.
    pub password_ok: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            device_id: "SIM-00:11:22:33".into(),
            name: "Step-to-Sign Sim".into(),
            rssi: -48,
            public_key: core::array::from_fn(|i| i as u8),
            capabilities: Capabilities::all(),
            mtu_payload: 20,
            drop_acks: false,
            password_ok: true,
        }
    }
}

/// One write as seen by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub target: WriteTarget,
    pub data: Vec<u8>,
    pub mode: WriteMode,
}

// ── Device ───────────────────────────────────────────────────

pub struct SimulatedDevice {
    config: SimConfig,
    connected: bool,
    subscribed_text: bool,
    subscribed_telemetry: bool,
    rx: TextReassembler,
    notify: Queue<NoopRawMutex, Notification, NOTIFY_DEPTH>,
    streaming: bool,
    stream_toggle: bool,
    stream_ts: u32,
    writes: Vec<WriteRecord>,
    link_lost: bool,
    failing_writes: u32,
}

impl SimulatedDevice {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            connected: false,
            subscribed_text: false,
            subscribed_telemetry: false,
            rx: TextReassembler::new(),
            notify: Queue::new(),
            streaming: false,
            stream_toggle: false,
            stream_ts: 0,
            writes: Vec::new(),
            link_lost: false,
            failing_writes: 0,
        }
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.config.public_key)
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Every write received, in order.
    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    /// Writes to `target`, concatenated.
    pub fn written_bytes(&self, target: WriteTarget) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|w| w.target == target)
            .flat_map(|w| w.data.iter().copied())
            .collect()
    }

    /// Queue an arbitrary notification (tests).
    pub fn inject(&mut self, notification: Notification) {
        let _ = self.notify.try_send(notification);
    }

    /// Make every further operation fail with `LinkLost`.
    pub fn drop_link(&mut self) {
        self.link_lost = true;
    }

    /// Fail the next `count` writes with `WriteFailed`; the link stays up.
    pub fn fail_next_writes(&mut self, count: u32) {
        self.failing_writes = count;
    }

    pub fn set_drop_acks(&mut self, drop: bool) {
        self.config.drop_acks = drop;
    }

    fn check_link(&self) -> Result<(), TransportError> {
        if self.link_lost {
            return Err(TransportError::LinkLost);
        }
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }

    // ── Firmware behaviour ───────────────────────────────────

    fn on_command(&mut self, command: &str) {
        debug!("SIM | command '{command}'");
        match command {
            "get_address" => {
                if !self.config.drop_acks {
                    let reply = format!("<SUI:{}>", self.public_key_hex());
                    self.send_text(&reply);
                }
            }
            "start_imu" => {
                info!("SIM | IMU streaming on");
                self.streaming = true;
            }
            "stop_imu" => {
                info!("SIM | IMU streaming off");
                self.streaming = false;
                if !self.config.drop_acks {
                    self.send_text("<IMU_STOPPED>");
                }
            }
            "start_current_password_verification" => {
                let verdict = if self.config.password_ok {
                    "<password_correct>"
                } else {
                    "<password_incorrect>"
                };
                self.send_text(verdict);
            }
            other => {
                if let Some(message_hex) = other.strip_prefix("msg") {
                    if !self.config.drop_acks {
                        let signature = self.sign(message_hex);
                        let reply = format!("<SIG:0x{}msg{}>", hex::encode(signature), message_hex);
                        self.send_text(&reply);
                    }
                }
            }
        }
    }

    /// Deterministic 97-byte serialized signature: flag ‖ 64-byte tag ‖ key.
    fn sign(&self, message_hex: &str) -> Vec<u8> {
        let mut hasher = Blake2b::<U64>::new();
        hasher.update(self.config.public_key);
        hasher.update(message_hex.as_bytes());
        let mut out = Vec::with_capacity(97);
        out.push(SIG_FLAG);
        out.extend_from_slice(&hasher.finalize());
        out.extend_from_slice(&self.config.public_key);
        out
    }

    fn send_text(&mut self, text: &str) {
        if !self.subscribed_text {
            return;
        }
        for chunk in chunk_message(text.as_bytes(), self.config.mtu_payload) {
            let _ = self.notify.try_send(Notification::text(chunk));
        }
    }

    fn next_record(&mut self) -> RawRecord {
        let ts = self.stream_ts;
        self.stream_ts = self.stream_ts.wrapping_add(10);
        let phase = ts as f32 * 0.01;
        RawRecord {
            timestamp: ts,
            accel: [phase.sin() * 0.5, phase.cos() * 0.5, 1.0],
            gyro: [phase.cos() * 2.0, 0.0, phase.sin() * -2.0],
        }
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl BleLink for SimulatedDevice {
    async fn scan(
        &mut self,
        name_filter: &str,
        _duration: Duration,
    ) -> Result<Vec<DiscoveredDevice>, TransportError> {
        if !self.config.name.contains(name_filter) {
            return Ok(Vec::new());
        }
        Ok(vec![DiscoveredDevice {
            id: self.config.device_id.clone(),
            name: self.config.name.clone(),
            rssi: Some(self.config.rssi),
        }])
    }

    async fn connect(&mut self, device_id: &str) -> Result<Connection, TransportError> {
        if device_id != self.config.device_id {
            return Err(TransportError::ConnectFailed);
        }
        self.connected = true;
        self.link_lost = false;
        self.rx.reset();
        Ok(Connection {
            device_id: device_id.to_owned(),
            handle: 1,
            capabilities: self.config.capabilities,
        })
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        self.streaming = false;
        self.subscribed_text = false;
        self.subscribed_telemetry = false;
        self.notify.clear();
        Ok(())
    }

    async fn subscribe(&mut self, channel: Channel) -> Result<(), TransportError> {
        self.check_link()?;
        match channel {
            Channel::Text => self.subscribed_text = true,
            Channel::Telemetry => self.subscribed_telemetry = true,
        }
        Ok(())
    }

    async fn write(
        &mut self,
        target: WriteTarget,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<(), TransportError> {
        self.check_link()?;
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(TransportError::WriteFailed);
        }
        if data.len() > self.config.mtu_payload {
            return Err(TransportError::PayloadTooLarge);
        }
        self.writes.push(WriteRecord {
            target,
            data: data.to_vec(),
            mode,
        });

        if target == WriteTarget::Command {
            match self.rx.push(data) {
                Ok(commands) => {
                    for command in commands {
                        self.on_command(&command);
                    }
                }
                Err(_) => return Err(TransportError::WriteFailed),
            }
        }
        Ok(())
    }

    async fn next_notification(&mut self) -> Result<Option<Notification>, TransportError> {
        self.check_link()?;
        if let Ok(notification) = self.notify.try_receive() {
            return Ok(Some(notification));
        }
        if self.streaming && self.subscribed_telemetry {
            self.stream_toggle = !self.stream_toggle;
            if self.stream_toggle {
                let record = self.next_record();
                return Ok(Some(Notification::telemetry(encode_record(&record).to_vec())));
            }
        }
        Ok(None)
    }
}

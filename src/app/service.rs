//! Link service: the hexagonal core.
//!
//! [`LinkService`] owns the signing flow, the training-session machine,
//! the sample rings and the archive.  It performs no I/O: inbound
//! notifications are fed in, outbound commands are queued in an outbox
//! that the async [`DeviceClient`](super::client::DeviceClient) drains
//! onto the radio.  Everything here is testable with plain function
//! calls.
//!
//! ```text
//!  Notification ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                   │         LinkService          │
//!  API calls ─────▶ │ Demux · Signing · Sessions   │ ──▶ outbox (Command)
//!                   └──────────────────────────────┘
//! ```

use std::collections::VecDeque;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::LinkConfig;
use crate::error::{LedgerError, ProtocolError, Result, TransportError};
use crate::link::{Connection, Demultiplexer, Inbound, Notification};
use crate::protocol::{
    AckTag, Command, InboundMessage, PendingAcks, SignedTransaction, SigningFlow, SystemState,
    derive_address, parse_message,
};
use crate::session::{
    IngestStats, Progress, SampleRing, SessionMachine, SessionState, TrainingArchive,
};
use crate::telemetry::{RawRecord, TelemetrySample};

use super::events::{AppEvent, StopReason};
use super::ports::{BroadcastReceipt, EventSink};

// ───────────────────────────────────────────────────────────────
// Supporting types
// ───────────────────────────────────────────────────────────────

/// Device identity learned from `SUI:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub public_key: String,
    pub address: String,
}

/// Summary of the buffered telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImuStats {
    pub total_samples: usize,
    pub display_samples: usize,
    pub oldest_timestamp: Option<u32>,
    pub newest_timestamp: Option<u32>,
}

// ───────────────────────────────────────────────────────────────
// LinkService
// ───────────────────────────────────────────────────────────────

pub struct LinkService {
    config: LinkConfig,
    connection: Option<Connection>,
    demux: Demultiplexer,
    flow: SigningFlow,
    acks: PendingAcks,
    sessions: SessionMachine,
    archive: TrainingArchive,
    display: SampleRing,
    ingest: SampleRing,
    stats: IngestStats,
    identity: Option<Identity>,
    identity_error: Option<ProtocolError>,
    streaming: bool,
    outbox: VecDeque<Command>,
    signed: Option<SignedTransaction>,
}

impl LinkService {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            connection: None,
            demux: Demultiplexer::new(),
            flow: SigningFlow::new(),
            acks: PendingAcks::new(config.ack_timeout_ms),
            sessions: SessionMachine::new(),
            archive: TrainingArchive::new(),
            display: SampleRing::new(config.display_capacity),
            ingest: SampleRing::new(config.archive_capacity),
            stats: IngestStats::default(),
            identity: None,
            identity_error: None,
            streaming: false,
            outbox: VecDeque::new(),
            signed: None,
            config,
        }
    }

    // ── Connection lifecycle ──────────────────────────────────

    /// Adopt a freshly connected device.
    pub fn on_connected(&mut self, connection: Connection, sink: &mut impl EventSink) -> Result<()> {
        connection.capabilities.require_core()?;
        info!(
            "Connected to {} (caps=0b{:05b})",
            connection.device_id,
            connection.capabilities.bits()
        );
        let device_id = connection.device_id.clone();
        self.connection = Some(connection);
        sink.emit(&AppEvent::Connected { device_id });
        Ok(())
    }

    /// Tear down per-connection state.  The session in progress is
    /// abandoned, never committed.
    pub fn on_disconnected(&mut self, lost: bool, sink: &mut impl EventSink) {
        if lost {
            warn!("Link lost");
        } else {
            info!("Disconnected");
        }

        if let Some(session) = self.sessions.abandon() {
            sink.emit(&AppEvent::SessionAbandoned {
                gesture: session.gesture,
                samples: session.samples.len(),
            });
        }
        if self.flow.state() == SystemState::AwaitingSignature {
            self.reset_signing(sink);
        }

        self.demux.reset();
        self.display.clear();
        self.acks.clear();
        self.outbox.clear();
        self.streaming = false;
        self.connection = None;
        sink.emit(&AppEvent::Disconnected { lost });
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    fn require_connected(&self) -> Result<()> {
        if self.connection.is_none() {
            return Err(TransportError::NotConnected.into());
        }
        Ok(())
    }

    // ── Outbound API ──────────────────────────────────────────

    /// Ask the device for its public key.
    pub fn request_address(&mut self, now_ms: u64) -> Result<()> {
        self.require_connected()?;
        self.enqueue(Command::GetAddress, now_ms);
        Ok(())
    }

    /// Ask the device to sign `message`.  Only valid from `Idle`.
    pub fn request_signature(
        &mut self,
        message: &[u8],
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        self.require_connected()?;
        self.flow.begin_signing()?;
        self.signed = None;
        self.enqueue(Command::SignMessage(message.to_vec()), now_ms);
        sink.emit(&AppEvent::SigningState {
            from: SystemState::Idle,
            to: SystemState::AwaitingSignature,
        });
        Ok(())
    }

    /// Give up on the signature locally.
    pub fn cancel_signing(&mut self, sink: &mut impl EventSink) {
        self.acks.cancel(AckTag::Signature);
        self.signed = None;
        if self.flow.state() != SystemState::Idle {
            self.reset_signing(sink);
        }
    }

    /// The signed transaction awaiting broadcast, if one arrived.
    pub fn take_signed(&mut self) -> Option<SignedTransaction> {
        self.signed.take()
    }

    /// Record the ledger outcome.  The flow returns to `Idle` either way.
    pub fn finish_broadcast(
        &mut self,
        outcome: &core::result::Result<BroadcastReceipt, LedgerError>,
        sink: &mut impl EventSink,
    ) {
        let from = self.flow.state();
        self.flow.finish_broadcast();
        if from != SystemState::Idle {
            sink.emit(&AppEvent::SigningState {
                from,
                to: SystemState::Idle,
            });
        }
        match outcome {
            Ok(receipt) => {
                info!("Broadcast accepted: {}", receipt.digest);
                sink.emit(&AppEvent::BroadcastCompleted {
                    digest: receipt.digest.clone(),
                });
            }
            Err(e) => {
                warn!("Broadcast failed: {e}");
                sink.emit(&AppEvent::BroadcastFailed(*e));
            }
        }
    }

    /// Open a training session; `target` falls back to the configured default.
    pub fn start_session(
        &mut self,
        gesture: &str,
        target: Option<u32>,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let target = target.unwrap_or(self.config.default_target_samples);
        let cmd = self.sessions.start(self.is_connected(), gesture, target)?;
        self.streaming = true;
        self.enqueue(cmd, now_ms);
        sink.emit(&AppEvent::SessionStarted {
            gesture: gesture.trim().to_owned(),
            target,
        });
        Ok(())
    }

    /// Stop the active session early.  Returns `false` when there was
    /// nothing to stop or a stop is already in flight.
    pub fn stop_session(&mut self, now_ms: u64, sink: &mut impl EventSink) -> bool {
        let Some(cmd) = self.sessions.stop() else {
            return false;
        };
        self.enqueue(cmd, now_ms);
        self.emit_stop(StopReason::Manual, sink);
        true
    }

    /// Undo a session whose `start_imu` never reached the device.
    pub fn abort_session(&mut self, sink: &mut impl EventSink) {
        self.acks.cancel(AckTag::ImuStopped);
        self.outbox.retain(|c| !matches!(c, Command::StopImu));
        self.streaming = false;
        if let Some(session) = self.sessions.abandon() {
            sink.emit(&AppEvent::SessionAbandoned {
                gesture: session.gesture,
                samples: session.samples.len(),
            });
        }
    }

    /// Queue a password, Morse or gesture-test command.
    ///
    /// Address, signing and IMU commands are refused here; they go
    /// through `request_address`, `request_signature` and the session
    /// operations.
    pub fn send_command(&mut self, cmd: Command, now_ms: u64) -> Result<()> {
        if matches!(
            cmd,
            Command::GetAddress | Command::SignMessage(_) | Command::StartImu | Command::StopImu
        ) {
            return Err(ProtocolError::DedicatedCommand(cmd.name()).into());
        }
        self.require_connected()?;
        cmd.to_wire()?;
        self.enqueue(cmd, now_ms);
        Ok(())
    }

    fn enqueue(&mut self, cmd: Command, now_ms: u64) {
        let expect = match &cmd {
            Command::GetAddress => Some(AckTag::Address),
            Command::SignMessage(_) => Some(AckTag::Signature),
            Command::StopImu => Some(AckTag::ImuStopped),
            Command::StartCurrentPasswordVerification => Some(AckTag::PasswordVerdict),
            _ => None,
        };
        if let Some(tag) = expect {
            self.acks.expect(tag, now_ms);
        }
        debug!("Queued {}", cmd.name());
        self.outbox.push_back(cmd);
    }

    /// Next command to put on the wire.
    pub fn pop_command(&mut self) -> Option<Command> {
        self.outbox.pop_front()
    }

    /// Put back a command whose write failed so the next flush retries it.
    /// Its pending acknowledgement keeps its original deadline.
    pub fn requeue_command(&mut self, cmd: Command) {
        if self.is_connected() {
            debug!("Requeued {}", cmd.name());
            self.outbox.push_front(cmd);
        }
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbox.is_empty()
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Route one notification through framing and into the state machines.
    pub fn handle_notification(
        &mut self,
        notification: &Notification,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) {
        for inbound in self.demux.route(notification) {
            match inbound {
                Inbound::Message(text) => self.handle_message(&text, sink),
                Inbound::Record(record) => self.handle_record(record, now_ms, sink),
                Inbound::Dropped(e) => {
                    self.stats.framing_errors += 1;
                    sink.emit(&AppEvent::FramingDropped(e));
                }
            }
        }
    }

    fn handle_record(&mut self, record: RawRecord, now_ms: u64, sink: &mut impl EventSink) {
        match self.sessions.on_sample(record) {
            Ok((sample, stop)) => {
                self.stats.accepted += 1;
                self.display.push(sample.clone());
                self.ingest.push(sample);
                if let Some(progress) = self.sessions.progress() {
                    sink.emit(&AppEvent::SessionProgress(progress));
                }
                if let Some(cmd) = stop {
                    self.enqueue(cmd, now_ms);
                    self.emit_stop(StopReason::TargetReached, sink);
                }
            }
            Err(e) => {
                self.stats.rejected_no_session += 1;
                warn!("Telemetry t={} rejected: {e}", record.timestamp);
                sink.emit(&AppEvent::TelemetryRejected(e));
            }
        }
    }

    fn handle_message(&mut self, text: &str, sink: &mut impl EventSink) {
        let message = match parse_message(text) {
            Ok(m) => m,
            Err(e) => {
                warn!("Bad message: {e}");
                sink.emit(&AppEvent::ProtocolViolation(e));
                return;
            }
        };

        match message {
            InboundMessage::PublicKey(public_key) => {
                self.acks.resolve(AckTag::Address);
                match derive_address(&public_key) {
                    Ok(address) => {
                        info!("Device address {address}");
                        self.identity_error = None;
                        self.identity = Some(Identity {
                            public_key: public_key.clone(),
                            address: address.clone(),
                        });
                        sink.emit(&AppEvent::IdentityResolved {
                            public_key,
                            address,
                        });
                    }
                    Err(e) => {
                        warn!("Rejecting public key: {e}");
                        self.identity_error = Some(e);
                        sink.emit(&AppEvent::ProtocolViolation(e));
                    }
                }
            }
            InboundMessage::Signature(tx) => match self.flow.on_signature() {
                Ok(()) => {
                    self.acks.resolve(AckTag::Signature);
                    sink.emit(&AppEvent::SigningState {
                        from: SystemState::AwaitingSignature,
                        to: SystemState::Broadcasting,
                    });
                    sink.emit(&AppEvent::SignatureReceived(tx.clone()));
                    self.signed = Some(tx);
                }
                Err(e) => sink.emit(&AppEvent::ProtocolViolation(e)),
            },
            InboundMessage::ImuStopped => {
                self.acks.resolve(AckTag::ImuStopped);
                self.streaming = false;
                if let Some(session) = self.sessions.on_device_ack() {
                    let samples = session.samples.len();
                    sink.emit(&AppEvent::SessionCommitted {
                        gesture: session.gesture.clone(),
                        samples,
                    });
                    self.archive.commit(session.gesture, session.samples);
                }
            }
            InboundMessage::PasswordVerdict(ok) => {
                self.acks.resolve(AckTag::PasswordVerdict);
                info!("Password {}", if ok { "accepted" } else { "rejected" });
                sink.emit(&AppEvent::PasswordVerdict(ok));
            }
            InboundMessage::Unknown(other) => debug!("Ignoring message '{other}'"),
        }
    }

    // ── Timeouts ──────────────────────────────────────────────

    /// Fail acknowledgements that outlived the configured timeout.
    /// Returns the tags that expired.
    pub fn tick(&mut self, now_ms: u64, sink: &mut impl EventSink) -> Vec<AckTag> {
        let expired = self.acks.expired(now_ms);
        for &tag in &expired {
            warn!("No reply for {tag:?}");
            match tag {
                AckTag::Signature => {
                    if self.flow.state() == SystemState::AwaitingSignature {
                        self.reset_signing(sink);
                    }
                }
                AckTag::ImuStopped => {
                    self.streaming = false;
                    if let Some(session) = self.sessions.abandon() {
                        sink.emit(&AppEvent::SessionAbandoned {
                            gesture: session.gesture,
                            samples: session.samples.len(),
                        });
                    }
                }
                AckTag::Address | AckTag::PasswordVerdict => {}
            }
            sink.emit(&AppEvent::AckTimedOut(tag));
        }
        expired.to_vec()
    }

    pub fn is_awaiting(&self, tag: AckTag) -> bool {
        self.acks.is_pending(tag)
    }

    // ── Data management ───────────────────────────────────────

    /// Drop archived data for one gesture, or all of it.
    pub fn clear_training_data(&mut self, gesture: Option<&str>) {
        match gesture {
            Some(name) => {
                self.archive.remove(name);
            }
            None => self.archive.clear(),
        }
    }

    /// Empty both sample rings.
    pub fn clear_imu_data(&mut self) {
        self.display.clear();
        self.ingest.clear();
    }

    pub fn imu_stats(&self) -> ImuStats {
        let all = self.ingest.snapshot();
        ImuStats {
            total_samples: all.len(),
            display_samples: self.display.len(),
            oldest_timestamp: all.first().map(|s| s.timestamp),
            newest_timestamp: all.last().map(|s| s.timestamp),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn signing_state(&self) -> SystemState {
        self.flow.state()
    }

    pub fn session_state(&self) -> SessionState {
        self.sessions.state()
    }

    pub fn active_gesture(&self) -> Option<&str> {
        self.sessions.active_gesture()
    }

    pub fn progress(&self) -> Option<Progress> {
        self.sessions.progress()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Why the last `SUI:` reply was rejected, if it was.
    pub fn identity_error(&self) -> Option<ProtocolError> {
        self.identity_error
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn archive(&self) -> &TrainingArchive {
        &self.archive
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Most recent samples for live display.
    pub fn display_snapshot(&self) -> Vec<TelemetrySample> {
        self.display.snapshot()
    }

    /// Everything still held in the ingest ring.
    pub fn ingest_snapshot(&self) -> Vec<TelemetrySample> {
        self.ingest.snapshot()
    }

    // ── Internals ─────────────────────────────────────────────

    fn reset_signing(&mut self, sink: &mut impl EventSink) {
        let from = self.flow.state();
        self.flow.cancel();
        sink.emit(&AppEvent::SigningState {
            from,
            to: SystemState::Idle,
        });
    }

    fn emit_stop(&self, reason: StopReason, sink: &mut impl EventSink) {
        if let Some(gesture) = self.sessions.active_gesture() {
            sink.emit(&AppEvent::StopRequested {
                gesture: gesture.to_owned(),
                reason,
            });
        }
    }
}

// ── Tests ────────────────────────────────────────────────────

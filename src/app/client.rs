//! Async driver: puts the [`LinkService`] on a real (or simulated) link.
//!
//! The service decides *what* to send; the client owns the transport
//! and the clock and decides *when*.  Each `pump` drains pending
//! notifications into the service, fails overdue acknowledgements and
//! flushes the outbox with paced, chunked writes.
//!
//! ```text
//!   BleLink ──notifications──▶ LinkService ──outbox──▶ send_chunked ──▶ BleLink
//!                                   │
//!                               EventSink
//! ```

use core::time::Duration;

use log::{info, warn};

use crate::config::LinkConfig;
use crate::error::{Error, ProtocolError, Result, SessionError, TransportError};
use crate::link::{
    BleLink, Capabilities, Channel, DiscoveredDevice, WriteMode, WriteTarget, send_chunked,
};
use crate::protocol::{AckTag, Command, SignedTransaction};

use super::ports::{BroadcastReceipt, EventSink, LedgerPort, TimePort};
use super::service::{Identity, LinkService};

pub struct DeviceClient<L: BleLink, T: TimePort> {
    link: L,
    time: T,
    service: LinkService,
    /// Tags that timed out since the last `wait_for`.
    timed_out: Vec<AckTag>,
}

impl<L: BleLink, T: TimePort> DeviceClient<L, T> {
    pub fn new(link: L, time: T, config: LinkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            link,
            time,
            service: LinkService::new(config),
            timed_out: Vec::new(),
        })
    }

    pub fn service(&self) -> &LinkService {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut LinkService {
        &mut self.service
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn time(&self) -> &T {
        &self.time
    }

    fn config(&self) -> &LinkConfig {
        self.service.config()
    }

    // ── Connection ────────────────────────────────────────────

    /// Scan for devices matching the configured name filter.
    pub async fn scan(&mut self) -> Result<Vec<DiscoveredDevice>> {
        let filter = self.config().device_name_filter.clone();
        let duration = Duration::from_millis(u64::from(self.config().scan_duration_ms));
        info!("Scanning for '{}' ({:?})", filter, duration);
        let found = self.link.scan(&filter, duration).await?;
        info!("Scan found {} device(s)", found.len());
        Ok(found)
    }

    /// Connect, verify characteristics and subscribe to both channels.
    pub async fn connect(&mut self, device_id: &str, sink: &mut impl EventSink) -> Result<()> {
        let connection = self.link.connect(device_id).await?;
        if let Err(e) = connection.capabilities.require_core() {
            warn!("{device_id}: {e}");
            let _ = self.link.disconnect().await;
            return Err(e.into());
        }
        for channel in [Channel::Text, Channel::Telemetry] {
            if let Err(e) = self.link.subscribe(channel).await {
                warn!("Subscribe {:?} failed: {e}", channel);
                let _ = self.link.disconnect().await;
                return Err(e.into());
            }
        }
        self.service.on_connected(connection, sink)
    }

    pub async fn disconnect(&mut self, sink: &mut impl EventSink) -> Result<()> {
        let result = self.link.disconnect().await;
        self.service.on_disconnected(false, sink);
        self.timed_out.clear();
        result.map_err(Error::from)
    }

    // ── Event loop ────────────────────────────────────────────

    /// Handle everything that has arrived, expire overdue requests and
    /// flush queued commands.  Returns the number of notifications handled.
    pub async fn pump(&mut self, sink: &mut impl EventSink) -> Result<usize> {
        let budget = self.config().max_notifications_per_pump;
        let mut handled = 0;

        while handled < budget {
            match self.link.next_notification().await {
                Ok(Some(notification)) => {
                    let now = self.time.now_ms();
                    self.service.handle_notification(&notification, now, sink);
                    handled += 1;
                }
                Ok(None) => break,
                Err(e) => return Err(self.on_transport_error(e, sink)),
            }
        }

        let expired = self.service.tick(self.time.now_ms(), sink);
        self.timed_out.extend(expired);
        self.flush(sink).await?;
        Ok(handled)
    }

    /// Write every queued command.
    pub async fn flush(&mut self, sink: &mut impl EventSink) -> Result<()> {
        while let Some(cmd) = self.service.pop_command() {
            let wire = cmd.to_wire()?;
            let (ceiling, delay) = (self.config().chunk_size, self.config().inter_chunk_delay_ms);
            let sent = send_chunked(
                &mut self.link,
                &self.time,
                WriteTarget::Command,
                cmd.write_mode(),
                wire.as_bytes(),
                ceiling,
                delay,
            )
            .await;

            if let Err(e) = sent {
                warn!("Sending {} failed: {e}", cmd.name());
                match cmd {
                    Command::SignMessage(_) => self.service.cancel_signing(sink),
                    Command::StartImu => self.service.abort_session(sink),
                    // Resent on the next flush.
                    Command::StopImu => self.service.requeue_command(cmd),
                    _ => {}
                }
                return Err(self.on_transport_error(e, sink));
            }
            info!("Sent {}", cmd.name());
        }
        Ok(())
    }

    /// Pump until `tag` is answered or times out.
    pub async fn wait_for(&mut self, tag: AckTag, sink: &mut impl EventSink) -> Result<()> {
        loop {
            self.pump(sink).await?;
            if let Some(i) = self.timed_out.iter().position(|&t| t == tag) {
                self.timed_out.swap_remove(i);
                return Err(ProtocolError::AckTimedOut(tag).into());
            }
            if !self.service.is_connected() {
                return Err(TransportError::NotConnected.into());
            }
            if !self.service.is_awaiting(tag) {
                return Ok(());
            }
            self.time.sleep_ms(self.config().poll_interval_ms).await;
        }
    }

    fn on_transport_error(&mut self, e: TransportError, sink: &mut impl EventSink) -> Error {
        if e == TransportError::LinkLost && self.service.is_connected() {
            self.service.on_disconnected(true, sink);
        }
        e.into()
    }

    // ── Identity & signing ────────────────────────────────────

    /// Fetch the public key and derived address.
    pub async fn request_address(&mut self, sink: &mut impl EventSink) -> Result<Identity> {
        self.service.request_address(self.time.now_ms())?;
        self.flush(sink).await?;
        self.wait_for(AckTag::Address, sink).await?;
        match (self.service.identity(), self.service.identity_error()) {
            (_, Some(e)) => Err(e.into()),
            (Some(identity), None) => Ok(identity.clone()),
            (None, None) => Err(ProtocolError::AckTimedOut(AckTag::Address).into()),
        }
    }

    /// Ask the device to sign `message` and wait for the signature.
    /// On return the flow is in `Broadcasting`.
    pub async fn request_signature(
        &mut self,
        message: &[u8],
        sink: &mut impl EventSink,
    ) -> Result<SignedTransaction> {
        let now = self.time.now_ms();
        self.service.request_signature(message, now, sink)?;
        self.flush(sink).await?;
        self.wait_for(AckTag::Signature, sink).await?;
        self.service
            .take_signed()
            .ok_or(Error::Protocol(ProtocolError::NoPendingSignature))
    }

    /// Submit a signed transaction.  The flow is back in `Idle` afterwards
    /// whatever the ledger said.
    pub async fn broadcast(
        &mut self,
        tx: &SignedTransaction,
        ledger: &mut impl LedgerPort,
        sink: &mut impl EventSink,
    ) -> Result<BroadcastReceipt> {
        let outcome = ledger.broadcast(tx).await;
        self.service.finish_broadcast(&outcome, sink);
        outcome.map_err(Error::from)
    }

    /// Full signing round: request, wait, broadcast, back to `Idle`.
    pub async fn sign_and_broadcast(
        &mut self,
        message: &[u8],
        ledger: &mut impl LedgerPort,
        sink: &mut impl EventSink,
    ) -> Result<BroadcastReceipt> {
        let tx = self.request_signature(message, sink).await?;
        self.broadcast(&tx, ledger, sink).await
    }

    // ── Training sessions ─────────────────────────────────────

    pub async fn start_session(
        &mut self,
        gesture: &str,
        target: Option<u32>,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let now = self.time.now_ms();
        self.service.start_session(gesture, target, now, sink)?;
        self.flush(sink).await
    }

    /// Request an early stop.  `false` if nothing was stopped.  A stop
    /// whose write failed earlier is resent either way.
    pub async fn stop_session(&mut self, sink: &mut impl EventSink) -> Result<bool> {
        let stopped = self.service.stop_session(self.time.now_ms(), sink);
        self.flush(sink).await?;
        Ok(stopped)
    }

    /// Run a whole session: start, stream until the target is reached and
    /// the device confirms.  Returns the number of samples archived.
    pub async fn collect(
        &mut self,
        gesture: &str,
        target: Option<u32>,
        sink: &mut impl EventSink,
    ) -> Result<usize> {
        self.start_session(gesture, target, sink).await?;
        let gesture = gesture.trim().to_owned();

        while self.service.active_gesture().is_some() {
            self.pump(sink).await?;
            if let Some(i) = self.timed_out.iter().position(|&t| t == AckTag::ImuStopped) {
                self.timed_out.swap_remove(i);
                return Err(ProtocolError::AckTimedOut(AckTag::ImuStopped).into());
            }
            if !self.service.is_connected() {
                return Err(SessionError::NotConnected.into());
            }
            if self.service.active_gesture().is_some() {
                self.time.sleep_ms(self.config().poll_interval_ms).await;
            }
        }
        Ok(self.service.archive().count(&gesture))
    }

    // ── Other commands ────────────────────────────────────────

    /// Send a password, Morse or gesture-test command.
    pub async fn send_command(&mut self, cmd: Command, sink: &mut impl EventSink) -> Result<()> {
        self.service.send_command(cmd, self.time.now_ms())?;
        self.flush(sink).await
    }

    /// Acknowledged write to the control characteristic.
    pub async fn send_control(&mut self, data: &[u8]) -> Result<()> {
        self.write_aux(WriteTarget::Control, Capabilities::CONTROL, "control", data)
            .await
    }

    /// Acknowledged write to the file-transfer characteristic.
    pub async fn send_file_chunk(&mut self, data: &[u8]) -> Result<()> {
        self.write_aux(
            WriteTarget::FileTransfer,
            Capabilities::FILE_TRANSFER,
            "file_transfer",
            data,
        )
        .await
    }

    async fn write_aux(
        &mut self,
        target: WriteTarget,
        capability: u8,
        name: &'static str,
        data: &[u8],
    ) -> Result<()> {
        let connection = self
            .service
            .connection()
            .ok_or(TransportError::NotConnected)?;
        if !connection.capabilities.contains(capability) {
            return Err(TransportError::CharacteristicMissing(name).into());
        }
        let (ceiling, delay) = (self.config().chunk_size, self.config().inter_chunk_delay_ms);
        send_chunked(
            &mut self.link,
            &self.time,
            target,
            WriteMode::WithResponse,
            data,
            ceiling,
            delay,
        )
        .await?;
        Ok(())
    }
}

//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (stderr through `env_logger` in the binary).  A UI
//! front end would implement the same trait.

use log::{debug, info, warn};

use crate::app::events::{AppEvent, StopReason};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] as a one-line tagged record.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Connected { device_id } => {
                info!("LINK  | connected to {}", device_id);
            }
            AppEvent::Disconnected { lost } => {
                if *lost {
                    warn!("LINK  | lost");
                } else {
                    info!("LINK  | disconnected");
                }
            }
            AppEvent::IdentityResolved { address, .. } => {
                info!("IDENT | address={}", address);
            }
            AppEvent::SigningState { from, to } => {
                info!("SIGN  | {} -> {}", from.as_str(), to.as_str());
            }
            AppEvent::SignatureReceived(tx) => {
                info!(
                    "SIGN  | signature received ({} hex chars over {} hex chars)",
                    tx.signature_hex.len(),
                    tx.message_hex.len()
                );
            }
            AppEvent::BroadcastCompleted { digest } => {
                info!("SIGN  | broadcast ok, digest={}", digest);
            }
            AppEvent::BroadcastFailed(e) => {
                warn!("SIGN  | broadcast failed: {}", e);
            }
            AppEvent::SessionStarted { gesture, target } => {
                info!("TRAIN | '{}' started, target={}", gesture, target);
            }
            AppEvent::SessionProgress(p) => {
                debug!(
                    "TRAIN | {}/{} ({:.1}%)",
                    p.collected, p.target, p.percent
                );
            }
            AppEvent::StopRequested { gesture, reason } => {
                let why = match reason {
                    StopReason::TargetReached => "target reached",
                    StopReason::Manual => "manual",
                };
                info!("TRAIN | '{}' stop requested ({})", gesture, why);
            }
            AppEvent::SessionCommitted { gesture, samples } => {
                info!("TRAIN | '{}' committed, {} samples", gesture, samples);
            }
            AppEvent::SessionAbandoned { gesture, samples } => {
                warn!("TRAIN | '{}' abandoned, {} samples discarded", gesture, samples);
            }
            AppEvent::TelemetryRejected(e) => {
                warn!("IMU   | record rejected: {}", e);
            }
            AppEvent::FramingDropped(e) => {
                warn!("FRAME | {}", e);
            }
            AppEvent::ProtocolViolation(e) => {
                warn!("PROTO | {}", e);
            }
            AppEvent::PasswordVerdict(ok) => {
                info!("AUTH  | password {}", if *ok { "correct" } else { "incorrect" });
            }
            AppEvent::AckTimedOut(tag) => {
                warn!("PROTO | no reply for {:?}", tag);
            }
        }
    }
}

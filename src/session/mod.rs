//! Gesture training sessions.
//!
//! ```text
//!              start                    len ≥ target
//!  NoSession ─────────▶ Active ──────────────────────▶ TargetReached ─┐
//!      ▲                  │            stop()                         │
//!      │                  └──────────────────────────▶ ManuallyStopped┤
//!      │                        IMU_STOPPED (commit)                  │
//!      └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reaching the target or a manual stop only *requests* a stop; samples
//! keep being appended until the device confirms with `IMU_STOPPED`,
//! which is the single point where a session is finalized.

pub mod archive;
pub mod buffers;

use log::{info, warn};
use serde::Serialize;

use crate::error::SessionError;
use crate::protocol::Command;
use crate::telemetry::{RawRecord, TelemetrySample};

pub use archive::TrainingArchive;
pub use buffers::{IngestStats, SampleRing};

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    NoSession,
    Active,
    /// Target hit, stop sent, waiting for the device.
    TargetReached,
    /// Caller stopped early, waiting for the device.
    ManuallyStopped,
}

/// One collection run for one gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSession {
    pub gesture: String,
    pub samples: Vec<TelemetrySample>,
    pub target: u32,
    state: SessionState,
}

impl TrainingSession {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stop_requested(&self) -> bool {
        self.state != SessionState::Active
    }
}

/// Collection progress of the active session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub collected: usize,
    pub target: u32,
    /// Clamped to 100.
    pub percent: f32,
    /// May exceed 100 when samples arrive after the stop request.
    pub raw_percent: f32,
}

impl Progress {
    fn of(collected: usize, target: u32) -> Self {
        let raw_percent = collected as f32 / target.max(1) as f32 * 100.0;
        Self {
            collected,
            target,
            percent: raw_percent.min(100.0),
            raw_percent,
        }
    }
}

/// Owner of the (at most one) active [`TrainingSession`].
#[derive(Debug, Default)]
pub struct SessionMachine {
    active: Option<TrainingSession>,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.active.as_ref().map_or(SessionState::NoSession, |s| s.state)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_gesture(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.gesture.as_str())
    }

    pub fn session(&self) -> Option<&TrainingSession> {
        self.active.as_ref()
    }

    /// Open a session and return the command that starts streaming.
    pub fn start(
        &mut self,
        connected: bool,
        gesture: &str,
        target: u32,
    ) -> Result<Command, SessionError> {
        if !connected {
            return Err(SessionError::NotConnected);
        }
        if self.active.is_some() {
            return Err(SessionError::AlreadyActive);
        }
        let gesture = gesture.trim();
        if gesture.is_empty() {
            return Err(SessionError::EmptyGestureName);
        }
        if target == 0 {
            return Err(SessionError::InvalidTarget);
        }

        info!("Session started: '{}' target={}", gesture, target);
        self.active = Some(TrainingSession {
            gesture: gesture.to_owned(),
            samples: Vec::with_capacity(target as usize),
            target,
            state: SessionState::Active,
        });
        Ok(Command::StartImu)
    }

    /// Append a sample; yields `StopImu` the first time the target is met.
    pub fn on_sample(
        &mut self,
        record: RawRecord,
    ) -> Result<(TelemetrySample, Option<Command>), SessionError> {
        let session = self.active.as_mut().ok_or(SessionError::NoActiveSession)?;
        let sample = record.into_sample(&session.gesture);
        session.samples.push(sample.clone());

        let stop = if session.state == SessionState::Active
            && session.samples.len() >= session.target as usize
        {
            info!(
                "Session '{}' reached target ({} samples), stopping",
                session.gesture, session.target
            );
            session.state = SessionState::TargetReached;
            Some(Command::StopImu)
        } else {
            None
        };
        Ok((sample, stop))
    }

    /// Request an early stop.  `None` if there is nothing to stop.
    pub fn stop(&mut self) -> Option<Command> {
        let session = self.active.as_mut()?;
        if session.stop_requested() {
            return None;
        }
        info!(
            "Session '{}' stopped manually at {} samples",
            session.gesture,
            session.samples.len()
        );
        session.state = SessionState::ManuallyStopped;
        Some(Command::StopImu)
    }

    /// Device confirmed the stop: hand the session over for commit.
    pub fn on_device_ack(&mut self) -> Option<TrainingSession> {
        let session = self.active.take();
        match &session {
            Some(s) => {
                if !s.stop_requested() {
                    warn!("Device stopped '{}' without a stop request", s.gesture);
                }
                info!("Session '{}' finalized with {} samples", s.gesture, s.samples.len());
            }
            None => warn!("IMU_STOPPED with no active session"),
        }
        session
    }

    /// Drop the session without committing (disconnect, ack timeout).
    pub fn abandon(&mut self) -> Option<TrainingSession> {
        let session = self.active.take();
        if let Some(s) = &session {
            warn!("Session '{}' abandoned with {} samples", s.gesture, s.samples.len());
        }
        session
    }

    pub fn progress(&self) -> Option<Progress> {
        self.active
            .as_ref()
            .map(|s| Progress::of(s.samples.len(), s.target))
    }
}

// ── Tests ────────────────────────────────────────────────────

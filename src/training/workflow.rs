//! Gesture training workflow.
//!
//! ```text
//!  Setup ──▶ Collect ──▶ Process ──▶ Train ──▶ Complete
//!  (plan)    (sessions)  (CSV→model) (upload)
//! ```
//!
//! A failed `process` stays in `Process`, a failed `deploy` stays in
//! `Train`; both reset progress to 0 so the step can be retried.

use core::time::Duration;

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::{EventSink, FileServerPort, TimePort, TrainingServerPort};
use crate::app::{DeviceClient, LinkService};
use crate::config::LinkConfig;
use crate::error::{Result, SessionError, WorkflowError};
use crate::link::BleLink;
use crate::telemetry::TelemetrySample;

use super::export::to_csv;
use super::upload::{ModelArtifact, UploadPlan, request_model, upload_model};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum TrainingStep {
    Setup,
    Collect,
    Process,
    Train,
    Complete,
}

/// One planned gesture and how much of it has been collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GestureEntry {
    pub name: String,
    pub collected: usize,
    pub complete: bool,
    pub target: u32,
}

pub struct TrainingWorkflow {
    step: TrainingStep,
    progress: f32,
    busy: bool,
    gestures: Vec<GestureEntry>,
    collecting: Option<String>,
    artifact: Option<ModelArtifact>,
    default_target: u32,
    training_timeout: Duration,
    model_filename: String,
    upload_chunk_size: usize,
    upload_pacing_ms: u32,
}

impl TrainingWorkflow {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            step: TrainingStep::Setup,
            progress: 0.0,
            busy: false,
            gestures: Vec::new(),
            collecting: None,
            artifact: None,
            default_target: config.default_target_samples,
            training_timeout: Duration::from_secs(u64::from(config.training_timeout_secs)),
            model_filename: config.model_filename.clone(),
            upload_chunk_size: config.upload_chunk_size,
            upload_pacing_ms: config.upload_pacing_ms,
        }
    }

    // ── Planning ──────────────────────────────────────────────

    pub fn add_gesture(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkflowError::EmptyName.into());
        }
        if self.gestures.iter().any(|g| g.name.eq_ignore_ascii_case(name)) {
            return Err(WorkflowError::DuplicateGesture.into());
        }
        self.gestures.push(GestureEntry {
            name: name.to_owned(),
            collected: 0,
            complete: false,
            target: self.default_target,
        });
        Ok(())
    }

    pub fn remove_gesture(&mut self, name: &str) -> Result<()> {
        let before = self.gestures.len();
        self.gestures.retain(|g| g.name != name);
        if self.gestures.len() == before {
            return Err(WorkflowError::UnknownGesture.into());
        }
        Ok(())
    }

    /// Leave `Setup`.  Needs at least one gesture.
    pub fn begin_collection(&mut self) -> Result<()> {
        if self.gestures.is_empty() {
            return Err(WorkflowError::NoGestures.into());
        }
        self.step = TrainingStep::Collect;
        Ok(())
    }

    // ── Collection ────────────────────────────────────────────

    fn target_for(&self, name: &str) -> Result<u32> {
        if self.step != TrainingStep::Collect {
            return Err(WorkflowError::WrongStep.into());
        }
        self.gestures
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.target)
            .ok_or_else(|| WorkflowError::UnknownGesture.into())
    }

    /// Open a session for a planned gesture.
    pub async fn start_collection<L: BleLink, T: TimePort>(
        &mut self,
        client: &mut DeviceClient<L, T>,
        name: &str,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let target = self.target_for(name)?;
        if client.service().active_gesture().is_some() {
            return Err(SessionError::AlreadyActive.into());
        }
        client.start_session(name, Some(target), sink).await?;
        self.collecting = Some(name.to_owned());
        Ok(())
    }

    /// Collect a planned gesture to completion.
    pub async fn collect<L: BleLink, T: TimePort>(
        &mut self,
        client: &mut DeviceClient<L, T>,
        name: &str,
        sink: &mut impl EventSink,
    ) -> Result<usize> {
        let target = self.target_for(name)?;
        self.collecting = Some(name.to_owned());
        let result = client.collect(name, Some(target), sink).await;
        self.sync(client.service());
        result
    }

    /// Refresh per-gesture counts from the live session and the archive.
    pub fn sync(&mut self, service: &LinkService) {
        let active = service.active_gesture();
        let live = service.progress();

        for g in &mut self.gestures {
            g.collected = match (active, live) {
                (Some(name), Some(p)) if name == g.name => p.collected,
                _ => service.archive().count(&g.name),
            };
            g.complete = g.collected >= g.target as usize;
        }
        self.collecting = active.map(str::to_owned);
    }

    pub fn all_gestures_complete(&self) -> bool {
        !self.gestures.is_empty() && self.gestures.iter().all(|g| g.complete)
    }

    // ── Model ─────────────────────────────────────────────────

    /// Export `samples`, have the server train a model and keep it.
    pub async fn process<S: TrainingServerPort>(
        &mut self,
        server: &mut S,
        samples: &[TelemetrySample],
    ) -> Result<()> {
        if self.step == TrainingStep::Setup {
            return Err(WorkflowError::WrongStep.into());
        }
        self.step = TrainingStep::Process;
        self.busy = true;
        self.progress = 0.0;

        let outcome = if samples.is_empty() {
            Err(WorkflowError::NoSamples.into())
        } else {
            let csv = to_csv(samples);
            request_model(server, &csv, self.training_timeout).await
        };
        self.busy = false;

        match outcome {
            Ok(artifact) => {
                self.artifact = Some(artifact);
                self.step = TrainingStep::Train;
                self.progress = 100.0;
                Ok(())
            }
            Err(e) => {
                warn!("Processing failed: {e}");
                self.progress = 0.0;
                Err(e)
            }
        }
    }

    /// Upload the trained model to the device.
    pub async fn deploy<F: FileServerPort, T: TimePort>(
        &mut self,
        server: &mut F,
        time: &T,
    ) -> Result<()> {
        let Some(artifact) = self.artifact.as_ref() else {
            return Err(WorkflowError::NoArtifact.into());
        };
        self.step = TrainingStep::Train;
        self.busy = true;
        self.progress = 0.0;

        let plan = UploadPlan {
            filename: &self.model_filename,
            chunk_size: self.upload_chunk_size,
            pacing_ms: self.upload_pacing_ms,
        };
        let progress = &mut self.progress;
        let outcome = upload_model(server, time, artifact, &plan, |p| *progress = p).await;
        self.busy = false;

        match outcome {
            Ok(chunks) => {
                info!("Model deployed in {chunks} chunk(s)");
                self.step = TrainingStep::Complete;
                self.progress = 100.0;
                Ok(())
            }
            Err(e) => {
                warn!("Deploy failed: {e}");
                self.step = TrainingStep::Train;
                self.progress = 0.0;
                Err(e)
            }
        }
    }

    /// Back to an empty `Setup`.
    pub fn reset(&mut self) {
        self.step = TrainingStep::Setup;
        self.progress = 0.0;
        self.busy = false;
        self.gestures.clear();
        self.collecting = None;
        self.artifact = None;
    }

    // ── Queries ───────────────────────────────────────────────

    /// Overall progress for the current step, 0–100.
    pub fn total_progress(&self) -> f32 {
        match self.step {
            TrainingStep::Setup => 0.0,
            TrainingStep::Collect => {
                let expected: u64 = self.gestures.iter().map(|g| u64::from(g.target)).sum();
                if expected == 0 {
                    return 0.0;
                }
                let collected: usize = self.gestures.iter().map(|g| g.collected).sum();
                (collected as f32 / expected as f32 * 100.0).min(100.0)
            }
            _ => self.progress,
        }
    }

    pub fn step(&self) -> TrainingStep {
        self.step
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn gestures(&self) -> &[GestureEntry] {
        &self.gestures
    }

    pub fn currently_collecting(&self) -> Option<&str> {
        self.collecting.as_deref()
    }

    pub fn artifact(&self) -> Option<&ModelArtifact> {
        self.artifact.as_ref()
    }
}

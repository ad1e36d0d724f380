//! Link configuration parameters
//!
//! All tunable parameters for the Step-to-Sign link.
//! Values can be overridden from a JSON document; missing keys keep
//! their defaults.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Core link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    // --- Transport ---
    /// Substring the advertised device name must contain
    pub device_name_filter: String,
    /// How long a scan runs (milliseconds)
    pub scan_duration_ms: u32,
    /// Maximum payload per write (bytes, MTU minus ATT header)
    pub chunk_size: usize,
    /// Pause between consecutive chunk writes (milliseconds)
    pub inter_chunk_delay_ms: u32,

    // --- Driver ---
    /// Sleep between notification polls while waiting on the device (milliseconds)
    pub poll_interval_ms: u32,
    /// Upper bound on notifications handled per pump call
    pub max_notifications_per_pump: usize,

    // --- Ingestion ---
    /// Samples kept for live display
    pub display_capacity: usize,
    /// Samples kept in the ingest ring (oldest evicted)
    pub archive_capacity: usize,

    // --- Sessions ---
    /// Samples collected per gesture when the caller does not say
    pub default_target_samples: u32,
    /// Device acknowledgement timeout; `None` waits forever
    pub ack_timeout_ms: Option<u32>,

    // --- Training export ---
    /// Training server request timeout (seconds)
    pub training_timeout_secs: u32,
    /// Base64 characters per model upload chunk
    pub upload_chunk_size: usize,
    /// Pause between upload chunks (milliseconds)
    pub upload_pacing_ms: u32,
    /// File name the device stores the model under
    pub model_filename: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            // Transport
            device_name_filter: "Step-to-Sign".into(),
            scan_duration_ms: 10_000,
            chunk_size: 20, // 23-byte MTU minus 3-byte ATT header
            inter_chunk_delay_ms: 20,

            // Driver
            poll_interval_ms: 5,
            max_notifications_per_pump: 64,

            // Ingestion
            display_capacity: 500,
            archive_capacity: 10_000,

            // Sessions
            default_target_samples: 1000,
            ack_timeout_ms: Some(30_000),

            // Training export
            training_timeout_secs: 300, // 5 min
            upload_chunk_size: 8 * 1024,
            upload_pacing_ms: 50,
            model_filename: "gesture_model.h".into(),
        }
    }
}

impl LinkConfig {
    /// Parse a (possibly partial) JSON document over the defaults and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed config JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the link cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be non-zero"));
        }
        if self.display_capacity == 0 || self.archive_capacity == 0 {
            return Err(Error::Config("sample buffers must be non-empty"));
        }
        if self.display_capacity > self.archive_capacity {
            return Err(Error::Config("display_capacity exceeds archive_capacity"));
        }
        if self.default_target_samples == 0 {
            return Err(Error::Config("default_target_samples must be non-zero"));
        }
        if self.max_notifications_per_pump == 0 {
            return Err(Error::Config("max_notifications_per_pump must be non-zero"));
        }
        if self.upload_chunk_size == 0 || self.upload_chunk_size % 4 != 0 {
            return Err(Error::Config("upload_chunk_size must be a non-zero multiple of 4"));
        }
        if self.ack_timeout_ms == Some(0) {
            return Err(Error::Config("ack_timeout_ms must be non-zero when set"));
        }
        Ok(())
    }
}

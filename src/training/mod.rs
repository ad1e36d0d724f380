//! Gesture-model training on top of collected sessions.
//!
//! - [`export`]: CSV rendering of samples
//! - [`upload`]: training-server request and device file-server upload
//! - [`workflow`]: step machine tying collection, processing and deploy together

pub mod export;
pub mod upload;
pub mod workflow;

pub use export::{CSV_HEADER, to_csv};
pub use upload::{ModelArtifact, UploadPlan, request_model, upload_model};
pub use workflow::{GestureEntry, TrainingStep, TrainingWorkflow};

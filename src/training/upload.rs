//! Model request and chunked upload to the device file server.
//!
//! ```text
//!  POST /upload_start   {filename, totalSize}
//!  POST /upload_chunk   {chunk, chunkIndex, filename}   × n   (50 ms apart)
//!  POST /upload_finish  {filename}
//! ```
//!
//! `chunk` is a slice of the base64 text as returned by the training
//! server; `totalSize` is the decoded model size in bytes.

use core::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;

use crate::app::ports::{FileServerPort, TimePort, TrainingServerPort};
use crate::error::{HttpError, Result};

pub const PATH_UPLOAD_START: &str = "/upload_start";
pub const PATH_UPLOAD_CHUNK: &str = "/upload_chunk";
pub const PATH_UPLOAD_FINISH: &str = "/upload_finish";

/// Share of the progress bar spent on chunks; the finish call takes the rest.
const CHUNK_PROGRESS_SHARE: f32 = 90.0;

/// JSON body returned by the training server.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainResponse {
    /// Base64-encoded C header with the model weights.
    pub model_h: String,
    #[serde(default)]
    pub classes: Vec<String>,
}

/// A trained model ready for deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    model_base64: String,
    size_bytes: usize,
    pub classes: Vec<String>,
}

impl ModelArtifact {
    /// Validate the base64 payload and record its decoded size.
    pub fn from_base64(model_base64: String, classes: Vec<String>) -> Result<Self> {
        let size_bytes = BASE64
            .decode(model_base64.as_bytes())
            .map_err(|_| HttpError::Decode)?
            .len();
        Ok(Self {
            model_base64,
            size_bytes,
            classes,
        })
    }

    pub fn from_response_json(body: &str) -> Result<Self> {
        let response: TrainResponse = serde_json::from_str(body).map_err(|_| HttpError::Decode)?;
        Self::from_base64(response.model_h, response.classes)
    }

    pub fn base64(&self) -> &str {
        &self.model_base64
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        Ok(BASE64
            .decode(self.model_base64.as_bytes())
            .map_err(|_| HttpError::Decode)?)
    }

    /// Number of upload chunks at `chunk_size` base64 characters each.
    pub fn chunk_count(&self, chunk_size: usize) -> usize {
        self.model_base64.len().div_ceil(chunk_size.max(1))
    }
}

/// Send the CSV export to the training server and decode its reply.
pub async fn request_model<S: TrainingServerPort>(
    server: &mut S,
    csv: &str,
    timeout: Duration,
) -> Result<ModelArtifact> {
    info!("Requesting model ({} B of CSV, timeout {:?})", csv.len(), timeout);
    let body = server.train(csv, timeout).await?;
    let artifact = ModelArtifact::from_response_json(&body)?;
    info!(
        "Model received: {} B, classes {:?}",
        artifact.size_bytes(),
        artifact.classes
    );
    Ok(artifact)
}

/// Upload parameters.
#[derive(Debug, Clone)]
pub struct UploadPlan<'a> {
    pub filename: &'a str,
    pub chunk_size: usize,
    pub pacing_ms: u32,
}

/// Push `artifact` to the device file server.  `on_progress` receives
/// 0–90 while chunks go out and 100 once the upload is finalized.
/// Returns the number of chunks sent.
pub async fn upload_model<F: FileServerPort, T: TimePort>(
    server: &mut F,
    time: &T,
    artifact: &ModelArtifact,
    plan: &UploadPlan<'_>,
    mut on_progress: impl FnMut(f32),
) -> Result<usize> {
    let total = artifact.chunk_count(plan.chunk_size);
    info!(
        "Uploading {} ({} B, {} chunks)",
        plan.filename,
        artifact.size_bytes(),
        total
    );

    post(
        server,
        PATH_UPLOAD_START,
        &json!({ "filename": plan.filename, "totalSize": artifact.size_bytes() }),
    )
    .await?;

    let chunks = artifact.base64().as_bytes().chunks(plan.chunk_size.max(1));
    for (i, chunk) in chunks.enumerate() {
        // Base64 is ASCII, so any byte slice of it is valid UTF-8.
        let chunk = core::str::from_utf8(chunk).map_err(|_| HttpError::Decode)?;
        post(
            server,
            PATH_UPLOAD_CHUNK,
            &json!({ "chunk": chunk, "chunkIndex": i, "filename": plan.filename }),
        )
        .await?;
        debug!("Chunk {}/{} sent ({} chars)", i + 1, total, chunk.len());

        on_progress((i + 1) as f32 / total as f32 * CHUNK_PROGRESS_SHARE);
        time.sleep_ms(plan.pacing_ms).await;
    }

    post(server, PATH_UPLOAD_FINISH, &json!({ "filename": plan.filename })).await?;
    on_progress(100.0);
    info!("Upload of {} complete", plan.filename);
    Ok(total)
}

async fn post<F: FileServerPort>(
    server: &mut F,
    path: &str,
    body: &serde_json::Value,
) -> Result<()> {
    let status = server.post_json(path, body).await?;
    if !(200..300).contains(&status) {
        warn!("POST {path} -> {status}");
        return Err(HttpError::Status(status).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_from_json() {
        let a = ModelArtifact::from_response_json(
            r#"{ "model_h": "aGVsbG8=", "classes": ["wave", "tap"] }"#,
        )
        .unwrap();
        assert_eq!(a.size_bytes(), 5);
        assert_eq!(a.bytes().unwrap(), b"hello");
        assert_eq!(a.classes, vec!["wave", "tap"]);
    }

    #[test]
    fn classes_are_optional() {
        let a = ModelArtifact::from_response_json(r#"{ "model_h": "" }"#).unwrap();
        assert_eq!(a.size_bytes(), 0);
        assert!(a.classes.is_empty());
    }

    #[test]
    fn bad_payloads_are_decode_errors() {
        use crate::error::Error;
        assert_eq!(
            ModelArtifact::from_response_json("not json"),
            Err(Error::Http(HttpError::Decode))
        );
        assert_eq!(
            ModelArtifact::from_response_json(r#"{ "model_h": "!!!" }"#),
            Err(Error::Http(HttpError::Decode))
        );
    }

    #[test]
    fn chunk_count_rounds_up() {
        let a = ModelArtifact::from_base64("A".repeat(8), vec![]).unwrap();
        assert_eq!(a.chunk_count(4), 2);
        assert_eq!(a.chunk_count(3), 3);
        assert_eq!(a.chunk_count(8192), 1);
    }
}

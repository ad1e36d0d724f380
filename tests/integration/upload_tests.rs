//! Model request and chunked upload against mock servers.

use core::time::Duration;

use futures_lite::future::block_on;

use steptosign::error::{Error, HttpError};
use steptosign::training::{ModelArtifact, UploadPlan, request_model, upload_model};

use crate::mock_ports::{ManualTime, MockFileServer, MockTrainingServer};

fn plan(chunk_size: usize) -> UploadPlan<'static> {
    UploadPlan {
        filename: "gesture_model.h",
        chunk_size,
        pacing_ms: 50,
    }
}

#[test]
fn chunks_are_indexed_paced_and_complete() {
    let artifact = ModelArtifact::from_base64("QUJDREVGR0hJSktMTU5PUA==".into(), vec![]).unwrap();
    let mut files = MockFileServer::default();
    let time = ManualTime::default();
    let mut progress = Vec::new();

    let sent = block_on(upload_model(&mut files, &time, &artifact, &plan(8), |p| {
        progress.push(p)
    }))
    .unwrap();
    assert_eq!(sent, 3);

    let (start_path, start) = &files.posts[0];
    assert_eq!(start_path, "/upload_start");
    assert_eq!(start["totalSize"], 16);

    let chunks: Vec<_> = files
        .posts
        .iter()
        .filter(|(p, _)| p == "/upload_chunk")
        .map(|(_, body)| body)
        .collect();
    assert_eq!(chunks.len(), 3);
    let mut rebuilt = String::new();
    for (i, body) in chunks.iter().enumerate() {
        assert_eq!(body["chunkIndex"], i);
        assert_eq!(body["filename"], "gesture_model.h");
        rebuilt.push_str(body["chunk"].as_str().unwrap());
    }
    assert_eq!(rebuilt, artifact.base64());

    assert_eq!(files.paths().last(), Some(&"/upload_finish"));
    assert_eq!(time.slept(), vec![50, 50, 50]);

    assert_eq!(progress.len(), 4);
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
    assert!((progress[2] - 90.0).abs() < 1e-3);
    assert!((progress[3] - 100.0).abs() < f32::EPSILON);
}

#[test]
fn rejected_start_sends_nothing_else() {
    let artifact = ModelArtifact::from_base64("AAAA".into(), vec![]).unwrap();
    let mut files = MockFileServer {
        fail: Some(("/upload_start", 507)),
        ..MockFileServer::default()
    };
    let time = ManualTime::default();

    let err = block_on(upload_model(&mut files, &time, &artifact, &plan(8), |_| {})).unwrap_err();
    assert_eq!(err, Error::Http(HttpError::Status(507)));
    assert_eq!(files.paths(), vec!["/upload_start"]);
    assert!(time.slept().is_empty());
}

#[test]
fn empty_model_uploads_no_chunks() {
    let artifact = ModelArtifact::from_base64(String::new(), vec![]).unwrap();
    let mut files = MockFileServer::default();
    let time = ManualTime::default();

    let sent = block_on(upload_model(&mut files, &time, &artifact, &plan(8), |_| {})).unwrap();
    assert_eq!(sent, 0);
    assert_eq!(files.paths(), vec!["/upload_start", "/upload_finish"]);
}

#[test]
fn request_model_passes_csv_and_timeout() {
    let mut trainer = MockTrainingServer::with_model("AQID", &["tap"]);
    let artifact = block_on(request_model(&mut trainer, "timestamp\n1", Duration::from_secs(7))).unwrap();
    assert_eq!(artifact.bytes().unwrap(), vec![1, 2, 3]);
    assert_eq!(trainer.requests, vec![("timestamp\n1".to_owned(), Duration::from_secs(7))]);
}

#[test]
fn request_model_surfaces_transport_errors() {
    let mut trainer = MockTrainingServer::failing(HttpError::Io);
    assert_eq!(
        block_on(request_model(&mut trainer, "", Duration::from_secs(1))),
        Err(Error::Http(HttpError::Io))
    );
}

//! TrainingWorkflow from planning through deploy, against the simulated
//! device and mock HTTP collaborators.

use core::time::Duration;

use futures_lite::future::block_on;

use steptosign::adapters::sim_link::SimConfig;
use steptosign::error::{Error, HttpError, SessionError, WorkflowError};
use steptosign::telemetry::TelemetrySample;
use steptosign::training::{CSV_HEADER, TrainingStep, TrainingWorkflow};

use crate::mock_ports::{
    MockFileServer, MockTrainingServer, SimClient, connected_client, test_config,
};

/// "hello world" in base64: 16 characters, 11 bytes.
const MODEL_B64: &str = "aGVsbG8gd29ybGQ=";

fn collected(gestures: &[&str]) -> (TrainingWorkflow, SimClient) {
    let config = test_config();
    let mut workflow = TrainingWorkflow::new(&config);
    let (mut client, mut sink) = connected_client(config, SimConfig::default());
    for g in gestures {
        workflow.add_gesture(g).unwrap();
    }
    workflow.begin_collection().unwrap();
    for g in gestures {
        block_on(workflow.collect(&mut client, g, &mut sink)).unwrap();
    }
    (workflow, client)
}

fn archived(client: &SimClient) -> Vec<TelemetrySample> {
    client.service().archive().all_samples().cloned().collect()
}

// ── Collection ────────────────────────────────────────────────

#[test]
fn collecting_every_gesture_completes_the_step() {
    let (workflow, client) = collected(&["heel", "toe"]);

    assert_eq!(workflow.step(), TrainingStep::Collect);
    assert!(workflow.all_gestures_complete());
    assert!((workflow.total_progress() - 100.0).abs() < 1e-3);
    assert!(workflow.currently_collecting().is_none());
    for g in workflow.gestures() {
        assert_eq!(g.collected, 20);
        assert!(g.complete);
    }
    assert_eq!(client.service().archive().total_samples(), 40);
}

#[test]
fn half_collected_plan_reports_half_progress() {
    let config = test_config();
    let mut workflow = TrainingWorkflow::new(&config);
    let (mut client, mut sink) = connected_client(config, SimConfig::default());
    workflow.add_gesture("heel").unwrap();
    workflow.add_gesture("toe").unwrap();
    workflow.begin_collection().unwrap();

    block_on(workflow.collect(&mut client, "heel", &mut sink)).unwrap();
    assert!((workflow.total_progress() - 50.0).abs() < 1e-3);
    assert!(!workflow.all_gestures_complete());
}

#[test]
fn collection_guards() {
    let config = test_config();
    let mut workflow = TrainingWorkflow::new(&config);
    let (mut client, mut sink) = connected_client(config, SimConfig::default());
    workflow.add_gesture("heel").unwrap();
    workflow.add_gesture("toe").unwrap();

    // Still in Setup.
    assert_eq!(
        block_on(workflow.collect(&mut client, "heel", &mut sink)),
        Err(Error::Workflow(WorkflowError::WrongStep))
    );

    workflow.begin_collection().unwrap();
    assert_eq!(
        block_on(workflow.collect(&mut client, "jump", &mut sink)),
        Err(Error::Workflow(WorkflowError::UnknownGesture))
    );

    block_on(workflow.start_collection(&mut client, "heel", &mut sink)).unwrap();
    assert_eq!(workflow.currently_collecting(), Some("heel"));
    assert_eq!(
        block_on(workflow.start_collection(&mut client, "toe", &mut sink)),
        Err(Error::Session(SessionError::AlreadyActive))
    );
}

#[test]
fn sync_tracks_live_session() {
    let config = test_config();
    let mut workflow = TrainingWorkflow::new(&config);
    let (mut client, mut sink) = connected_client(config, SimConfig::default());
    workflow.add_gesture("heel").unwrap();
    workflow.begin_collection().unwrap();

    block_on(async {
        workflow
            .start_collection(&mut client, "heel", &mut sink)
            .await
            .unwrap();
        for _ in 0..5 {
            client.pump(&mut sink).await.unwrap();
        }
    });
    workflow.sync(client.service());
    assert_eq!(workflow.gestures()[0].collected, 5);
    assert!(!workflow.gestures()[0].complete);
    assert!((workflow.total_progress() - 25.0).abs() < 1e-3);
}

// ── Processing ────────────────────────────────────────────────

#[test]
fn process_then_deploy() {
    let (mut workflow, client) = collected(&["heel", "toe"]);
    let mut trainer = MockTrainingServer::with_model(MODEL_B64, &["heel", "toe"]);
    let mut files = MockFileServer::default();

    block_on(workflow.process(&mut trainer, &archived(&client))).unwrap();
    assert_eq!(workflow.step(), TrainingStep::Train);
    assert!(!workflow.is_busy());

    let (csv, timeout) = &trainer.requests[0];
    assert_eq!(*timeout, Duration::from_secs(300));
    assert_eq!(csv.lines().next(), Some(CSV_HEADER));
    assert_eq!(csv.lines().count(), 41);
    assert!(csv.lines().skip(1).all(|l| l.ends_with(",heel") || l.ends_with(",toe")));

    let artifact = workflow.artifact().unwrap();
    assert_eq!(artifact.size_bytes(), 11);
    assert_eq!(artifact.classes, vec!["heel", "toe"]);

    block_on(workflow.deploy(&mut files, client.time())).unwrap();
    assert_eq!(workflow.step(), TrainingStep::Complete);
    assert!((workflow.progress() - 100.0).abs() < f32::EPSILON);
    assert_eq!(
        files.paths(),
        vec!["/upload_start", "/upload_chunk", "/upload_chunk", "/upload_finish"]
    );
    assert_eq!(files.posts[0].1["filename"], "gesture_model.h");
    assert_eq!(files.posts[0].1["totalSize"], 11);
}

#[test]
fn failed_processing_can_be_retried() {
    let (mut workflow, client) = collected(&["heel"]);
    let samples = archived(&client);

    let mut down = MockTrainingServer::failing(HttpError::Timeout);
    assert_eq!(
        block_on(workflow.process(&mut down, &samples)),
        Err(Error::Http(HttpError::Timeout))
    );
    assert_eq!(workflow.step(), TrainingStep::Process);
    assert!(workflow.progress().abs() < f32::EPSILON);
    assert!(!workflow.is_busy());
    assert!(workflow.artifact().is_none());

    let mut garbled = MockTrainingServer::failing(HttpError::Decode);
    garbled.reply = Ok("{ \"nope\": 1 }".into());
    assert_eq!(
        block_on(workflow.process(&mut garbled, &samples)),
        Err(Error::Http(HttpError::Decode))
    );

    let mut up = MockTrainingServer::with_model(MODEL_B64, &["heel"]);
    block_on(workflow.process(&mut up, &samples)).unwrap();
    assert_eq!(workflow.step(), TrainingStep::Train);
}

#[test]
fn processing_needs_samples_and_a_plan() {
    let mut workflow = TrainingWorkflow::new(&test_config());
    let mut trainer = MockTrainingServer::with_model(MODEL_B64, &[]);
    assert_eq!(
        block_on(workflow.process(&mut trainer, &[])),
        Err(Error::Workflow(WorkflowError::WrongStep))
    );

    workflow.add_gesture("heel").unwrap();
    workflow.begin_collection().unwrap();
    assert_eq!(
        block_on(workflow.process(&mut trainer, &[])),
        Err(Error::Workflow(WorkflowError::NoSamples))
    );
    assert!(trainer.requests.is_empty());
}

#[test]
fn failed_deploy_stays_in_train() {
    let (mut workflow, client) = collected(&["heel"]);
    let mut trainer = MockTrainingServer::with_model(MODEL_B64, &["heel"]);
    block_on(workflow.process(&mut trainer, &archived(&client))).unwrap();

    let mut files = MockFileServer {
        fail: Some(("/upload_chunk", 500)),
        ..MockFileServer::default()
    };
    assert_eq!(
        block_on(workflow.deploy(&mut files, client.time())),
        Err(Error::Http(HttpError::Status(500)))
    );
    assert_eq!(workflow.step(), TrainingStep::Train);
    assert!(workflow.progress().abs() < f32::EPSILON);
    assert!(!files.paths().contains(&"/upload_finish"));

    let mut healthy = MockFileServer::default();
    block_on(workflow.deploy(&mut healthy, client.time())).unwrap();
    assert_eq!(workflow.step(), TrainingStep::Complete);
}

#[test]
fn deploy_without_model_is_refused() {
    let (mut workflow, client) = collected(&["heel"]);
    let mut files = MockFileServer::default();
    assert_eq!(
        block_on(workflow.deploy(&mut files, client.time())),
        Err(Error::Workflow(WorkflowError::NoArtifact))
    );
    assert!(files.posts.is_empty());
}

#[test]
fn reset_returns_to_setup() {
    let (mut workflow, _client) = collected(&["heel"]);
    workflow.reset();
    assert_eq!(workflow.step(), TrainingStep::Setup);
    assert!(workflow.gestures().is_empty());
    assert!(workflow.artifact().is_none());
}

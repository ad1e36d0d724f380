//! Mock adapters for integration tests.
//!
//! Every mock records what it was asked to do so tests can assert on
//! the full call history without a radio, a clock or a network.

use core::cell::{Cell, RefCell};
use core::time::Duration;

use steptosign::adapters::sim_link::{SimConfig, SimulatedDevice};
use steptosign::app::DeviceClient;
use steptosign::app::events::AppEvent;
use steptosign::app::ports::{
    BroadcastReceipt, EventSink, FileServerPort, LedgerError, LedgerPort, TimePort,
    TrainingServerPort,
};
use steptosign::config::LinkConfig;
use steptosign::error::HttpError;
use steptosign::protocol::SignedTransaction;

// ── ManualTime ────────────────────────────────────────────────

/// Clock that only moves when someone sleeps.
#[derive(Default)]
pub struct ManualTime {
    now: Cell<u64>,
    pub sleeps: RefCell<Vec<u32>>,
}

#[allow(dead_code)]
impl ManualTime {
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn slept(&self) -> Vec<u32> {
        self.sleeps.borrow().clone()
    }
}

impl TimePort for ManualTime {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    async fn sleep_ms(&self, ms: u32) {
        self.sleeps.borrow_mut().push(ms);
        self.advance(u64::from(ms));
    }
}

// ── Recorder ──────────────────────────────────────────────────

#[derive(Default)]
pub struct Recorder {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for Recorder {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockLedger ────────────────────────────────────────────────

pub struct MockLedger {
    pub outcome: Result<BroadcastReceipt, LedgerError>,
    pub submitted: Vec<SignedTransaction>,
}

#[allow(dead_code)]
impl MockLedger {
    pub fn accepting(digest: &str) -> Self {
        Self {
            outcome: Ok(BroadcastReceipt {
                digest: digest.into(),
            }),
            submitted: Vec::new(),
        }
    }

    pub fn failing(error: LedgerError) -> Self {
        Self {
            outcome: Err(error),
            submitted: Vec::new(),
        }
    }
}

impl LedgerPort for MockLedger {
    async fn broadcast(&mut self, tx: &SignedTransaction) -> Result<BroadcastReceipt, LedgerError> {
        self.submitted.push(tx.clone());
        self.outcome.clone()
    }
}

// ── MockTrainingServer ────────────────────────────────────────

pub struct MockTrainingServer {
    pub reply: Result<String, HttpError>,
    pub requests: Vec<(String, Duration)>,
}

#[allow(dead_code)]
impl MockTrainingServer {
    /// Replies with a model whose base64 text is `model_b64`.
    pub fn with_model(model_b64: &str, classes: &[&str]) -> Self {
        let reply = serde_json::json!({ "model_h": model_b64, "classes": classes }).to_string();
        Self {
            reply: Ok(reply),
            requests: Vec::new(),
        }
    }

    pub fn failing(error: HttpError) -> Self {
        Self {
            reply: Err(error),
            requests: Vec::new(),
        }
    }
}

impl TrainingServerPort for MockTrainingServer {
    async fn train(&mut self, csv: &str, timeout: Duration) -> Result<String, HttpError> {
        self.requests.push((csv.to_owned(), timeout));
        self.reply.clone()
    }
}

// ── MockFileServer ────────────────────────────────────────────

#[derive(Default)]
pub struct MockFileServer {
    pub posts: Vec<(String, serde_json::Value)>,
    /// Answer this path with the given status instead of 200.
    pub fail: Option<(&'static str, u16)>,
}

#[allow(dead_code)]
impl MockFileServer {
    pub fn paths(&self) -> Vec<&str> {
        self.posts.iter().map(|(p, _)| p.as_str()).collect()
    }
}

impl FileServerPort for MockFileServer {
    async fn post_json(&mut self, path: &str, body: &serde_json::Value) -> Result<u16, HttpError> {
        self.posts.push((path.to_owned(), body.clone()));
        match self.fail {
            Some((p, status)) if p == path => Ok(status),
            _ => Ok(200),
        }
    }
}

// ── Harness ───────────────────────────────────────────────────

pub type SimClient = DeviceClient<SimulatedDevice, ManualTime>;

/// Test config: short ack timeout so timeouts resolve in few polls.
pub fn test_config() -> LinkConfig {
    LinkConfig {
        ack_timeout_ms: Some(500),
        default_target_samples: 20,
        upload_chunk_size: 8,
        ..LinkConfig::default()
    }
}

/// A client already connected to a simulated device.
#[allow(dead_code)]
pub fn connected_client(config: LinkConfig, sim: SimConfig) -> (SimClient, Recorder) {
    let device_id = sim.device_id.clone();
    let mut client =
        DeviceClient::new(SimulatedDevice::new(sim), ManualTime::default(), config).unwrap();
    let mut sink = Recorder::default();
    futures_lite::future::block_on(client.connect(&device_id, &mut sink)).unwrap();
    (client, sink)
}

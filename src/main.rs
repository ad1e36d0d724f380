//! Step-to-Sign link: demo entry point.
//!
//! Runs one full companion session against the simulated insole:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  SimulatedDevice   MonotonicTime   LogEventSink  DryRunLedger│
//! │  (BleLink)         (TimePort)      (EventSink)   (LedgerPort)│
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────────  │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  DeviceClient ─▶ LinkService (framing · signing ·      │  │
//! │  │                  sessions · archive)                   │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                                                              │
//! │  TrainingWorkflow (plan · collect · CSV export)              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `steptosign [config.json]`.  Keys missing from the file keep
//! their defaults.
#![deny(unused_must_use)]

use anyhow::{Context, Result, bail};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use edge_executor::LocalExecutor;
use log::{info, warn};

use steptosign::adapters::log_sink::LogEventSink;
use steptosign::adapters::sim_link::SimulatedDevice;
use steptosign::adapters::time::MonotonicTime;
use steptosign::app::ports::{BroadcastReceipt, LedgerError, LedgerPort};
use steptosign::app::DeviceClient;
use steptosign::config::LinkConfig;
use steptosign::protocol::SignedTransaction;
use steptosign::training::{TrainingWorkflow, to_csv};

/// Gestures recorded by the demo.
const DEMO_GESTURES: [&str; 2] = ["heel_tap", "toe_raise"];
/// Per-gesture target when no config file is given.
const DEMO_TARGET: u32 = 50;

// ── Ledger stand-in ───────────────────────────────────────────
//
// Accepts any well-formed signature and answers with a digest over
// the signed bytes, so the signing round completes offline.

struct DryRunLedger;

impl LedgerPort for DryRunLedger {
    async fn broadcast(&mut self, tx: &SignedTransaction) -> Result<BroadcastReceipt, LedgerError> {
        let signature = tx
            .signature_bytes()
            .map_err(|_| LedgerError::InvalidTransaction)?;
        let message = tx
            .message_bytes()
            .map_err(|_| LedgerError::InvalidTransaction)?;
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(&message);
        hasher.update(&signature);
        Ok(BroadcastReceipt {
            digest: hex::encode(hasher.finalize()),
        })
    }
}

fn load_config() -> Result<LinkConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(LinkConfig {
            default_target_samples: DEMO_TARGET,
            ..LinkConfig::default()
        });
    };
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config = LinkConfig::from_json(&json).with_context(|| format!("parsing {path}"))?;
    info!("Config loaded from {path}");
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("╔══════════════════════════════════════╗");
    info!("║  Step-to-Sign link v{}            ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = load_config()?;
    let executor: LocalExecutor<'_, 8> = LocalExecutor::new();
    futures_lite::future::block_on(executor.run(run(config)))
}

async fn run(config: LinkConfig) -> Result<()> {
    let mut sink = LogEventSink::new();
    let mut workflow = TrainingWorkflow::new(&config);
    let mut client = DeviceClient::new(SimulatedDevice::default(), MonotonicTime::new(), config)?;

    // ── Connect ───────────────────────────────────────────────
    let devices = client.scan().await?;
    let Some(device) = devices.first() else {
        bail!("no Step-to-Sign device in range");
    };
    info!("Connecting to {} ({}, rssi {:?})", device.name, device.id, device.rssi);
    client.connect(&device.id, &mut sink).await?;

    // ── Identity & signing ────────────────────────────────────
    let identity = client.request_address(&mut sink).await?;
    info!("Wallet address: {}", identity.address);

    let receipt = client
        .sign_and_broadcast(b"transfer 1 SUI to 0xfeed", &mut DryRunLedger, &mut sink)
        .await?;
    info!(
        "Transaction {} accepted, flow back to {}",
        receipt.digest,
        client.service().signing_state().as_str()
    );

    // ── Gesture collection ────────────────────────────────────
    for gesture in DEMO_GESTURES {
        workflow.add_gesture(gesture)?;
    }
    for entry in workflow.gestures() {
        info!("Planned '{}' ({} samples)", entry.name, entry.target);
    }
    workflow.begin_collection()?;

    for gesture in DEMO_GESTURES {
        match workflow.collect(&mut client, gesture, &mut sink).await {
            Ok(n) => info!("'{gesture}': {n} samples archived"),
            Err(e) => warn!("'{gesture}': collection failed: {e}"),
        }
        info!("Collection {:.0}% complete", workflow.total_progress());
    }
    if !workflow.all_gestures_complete() {
        warn!("Some gestures are short of their target");
    }

    // ── Summary ───────────────────────────────────────────────
    let archive = client.service().archive();
    info!(
        "Archive: {} gesture(s), {} sample(s)",
        archive.gestures().count(),
        archive.total_samples()
    );
    let samples: Vec<_> = archive.all_samples().cloned().collect();
    let csv = to_csv(&samples);
    info!("CSV export: {} line(s), {} B", csv.lines().count(), csv.len());

    let stats = client.service().imu_stats();
    info!("IMU: {:?}", stats);

    client.disconnect(&mut sink).await?;
    Ok(())
}

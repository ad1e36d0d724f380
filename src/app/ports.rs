//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ LinkService / DeviceClient (domain)
//! ```
//!
//! Driven adapters (event sinks, clocks, ledger and HTTP clients)
//! implement these traits.  The [`LinkService`](super::service::LinkService)
//! and [`DeviceClient`](super::client::DeviceClient) consume them via
//! generics, so the domain core never touches a socket directly.  The
//! radio itself sits behind [`BleLink`](crate::link::BleLink).

use core::time::Duration;

pub use crate::error::LedgerError;
use crate::error::HttpError;
use crate::protocol::SignedTransaction;

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / UI)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (log, UI channel,
/// test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Time port (driven adapter: domain ↔ monotonic clock)
// ───────────────────────────────────────────────────────────────

/// Monotonic clock plus a cooperative sleep.
#[allow(async_fn_in_trait)]
pub trait TimePort {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;

    /// Yield for `ms` milliseconds.
    async fn sleep_ms(&self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Ledger port (driven adapter: domain → chain client)
// ───────────────────────────────────────────────────────────────

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReceipt {
    /// Transaction digest assigned by the network.
    pub digest: String,
}

/// Submits device-signed transactions.
#[allow(async_fn_in_trait)]
pub trait LedgerPort {
    async fn broadcast(&mut self, tx: &SignedTransaction) -> Result<BroadcastReceipt, LedgerError>;
}

// ───────────────────────────────────────────────────────────────
// HTTP collaborators (driven adapters: domain → servers)
// ───────────────────────────────────────────────────────────────

/// Gesture-model training server.
#[allow(async_fn_in_trait)]
pub trait TrainingServerPort {
    /// POST the CSV export and return the raw JSON reply body.
    async fn train(&mut self, csv: &str, timeout: Duration) -> Result<String, HttpError>;
}

/// The device's Wi-Fi file server.
#[allow(async_fn_in_trait)]
pub trait FileServerPort {
    /// POST `body` as JSON to `path` and return the HTTP status.
    async fn post_json(&mut self, path: &str, body: &serde_json::Value) -> Result<u16, HttpError>;
}

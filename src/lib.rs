//! Step-to-Sign host link library.
//!
//! Talks to a Step-to-Sign insole over BLE: resolves its on-chain
//! identity, relays signing requests, ingests IMU telemetry into
//! labelled training sessions and drives the gesture-model workflow.
//! The radio, the clock and every network collaborator sit behind
//! port traits so the core runs the same against hardware, the
//! simulated device and test doubles.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod link;
pub mod protocol;
pub mod session;
pub mod telemetry;
pub mod training;

pub use error::{Error, Result};

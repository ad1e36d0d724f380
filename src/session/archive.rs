//! Finalized training data, keyed by gesture.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::telemetry::TelemetrySample;

/// Gesture name → samples of the most recent committed session for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingArchive {
    gestures: BTreeMap<String, Vec<TelemetrySample>>,
}

impl TrainingArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a finished session, replacing any earlier one for `gesture`.
    pub fn commit(&mut self, gesture: String, samples: Vec<TelemetrySample>) {
        self.gestures.insert(gesture, samples);
    }

    pub fn get(&self, gesture: &str) -> Option<&[TelemetrySample]> {
        self.gestures.get(gesture).map(Vec::as_slice)
    }

    pub fn count(&self, gesture: &str) -> usize {
        self.gestures.get(gesture).map_or(0, Vec::len)
    }

    pub fn gestures(&self) -> impl Iterator<Item = &str> {
        self.gestures.keys().map(String::as_str)
    }

    pub fn total_samples(&self) -> usize {
        self.gestures.values().map(Vec::len).sum()
    }

    pub fn remove(&mut self, gesture: &str) -> Option<Vec<TelemetrySample>> {
        self.gestures.remove(gesture)
    }

    pub fn is_empty(&self) -> bool {
        self.gestures.is_empty()
    }

    pub fn clear(&mut self) {
        self.gestures.clear();
    }

    /// All samples, grouped by gesture in name order.
    pub fn all_samples(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.gestures.values().flatten()
    }

    /// Compact binary snapshot.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|_| Error::Snapshot("archive encode failed"))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        postcard::from_bytes(bytes).map_err(|_| Error::Snapshot("archive decode failed"))
    }
}

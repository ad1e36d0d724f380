//! Bounded sample rings.
//!
//! Telemetry arrives without end while a session runs; both rings keep
//! only the most recent `capacity` samples and evict the oldest first.

use std::collections::VecDeque;

use serde::Serialize;

use crate::telemetry::TelemetrySample;

/// Fixed-capacity FIFO of samples.
#[derive(Debug, Clone)]
pub struct SampleRing {
    samples: VecDeque<TelemetrySample>,
    capacity: usize,
    evicted: u64,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            evicted: 0,
        }
    }

    pub fn push(&mut self, sample: TelemetrySample) {
        if self.capacity == 0 {
            self.evicted += 1;
            return;
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
            self.evicted += 1;
        }
        self.samples.push_back(sample);
    }

    /// Cloned copy, oldest first.
    pub fn snapshot(&self) -> Vec<TelemetrySample> {
        self.samples.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples pushed out since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Counters for the inbound telemetry path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Records accepted into a session.
    pub accepted: u64,
    /// Records decoded while no session was active.
    pub rejected_no_session: u64,
    /// Chunks that failed framing (either channel).
    pub framing_errors: u64,
}

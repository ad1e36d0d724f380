//! Request correlation for device acknowledgements.
//!
//! The device answers a handful of commands with a tagged text message.
//! Each outstanding request is recorded here with the time it was issued
//! so the service can fail it after `ack_timeout_ms`.

use heapless::Vec;
use serde::{Deserialize, Serialize};

/// Response tag the service is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckTag {
    /// `SUI:` reply to `get_address`.
    Address,
    /// `SIG:` reply to `msg…`.
    Signature,
    /// `IMU_STOPPED` reply to `stop_imu`.
    ImuStopped,
    /// `password_correct` / `password_incorrect`.
    PasswordVerdict,
}

/// One slot per tag; re-registering a tag refreshes its start time.
const CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    tag: AckTag,
    issued_ms: u64,
}

/// Table of outstanding acknowledgements.
#[derive(Debug)]
pub struct PendingAcks {
    entries: Vec<Pending, CAPACITY>,
    timeout_ms: Option<u32>,
}

impl PendingAcks {
    pub fn new(timeout_ms: Option<u32>) -> Self {
        Self {
            entries: Vec::new(),
            timeout_ms,
        }
    }

    /// Start waiting for `tag`.
    pub fn expect(&mut self, tag: AckTag, now_ms: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.tag == tag) {
            entry.issued_ms = now_ms;
            return;
        }
        // Capacity equals the number of tags, so this cannot overflow.
        let _ = self.entries.push(Pending { tag, issued_ms: now_ms });
    }

    /// Mark `tag` answered.  Returns `false` if nothing was waiting.
    pub fn resolve(&mut self, tag: AckTag) -> bool {
        self.cancel(tag)
    }

    /// Stop waiting for `tag` without an answer.
    pub fn cancel(&mut self, tag: AckTag) -> bool {
        match self.entries.iter().position(|e| e.tag == tag) {
            Some(i) => {
                self.entries.swap_remove(i);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, tag: AckTag) -> bool {
        self.entries.iter().any(|e| e.tag == tag)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove and return every entry older than the timeout.
    pub fn expired(&mut self, now_ms: u64) -> Vec<AckTag, CAPACITY> {
        let mut out = Vec::new();
        let Some(timeout) = self.timeout_ms else {
            return out;
        };
        let timeout = u64::from(timeout);
        self.entries.retain(|e| {
            if now_ms.saturating_sub(e.issued_ms) >= timeout {
                let _ = out.push(e.tag);
                false
            } else {
                true
            }
        });
        out
    }
}

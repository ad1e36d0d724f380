//! Channel event sink adapter.
//!
//! Forwards every [`AppEvent`] into an `embassy-sync` bounded channel so
//! another task (UI, recorder) can consume them at its own pace.
//!
//! ```text
//! ┌──────────────┐  AppEvent  ┌──────────────┐
//! │ LinkService  │──────────▶│  Consumer    │
//! │  (sync)      │  bounded   │  (async)     │
//! └──────────────┘            └──────────────┘
//! ```
//!
//! The producer never blocks: when the channel is full the event is
//! dropped and counted.

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Default channel depth.
pub const EVENT_DEPTH: usize = 64;

/// Single-threaded event channel.
pub type EventChannel<const N: usize = EVENT_DEPTH> = Channel<NoopRawMutex, AppEvent, N>;

pub struct ChannelEventSink<'a, const N: usize = EVENT_DEPTH> {
    channel: &'a EventChannel<N>,
    dropped: u64,
}

impl<'a, const N: usize> ChannelEventSink<'a, N> {
    pub fn new(channel: &'a EventChannel<N>) -> Self {
        Self {
            channel,
            dropped: 0,
        }
    }

    /// Events lost to a full channel.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl<const N: usize> EventSink for ChannelEventSink<'_, N> {
    fn emit(&mut self, event: &AppEvent) {
        if self.channel.try_send(event.clone()).is_err() {
            self.dropped += 1;
            if self.dropped.is_power_of_two() {
                warn!("Event channel full, {} event(s) dropped", self.dropped);
            }
        }
    }
}

//! Channel demultiplexer.
//!
//! Text notifications go to the reassembler, telemetry notifications to
//! the record parser.  The two paths share no state.

use log::{debug, warn};

use crate::error::FramingError;
use crate::telemetry::{self, RawRecord};

use super::framing::TextReassembler;
use super::transport::{Channel, Notification};

/// One unit of inbound traffic after framing.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A complete text message, delimiters stripped.
    Message(String),
    /// A decoded telemetry record (not yet labelled).
    Record(RawRecord),
    /// A chunk that could not be framed; already logged.
    Dropped(FramingError),
}

#[derive(Default)]
pub struct Demultiplexer {
    text: TextReassembler,
}

impl Demultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&mut self, notification: &Notification) -> Vec<Inbound> {
        match notification.channel {
            Channel::Text => match self.text.push(&notification.payload) {
                Ok(messages) => messages.into_iter().map(Inbound::Message).collect(),
                Err(e) => vec![Inbound::Dropped(e)],
            },
            Channel::Telemetry => match telemetry::parse_record(&notification.payload) {
                Ok(record) => {
                    debug!("RX telemetry t={}", record.timestamp);
                    vec![Inbound::Record(record)]
                }
                Err(e) => {
                    warn!("Dropping telemetry chunk: {e}");
                    vec![Inbound::Dropped(e)]
                }
            },
        }
    }

    /// Forget any partially received text (disconnect).
    pub fn reset(&mut self) {
        self.text.reset();
    }

    pub fn pending_text(&self) -> usize {
        self.text.pending()
    }
}

//! Outbound chunking and inbound text reassembly.
//!
//! The transport accepts at most `ceiling` bytes per write (20 by
//! default), so longer commands are split into consecutive slices and
//! written in order with a short pause between writes:
//!
//! ```text
//! "<msg0011…ff>"  ──▶  [20 B] ─20ms─ [20 B] ─20ms─ … [≤20 B]
//! ```
//!
//! The device does the same in the other direction; the reassembler
//! accumulates notification chunks until a `<`…`>` pair is complete.

use log::{debug, warn};

use crate::app::ports::TimePort;
use crate::error::{FramingError, TransportError};

use super::transport::{BleLink, WriteMode, WriteTarget};

/// Accumulator capacity for a single text message.
pub const MAX_TEXT_FRAME: usize = 4096;

// ── Outbound ─────────────────────────────────────────────────

/// Split `data` into transport-sized slices.
///
/// A message that fits is returned whole; an empty message yields one
/// empty slice so the caller still performs a write.
pub fn chunk_message(data: &[u8], ceiling: usize) -> Vec<&[u8]> {
    if data.len() <= ceiling || ceiling == 0 {
        return vec![data];
    }
    data.chunks(ceiling).collect()
}

/// Write `data` to `target` in order, pausing `delay_ms` between writes.
///
/// A failed write aborts the remaining slices.
pub async fn send_chunked<L: BleLink, T: TimePort>(
    link: &mut L,
    time: &T,
    target: WriteTarget,
    mode: WriteMode,
    data: &[u8],
    ceiling: usize,
    delay_ms: u32,
) -> Result<(), TransportError> {
    let chunks = chunk_message(data, ceiling);
    let total = chunks.len();

    for (i, chunk) in chunks.into_iter().enumerate() {
        if i > 0 && delay_ms > 0 {
            time.sleep_ms(delay_ms).await;
        }
        link.write(target, chunk, mode).await?;
        debug!("TX {:?} chunk {}/{} ({} B)", target, i + 1, total, chunk.len());
    }
    Ok(())
}

// ── Inbound ──────────────────────────────────────────────────

/// Byte accumulator for the text channel.
///
/// A message is complete once a `<` is followed by a `>`; the payload is
/// everything strictly between the first `<` and the first `>` after
/// it.  Bytes before a `<` are discarded, so only an unterminated
/// message is ever buffered.  There is no timeout: a partial
/// message waits indefinitely for its closing delimiter.
pub struct TextReassembler {
    buffer: heapless::Vec<u8, MAX_TEXT_FRAME>,
}

impl TextReassembler {
    pub fn new() -> Self {
        Self {
            buffer: heapless::Vec::new(),
        }
    }

    /// Append a chunk and drain every complete message.
    ///
    /// On overflow the accumulator is discarded and the messages already
    /// completed by this chunk are lost with it.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, FramingError> {
        let mut messages = Vec::new();
        let mut rest = chunk;

        loop {
            let room = MAX_TEXT_FRAME - self.buffer.len();
            let take = rest.len().min(room);
            // `take` never exceeds the remaining capacity.
            let _ = self.buffer.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            self.drain_into(&mut messages);

            if rest.is_empty() {
                return Ok(messages);
            }
            if self.buffer.len() == MAX_TEXT_FRAME {
                warn!("Text buffer overflow, discarding {} B", self.buffer.len());
                self.reset();
                return Err(FramingError::BufferOverflow);
            }
        }
    }

    fn drain_into(&mut self, out: &mut Vec<String>) {
        let mut consumed = 0;
        loop {
            let Some(open) = find(&self.buffer[consumed..], b'<').map(|i| consumed + i) else {
                // Nothing can start a message here.
                consumed = self.buffer.len();
                break;
            };
            let Some(close) = find(&self.buffer[open + 1..], b'>').map(|i| open + 1 + i) else {
                // Keep the partial message, drop the noise before it.
                consumed = open;
                break;
            };
            out.push(String::from_utf8_lossy(&self.buffer[open + 1..close]).into_owned());
            consumed = close + 1;
        }
        if consumed == 0 {
            return;
        }
        let len = self.buffer.len();
        self.buffer.copy_within(consumed..len, 0);
        self.buffer.truncate(len - consumed);
    }

    /// Discard any partial message.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Bytes currently buffered.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for TextReassembler {
    fn default() -> Self {
        Self::new()
    }
}

fn find(haystack: &[u8], needle: u8) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}

// ── Tests ────────────────────────────────────────────────────

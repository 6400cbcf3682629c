//! Reassembly of inbound chunks into complete text messages.

use bytes::BytesMut;

use crate::config::Config;
use crate::error::Result;

/// Accumulates received chunks until the transport marks end of message.
///
/// Owned by the receive loop alone. The buffer is cleared, not reallocated,
/// after every dispatched message, so it is empty at the start and end of
/// each cycle.
#[derive(Debug)]
pub struct Reassembler {
    buffer: BytesMut,
    chunk_count: usize,
    max_message_size: Option<usize>,
}

impl Reassembler {
    /// Create a reassembler sized for `config.receive_chunk_size` reads.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            buffer: BytesMut::with_capacity(config.receive_chunk_size),
            chunk_count: 0,
            max_message_size: config.max_message_size,
        }
    }

    /// Append a chunk.
    ///
    /// Returns `Some(text)` once a chunk marked `end_of_message` completes the
    /// message, `None` while more chunks are expected.
    ///
    /// # Errors
    ///
    /// - [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) if a size
    ///   limit is configured and the accumulated message would exceed it
    /// - [`Error::InvalidUtf8`](crate::Error::InvalidUtf8) if the completed
    ///   message does not decode
    ///
    /// The buffer is reset on either error.
    pub fn push(&mut self, chunk: &[u8], end_of_message: bool) -> Result<Option<String>> {
        let new_size = self.buffer.len() + chunk.len();
        if let Some(max) = self.max_message_size {
            if new_size > max {
                self.reset();
                return Err(crate::Error::MessageTooLarge {
                    size: new_size,
                    max,
                });
            }
        }

        self.buffer.extend_from_slice(chunk);
        self.chunk_count += 1;

        if !end_of_message {
            return Ok(None);
        }

        let decoded = std::str::from_utf8(&self.buffer).map(str::to_owned);
        self.reset();
        Ok(Some(decoded?))
    }

    /// Whether a partial message is buffered.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.chunk_count > 0
    }

    /// Bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Chunks received for the message in progress.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Drop any partial message, keeping the allocation.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.chunk_count = 0;
    }
}

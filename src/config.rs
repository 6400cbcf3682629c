//! Per-connection configuration.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default number of bytes requested per low-level receive.
pub const DEFAULT_RECEIVE_CHUNK_SIZE: usize = 4 * 1024;

/// Default maximum payload bytes per outbound frame.
pub const DEFAULT_SEND_CHUNK_SIZE: usize = 4 * 1024;

/// Default upper bound on the close handshake.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection configuration.
///
/// Attached to a connection at accept time and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bytes requested from the transport per receive call.
    ///
    /// Default: 4 KB (4096)
    pub receive_chunk_size: usize,

    /// Maximum payload bytes per outbound frame.
    ///
    /// Messages larger than this are split into multiple frames.
    ///
    /// Default: 4 KB (4096)
    pub send_chunk_size: usize,

    /// Maximum size of a reassembled inbound message.
    ///
    /// When set, a peer that accumulates more than this many bytes without
    /// finishing a message gets the connection closed with
    /// [`CloseCode::MessageTooBig`](crate::CloseCode::MessageTooBig).
    ///
    /// Default: None (unbounded)
    pub max_message_size: Option<usize>,

    /// Upper bound on the transport close handshake.
    ///
    /// Default: 5 seconds
    pub close_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            receive_chunk_size: DEFAULT_RECEIVE_CHUNK_SIZE,
            send_chunk_size: DEFAULT_SEND_CHUNK_SIZE,
            max_message_size: None,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl Config {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the receive chunk size.
    #[must_use]
    pub const fn with_receive_chunk_size(mut self, size: usize) -> Self {
        self.receive_chunk_size = size;
        self
    }

    /// Set the send chunk size.
    #[must_use]
    pub const fn with_send_chunk_size(mut self, size: usize) -> Self {
        self.send_chunk_size = size;
        self
    }

    /// Bound the size of reassembled inbound messages.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    /// Set the close handshake timeout.
    #[must_use]
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Check that every size is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a chunk size or the message size
    /// limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.receive_chunk_size == 0 {
            return Err(Error::InvalidConfig(
                "receive_chunk_size must be positive".into(),
            ));
        }
        if self.send_chunk_size == 0 {
            return Err(Error::InvalidConfig(
                "send_chunk_size must be positive".into(),
            ));
        }
        if self.max_message_size == Some(0) {
            return Err(Error::InvalidConfig(
                "max_message_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

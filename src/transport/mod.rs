//! Transport capabilities consumed by a session.
//!
//! A transport is an already-established, full-duplex connection that has
//! been split into a read half (driven only by the receive loop) and a write
//! half (shared by senders behind the connection's send lock).
//!
//! Cancellation is applied by the session dropping the pending future, so
//! every method here must be cancel-safe: a dropped `receive` must not lose
//! bytes it has not returned, and a dropped `send` must finish (or discard
//! whole) the frame it started before writing anything else. A dropped send
//! may leave a truncated message; the connection closes rather than reuse
//! such a writer for new messages.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::message::CloseReason;

pub mod memory;
pub mod stream;

pub use memory::{MemoryReader, MemoryTransport, MemoryWriter, Outbound, Peer, SentFrame};
pub use stream::{Role, StreamReader, StreamWriter, WebSocketStream};

/// Result of one bounded receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Up to the requested number of bytes of the current message.
    Chunk {
        /// Received bytes.
        data: Bytes,
        /// True when this chunk completes the logical message.
        end_of_message: bool,
    },
    /// The peer is closing. `None` when no status was supplied.
    Close(Option<CloseReason>),
}

impl Received {
    /// Build a data chunk.
    #[must_use]
    pub fn chunk(data: impl Into<Bytes>, end_of_message: bool) -> Self {
        Received::Chunk {
            data: data.into(),
            end_of_message,
        }
    }
}

/// Read half of a transport.
#[async_trait]
pub trait FrameReader: Send {
    /// Receive at most `max_len` bytes of the current message, or a close signal.
    async fn receive(&mut self, max_len: usize) -> Result<Received>;

    /// Diagnostic view of whether the read side is still usable.
    fn is_open(&self) -> bool {
        true
    }
}

/// Write half of a transport.
#[async_trait]
pub trait FrameWriter: Send {
    /// Send one frame, flagging whether it completes the logical message.
    async fn send(&mut self, data: Bytes, end_of_message: bool) -> Result<()>;

    /// Perform the transport's close handshake with the given reason.
    async fn close(&mut self, reason: &CloseReason) -> Result<()>;

    /// Diagnostic view of whether the write side is still usable.
    fn is_open(&self) -> bool {
        true
    }
}

/// An established connection that can be split into its two halves.
pub trait Transport: Send + 'static {
    /// Read half type.
    type Reader: FrameReader + 'static;
    /// Write half type.
    type Writer: FrameWriter + 'static;

    /// Split into independent read and write halves.
    fn split(self) -> (Self::Reader, Self::Writer);
}

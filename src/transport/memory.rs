//! In-memory transport pair.
//!
//! [`pair`] returns a [`MemoryTransport`] to hand to
//! [`accept`](crate::accept) and a [`Peer`] that plays the remote endpoint:
//! it pushes inbound chunks, close signals or failures, and observes every
//! frame and close handshake the session writes.
//!
//! ```rust,ignore
//! let (transport, mut peer) = wsession::transport::memory::pair();
//! peer.send_chunk("He", false);
//! peer.send_chunk("llo", true);
//! peer.send_close(None);
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::{FrameReader, FrameWriter, Received, Transport};
use crate::error::{Error, Result};
use crate::message::CloseReason;

/// A frame written by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    /// Frame payload.
    pub data: Bytes,
    /// Whether the frame completed its message.
    pub end_of_message: bool,
}

/// Something the session wrote towards the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A data frame.
    Frame(SentFrame),
    /// The close handshake.
    Close(CloseReason),
}

enum Inbound {
    Chunk(Bytes, bool),
    Close(Option<CloseReason>),
    Fail(String),
}

#[derive(Default)]
struct Shared {
    sent: Mutex<Vec<SentFrame>>,
    close_reason: Mutex<Option<CloseReason>>,
    send_calls: AtomicUsize,
    fail_sends: AtomicBool,
    stall_sends_after: Mutex<Option<usize>>,
    fail_close: AtomicBool,
    stall_close: AtomicBool,
    closed: AtomicBool,
}

/// Create a connected transport and its remote peer.
#[must_use]
pub fn pair() -> (MemoryTransport, Peer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared::default());

    let transport = MemoryTransport {
        reader: MemoryReader {
            inbound: in_rx,
            pending: None,
            disconnected: false,
        },
        writer: MemoryWriter {
            outbound: out_tx,
            shared: Arc::clone(&shared),
        },
    };
    let peer = Peer {
        inbound: in_tx,
        outbound: out_rx,
        shared,
    };
    (transport, peer)
}

/// Session side of an in-memory connection.
pub struct MemoryTransport {
    reader: MemoryReader,
    writer: MemoryWriter,
}

impl Transport for MemoryTransport {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> (MemoryReader, MemoryWriter) {
        (self.reader, self.writer)
    }
}

/// Read half of a [`MemoryTransport`].
pub struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    pending: Option<(Bytes, bool)>,
    disconnected: bool,
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn receive(&mut self, max_len: usize) -> Result<Received> {
        let (mut data, end_of_message) = match self.pending.take() {
            Some(pending) => pending,
            None => match self.inbound.recv().await {
                Some(Inbound::Chunk(data, eom)) => (data, eom),
                Some(Inbound::Close(reason)) => return Ok(Received::Close(reason)),
                Some(Inbound::Fail(msg)) => return Err(Error::Transport(msg)),
                None => {
                    self.disconnected = true;
                    return Err(Error::Transport("peer disconnected".into()));
                }
            },
        };

        if data.len() > max_len {
            let rest = data.split_off(max_len);
            self.pending = Some((rest, end_of_message));
            return Ok(Received::chunk(data, false));
        }
        Ok(Received::chunk(data, end_of_message))
    }

    fn is_open(&self) -> bool {
        !self.disconnected
    }
}

/// Write half of a [`MemoryTransport`].
pub struct MemoryWriter {
    outbound: mpsc::UnboundedSender<Outbound>,
    shared: Arc<Shared>,
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn send(&mut self, data: Bytes, end_of_message: bool) -> Result<()> {
        let call = self.shared.send_calls.fetch_add(1, Ordering::SeqCst);
        let stall_after = *self
            .shared
            .stall_sends_after
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if stall_after.is_some_and(|n| call >= n) {
            std::future::pending::<()>().await;
        }
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(Error::Transport("send after close".into()));
        }
        if self.shared.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Transport("injected send failure".into()));
        }

        let frame = SentFrame {
            data,
            end_of_message,
        };
        self.shared
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame.clone());
        let _ = self.outbound.send(Outbound::Frame(frame));

        // Give concurrent senders a chance to run between frames.
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn close(&mut self, reason: &CloseReason) -> Result<()> {
        if self.shared.stall_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.shared.fail_close.load(Ordering::SeqCst) {
            return Err(Error::Transport("injected close failure".into()));
        }
        self.shared.closed.store(true, Ordering::SeqCst);
        *self
            .shared
            .close_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(reason.clone());
        let _ = self.outbound.send(Outbound::Close(reason.clone()));
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.shared.closed.load(Ordering::SeqCst)
    }
}

/// Remote end of an in-memory connection.
pub struct Peer {
    inbound: mpsc::UnboundedSender<Inbound>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    shared: Arc<Shared>,
}

impl Peer {
    /// Deliver one chunk to the session.
    ///
    /// Chunks longer than the session's receive size are handed out in
    /// several receives; only the last piece carries `end_of_message`.
    pub fn send_chunk(&self, data: impl Into<Bytes>, end_of_message: bool) {
        let _ = self.inbound.send(Inbound::Chunk(data.into(), end_of_message));
    }

    /// Deliver a complete text message as a single chunk.
    pub fn send_text(&self, text: &str) {
        self.send_chunk(Bytes::copy_from_slice(text.as_bytes()), true);
    }

    /// Send the terminal close signal.
    pub fn send_close(&self, reason: Option<CloseReason>) {
        let _ = self.inbound.send(Inbound::Close(reason));
    }

    /// Make the session's next receive fail.
    pub fn fail_receive(&self, message: impl Into<String>) {
        let _ = self.inbound.send(Inbound::Fail(message.into()));
    }

    /// Make every subsequent send fail.
    pub fn fail_sends(&self) {
        self.shared.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Let the first `n` sends through and leave every later one pending.
    ///
    /// A pending send still counts towards [`send_calls`](Self::send_calls).
    pub fn stall_sends_after(&self, n: usize) {
        *self
            .shared
            .stall_sends_after
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(n);
    }

    /// Make the close handshake fail.
    pub fn fail_close(&self) {
        self.shared.fail_close.store(true, Ordering::SeqCst);
    }

    /// Make the close handshake never complete.
    pub fn stall_close(&self) {
        self.shared.stall_close.store(true, Ordering::SeqCst);
    }

    /// Wait for the next thing the session writes.
    ///
    /// Returns `None` once the session's writer has been dropped.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    /// Wait for the next complete message the session sends.
    ///
    /// Returns `None` if the close handshake arrives first or the writer is
    /// dropped.
    pub async fn recv_message(&mut self) -> Option<String> {
        let mut buf = Vec::new();
        loop {
            match self.outbound.recv().await? {
                Outbound::Frame(frame) => {
                    buf.extend_from_slice(&frame.data);
                    if frame.end_of_message {
                        return String::from_utf8(buf).ok();
                    }
                }
                Outbound::Close(_) => return None,
            }
        }
    }

    /// Every frame written so far, in order.
    #[must_use]
    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.shared
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times the session called `send` on the writer.
    #[must_use]
    pub fn send_calls(&self) -> usize {
        self.shared.send_calls.load(Ordering::SeqCst)
    }

    /// Reason passed to the close handshake, once it has happened.
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared
            .close_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::fragmenter::MessageFragmenter;
use super::id::ConnectionId;
use super::state::{ConnectionState, StateCell};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::message::CloseReason;
use crate::transport::FrameWriter;

/// Handle to one accepted connection.
///
/// Cheap to clone; every clone refers to the same connection. The handle
/// owns the connection's identity, lifecycle state, close-reason slot and
/// cancellation scope, and the write half of the transport behind the send
/// lock.
///
/// ## Example
///
/// ```rust,ignore
/// let session = wsession::accept(transport, handler, Config::default(), &shutdown).await?;
/// let conn = session.connection().clone();
/// let task = session.spawn();
///
/// conn.send("hello").await?;
/// conn.request_close(CloseReason::normal());
/// let reason = task.await?;
/// ```
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    id: ConnectionId,
    config: Config,
    state: StateCell,
    close_reason: OnceLock<CloseReason>,
    cancel: CancellationToken,
    writer: Mutex<Box<dyn FrameWriter>>,
}

impl Connection {
    pub(crate) fn new(
        writer: Box<dyn FrameWriter>,
        config: Config,
        parent: &CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: ConnectionId::generate(),
                config,
                state: StateCell::new(),
                close_reason: OnceLock::new(),
                cancel: parent.child_token(),
                writer: Mutex::new(writer),
            }),
        }
    }

    /// Identity assigned at accept time.
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// Check if the connection is in an open state.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Configuration the connection was accepted with.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The recorded close reason, once closing has begun.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.inner.close_reason.get().cloned()
    }

    /// Whether the connection's cancellation scope has fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// A token cancelled when this connection starts closing.
    ///
    /// Cancelling the returned token does not close the connection.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.child_token()
    }

    /// Ask the connection to close.
    ///
    /// Records `reason` unless a reason was already recorded, then cancels the
    /// connection scope, waking a blocked receive or send. Returns without
    /// waiting for the close handshake; the session's
    /// [`run`](crate::Session::run) completes it.
    pub fn request_close(&self, reason: CloseReason) {
        let recorded = self.inner.close_reason.set(reason).is_ok();
        self.inner.state.begin_closing();
        if recorded {
            debug!(
                conn_id = %self.inner.id,
                reason = ?self.inner.close_reason.get(),
                "close requested"
            );
        }
        self.inner.cancel.cancel();
    }

    /// Send a text message.
    ///
    /// The message is split into frames of at most
    /// [`send_chunk_size`](Config::send_chunk_size) bytes; only the last is
    /// marked as ending the message. Concurrent sends on the same connection
    /// are serialized, so their frames never interleave.
    ///
    /// A send that fails or is cancelled after its first frame reached the
    /// writer leaves the peer holding a truncated message. The connection is
    /// then closed with an internal error, so no later send can be mistaken
    /// for a continuation of it.
    ///
    /// ## Errors
    ///
    /// - `Error::ConnectionClosed` if the connection is closing or closed
    /// - `Error::Cancelled` if the connection scope fires mid-send
    /// - transport errors from the writer
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        self.send_with_cancel(text, &CancellationToken::new()).await
    }

    /// Send a text message, also aborting if `cancel` fires.
    ///
    /// ## Errors
    ///
    /// As [`send`](Self::send); `Error::Cancelled` also covers `cancel`.
    pub async fn send_with_cancel(
        &self,
        text: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.ensure_can_send()?;
        if self.is_cancelled() || cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let payload = Bytes::from(text.into());
        let fragments = MessageFragmenter::new(payload, self.inner.config.send_chunk_size);
        let frames = fragments.fragment_count();

        let mut writer = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => return Err(Error::Cancelled),
            () = cancel.cancelled() => return Err(Error::Cancelled),
            writer = self.inner.writer.lock() => writer,
        };
        // The state may have moved on while this send waited for the lock.
        self.ensure_can_send()?;
        if self.is_cancelled() || cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        for (sent, fragment) in fragments.enumerate() {
            let result = tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => Err(Error::Cancelled),
                () = cancel.cancelled() => Err(Error::Cancelled),
                result = writer.send(fragment.payload, fragment.end_of_message) => result,
            };
            if let Err(err) = result {
                drop(writer);
                self.abandon_message(&err, sent, frames);
                return Err(err);
            }
        }
        Ok(())
    }

    /// The writer holds part of a message that will never be finished.
    ///
    /// If the connection is already closing, the truncation is a side effect
    /// of that close and its reason stands.
    fn abandon_message(&self, err: &Error, sent: usize, frames: usize) {
        warn!(
            conn_id = %self.inner.id,
            error = %err,
            sent,
            frames,
            "send abandoned mid-message"
        );
        if !self.is_cancelled() {
            self.request_close(CloseReason::internal_error());
        }
    }

    fn ensure_can_send(&self) -> Result<()> {
        let state = self.state();
        if state.can_send() {
            Ok(())
        } else {
            Err(Error::ConnectionClosed(state))
        }
    }

    /// The connection's own cancellation scope.
    pub(crate) fn scope(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    pub(crate) fn mark_open(&self) -> bool {
        self.inner.state.open()
    }

    /// Record `reason` if nothing was recorded yet and enter `Closing`.
    ///
    /// Returns the reason that ends up recorded.
    pub(crate) fn begin_closing(&self, reason: CloseReason) -> CloseReason {
        let recorded = self.inner.close_reason.get_or_init(|| reason).clone();
        self.inner.state.begin_closing();
        self.inner.cancel.cancel();
        recorded
    }

    pub(crate) fn mark_closed(&self) {
        self.inner.state.close();
        self.inner.cancel.cancel();
    }

    /// Run the transport close handshake, bounded by `close_timeout`.
    pub(crate) async fn close_transport(&self, reason: &CloseReason) -> Result<()> {
        let handshake = async {
            let mut writer = self.inner.writer.lock().await;
            let result = writer.close(reason).await;
            (result, writer.is_open())
        };
        match tokio::time::timeout(self.inner.config.close_timeout, handshake).await {
            Ok((result, still_open)) => {
                debug!(conn_id = %self.inner.id, transport_open = still_open, "close handshake finished");
                result
            }
            Err(_) => Err(Error::CloseTimeout),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("close_reason", &self.inner.close_reason.get())
            .finish()
    }
}

//! Accept sequence and the per-connection receive loop.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::connection::Connection;
use super::handler::{guarded, Handler};
use super::id::ConnectionId;
use super::reassembler::Reassembler;
use crate::config::Config;
use crate::error::{Error, HandlerError, Result};
use crate::message::{CloseCode, CloseReason};
use crate::transport::{FrameReader, Received, Transport};

/// Accept a connection over `transport`.
///
/// Validates `config`, splits the transport, links the connection's
/// cancellation scope to `parent` and runs [`Handler::on_accepted`]. The
/// returned [`Session`] must be [`run`](Session::run) (or
/// [`spawn`](Session::spawn)ed) to receive messages and to perform cleanup.
///
/// # Errors
///
/// - [`Error::InvalidConfig`] before the transport is touched
/// - [`Error::Handler`] if the accept hook fails; the connection is left
///   `Closed` and must not be used
pub async fn accept<T, H>(
    transport: T,
    handler: H,
    config: Config,
    parent: &CancellationToken,
) -> Result<Session<H>>
where
    T: Transport,
    H: Handler,
{
    config.validate()?;

    let (reader, writer) = transport.split();
    let reassembler = Reassembler::new(&config);
    let connection = Connection::new(Box::new(writer), config, parent);
    debug!(conn_id = %connection.id(), "connection accepted");

    if let Err(err) = guarded(handler.on_accepted(&connection)).await {
        error!(conn_id = %connection.id(), error = %err, "accept hook failed");
        connection.mark_closed();
        return Err(Error::handler(&err));
    }

    if connection.mark_open() {
        debug!(conn_id = %connection.id(), "connection open");
    } else {
        debug!(
            conn_id = %connection.id(),
            state = %connection.state(),
            "close requested during accept"
        );
    }

    Ok(Session {
        connection,
        reader: Box::new(reader),
        handler,
        reassembler,
    })
}

/// Accept a connection and drive it until it closes.
///
/// # Errors
///
/// As [`accept`]. Failures after accept end the connection and are reported
/// through the returned [`CloseReason`].
pub async fn serve<T, H>(
    transport: T,
    handler: H,
    config: Config,
    parent: &CancellationToken,
) -> Result<CloseReason>
where
    T: Transport,
    H: Handler,
{
    Ok(accept(transport, handler, config, parent).await?.run().await)
}

/// An accepted connection together with its receive side.
///
/// Dropping a session without running it skips the close handshake and the
/// close hook; the connection is still marked `Closed`.
pub struct Session<H: Handler> {
    connection: Connection,
    reader: Box<dyn FrameReader>,
    handler: H,
    reassembler: Reassembler,
}

impl<H: Handler> Session<H> {
    /// Handle for sending and requesting close from other tasks.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Identity of the underlying connection.
    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Receive, reassemble and dispatch messages until the connection ends.
    ///
    /// However the loop ends, the close handshake and
    /// [`Handler::on_closed`] run exactly once before this returns. The
    /// returned reason is the one recorded on the connection.
    pub async fn run(mut self) -> CloseReason {
        let conn_id = self.connection.id();
        let outcome = self.receive_loop().await;
        if self.reassembler.is_assembling() {
            debug!(
                %conn_id,
                bytes = self.reassembler.buffered(),
                chunks = self.reassembler.chunk_count(),
                "discarding partial message"
            );
            self.reassembler.reset();
        }

        let reason = match outcome {
            Ok(Some(reason)) => {
                debug!(%conn_id, code = reason.code.as_u16(), "peer closed");
                reason
            }
            Ok(None) => CloseReason::normal(),
            Err(_) if self.connection.is_cancelled() => CloseReason::normal(),
            Err(Error::MessageTooLarge { size, max }) => {
                warn!(%conn_id, size, max, "inbound message too large");
                CloseReason::message_too_large()
            }
            Err(err) => {
                error!(%conn_id, error = %err, "receive loop failed");
                CloseReason::internal_error()
            }
        };

        let reason = self.connection.begin_closing(reason);
        if let Err(err) = self.connection.close_transport(&reason).await {
            warn!(%conn_id, error = %err, "close handshake failed");
        }

        let on_closed = async {
            self.handler.on_closed(&self.connection, &reason).await;
            Ok::<(), HandlerError>(())
        };
        if let Err(err) = guarded(on_closed).await {
            error!(%conn_id, error = %err, "close hook failed");
        }

        self.connection.mark_closed();
        debug!(%conn_id, code = reason.code.as_u16(), reason = %reason.reason, "connection closed");
        reason
    }

    /// Run the session on a new tokio task.
    pub fn spawn(self) -> JoinHandle<CloseReason> {
        tokio::spawn(self.run())
    }

    /// `Ok(Some(_))` for a peer close, `Ok(None)` for cancellation.
    async fn receive_loop(&mut self) -> Result<Option<CloseReason>> {
        let cancel = self.connection.scope().clone();
        let handler_cancel = self.connection.cancellation_token();
        let chunk_size = self.connection.config().receive_chunk_size;

        loop {
            let received = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(None),
                received = self.reader.receive(chunk_size) => received?,
            };

            let (data, end_of_message) = match received {
                Received::Chunk {
                    data,
                    end_of_message,
                } => (data, end_of_message),
                Received::Close(reason) => {
                    return Ok(Some(
                        reason.unwrap_or_else(|| CloseReason::from_code(CloseCode::Empty)),
                    ));
                }
            };

            let Some(text) = self.reassembler.push(&data, end_of_message)? else {
                continue;
            };

            let hook = self
                .handler
                .on_message(&self.connection, text, handler_cancel.clone());
            guarded(hook).await.map_err(|err| Error::handler(&err))?;
        }
    }
}

impl<H: Handler> Drop for Session<H> {
    fn drop(&mut self) {
        if self.connection.state().is_active() {
            warn!(conn_id = %self.connection.id(), "session dropped before close");
            self.connection.mark_closed();
        }
    }
}

impl<H: Handler> std::fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection", &self.connection)
            .field("reassembler", &self.reassembler)
            .finish_non_exhaustive()
    }
}

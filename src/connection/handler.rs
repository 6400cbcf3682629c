//! Application hooks invoked over a connection's lifetime.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::Connection;
use crate::error::HandlerError;
use crate::message::CloseReason;
use crate::panic::PanicMessage;

/// Behavior plugged into a session.
///
/// `on_message` is the only required hook. Every hook receives the
/// [`Connection`] so it can [`send`](Connection::send) replies or
/// [`request_close`](Connection::request_close).
///
/// ```rust,ignore
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl Handler for Echo {
///     async fn on_message(
///         &self,
///         conn: &Connection,
///         text: String,
///         _cancel: CancellationToken,
///     ) -> Result<(), HandlerError> {
///         conn.send(text).await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Runs once before the receive loop starts. An error aborts the accept.
    async fn on_accepted(&self, _conn: &Connection) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Runs for every complete inbound message, one at a time.
    ///
    /// `cancel` fires when the connection starts closing. An error or panic
    /// ends the connection with an internal error.
    async fn on_message(
        &self,
        conn: &Connection,
        text: String,
        cancel: CancellationToken,
    ) -> Result<(), HandlerError>;

    /// Runs once after the close handshake, whatever ended the connection.
    async fn on_closed(&self, _conn: &Connection, _reason: &CloseReason) {}
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn on_accepted(&self, conn: &Connection) -> Result<(), HandlerError> {
        (**self).on_accepted(conn).await
    }

    async fn on_message(
        &self,
        conn: &Connection,
        text: String,
        cancel: CancellationToken,
    ) -> Result<(), HandlerError> {
        (**self).on_message(conn, text, cancel).await
    }

    async fn on_closed(&self, conn: &Connection, reason: &CloseReason) {
        (**self).on_closed(conn, reason).await;
    }
}

/// Await a hook, turning a panic into an error.
pub(crate) async fn guarded<F, T>(hook: F) -> Result<T, HandlerError>
where
    F: Future<Output = Result<T, HandlerError>>,
{
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(format!("handler panicked: {}", PanicMessage::new(payload)).into()),
    }
}

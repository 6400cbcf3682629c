//! # wsession - Per-connection message framing and lifecycle management
//!
//! `wsession` sits between a message-oriented transport and application code.
//! It reassembles inbound chunks into complete text messages, splits outbound
//! messages into bounded frames, and runs a close state machine that always
//! performs the close handshake and the close hook exactly once.
//!
//! ## Features
//!
//! - **Reassembly** of chunked inbound messages, dispatched one at a time
//! - **Fragmentation** of outbound messages with serialized concurrent sends
//! - **Cooperative cancellation** linked to a parent shutdown token
//! - **Pluggable transports**: an in-memory pair and RFC 6455 framing over
//!   any tokio byte stream
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsession::{serve, Config, Connection, Handler, HandlerError};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl Handler for Echo {
//!     async fn on_message(
//!         &self,
//!         conn: &Connection,
//!         text: String,
//!         _cancel: CancellationToken,
//!     ) -> Result<(), HandlerError> {
//!         conn.send(text).await?;
//!         Ok(())
//!     }
//! }
//!
//! let reason = serve(transport, Echo, Config::default(), &CancellationToken::new()).await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod panic;
pub mod protocol;
pub mod transport;

pub use config::Config;
pub use connection::{
    accept, serve, Connection, ConnectionId, ConnectionState, Handler, MessageFragmenter,
    Reassembler, Session,
};
pub use error::{Error, HandlerError, Result};
pub use message::{CloseCode, CloseReason};
pub use protocol::OpCode;
pub use transport::{FrameReader, FrameWriter, Received, Role, Transport, WebSocketStream};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_public_types_are_send() {
        assert_send::<Error>();
        assert_send::<Config>();
        assert_send::<CloseCode>();
        assert_send::<CloseReason>();
        assert_send::<Connection>();
        assert_send::<ConnectionId>();
        assert_send::<ConnectionState>();
        assert_send::<Reassembler>();
        assert_send::<Role>();
        assert_send::<transport::MemoryTransport>();
        assert_send::<WebSocketStream<tokio::io::DuplexStream>>();
    }

    #[test]
    fn test_public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<Config>();
        assert_sync::<CloseCode>();
        assert_sync::<CloseReason>();
        assert_sync::<Connection>();
        assert_sync::<ConnectionId>();
        assert_sync::<ConnectionState>();
        assert_sync::<Role>();
    }

    #[test]
    fn test_session_is_send() {
        struct Nop;

        #[async_trait::async_trait]
        impl Handler for Nop {
            async fn on_message(
                &self,
                _conn: &Connection,
                _text: String,
                _cancel: tokio_util::sync::CancellationToken,
            ) -> std::result::Result<(), HandlerError> {
                Ok(())
            }
        }

        assert_send::<Session<Nop>>();
    }
}

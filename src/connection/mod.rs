//! Connection handle, lifecycle state machine and receive loop.
//!
//! [`accept`] turns a [`Transport`](crate::transport::Transport) into a
//! [`Session`]. The session owns the receive side and runs the reassembly
//! loop; its [`Connection`] handle can be cloned into other tasks to send
//! messages or request a close.
//!
//! ## Connection Lifecycle
//!
//! 1. **Connecting** - accepted, accept hook running
//! 2. **Open** - receive loop dispatching messages
//! 3. **Closing** - close requested or detected, handshake pending
//! 4. **Closed** - handshake attempted and close hook has run
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsession::{accept, Config};
//! use tokio_util::sync::CancellationToken;
//!
//! let shutdown = CancellationToken::new();
//! let session = accept(transport, Echo, Config::default(), &shutdown).await?;
//! let conn = session.connection().clone();
//! let task = session.spawn();
//!
//! conn.send("welcome").await?;
//! shutdown.cancel();
//! let reason = task.await?;
//! ```

#[allow(clippy::module_inception)]
mod connection;
mod fragmenter;
mod handler;
mod id;
mod reassembler;
mod session;
mod state;

pub use connection::Connection;
pub use fragmenter::{Fragment, MessageFragmenter};
pub use handler::Handler;
pub use id::ConnectionId;
pub use reassembler::Reassembler;
pub use session::{accept, serve, Session};
pub use state::ConnectionState;

//! Error types for connection sessions and transports.
//!
//! Receive-loop failures never surface through these types to the caller of
//! [`Session::run`](crate::Session::run); they are converted into a close
//! reason. Everything else (misuse, send failures, accept failures) is
//! reported synchronously as an [`Error`].

use thiserror::Error;

use crate::connection::ConnectionState;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type returned by application [`Handler`](crate::Handler) hooks.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while accepting, driving, or sending on a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Configuration rejected before the connection was created.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation attempted while the connection is not open.
    #[error("Connection is not open (state: {0})")]
    ConnectionClosed(ConnectionState),

    /// The connection scope or a caller-supplied token was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Transport-level failure reported by a reader or writer.
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Reassembled message was not valid UTF-8.
    #[error("Invalid UTF-8 in text message")]
    InvalidUtf8,

    /// Accumulated message exceeds the configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Size the message would reach.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// An application hook returned an error or panicked.
    #[error("Handler error: {0}")]
    Handler(String),

    /// Close handshake did not finish within the configured timeout.
    #[error("Close handshake timed out")]
    CloseTimeout,

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),
}

impl Error {
    /// Wrap an application hook failure.
    pub(crate) fn handler(err: &HandlerError) -> Self {
        Error::Handler(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(_: std::string::FromUtf8Error) -> Self {
        Error::InvalidUtf8
    }
}

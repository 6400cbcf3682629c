//! Close codes and close reasons recorded when a connection terminates.

/// Close status code, using the RFC 6455 Section 7.4 numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000). The connection successfully completed.
    #[default]
    NormalClosure,
    /// Endpoint unavailable (1001). Server shutdown or client navigating away.
    EndpointUnavailable,
    /// Protocol error (1002). Malformed frame or protocol violation.
    ProtocolError,
    /// Invalid message type (1003). Data type the endpoint cannot handle.
    InvalidMessageType,
    /// No status (1005). The peer closed without giving a status code.
    Empty,
    /// Invalid payload data (1007). For example non-UTF-8 in a text message.
    InvalidPayloadData,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009). Accumulated message exceeded the size limit.
    MessageTooBig,
    /// Mandatory extension (1010).
    MandatoryExtension,
    /// Internal server error (1011). Unexpected failure inside this endpoint.
    InternalServerError,
    /// Any other code (1012-1014 registered, 3000-4999 application).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::NormalClosure,
            1001 => CloseCode::EndpointUnavailable,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::InvalidMessageType,
            1005 => CloseCode::Empty,
            1007 => CloseCode::InvalidPayloadData,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalServerError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::NormalClosure => 1000,
            CloseCode::EndpointUnavailable => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::InvalidMessageType => 1003,
            CloseCode::Empty => 1005,
            CloseCode::InvalidPayloadData => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalServerError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Whether this code may appear on the wire in a close frame.
    ///
    /// 1005 (`Empty`) and the other reserved codes (1004, 1006, 1015) are
    /// only used locally; a close frame for them carries no status.
    #[must_use]
    pub const fn is_sendable(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
    }

    /// Name used as the default human-readable reason.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            CloseCode::NormalClosure => "NormalClosure".into(),
            CloseCode::EndpointUnavailable => "EndpointUnavailable".into(),
            CloseCode::ProtocolError => "ProtocolError".into(),
            CloseCode::InvalidMessageType => "InvalidMessageType".into(),
            CloseCode::Empty => "Empty".into(),
            CloseCode::InvalidPayloadData => "InvalidPayloadData".into(),
            CloseCode::PolicyViolation => "PolicyViolation".into(),
            CloseCode::MessageTooBig => "MessageTooBig".into(),
            CloseCode::MandatoryExtension => "MandatoryExtension".into(),
            CloseCode::InternalServerError => "InternalServerError".into(),
            CloseCode::Other(code) => code.to_string(),
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u16())
    }
}

/// Why a connection terminated: a code plus descriptive text.
///
/// Recorded at most once per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason for closing.
    pub reason: String,
}

impl CloseReason {
    /// Create a close reason with explicit text.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Close reason whose text is the code's name.
    #[must_use]
    pub fn from_code(code: CloseCode) -> Self {
        Self::new(code, code.name())
    }

    /// Normal closure, recorded when the connection is cancelled.
    #[must_use]
    pub fn normal() -> Self {
        Self::from_code(CloseCode::NormalClosure)
    }

    /// Internal error, recorded when the receive loop fails.
    #[must_use]
    pub fn internal_error() -> Self {
        Self::from_code(CloseCode::InternalServerError)
    }

    /// Recorded when an inbound message exceeds `max_message_size`.
    #[must_use]
    pub fn message_too_large() -> Self {
        Self::new(CloseCode::MessageTooBig, "message too large")
    }

    /// Check whether this reason describes a clean shutdown.
    #[must_use]
    pub fn is_normal(&self) -> bool {
        self.code == CloseCode::NormalClosure
    }
}

impl Default for CloseReason {
    fn default() -> Self {
        Self::normal()
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.reason)
    }
}

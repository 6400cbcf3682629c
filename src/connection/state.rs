//! Connection lifecycle state machine.

use std::sync::atomic::{AtomicU8, Ordering};

/// Connection lifecycle state.
///
/// `Connecting → Open → Closing → Closed`. A connection never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Accepted, accept hook not yet finished.
    #[default]
    Connecting,
    /// Connection is open and ready for data transfer.
    Open,
    /// Close requested or detected; handshake pending.
    Closing,
    /// Handshake done and close hook has run.
    Closed,
}

impl ConnectionState {
    /// Check if the connection is in an active state.
    ///
    /// Returns `true` for `Connecting`, `Open`, or `Closing` states.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    /// Check if sending data is allowed in this state.
    ///
    /// Returns `true` for `Connecting` (so the accept hook can greet the
    /// peer) and `Open`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }

    const fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Connecting => 0,
            ConnectionState::Open => 1,
            ConnectionState::Closing => 2,
            ConnectionState::Closed => 3,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Atomically updated [`ConnectionState`], readable from any task.
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Connecting.as_u8()))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `Connecting → Open`. Returns `false` if the connection already moved on.
    pub(crate) fn open(&self) -> bool {
        self.transition(ConnectionState::Connecting, ConnectionState::Open)
    }

    /// Move to `Closing` from `Connecting` or `Open`.
    ///
    /// Returns `true` only for the caller that performed the transition.
    pub(crate) fn begin_closing(&self) -> bool {
        self.transition(ConnectionState::Open, ConnectionState::Closing)
            || self.transition(ConnectionState::Connecting, ConnectionState::Closing)
    }

    pub(crate) fn close(&self) {
        self.0
            .store(ConnectionState::Closed.as_u8(), Ordering::Release);
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = ConnectionState::default();
        assert_eq!(state, ConnectionState::Connecting);
        assert_eq!(StateCell::new().get(), ConnectionState::Connecting);
    }

    #[test]
    fn test_can_send_in_each_state() {
        assert!(ConnectionState::Connecting.can_send());
        assert!(ConnectionState::Open.can_send());
        assert!(!ConnectionState::Closing.can_send());
        assert!(!ConnectionState::Closed.can_send());
    }

    #[test]
    fn test_is_active() {
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Open.is_active());
        assert!(ConnectionState::Closing.is_active());
        assert!(!ConnectionState::Closed.is_active());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionState::Open.to_string(), "Open");
        assert_eq!(ConnectionState::Closing.to_string(), "Closing");
        assert_eq!(ConnectionState::Closed.to_string(), "Closed");
    }

    #[test]
    fn test_cell_full_lifecycle() {
        let cell = StateCell::new();
        assert!(cell.open());
        assert_eq!(cell.get(), ConnectionState::Open);
        assert!(cell.begin_closing());
        assert_eq!(cell.get(), ConnectionState::Closing);
        cell.close();
        assert_eq!(cell.get(), ConnectionState::Closed);
    }

    #[test]
    fn test_begin_closing_only_once() {
        let cell = StateCell::new();
        cell.open();
        assert!(cell.begin_closing());
        assert!(!cell.begin_closing());
        assert_eq!(cell.get(), ConnectionState::Closing);
    }

    #[test]
    fn test_open_after_closing_is_rejected() {
        let cell = StateCell::new();
        assert!(cell.begin_closing());
        assert!(!cell.open());
        assert_eq!(cell.get(), ConnectionState::Closing);
    }

    #[test]
    fn test_closed_is_terminal() {
        let cell = StateCell::new();
        cell.close();
        assert!(!cell.open());
        assert!(!cell.begin_closing());
        assert_eq!(cell.get(), ConnectionState::Closed);
    }
}

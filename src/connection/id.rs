//! Opaque connection identities.

use std::sync::atomic::{AtomicU64, Ordering};

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identity assigned to a connection at accept time.
///
/// 128 random bits, displayed as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u128);

impl ConnectionId {
    /// Generate a fresh identity.
    ///
    /// Uses OS randomness, falling back to the system clock mixed with a
    /// process-wide counter if the OS source is unavailable.
    #[must_use]
    pub fn generate() -> Self {
        let mut buf = [0u8; 16];
        if getrandom::getrandom(&mut buf).is_ok() {
            Self(u128::from_le_bytes(buf))
        } else {
            Self(fallback_seed())
        }
    }

    /// Raw 128-bit value.
    #[must_use]
    pub const fn as_u128(&self) -> u128 {
        self.0
    }
}

impl From<u128> for ConnectionId {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

fn fallback_seed() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0x1234_5678);
    let count = u128::from(FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed));
    (nanos << 64) ^ count ^ (nanos >> 64)
}

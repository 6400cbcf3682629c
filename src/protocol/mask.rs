//! Payload masking (RFC 6455 Section 5.3).

/// XOR `data` with `mask`, treating `data[0]` as payload byte `offset`.
///
/// The offset lets a payload be unmasked piece by piece as it arrives.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4], offset: usize) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[(offset + i) % 4];
    }
}

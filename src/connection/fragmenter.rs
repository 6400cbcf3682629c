//! Splitting outgoing messages into bounded frames.

use bytes::Bytes;

/// One outbound frame produced by [`MessageFragmenter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Frame payload, at most the configured fragment size.
    pub payload: Bytes,
    /// True only for the last frame of the message.
    pub end_of_message: bool,
}

/// Iterator that produces frames from a message payload.
///
/// Every fragment except the last carries exactly `fragment_size` bytes. An
/// empty payload yields a single empty final fragment. Fragments share the
/// payload's storage instead of copying it.
pub struct MessageFragmenter {
    payload: Bytes,
    fragment_size: usize,
    offset: usize,
    emitted: bool,
}

impl MessageFragmenter {
    /// Create a new fragmenter for the given payload.
    #[inline]
    #[must_use]
    pub fn new(payload: impl Into<Bytes>, fragment_size: usize) -> Self {
        Self {
            payload: payload.into(),
            fragment_size: fragment_size.max(1),
            offset: 0,
            emitted: false,
        }
    }

    /// Number of fragments this payload produces in total.
    #[inline]
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.payload.len().div_ceil(self.fragment_size).max(1)
    }

    /// Get remaining bytes to send.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.payload.len().saturating_sub(self.offset)
    }
}

impl Iterator for MessageFragmenter {
    type Item = Fragment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.payload.len() {
            if !self.emitted {
                self.emitted = true;
                return Some(Fragment {
                    payload: Bytes::new(),
                    end_of_message: true,
                });
            }
            return None;
        }

        let chunk_size = self.remaining().min(self.fragment_size);
        let end = self.offset + chunk_size;
        let payload = self.payload.slice(self.offset..end);
        self.offset = end;
        self.emitted = true;

        Some(Fragment {
            payload,
            end_of_message: end >= self.payload.len(),
        })
    }
}

//! Property-based tests for fragmentation and reassembly.
//!
//! These tests use proptest to check the framing invariants over arbitrary
//! payloads and chunk sizes.

use proptest::prelude::*;
use wsession::protocol::{apply_mask, FrameHeader, OpCode};
use wsession::{Config, MessageFragmenter, Reassembler};

/// Split `data` at the given cut points, clamped and sorted.
fn split_at_cuts(data: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (data.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for point in points {
        chunks.push(data[start..point].to_vec());
        start = point;
    }
    chunks.push(data[start..].to_vec());
    chunks
}

proptest! {
    // =========================================================================
    // Property 1: ceil(L/C) fragments (min 1), only the last is final
    // =========================================================================
    #[test]
    fn test_fragment_count_and_flags(
        payload in prop::collection::vec(any::<u8>(), 0..2048),
        size in 1usize..300
    ) {
        let fragmenter = MessageFragmenter::new(payload.clone(), size);
        let expected = payload.len().div_ceil(size).max(1);
        prop_assert_eq!(fragmenter.fragment_count(), expected);

        let fragments: Vec<_> = fragmenter.collect();
        prop_assert_eq!(fragments.len(), expected);
        for (i, fragment) in fragments.iter().enumerate() {
            prop_assert_eq!(fragment.end_of_message, i == expected - 1);
            prop_assert!(fragment.payload.len() <= size);
        }
    }

    // =========================================================================
    // Property 2: concatenated fragments reproduce the payload
    // =========================================================================
    #[test]
    fn test_fragments_concatenate_to_payload(
        payload in prop::collection::vec(any::<u8>(), 0..2048),
        size in 1usize..300
    ) {
        let joined: Vec<u8> = MessageFragmenter::new(payload.clone(), size)
            .flat_map(|f| f.payload.to_vec())
            .collect();
        prop_assert_eq!(joined, payload);
    }

    // =========================================================================
    // Property 3: any chunking of a text reassembles to exactly that text
    // =========================================================================
    #[test]
    fn test_reassembly_of_arbitrary_chunking(
        text in "\\PC{0,200}",
        cuts in prop::collection::vec(any::<usize>(), 0..10)
    ) {
        let mut reassembler = Reassembler::new(&Config::default());
        let chunks = split_at_cuts(text.as_bytes(), &cuts);
        let last = chunks.len() - 1;

        let mut dispatched = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if let Some(message) = reassembler.push(chunk, i == last).unwrap() {
                dispatched.push(message);
            }
        }

        prop_assert_eq!(dispatched, vec![text]);
        prop_assert!(!reassembler.is_assembling());
        prop_assert_eq!(reassembler.buffered(), 0);
    }

    // =========================================================================
    // Property 4: non-final chunks never dispatch
    // =========================================================================
    #[test]
    fn test_partial_message_never_dispatches(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..20)
    ) {
        let mut reassembler = Reassembler::new(&Config::default());
        let total: usize = chunks.iter().map(Vec::len).sum();
        for chunk in &chunks {
            prop_assert_eq!(reassembler.push(chunk, false).unwrap(), None);
        }
        prop_assert_eq!(reassembler.buffered(), total);
    }

    // =========================================================================
    // Property 5: fragmenting then reassembling a text is the identity
    // =========================================================================
    #[test]
    fn test_fragmenter_feeds_reassembler(
        text in "\\PC{0,300}",
        size in 1usize..64
    ) {
        let mut reassembler = Reassembler::new(&Config::default());
        let mut result = None;
        for fragment in MessageFragmenter::new(text.clone(), size) {
            result = reassembler.push(&fragment.payload, fragment.end_of_message).unwrap();
        }
        prop_assert_eq!(result, Some(text));
    }

    // =========================================================================
    // Property 6: masking at any offset split matches masking in one pass
    // =========================================================================
    #[test]
    fn test_mask_offset_split(
        data in prop::collection::vec(any::<u8>(), 0..512),
        mask in any::<[u8; 4]>(),
        cut in any::<usize>()
    ) {
        let cut = cut % (data.len() + 1);
        let mut whole = data.clone();
        apply_mask(&mut whole, mask, 0);

        let mut pieces = data.clone();
        let (head, tail) = pieces.split_at_mut(cut);
        apply_mask(head, mask, 0);
        apply_mask(tail, mask, cut);

        prop_assert_eq!(pieces, whole);
    }

    // =========================================================================
    // Property 7: header parsing never panics on arbitrary input
    // =========================================================================
    #[test]
    fn test_header_parse_never_panics(data in prop::collection::vec(any::<u8>(), 0..32)) {
        if let Ok(Some((header, len))) = FrameHeader::parse(&data) {
            prop_assert!(len <= data.len());
            prop_assert!(len >= 2);
            prop_assert_eq!(OpCode::from_u8(header.opcode.as_u8()).ok(), Some(header.opcode));
        }
    }
}

//! Property-based tests for DTS layout conversion and frame scanning.

use demux_dts::header::find_header;
use demux_dts::repack::{dts_14_to_16, dts_16_to_14, swap_bytes, DtsTransform};
use demux_dts::truehd::survey;
use proptest::prelude::*;

fn native_blocks() -> impl Strategy<Value = Vec<u8>> {
    (0usize..64).prop_flat_map(|blocks| prop::collection::vec(any::<u8>(), blocks * 14))
}

fn canonical_words() -> impl Strategy<Value = Vec<u8>> {
    (0usize..64).prop_flat_map(|blocks| {
        prop::collection::vec(-8192i16..8192, blocks * 8)
            .prop_map(|words| words.iter().flat_map(|w| w.to_be_bytes()).collect())
    })
}

// =============================================================================
// 14 <-> 16 bit repacking
// =============================================================================

proptest! {
    /// Native data survives a trip through the 14-bit layout.
    #[test]
    fn native_roundtrip(data in native_blocks()) {
        let padded = dts_16_to_14(&data);
        prop_assert_eq!(padded.len(), data.len() / 14 * 16);
        prop_assert_eq!(dts_14_to_16(&padded), data);
    }

    /// Sign-extended 14-bit words survive a trip through the native layout.
    #[test]
    fn padded_roundtrip(data in canonical_words()) {
        let native = dts_14_to_16(&data);
        prop_assert_eq!(native.len(), data.len() / 16 * 14);
        prop_assert_eq!(dts_16_to_14(&native), data);
    }

    /// Repacking shrinks any input to 7/8 of its whole blocks.
    #[test]
    fn repack_length(data in prop::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(dts_14_to_16(&data).len(), data.len() / 16 * 14);
    }

    /// Swapping twice restores the input.
    #[test]
    fn swap_involution(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut copy = data.clone();
        swap_bytes(&mut copy);
        swap_bytes(&mut copy);
        prop_assert_eq!(copy, data);
    }

    /// Decoding matches the declared output length for every layout.
    #[test]
    fn decoded_len_matches(data in prop::collection::vec(any::<u8>(), 0..512)) {
        for t in DtsTransform::CANDIDATES {
            prop_assert_eq!(t.decode(&data).len(), t.decoded_len(data.len()));
        }
    }
}

// =============================================================================
// Synchronizers on arbitrary input
// =============================================================================

proptest! {
    /// Scanning never panics and reported headers lie inside the buffer.
    #[test]
    fn scanners_never_panic(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        if let Some((pos, header)) = find_header(&data) {
            prop_assert!(pos < data.len());
            prop_assert!(header.frame_size >= 96);
        }
        let _ = DtsTransform::detect(&data);
        let result = survey(&data);
        prop_assert!(result.first_sync_offset.map_or(true, |pos| pos < data.len()));
    }
}

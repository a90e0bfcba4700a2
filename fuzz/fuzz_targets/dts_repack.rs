#![no_main]

//! Fuzz target for DTS 14-bit repacking.
//!
//! 16 -> 14 -> 16 must reproduce any input whose length is a multiple of
//! 14 bytes.

use demux_dts::repack::{dts_14_to_16, dts_16_to_14};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let usable = data.len() - data.len() % 14;
    let native = &data[..usable];

    let padded = dts_16_to_14(native);
    assert_eq!(padded.len(), usable / 14 * 16);
    assert_eq!(dts_14_to_16(&padded), native);
});

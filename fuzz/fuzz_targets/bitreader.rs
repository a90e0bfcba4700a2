#![no_main]

//! Fuzz target for BitReader edge cases.
//!
//! Runs arbitrary sequences of reads over arbitrary data and checks the
//! position bookkeeping.

use arbitrary::Arbitrary;
use demux_core::BitReader;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct BitstreamInput {
    data: Vec<u8>,
    operations: Vec<BitOperation>,
}

#[derive(Arbitrary, Debug, Clone)]
enum BitOperation {
    ReadBit,
    ReadBits(u8),
    ReadUe,
    ReadSe,
    Skip(u16),
    PeekBits(u8),
    AlignToByte,
}

fuzz_target!(|input: BitstreamInput| {
    let total = input.data.len() * 8;
    let mut reader = BitReader::new(&input.data);

    for op in input.operations.into_iter().take(4096) {
        let _ = match op {
            BitOperation::ReadBit => reader.read_bit().map(|_| ()),
            BitOperation::ReadBits(n) => reader.read_bits(n % 33).map(|_| ()),
            BitOperation::ReadUe => reader.read_ue().map(|_| ()),
            BitOperation::ReadSe => reader.read_se().map(|_| ()),
            BitOperation::Skip(n) => reader.skip(n as usize),
            BitOperation::PeekBits(n) => reader.peek_bits(n % 33).map(|_| ()),
            BitOperation::AlignToByte => {
                reader.align_to_byte();
                Ok(())
            }
        };
        assert!(reader.position() <= total);
        assert_eq!(reader.position() + reader.remaining_bits(), total);
    }
});

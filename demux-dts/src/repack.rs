//! DTS layout conversion.
//!
//! DTS is stored on disc and in files in four layouts: the native 16-bit
//! big-endian form, its byte-swapped twin, and a 14-bit form in which each
//! 16-bit word carries 14 payload bits (plus the swapped variant of that).
//! Every 8 words (16 bytes) of 14-bit data hold 14 bytes of native data.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::header::find_header;

/// Bytes of 14-bit data that repack into one [`NATIVE_BLOCK`].
pub const PADDED_BLOCK: usize = 16;

/// Bytes of native data per [`PADDED_BLOCK`].
pub const NATIVE_BLOCK: usize = 14;

const WORDS_PER_BLOCK: usize = PADDED_BLOCK / 2;
const PAYLOAD_MASK: u16 = 0x3FFF;
const SIGN_BIT: u16 = 0x2000;

/// Convert 14-bit words to native 16-bit data.
///
/// Only whole 16-byte blocks are converted; a trailing partial block is
/// ignored. The top two bits of every word are discarded.
pub fn dts_14_to_16(src: &[u8]) -> Vec<u8> {
    let blocks = src.len() / PADDED_BLOCK;
    let mut out = Vec::with_capacity(blocks * NATIVE_BLOCK);

    for block in src.chunks_exact(PADDED_BLOCK) {
        let mut acc = 0u128;
        for word in 0..WORDS_PER_BLOCK {
            let value = BigEndian::read_u16(&block[word * 2..]) & PAYLOAD_MASK;
            acc = (acc << 14) | value as u128;
        }
        // 112 payload bits sit in the low bits of the accumulator
        let bytes = acc.to_be_bytes();
        out.extend_from_slice(&bytes[16 - NATIVE_BLOCK..]);
    }
    out
}

/// Convert native 16-bit data to 14-bit words, sign-extending bit 13 into
/// the two padding bits.
///
/// Only whole 14-byte blocks are converted.
pub fn dts_16_to_14(src: &[u8]) -> Vec<u8> {
    let blocks = src.len() / NATIVE_BLOCK;
    let mut out = vec![0u8; blocks * PADDED_BLOCK];

    for (block, dst) in src
        .chunks_exact(NATIVE_BLOCK)
        .zip(out.chunks_exact_mut(PADDED_BLOCK))
    {
        let mut bytes = [0u8; 16];
        bytes[16 - NATIVE_BLOCK..].copy_from_slice(block);
        let acc = u128::from_be_bytes(bytes);

        for word in 0..WORDS_PER_BLOCK {
            let shift = 14 * (WORDS_PER_BLOCK - 1 - word);
            let mut value = ((acc >> shift) as u16) & PAYLOAD_MASK;
            if value & SIGN_BIT != 0 {
                value |= !PAYLOAD_MASK;
            }
            BigEndian::write_u16(&mut dst[word * 2..], value);
        }
    }
    out
}

/// Swap the bytes of every 16-bit word in place. A trailing odd byte is
/// left untouched.
pub fn swap_bytes(data: &mut [u8]) {
    for pair in data.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

/// The conversion that turns a stored DTS layout into the native one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DtsTransform {
    /// Swap the bytes of each 16-bit word first.
    pub swap_bytes: bool,
    /// Then repack 14-bit words into native 16-bit data.
    pub repack_14_to_16: bool,
}

impl DtsTransform {
    /// The candidates tried by [`DtsTransform::detect`], in order.
    pub const CANDIDATES: [DtsTransform; 4] = [
        DtsTransform {
            swap_bytes: false,
            repack_14_to_16: false,
        },
        DtsTransform {
            swap_bytes: true,
            repack_14_to_16: false,
        },
        DtsTransform {
            swap_bytes: false,
            repack_14_to_16: true,
        },
        DtsTransform {
            swap_bytes: true,
            repack_14_to_16: true,
        },
    ];

    /// Find the layout of `buf` by trying each candidate until a valid core
    /// header shows up in the converted data.
    pub fn detect(buf: &[u8]) -> Option<Self> {
        Self::CANDIDATES
            .into_iter()
            .find(|t| find_header(&t.decode(buf)).is_some())
    }

    /// Whether the data is already native.
    pub fn is_identity(&self) -> bool {
        !self.swap_bytes && !self.repack_14_to_16
    }

    /// Input bytes must be fed in multiples of this to convert cleanly.
    pub fn granule(&self) -> usize {
        if self.repack_14_to_16 {
            PADDED_BLOCK
        } else if self.swap_bytes {
            2
        } else {
            1
        }
    }

    /// Convert `buf` into native data. Bytes past the last whole granule
    /// are dropped.
    pub fn decode(&self, buf: &[u8]) -> Vec<u8> {
        let usable = buf.len() - buf.len() % self.granule();
        let mut data = buf[..usable].to_vec();
        if self.swap_bytes {
            swap_bytes(&mut data);
        }
        if self.repack_14_to_16 {
            dts_14_to_16(&data)
        } else {
            data
        }
    }

    /// Number of native bytes produced from `input` stored bytes.
    pub fn decoded_len(&self, input: usize) -> usize {
        let usable = input - input % self.granule();
        if self.repack_14_to_16 {
            usable / PADDED_BLOCK * NATIVE_BLOCK
        } else {
            usable
        }
    }
}

impl fmt::Display for DtsTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = if self.swap_bytes { "little" } else { "big" };
        let width = if self.repack_14_to_16 { 14 } else { 16 };
        write!(f, "{width}-bit words, {order} endian")
    }
}

//! Bit-level access to header bytes.
//!
//! Codec headers (MPEG video sequence headers, AVC parameter sets, DTS and
//! AC-3 frame headers) pack their fields across byte boundaries. The reader
//! works on an in-memory slice that a synchronizer has already pulled from
//! the byte source; a single bit cursor tracks progress through it.

use crate::error::{BitstreamError, Result};

/// Big-endian bit cursor over a header slice.
///
/// Fields are read most significant bit first, as every header format in
/// the workspace stores them.
#[derive(Debug, Clone, Copy)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Absolute position in bits.
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Start reading at the first bit of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bits consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bits left before the end of the slice.
    pub fn remaining_bits(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }

    /// Whether the cursor sits on a byte boundary.
    pub fn is_byte_aligned(&self) -> bool {
        self.pos % 8 == 0
    }

    /// Move the cursor to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        self.pos = self.pos.div_ceil(8) * 8;
    }

    /// Read one bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Read a one-bit flag.
    pub fn read_flag(&mut self) -> Result<bool> {
        self.read_bit()
    }

    /// Read an `n`-bit unsigned field, `n <= 32`.
    pub fn read_bits(&mut self, n: u8) -> Result<u32> {
        if n > 32 {
            return Err(BitstreamError::TooManyBits(n).into());
        }
        let n = n as usize;
        if self.remaining_bits() < n {
            return Err(BitstreamError::UnexpectedEnd.into());
        }

        let mut value = 0u64;
        let mut left = n;
        while left > 0 {
            let byte = self.data[self.pos / 8];
            let offset = self.pos % 8;
            let take = (8 - offset).min(left);
            let bits = (byte >> (8 - offset - take)) & (0xFF >> (8 - take));
            value = (value << take) | bits as u64;
            self.pos += take;
            left -= take;
        }
        Ok(value as u32)
    }

    /// Read the next `n` bits without moving the cursor.
    pub fn peek_bits(&self, n: u8) -> Result<u32> {
        let mut ahead = *self;
        ahead.read_bits(n)
    }

    /// Read an unsigned Exp-Golomb code, `ue(v)`.
    pub fn read_ue(&mut self) -> Result<u32> {
        let mut zeros = 0u8;
        while !self.read_bit()? {
            zeros += 1;
            if zeros > 31 {
                return Err(BitstreamError::ExpGolombOverflow.into());
            }
        }
        let info = self.read_bits(zeros)? as u64;
        Ok(((1u64 << zeros) - 1 + info).min(u32::MAX as u64) as u32)
    }

    /// Read a signed Exp-Golomb code, `se(v)`.
    pub fn read_se(&mut self) -> Result<i32> {
        let code = self.read_ue()? as i64;
        let magnitude = (code + 1) / 2;
        let value = if code & 1 == 1 { magnitude } else { -magnitude };
        Ok(value as i32)
    }

    /// Move the cursor `n` bits forward.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining_bits() < n {
            return Err(BitstreamError::UnexpectedEnd.into());
        }
        self.pos += n;
        Ok(())
    }
}

/// Bit packer used to build headers in tests and by the DTS 16-to-14 bit
/// packing.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    /// Total bits written.
    len: usize,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one bit.
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(bit as u32, 1);
    }

    /// Append the low `n` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u32, n: u8) {
        let mut left = n.min(32) as usize;
        while left > 0 {
            let offset = self.len % 8;
            if offset == 0 {
                self.data.push(0);
            }
            let take = (8 - offset).min(left);
            let bits = (((value as u64) >> (left - take)) & ((1 << take) - 1)) as u8;
            if let Some(last) = self.data.last_mut() {
                *last |= bits << (8 - offset - take);
            }
            self.len += take;
            left -= take;
        }
    }

    /// Append an unsigned Exp-Golomb code.
    pub fn write_ue(&mut self, value: u32) {
        let code = value as u64 + 1;
        let width = (64 - code.leading_zeros()) as u8;
        self.write_bits(0, width - 1);
        // width can reach 33 for u32::MAX
        if width > 32 {
            self.write_bit(true);
            self.write_bits(code as u32, 32);
        } else {
            self.write_bits(code as u32, width);
        }
    }

    /// Append a signed Exp-Golomb code.
    pub fn write_se(&mut self, value: i32) {
        let code = if value > 0 {
            2 * value as i64 - 1
        } else {
            -2 * value as i64
        };
        self.write_ue(code as u32);
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        self.len = self.len.div_ceil(8) * 8;
    }

    /// Bytes written so far; a partial last byte is zero-padded.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the writer and return its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Strip `00 00 03` emulation prevention bytes from an AVC NAL unit.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut zero_run = 0;
    data.iter()
        .copied()
        .filter(|&byte| {
            let escape = zero_run >= 2 && byte == 3;
            zero_run = if byte == 0 && !escape { zero_run + 1 } else { 0 };
            !escape
        })
        .collect()
}

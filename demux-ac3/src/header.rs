//! AC-3 and E-AC-3 sync frame headers.
//!
//! Both formats start with the `0x0B77` sync word. The bitstream id decides
//! which syntax follows: up to 10 is AC-3, 11 to 16 is E-AC-3.

use demux_core::bitstream::BitReader;
use demux_core::timestamp::samples_to_ns;
use demux_core::Codec;

use crate::{Ac3Error, Result, AC3_SYNC_WORD};

/// AC-3 sample rate table (indexed by fscod).
const AC3_SAMPLE_RATES: [u32; 3] = [48000, 44100, 32000];

/// E-AC-3 reduced sample rates (indexed by fscod2).
const EAC3_SAMPLE_RATES_2: [u32; 3] = [24000, 22050, 16000];

/// AC-3 bitrate table in kbps (indexed by frmsizecod / 2).
const AC3_BITRATES: [u32; 19] = [
    32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 576, 640,
];

/// AC-3 frame sizes in 16-bit words at 48 kHz (indexed by frmsizecod / 2).
const AC3_FRAME_WORDS_48: [u16; 19] = [
    64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 640, 768, 896, 1024, 1152, 1280,
];

/// AC-3 frame sizes in 16-bit words at 44.1 kHz (indexed by frmsizecod / 2).
const AC3_FRAME_WORDS_44: [u16; 19] = [
    69, 87, 104, 121, 139, 174, 208, 243, 278, 348, 417, 487, 557, 696, 835, 975, 1114, 1253, 1393,
];

/// AC-3 frame sizes in 16-bit words at 32 kHz (indexed by frmsizecod / 2).
const AC3_FRAME_WORDS_32: [u16; 19] = [
    96, 120, 144, 168, 192, 240, 288, 336, 384, 480, 576, 672, 768, 960, 1152, 1344, 1536, 1728,
    1920,
];

/// Full-bandwidth channel count per acmod.
const ACMOD_CHANNELS: [u8; 8] = [2, 1, 2, 3, 3, 4, 4, 5];

/// E-AC-3 audio blocks per frame (indexed by numblkscod).
const EAC3_BLOCKS: [u32; 4] = [1, 2, 3, 6];

/// Bytes needed to parse any header variant.
pub const AC3_HEADER_SIZE: usize = 8;

/// A parsed AC-3 or E-AC-3 sync frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ac3Header {
    /// Bitstream id.
    pub bsid: u8,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Audio coding mode.
    pub acmod: u8,
    /// LFE channel present.
    pub lfe: bool,
    /// Total channel count including LFE.
    pub channels: u8,
    /// Frame size in bytes.
    pub frame_size: usize,
    /// PCM samples per channel in this frame.
    pub samples: u32,
    /// Bitrate in kbps (AC-3 only).
    pub bitrate: Option<u32>,
}

impl Ac3Header {
    /// Parse a header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < AC3_HEADER_SIZE {
            return Err(Ac3Error::InsufficientData {
                needed: AC3_HEADER_SIZE,
                available: data.len(),
            });
        }

        let sync = u16::from_be_bytes([data[0], data[1]]);
        if sync != AC3_SYNC_WORD {
            return Err(Ac3Error::InvalidSyncWord(sync));
        }

        let bsid = data[5] >> 3;
        match bsid {
            0..=10 => Self::parse_ac3(data),
            11..=16 => Self::parse_eac3(data),
            _ => Err(Ac3Error::InvalidBsid(bsid)),
        }
    }

    fn parse_ac3(data: &[u8]) -> Result<Self> {
        let mut r = BitReader::new(&data[2..]);
        r.skip(16)?; // crc1
        let fscod = r.read_bits(2)? as u8;
        let frmsizecod = r.read_bits(6)? as u8;
        let bsid = r.read_bits(5)? as u8;
        r.skip(3)?; // bsmod
        let acmod = r.read_bits(3)? as u8;

        if fscod >= 3 {
            return Err(Ac3Error::UnsupportedSampleRate(fscod));
        }
        if frmsizecod >= 38 {
            return Err(Ac3Error::UnsupportedFrameSize(frmsizecod));
        }

        if (acmod & 0x01) != 0 && acmod != 0x01 {
            r.skip(2)?; // cmixlev
        }
        if (acmod & 0x04) != 0 {
            r.skip(2)?; // surmixlev
        }
        if acmod == 0x02 {
            r.skip(2)?; // dsurmod
        }
        let lfe = r.read_flag()?;

        let index = (frmsizecod / 2) as usize;
        let words = match fscod {
            0 => AC3_FRAME_WORDS_48[index],
            1 => AC3_FRAME_WORDS_44[index] + (frmsizecod & 1) as u16,
            _ => AC3_FRAME_WORDS_32[index],
        };

        // bsid 9 and 10 signal half and quarter sample rates
        let shift = bsid.saturating_sub(8);
        let sample_rate = AC3_SAMPLE_RATES[fscod as usize] >> shift;

        Ok(Self {
            bsid,
            sample_rate,
            acmod,
            lfe,
            channels: ACMOD_CHANNELS[acmod as usize] + lfe as u8,
            frame_size: words as usize * 2,
            samples: 1536,
            bitrate: Some(AC3_BITRATES[index] >> shift),
        })
    }

    fn parse_eac3(data: &[u8]) -> Result<Self> {
        let mut r = BitReader::new(&data[2..]);
        let strmtyp = r.read_bits(2)? as u8;
        r.skip(3)?; // substreamid
        let frmsiz = r.read_bits(11)? as usize;
        let fscod = r.read_bits(2)? as u8;

        if strmtyp == 3 {
            return Err(Ac3Error::BitstreamCorruption("reserved E-AC-3 stream type".into()));
        }

        let (sample_rate, blocks) = if fscod == 3 {
            let fscod2 = r.read_bits(2)? as usize;
            let rate = *EAC3_SAMPLE_RATES_2
                .get(fscod2)
                .ok_or(Ac3Error::UnsupportedSampleRate(fscod2 as u8))?;
            (rate, 6)
        } else {
            let numblkscod = r.read_bits(2)? as usize;
            (AC3_SAMPLE_RATES[fscod as usize], EAC3_BLOCKS[numblkscod])
        };

        let acmod = r.read_bits(3)? as u8;
        let lfe = r.read_flag()?;
        let bsid = r.read_bits(5)? as u8;

        Ok(Self {
            bsid,
            sample_rate,
            acmod,
            lfe,
            channels: ACMOD_CHANNELS[acmod as usize] + lfe as u8,
            frame_size: (frmsiz + 1) * 2,
            samples: 256 * blocks,
            bitrate: None,
        })
    }

    /// Whether this is an E-AC-3 header.
    pub fn is_eac3(&self) -> bool {
        self.bsid > 10
    }

    /// Codec tag for this header.
    pub fn codec(&self) -> Codec {
        if self.bsid == 16 {
            Codec::Eac3
        } else {
            Codec::Ac3
        }
    }

    /// Frame duration in nanoseconds.
    pub fn duration_ns(&self) -> Option<i64> {
        samples_to_ns(self.samples as u64, self.sample_rate)
    }
}

/// Find the first valid header in `data`.
///
/// Returns the offset of the sync word and the parsed header.
pub fn find_header(data: &[u8]) -> Option<(usize, Ac3Header)> {
    let mut pos = 0;
    while pos + AC3_HEADER_SIZE <= data.len() {
        let rel = find_sync(&data[pos..])?;
        pos += rel;
        if let Ok(header) = Ac3Header::parse(&data[pos..]) {
            return Some((pos, header));
        }
        pos += 1;
    }
    None
}

/// Find a header at `offset` that is followed by `count - 1` further valid
/// headers back to back.
pub fn find_consecutive_headers(data: &[u8], count: usize) -> Option<(usize, Ac3Header)> {
    let mut start = 0;
    while let Some((rel, first)) = find_header(&data[start..]) {
        let offset = start + rel;
        let mut pos = offset + first.frame_size;
        let mut found = 1;
        while found < count {
            match Ac3Header::parse(data.get(pos..).unwrap_or(&[])) {
                Ok(next) => {
                    pos += next.frame_size;
                    found += 1;
                }
                Err(_) => break,
            }
        }
        if found >= count {
            return Some((offset, first));
        }
        start = offset + 1;
    }
    None
}

/// Find the next `0x0B77` sync word.
pub fn find_sync(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == [0x0B, 0x77])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use demux_core::BitWriter;

    /// Build a 48 kHz stereo AC-3 frame with LFE. frmsizecod 16 is
    /// 128 kbps, 512 bytes.
    pub(crate) fn ac3_frame(frmsizecod: u8) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(0x0B77, 16);
        w.write_bits(0, 16); // crc1
        w.write_bits(0, 2); // fscod 48 kHz
        w.write_bits(frmsizecod as u32, 6);
        w.write_bits(8, 5); // bsid
        w.write_bits(0, 3); // bsmod
        w.write_bits(2, 3); // acmod 2/0
        w.write_bits(0, 2); // dsurmod
        w.write_bit(true); // lfeon
        w.align_to_byte();
        let mut frame = w.into_data();
        let size = AC3_FRAME_WORDS_48[(frmsizecod / 2) as usize] as usize * 2;
        frame.resize(size, 0);
        frame
    }

    fn eac3_frame() -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(0x0B77, 16);
        w.write_bits(0, 2); // strmtyp
        w.write_bits(0, 3); // substreamid
        w.write_bits(383, 11); // frmsiz -> 768 bytes
        w.write_bits(0, 2); // fscod 48 kHz
        w.write_bits(3, 2); // numblkscod 6 blocks
        w.write_bits(7, 3); // acmod 3/2
        w.write_bit(true); // lfeon
        w.write_bits(16, 5); // bsid
        w.align_to_byte();
        let mut frame = w.into_data();
        frame.resize(768, 0);
        frame
    }

    #[test]
    fn test_parse_ac3() {
        let header = Ac3Header::parse(&ac3_frame(16)).unwrap();
        assert_eq!(header.sample_rate, 48000);
        assert_eq!(header.frame_size, 512);
        assert_eq!(header.channels, 3);
        assert_eq!(header.bitrate, Some(128));
        assert_eq!(header.codec(), Codec::Ac3);
        assert_eq!(header.duration_ns(), Some(32_000_000));
    }

    #[test]
    fn test_parse_eac3() {
        let header = Ac3Header::parse(&eac3_frame()).unwrap();
        assert!(header.is_eac3());
        assert_eq!(header.codec(), Codec::Eac3);
        assert_eq!(header.frame_size, 768);
        assert_eq!(header.channels, 6);
        assert_eq!(header.samples, 1536);
    }

    #[test]
    fn test_invalid_fields() {
        let mut frame = ac3_frame(16);
        frame[4] = 0xC0 | 8; // fscod 3
        assert!(matches!(
            Ac3Header::parse(&frame),
            Err(Ac3Error::UnsupportedSampleRate(3))
        ));

        let mut frame = ac3_frame(16);
        frame[4] = 40; // frmsizecod 40
        assert!(matches!(
            Ac3Header::parse(&frame),
            Err(Ac3Error::UnsupportedFrameSize(40))
        ));

        assert!(matches!(
            Ac3Header::parse(&[0x0B, 0x77]),
            Err(Ac3Error::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_find_header_after_garbage() {
        let mut data = vec![0x0B, 0x77, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x12];
        data.extend(ac3_frame(16));
        let (pos, header) = find_header(&data).unwrap();
        assert_eq!(pos, 9);
        assert_eq!(header.frame_size, 512);
    }

    #[test]
    fn test_find_consecutive() {
        let mut data = ac3_frame(16);
        data.extend(ac3_frame(16));
        assert_eq!(find_consecutive_headers(&data, 2).map(|(p, _)| p), Some(0));
        data[512] = 0;
        assert!(find_consecutive_headers(&data, 2).is_none());
    }
}

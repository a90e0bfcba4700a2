//! DTS core sync frame headers.
//!
//! Frames are expected in the native 16-bit big-endian layout; callers
//! holding 14-bit or byte-swapped data convert it first with
//! [`DtsTransform`](crate::repack::DtsTransform).

use demux_core::timestamp::samples_to_ns;
use demux_core::BitReader;

use crate::{DtsError, Result, DTS_HD_SYNC, DTS_SYNC_WORD_BE};

/// Bytes needed to parse a core header, CRC word included.
pub const DTS_HEADER_SIZE: usize = 16;

/// Bytes needed to read the size of a DTS-HD substream header.
pub const DTS_HD_HEADER_SIZE: usize = 12;

/// Smallest valid FSIZE field.
const MIN_FSIZE: u32 = 95;

/// Smallest valid NBLKS field.
const MIN_NBLKS: u32 = 5;

/// Core sample rates indexed by SFREQ (0 = invalid).
const DTS_SAMPLE_RATES: [u32; 16] = [
    0, 8000, 16000, 32000, 0, 0, 11025, 22050, 44100, 0, 0, 12000, 24000, 48000, 96000, 192000,
];

/// Transmission bit rates in kbps indexed by RATE. The last three codes are
/// open, variable and lossless.
const DTS_BIT_RATES: [u32; 32] = [
    32, 56, 64, 96, 112, 128, 192, 224, 256, 320, 384, 448, 512, 576, 640, 768, 896, 1024, 1152,
    1280, 1344, 1408, 1411, 1472, 1536, 1920, 2048, 3072, 3840, 0, 0, 0,
];

/// Channels for each standard AMODE value (LFE excluded).
const AMODE_CHANNELS: [u8; 16] = [1, 2, 2, 2, 2, 3, 3, 4, 4, 5, 6, 6, 6, 7, 8, 8];

/// Source PCM resolution indexed by PCMR.
const PCM_RESOLUTION: [Option<u8>; 8] = [
    Some(16),
    Some(16),
    Some(20),
    Some(20),
    None,
    Some(24),
    Some(24),
    None,
];

/// A parsed DTS core frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DtsHeader {
    /// Core frame size in bytes (FSIZE + 1).
    pub frame_size: usize,
    /// PCM sample blocks in the frame (NBLKS + 1).
    pub blocks: u8,
    /// Core sample rate in Hz.
    pub sample_rate: u32,
    /// Channel arrangement code.
    pub amode: u8,
    /// Channel count including LFE.
    pub channels: u8,
    /// Whether an LFE channel is present.
    pub lfe: bool,
    /// Transmission bit rate in kbps; `None` for open, variable or lossless.
    pub bit_rate: Option<u32>,
    /// Source PCM resolution.
    pub bit_depth: Option<u8>,
    /// Whether the header CRC word is present.
    pub crc_present: bool,
    /// Whether an extension (XCh, X96, XXCh) is signalled in the core.
    pub ext_audio: bool,
}

impl DtsHeader {
    /// Parse a core header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < DTS_HEADER_SIZE {
            return Err(DtsError::InsufficientData {
                needed: DTS_HEADER_SIZE,
                available: data.len(),
            });
        }

        let sync = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        if sync != DTS_SYNC_WORD_BE {
            return Err(DtsError::InvalidSyncWord(sync));
        }

        let mut r = BitReader::new(&data[4..]);

        if !r.read_flag()? {
            return Err(DtsError::invalid_header("termination frame"));
        }
        r.skip(5)?; // SHORT
        let crc_present = r.read_flag()?;
        let nblks = r.read_bits(7)?;
        let fsize = r.read_bits(14)?;
        let amode = r.read_bits(6)? as u8;
        let sfreq = r.read_bits(4)? as u8;
        let rate = r.read_bits(5)? as usize;

        if nblks < MIN_NBLKS {
            return Err(DtsError::invalid_header(format!("NBLKS {nblks} too small")));
        }
        if fsize < MIN_FSIZE {
            return Err(DtsError::invalid_header(format!("FSIZE {fsize} too small")));
        }
        let sample_rate = DTS_SAMPLE_RATES[sfreq as usize];
        if sample_rate == 0 {
            return Err(DtsError::UnsupportedSampleRate(sfreq));
        }
        let base_channels = *AMODE_CHANNELS
            .get(amode as usize)
            .ok_or_else(|| DtsError::invalid_header(format!("user defined AMODE {amode}")))?;

        r.skip(1)?; // fixed bit
        r.skip(4)?; // DYNF, TIMEF, AUXF, HDCD
        r.skip(3)?; // EXT_AUDIO_ID
        let ext_audio = r.read_flag()?;
        r.skip(1)?; // ASPF
        let lff = r.read_bits(2)?;
        r.skip(1)?; // HFLAG
        if crc_present {
            r.skip(16)?; // HCRC
        }
        r.skip(1)?; // FILTS
        r.skip(4)?; // VERNUM
        r.skip(2)?; // CHIST
        let pcmr = r.read_bits(3)? as usize;

        let lfe = lff == 1 || lff == 2;
        let bit_rate = match DTS_BIT_RATES[rate] {
            0 => None,
            kbps => Some(kbps),
        };

        Ok(Self {
            frame_size: fsize as usize + 1,
            blocks: nblks as u8 + 1,
            sample_rate,
            amode,
            channels: base_channels + lfe as u8,
            lfe,
            bit_rate,
            bit_depth: PCM_RESOLUTION[pcmr],
            crc_present,
            ext_audio,
        })
    }

    /// PCM samples per channel in one frame.
    pub fn samples(&self) -> u32 {
        self.blocks as u32 * 32
    }

    /// Frame duration in nanoseconds.
    pub fn duration_ns(&self) -> Option<i64> {
        samples_to_ns(self.samples() as u64, self.sample_rate)
    }

    /// Length of the whole frame starting at `data[0]`: the core plus a
    /// DTS-HD substream directly following it.
    ///
    /// Returns `None` when more bytes are needed to decide.
    pub fn frame_length(&self, data: &[u8]) -> Option<usize> {
        let core = self.frame_size;
        if data.len() < core + 4 {
            return None;
        }
        if read_u32(&data[core..]) != DTS_HD_SYNC {
            return Some(core);
        }
        hd_substream_size(&data[core..]).map(|hd| core + hd)
    }
}

/// Size of the DTS-HD substream starting at `data[0]`, header included.
pub fn hd_substream_size(data: &[u8]) -> Option<usize> {
    if data.len() < DTS_HD_HEADER_SIZE || read_u32(data) != DTS_HD_SYNC {
        return None;
    }
    let mut r = BitReader::new(&data[4..]);
    r.skip(8).ok()?; // UserDefinedBits
    r.skip(2).ok()?; // nExtSSIndex
    let (header_bits, size_bits) = if r.read_flag().ok()? { (12, 20) } else { (8, 16) };
    r.skip(header_bits).ok()?;
    let size = r.read_bits(size_bits).ok()?;
    Some(size as usize + 1)
}

fn read_u32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}

/// Position of the next DTS core or DTS-HD sync word.
pub fn find_sync(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| {
        let sync = u32::from_be_bytes([w[0], w[1], w[2], w[3]]);
        sync == DTS_SYNC_WORD_BE || sync == DTS_HD_SYNC
    })
}

/// Find the first valid core header in `data`.
///
/// A candidate is accepted when the bytes after it start with another
/// core or DTS-HD sync word, or when the buffer ends before that point.
pub fn find_header(data: &[u8]) -> Option<(usize, DtsHeader)> {
    let mut start = 0;
    while let Some(rel) = data.get(start..).and_then(find_sync) {
        let pos = start + rel;
        if let Ok(header) = DtsHeader::parse(&data[pos..]) {
            let next = pos + header.frame_size;
            if next + 4 > data.len() {
                return Some((pos, header));
            }
            let sync = read_u32(&data[next..]);
            if sync == DTS_SYNC_WORD_BE || sync == DTS_HD_SYNC {
                return Some((pos, header));
            }
        }
        start = pos + 1;
    }
    None
}

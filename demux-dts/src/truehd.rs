//! TrueHD / MLP access unit classification.
//!
//! Every access unit starts with a 4-byte header whose low 12 bits of the
//! first word give the unit length in 16-bit words. Major sync units carry
//! `0xF8726FBA` (TrueHD) or `0xF8726FBB` (MLP) at offset 4 followed by the
//! stream parameters; the units in between reuse the parameters of the last
//! major sync. Blu-ray TrueHD tracks interleave a complete AC-3 stream with
//! the access units.

use demux_ac3::{Ac3Header, AC3_SYNC_WORD};
use demux_core::framing::Scan;
use demux_core::timestamp::samples_to_ns;
use demux_core::Codec;

use crate::{MLP_SYNC, TRUEHD_SYNC};

/// Bytes needed to classify any frame.
pub const TRUEHD_HEADER_SIZE: usize = 12;

const MIN_FRAME_SIZE: usize = 8;

/// Channel count contributed by each bit of a TrueHD channel map.
const TRUEHD_CHANNELS: [u8; 13] = [2, 1, 1, 2, 2, 2, 2, 1, 1, 2, 2, 1, 1];

/// MLP channel count indexed by the channel arrangement.
const MLP_CHANNELS: [u8; 32] = [
    1, 2, 3, 4, 3, 4, 5, 3, 4, 5, 4, 5, 6, 4, 5, 4, 5, 6, 5, 5, 6, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// What kind of unit a frame is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrueHdFrameKind {
    /// TrueHD major sync unit.
    TrueHdSync,
    /// MLP major sync unit.
    MlpSync,
    /// Access unit without major sync.
    Continuation,
    /// Interleaved AC-3 frame.
    Ac3,
}

/// A classified frame with the stream parameters in effect for it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrueHdFrame {
    /// Frame classification.
    pub kind: TrueHdFrameKind,
    /// `TrueHd`, `Mlp`, `Ac3` or `Eac3`.
    pub codec: Codec,
    /// Frame length in bytes.
    pub size: usize,
    /// Sample rate in Hz (0 if unknown).
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u8,
    /// PCM samples per channel in the frame.
    pub samples_per_frame: u32,
    /// Sample resolution, when signalled.
    pub bit_depth: Option<u8>,
}

impl TrueHdFrame {
    /// Whether this is a TrueHD or MLP major sync unit.
    pub fn is_sync(&self) -> bool {
        matches!(
            self.kind,
            TrueHdFrameKind::TrueHdSync | TrueHdFrameKind::MlpSync
        )
    }

    /// Frame duration in nanoseconds.
    pub fn duration_ns(&self) -> Option<i64> {
        samples_to_ns(self.samples_per_frame as u64, self.sample_rate)
    }

    fn from_ac3(header: &Ac3Header) -> Self {
        Self {
            kind: TrueHdFrameKind::Ac3,
            codec: header.codec(),
            size: header.frame_size,
            sample_rate: header.sample_rate,
            channels: header.channels,
            samples_per_frame: header.samples,
            bit_depth: None,
        }
    }
}

/// Outcome of looking for a frame at the start of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameParse {
    /// A frame starts here.
    Frame(TrueHdFrame),
    /// Too few bytes to tell.
    NeedMore,
    /// No frame starts here.
    NoFrame,
}

fn decode_rate(bits: u8) -> u32 {
    if bits == 0x0F {
        return 0;
    }
    let base = if bits & 0x08 != 0 { 44100 } else { 48000 };
    base << (bits & 0x07)
}

fn truehd_channels(map: u16) -> u8 {
    TRUEHD_CHANNELS
        .iter()
        .enumerate()
        .filter(|(bit, _)| map & (1 << bit) != 0)
        .map(|(_, &count)| count)
        .sum()
}

fn mlp_bit_depth(bits: u8) -> Option<u8> {
    match bits {
        0 => Some(16),
        1 => Some(20),
        2 => Some(24),
        _ => None,
    }
}

fn parse_major_sync(data: &[u8], size: usize) -> Option<TrueHdFrame> {
    let sync = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    match sync {
        TRUEHD_SYNC => {
            let rate_bits = data[8] >> 4;
            let substream_1 = (((data[9] & 0x0F) as u16) << 1) | (data[10] >> 7) as u16;
            let substream_2 = (((data[10] & 0x1F) as u16) << 8) | data[11] as u16;
            let map = if substream_2 != 0 {
                substream_2
            } else {
                substream_1
            };
            Some(TrueHdFrame {
                kind: TrueHdFrameKind::TrueHdSync,
                codec: Codec::TrueHd,
                size,
                sample_rate: decode_rate(rate_bits),
                channels: truehd_channels(map),
                samples_per_frame: 40 << (rate_bits & 0x07),
                bit_depth: None,
            })
        }
        MLP_SYNC => {
            let rate_bits = data[9] >> 4;
            Some(TrueHdFrame {
                kind: TrueHdFrameKind::MlpSync,
                codec: Codec::Mlp,
                size,
                sample_rate: decode_rate(rate_bits),
                channels: MLP_CHANNELS[(data[11] & 0x1F) as usize],
                samples_per_frame: 40 << (rate_bits & 0x07),
                bit_depth: mlp_bit_depth(data[8] >> 4),
            })
        }
        _ => None,
    }
}

/// Stateful frame classifier.
///
/// Continuation units are only recognised after a major sync has been seen,
/// since their header carries no signature of its own.
#[derive(Debug, Default)]
pub struct TrueHdParser {
    last_sync: Option<TrueHdFrame>,
    sync_frames: usize,
}

impl TrueHdParser {
    /// Create a parser that has not seen a major sync yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of major sync units classified so far.
    pub fn sync_frames(&self) -> usize {
        self.sync_frames
    }

    /// Parameters of the last major sync unit.
    pub fn last_sync(&self) -> Option<&TrueHdFrame> {
        self.last_sync.as_ref()
    }

    /// Classify the frame at the start of `data`.
    pub fn parse(&mut self, data: &[u8]) -> FrameParse {
        if data.len() < TRUEHD_HEADER_SIZE {
            return FrameParse::NeedMore;
        }

        if u16::from_be_bytes([data[0], data[1]]) == AC3_SYNC_WORD {
            if let Ok(header) = Ac3Header::parse(data) {
                return FrameParse::Frame(TrueHdFrame::from_ac3(&header));
            }
        }

        let size = ((((data[0] & 0x0F) as usize) << 8) | data[1] as usize) * 2;
        if size < MIN_FRAME_SIZE {
            return FrameParse::NoFrame;
        }

        if let Some(frame) = parse_major_sync(data, size) {
            self.sync_frames += 1;
            self.last_sync = Some(frame.clone());
            return FrameParse::Frame(frame);
        }

        match &self.last_sync {
            Some(sync) => FrameParse::Frame(TrueHdFrame {
                kind: TrueHdFrameKind::Continuation,
                size,
                ..sync.clone()
            }),
            None => FrameParse::NoFrame,
        }
    }

    /// Frame boundary decision for the reader: TrueHD/MLP units go to track
    /// 0, AC-3 frames to track 1.
    pub fn scan(&mut self, data: &[u8]) -> Scan {
        match self.parse(data) {
            FrameParse::Frame(frame) => Scan::Frame {
                len: frame.size,
                duration: frame.duration_ns(),
                track: if frame.kind == TrueHdFrameKind::Ac3 { 1 } else { 0 },
            },
            FrameParse::NeedMore => Scan::NeedMore,
            FrameParse::NoFrame => Scan::Skip(1),
        }
    }
}

/// What a window of stream data contains.
#[derive(Debug, Clone, Default)]
pub struct Survey {
    /// Offset of the first major sync unit.
    pub first_sync_offset: Option<usize>,
    /// The first major sync unit.
    pub first_sync: Option<TrueHdFrame>,
    /// The first interleaved AC-3 frame.
    pub first_ac3: Option<TrueHdFrame>,
    /// Number of major sync units.
    pub sync_frames: usize,
}

impl Survey {
    /// Whether the window holds a usable TrueHD/MLP stream.
    pub fn is_valid(&self) -> bool {
        self.sync_frames >= 2
    }
}

/// Classify every frame in `data` from scratch.
pub fn survey(data: &[u8]) -> Survey {
    let mut parser = TrueHdParser::new();
    let mut result = Survey::default();
    let mut pos = 0;

    while pos < data.len() {
        match parser.parse(&data[pos..]) {
            FrameParse::Frame(frame) => {
                if frame.is_sync() && result.first_sync.is_none() {
                    result.first_sync_offset = Some(pos);
                    result.first_sync = Some(frame.clone());
                }
                if frame.kind == TrueHdFrameKind::Ac3 && result.first_ac3.is_none() {
                    result.first_ac3 = Some(frame.clone());
                }
                pos += frame.size;
            }
            FrameParse::NeedMore => break,
            FrameParse::NoFrame => pos += 1,
        }
    }

    result.sync_frames = parser.sync_frames();
    result
}

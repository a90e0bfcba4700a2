//! Track descriptions exposed by readers.

use std::fmt;

/// Kind of elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackKind {
    /// Video stream.
    Video,
    /// Audio stream.
    Audio,
    /// Subtitle stream.
    Subtitle,
    /// Anything else.
    Unknown,
}

impl TrackKind {
    /// Sort class: video before audio before subtitles before the rest.
    pub fn sort_class(self) -> u32 {
        match self {
            TrackKind::Video => 0,
            TrackKind::Audio => 1,
            TrackKind::Subtitle => 2,
            TrackKind::Unknown => 3,
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
            TrackKind::Subtitle => "subtitles",
            TrackKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Codec carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Codec {
    /// MPEG-1 video.
    Mpeg1Video,
    /// MPEG-2 video.
    Mpeg2Video,
    /// MPEG-4 part 2 video.
    Mpeg4Video,
    /// H.264/AVC.
    Avc,
    /// VC-1.
    Vc1,
    /// MPEG-1 audio layer 1.
    Mp1,
    /// MPEG-1 audio layer 2.
    Mp2,
    /// MPEG-1 audio layer 3.
    Mp3,
    /// AAC.
    Aac,
    /// AC-3.
    Ac3,
    /// E-AC-3.
    Eac3,
    /// DTS.
    Dts,
    /// Dolby TrueHD.
    TrueHd,
    /// Meridian Lossless Packing.
    Mlp,
    /// PCM in private stream 1.
    Pcm,
    /// DVD LPCM.
    Lpcm,
    /// DVD subtitles.
    VobSub,
    /// Unrecognised.
    Unknown,
}

impl Codec {
    /// Human-readable codec name used in identification output.
    pub fn name(self) -> &'static str {
        match self {
            Codec::Mpeg1Video => "MPEG-1",
            Codec::Mpeg2Video => "MPEG-2",
            Codec::Mpeg4Video => "MPEG-4",
            Codec::Avc => "AVC/h.264",
            Codec::Vc1 => "VC1",
            Codec::Mp1 => "MPEG-1 layer 1",
            Codec::Mp2 => "MPEG-1 layer 2",
            Codec::Mp3 => "MPEG-1 layer 3",
            Codec::Aac => "AAC",
            Codec::Ac3 => "AC3",
            Codec::Eac3 => "EAC3",
            Codec::Dts => "DTS",
            Codec::TrueHd => "TrueHD",
            Codec::Mlp => "MLP",
            Codec::Pcm => "PCM",
            Codec::Lpcm => "LPCM",
            Codec::VobSub => "VobSub",
            Codec::Unknown => "unknown",
        }
    }

    /// The kind of track this codec implies.
    pub fn kind(self) -> TrackKind {
        match self {
            Codec::Mpeg1Video | Codec::Mpeg2Video | Codec::Mpeg4Video | Codec::Avc | Codec::Vc1 => {
                TrackKind::Video
            }
            Codec::VobSub => TrackKind::Subtitle,
            Codec::Unknown => TrackKind::Unknown,
            _ => TrackKind::Audio,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Video parameters discovered from the stream headers.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoParams {
    /// MPEG version (1 or 2) for MPEG video, 0 otherwise.
    pub version: u8,
    /// Coded width.
    pub width: u32,
    /// Coded height.
    pub height: u32,
    /// Display width.
    pub display_width: u32,
    /// Display height.
    pub display_height: u32,
    /// Frame rate in frames per second, if known.
    pub frame_rate: Option<f64>,
    /// Display aspect ratio, if signalled.
    pub aspect_ratio: Option<f64>,
}

/// Audio parameters discovered from the stream headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AudioParams {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u8,
    /// Bits per sample, when the format signals it.
    pub bit_depth: Option<u8>,
    /// Bitstream id (AC-3 family).
    pub bsid: Option<u8>,
}

/// Codec parameters of a track.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CodecParams {
    /// Video track parameters.
    Video(VideoParams),
    /// Audio track parameters.
    Audio(AudioParams),
    /// No parameters known.
    None,
}

/// Frozen description of a demultiplexed track.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackDescriptor {
    /// Track number (index in the reader's sorted track list).
    pub number: usize,
    /// Container-level id (private sub-streams are offset by 256).
    pub id: u16,
    /// Kind of stream.
    pub kind: TrackKind,
    /// Codec.
    pub codec: Codec,
    /// Offset of this track's first timestamp relative to the earliest track.
    pub timecode_offset: Option<i64>,
    /// Codec parameters.
    pub params: CodecParams,
    /// Codec private data (sequence headers, parameter sets).
    pub private_data: Option<Vec<u8>>,
}

impl TrackDescriptor {
    /// Create a descriptor with no parameters.
    pub fn new(number: usize, id: u16, codec: Codec) -> Self {
        Self {
            number,
            id,
            kind: codec.kind(),
            codec,
            timecode_offset: None,
            params: CodecParams::None,
            private_data: None,
        }
    }

    /// Video parameters, if this is a video track.
    pub fn video(&self) -> Option<&VideoParams> {
        match &self.params {
            CodecParams::Video(v) => Some(v),
            _ => None,
        }
    }

    /// Audio parameters, if this is an audio track.
    pub fn audio(&self) -> Option<&AudioParams> {
        match &self.params {
            CodecParams::Audio(a) => Some(a),
            _ => None,
        }
    }
}

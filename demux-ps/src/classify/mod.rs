//! Elementary stream classification.
//!
//! When discovery meets a new container id, [`probe_for`] picks a
//! [`StreamProbe`] from the id and the first payload. The registry then
//! feeds further payloads of the same id until the probe reports that the
//! headers are complete, and turns the outcome into a track.

pub mod audio;
pub mod avc;
pub mod mpeg_video;
pub mod vc1;

use byteorder::{BigEndian, ByteOrder};
use demux_core::{Codec, CodecParams};

use crate::pes::{PRIVATE_STREAM_1, VC1_STREAM};

pub use audio::{Ac3Probe, DtsProbe, MpegAudioHeader, MpegAudioProbe};
pub use avc::{AvcProbe, Sps};
pub use mpeg_video::{Mpeg12Probe, SequenceHeader};
pub use vc1::Vc1Probe;

/// What classification learned about a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    /// Codec.
    pub codec: Codec,
    /// Codec parameters.
    pub params: CodecParams,
    /// Codec private data.
    pub private_data: Option<Vec<u8>>,
    /// Coalescing buffer capacity. `None` disables coalescing.
    pub buffer_capacity: Option<usize>,
}

/// Outcome of a probe: the track, or why the stream cannot be used.
pub type ProbeResult = std::result::Result<TrackInfo, &'static str>;

/// Incremental header discovery for one elementary stream.
pub trait StreamProbe {
    /// Feed the next payload. Returns `true` once no more data is needed.
    fn push(&mut self, payload: &[u8]) -> bool;

    /// Produce the track description from everything pushed so far.
    fn finish(self: Box<Self>) -> ProbeResult;
}

/// Choose a probe for a new stream.
///
/// `key` is the lookup key (`256 + sub id` for private stream 1) and
/// `first` the first payload seen for it.
pub fn probe_for(key: u16, first: &[u8]) -> std::result::Result<Box<dyn StreamProbe>, &'static str> {
    if key > 0xFF {
        let sub_id = (key - 256) as u8;
        return match sub_id {
            0x20..=0x3F => Err("VobSub subtitles are not supported"),
            0x80..=0x87 | 0xC0..=0xC7 => Ok(Box::new(Ac3Probe::new())),
            0x88..=0x9F => Ok(Box::new(DtsProbe::new())),
            0xA0..=0xA7 => Err("PCM audio is not supported"),
            _ => Err("unknown private stream 1 sub-stream"),
        };
    }

    match key as u8 {
        0xC0..=0xDF => Ok(Box::new(MpegAudioProbe::new())),
        0xE0..=0xEF => {
            let Some(code) = first.get(..4) else {
                return Err("first video payload shorter than four bytes");
            };
            match BigEndian::read_u32(code) {
                0x0000_0001 => Ok(Box::new(AvcProbe::new())),
                0x0000_01B3 | 0x0000_01BA | 0x0000_01BB => Ok(Box::new(Mpeg12Probe::new())),
                _ => Err("video payload starts with neither a NAL unit nor a sequence header"),
            }
        }
        VC1_STREAM => Ok(Box::new(Vc1Probe::new())),
        PRIVATE_STREAM_1 => Err("private stream 1 packet without a sub-stream id"),
        _ => Err("stream id cannot carry an elementary stream"),
    }
}

/// Iterate over `00 00 01` start code positions in `data`, beginning at
/// `from`.
pub(crate) fn start_codes(data: &[u8], from: usize) -> impl Iterator<Item = usize> + '_ {
    let mut pos = from;
    std::iter::from_fn(move || {
        let rel = data.get(pos..)?.windows(3).position(|w| w == [0, 0, 1])?;
        let found = pos + rel;
        pos = found + 3;
        Some(found)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_codes() {
        let data = [0xFF, 0, 0, 1, 0xB3, 0, 0, 0, 1, 0xB5, 0, 0];
        let found: Vec<_> = start_codes(&data, 0).collect();
        assert_eq!(found, vec![1, 6]);
        assert_eq!(start_codes(&data, 2).collect::<Vec<_>>(), vec![6]);
    }

    #[test]
    fn test_probe_selection() {
        assert!(probe_for(0x180, &[]).is_ok());
        assert!(probe_for(0x1C2, &[]).is_ok());
        assert!(probe_for(0x189, &[]).is_ok());
        assert!(probe_for(0xC0, &[]).is_ok());
        assert!(probe_for(0xFD, &[]).is_ok());
        assert!(probe_for(0xE0, &[0, 0, 1, 0xB3]).is_ok());
        assert!(probe_for(0xE0, &[0, 0, 0, 1, 0x67]).is_ok());

        assert_eq!(
            probe_for(0x120, &[]).err(),
            Some("VobSub subtitles are not supported")
        );
        assert_eq!(probe_for(0x1A0, &[]).err(), Some("PCM audio is not supported"));
        assert!(probe_for(0xE0, &[0, 0, 1]).is_err());
        assert!(probe_for(0xE0, &[0x47, 0, 0, 0]).is_err());
        assert!(probe_for(0xBD, &[]).is_err());
    }
}

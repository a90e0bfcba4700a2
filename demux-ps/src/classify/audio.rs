//! Audio stream probes: MPEG audio, AC-3 and DTS.

use byteorder::{BigEndian, ByteOrder};
use demux_core::{AudioParams, Codec, CodecParams};
use tracing::debug;

use super::{ProbeResult, StreamProbe, TrackInfo};

/// MPEG audio sample rates for MPEG-1 (indexed by sampling_frequency).
const MPEG1_SAMPLE_RATES: [u32; 3] = [44100, 48000, 32000];

/// Fields of an MPEG audio frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpegAudioHeader {
    /// Layer (1, 2 or 3).
    pub layer: u8,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u8,
}

impl MpegAudioHeader {
    /// Decode the 32-bit header word.
    pub fn parse(word: u32) -> Option<Self> {
        if word & 0xFFE0_0000 != 0xFFE0_0000 {
            return None;
        }
        let version = (word >> 19) & 3;
        let layer_bits = (word >> 17) & 3;
        let bitrate_index = (word >> 12) & 0xF;
        let sampling = (word >> 10) & 3;
        let mode = (word >> 6) & 3;

        if version == 1 || layer_bits == 0 || bitrate_index == 0xF || sampling == 3 {
            return None;
        }

        let base = MPEG1_SAMPLE_RATES[sampling as usize];
        let sample_rate = match version {
            3 => base,
            2 => base / 2,
            _ => base / 4,
        };

        Some(Self {
            layer: 4 - layer_bits as u8,
            sample_rate,
            channels: if mode == 3 { 1 } else { 2 },
        })
    }

    /// Codec tag for this layer.
    pub fn codec(&self) -> Codec {
        match self.layer {
            1 => Codec::Mp1,
            2 => Codec::Mp2,
            _ => Codec::Mp3,
        }
    }

    /// Find the first valid header in `data`.
    pub fn find(data: &[u8]) -> Option<(usize, Self)> {
        data.windows(4).enumerate().find_map(|(pos, w)| {
            Self::parse(BigEndian::read_u32(w)).map(|h| (pos, h))
        })
    }
}

fn audio_params(
    sample_rate: u32,
    channels: u8,
    bit_depth: Option<u8>,
    bsid: Option<u8>,
) -> CodecParams {
    CodecParams::Audio(AudioParams {
        sample_rate,
        channels,
        bit_depth,
        bsid,
    })
}

fn audio_track(codec: Codec, params: CodecParams) -> TrackInfo {
    TrackInfo {
        codec,
        params,
        private_data: None,
        buffer_capacity: None,
    }
}

/// Probe for MPEG-1/2 audio. Decided by the first payload.
#[derive(Debug, Default)]
pub struct MpegAudioProbe {
    header: Option<MpegAudioHeader>,
}

impl MpegAudioProbe {
    /// Create an empty probe.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamProbe for MpegAudioProbe {
    fn push(&mut self, payload: &[u8]) -> bool {
        self.header = MpegAudioHeader::find(payload).map(|(_, h)| h);
        true
    }

    fn finish(self: Box<Self>) -> ProbeResult {
        let header = self.header.ok_or("no MPEG audio header in the first payload")?;
        Ok(audio_track(
            header.codec(),
            audio_params(header.sample_rate, header.channels, None, None),
        ))
    }
}

/// Probe for AC-3 and E-AC-3 in private stream 1. Decided by the first
/// payload.
#[derive(Debug, Default)]
pub struct Ac3Probe {
    header: Option<demux_ac3::Ac3Header>,
}

impl Ac3Probe {
    /// Create an empty probe.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamProbe for Ac3Probe {
    fn push(&mut self, payload: &[u8]) -> bool {
        self.header = demux_ac3::find_header(payload).map(|(_, h)| h);
        if let Some(h) = &self.header {
            debug!(
                bsid = h.bsid,
                channels = h.channels,
                sample_rate = h.sample_rate,
                bytes = h.frame_size,
                samples = h.samples,
                "first AC-3 header"
            );
        }
        true
    }

    fn finish(self: Box<Self>) -> ProbeResult {
        let header = self.header.ok_or("no AC-3 header in the first payload")?;
        Ok(audio_track(
            header.codec(),
            audio_params(header.sample_rate, header.channels, None, Some(header.bsid)),
        ))
    }
}

/// Probe for DTS in private stream 1.
///
/// Payloads accumulate until a core header is found.
#[derive(Debug, Default)]
pub struct DtsProbe {
    buffer: Vec<u8>,
    header: Option<demux_dts::DtsHeader>,
}

impl DtsProbe {
    /// Create an empty probe.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamProbe for DtsProbe {
    fn push(&mut self, payload: &[u8]) -> bool {
        if self.header.is_none() {
            self.buffer.extend_from_slice(payload);
            self.header = demux_dts::find_header(&self.buffer).map(|(_, h)| h);
        }
        self.header.is_some()
    }

    fn finish(self: Box<Self>) -> ProbeResult {
        let header = self.header.ok_or("no DTS header found")?;
        Ok(audio_track(
            Codec::Dts,
            audio_params(header.sample_rate, header.channels, header.bit_depth, None),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use demux_core::BitWriter;

    /// A 48 kHz 5.1 AC-3 sync frame with frmsizecod 28 (1536 bytes).
    pub(crate) fn ac3_frame() -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(0x0B77, 16);
        w.write_bits(0, 16); // crc1
        w.write_bits(0, 2); // 48 kHz
        w.write_bits(28, 6);
        w.write_bits(8, 5); // bsid
        w.write_bits(0, 3);
        w.write_bits(7, 3); // 3/2
        w.write_bits(0, 2); // cmixlev
        w.write_bits(0, 2); // surmixlev
        w.write_bit(true); // lfe
        w.align_to_byte();
        let mut frame = w.into_data();
        frame.resize(1536, 0);
        frame
    }

    /// A DTS core frame: 48 kHz, 5.1, 512 samples, `size` bytes.
    pub(crate) fn dts_frame(size: usize) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(0x7FFE_8001, 32);
        w.write_bit(true); // FTYPE
        w.write_bits(31, 5);
        w.write_bit(false); // CPF
        w.write_bits(15, 7); // NBLKS
        w.write_bits(size as u32 - 1, 14);
        w.write_bits(9, 6); // AMODE
        w.write_bits(13, 4); // 48 kHz
        w.write_bits(15, 5); // RATE
        w.write_bit(false);
        w.write_bits(0, 4); // DYNF TIMEF AUXF HDCD
        w.write_bits(0, 3); // EXT_AUDIO_ID
        w.write_bit(false); // EXT_AUDIO
        w.write_bit(false); // ASPF
        w.write_bits(2, 2); // LFF
        w.write_bit(false); // HFLAG
        w.write_bit(false); // FILTS
        w.write_bits(7, 4); // VERNUM
        w.write_bits(0, 2); // CHIST
        w.write_bits(5, 3); // PCMR
        w.align_to_byte();
        let mut frame = w.into_data();
        frame.resize(size, 0);
        frame
    }

    #[test]
    fn test_mpeg_audio_header() {
        // MPEG-1 layer 2, 192 kbps, 48 kHz, stereo
        let header = MpegAudioHeader::parse(0xFFFD_A404).unwrap();
        assert_eq!(header.layer, 2);
        assert_eq!(header.sample_rate, 48000);
        assert_eq!(header.channels, 2);
        assert_eq!(header.codec(), Codec::Mp2);

        // MPEG-2 layer 3, 24 kHz, mono
        let header = MpegAudioHeader::parse(0xFFF3_54C4).unwrap();
        assert_eq!(header.layer, 3);
        assert_eq!(header.sample_rate, 24000);
        assert_eq!(header.channels, 1);

        assert!(MpegAudioHeader::parse(0xFFEF_A404).is_none()); // reserved version
        assert!(MpegAudioHeader::parse(0xFFF9_A404).is_none()); // reserved layer
        assert!(MpegAudioHeader::parse(0xFFFD_F404).is_none()); // bad bitrate
        assert!(MpegAudioHeader::parse(0xFFFD_AC04).is_none()); // bad sample rate
    }

    #[test]
    fn test_mpeg_audio_probe() {
        let mut probe = Box::new(MpegAudioProbe::new());
        assert!(probe.push(&[0x00, 0x12, 0xFF, 0xFD, 0xA4, 0x04, 0x00]));
        let info = probe.finish().unwrap();
        assert_eq!(info.codec, Codec::Mp2);
        assert_eq!(info.buffer_capacity, None);

        let mut probe = Box::new(MpegAudioProbe::new());
        probe.push(&[0x00; 16]);
        assert!(probe.finish().is_err());
    }

    #[test]
    fn test_ac3_probe() {
        let mut payload = vec![0xAA, 0xBB];
        payload.extend(ac3_frame());
        let mut probe = Box::new(Ac3Probe::new());
        assert!(probe.push(&payload));

        let info = probe.finish().unwrap();
        assert_eq!(info.codec, Codec::Ac3);
        assert_eq!(info.params, audio_params(48000, 6, None, Some(8)));
    }

    #[test]
    fn test_dts_probe_accumulates() {
        let frame = dts_frame(1024);
        let mut probe = Box::new(DtsProbe::new());
        assert!(!probe.push(&frame[..10]));
        assert!(probe.push(&frame[10..]));

        let info = probe.finish().unwrap();
        assert_eq!(info.codec, Codec::Dts);
        let CodecParams::Audio(audio) = info.params else {
            panic!("expected audio params");
        };
        assert_eq!(audio.sample_rate, 48000);
        assert_eq!(audio.channels, 6);
        assert_eq!(audio.bit_depth, Some(24));
    }
}

//! MPEG-1/2 video sequence headers.

use demux_core::bitstream::BitReader;
use demux_core::{Codec, CodecParams, VideoParams};

use super::{start_codes, ProbeResult, StreamProbe, TrackInfo};

/// Coalescing capacity for MPEG-1/2 video tracks.
pub const MPEG12_BUFFER_CAPACITY: usize = 128_000;

const PICTURE_START: u8 = 0x00;
const SEQUENCE_HEADER: u8 = 0xB3;
const EXTENSION_START: u8 = 0xB5;
const SEQUENCE_EXTENSION_ID: u32 = 1;

/// Frame rates indexed by frame_rate_code.
const FRAME_RATES: [f64; 9] = [
    0.0,
    24000.0 / 1001.0,
    24.0,
    25.0,
    30000.0 / 1001.0,
    30.0,
    50.0,
    60000.0 / 1001.0,
    60.0,
];

/// MPEG-1 pel aspect ratios (pel height / pel width).
const MPEG1_PEL_ASPECT: [f64; 15] = [
    0.0, 1.0, 0.6735, 0.7031, 0.7615, 0.8055, 0.8437, 0.8935, 0.9157, 0.9815, 1.0255, 1.0695,
    1.0950, 1.1575, 1.2015,
];

/// Fields of a sequence header and its sequence extension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceHeader {
    /// Horizontal size.
    pub width: u32,
    /// Vertical size.
    pub height: u32,
    /// aspect_ratio_information.
    pub aspect_code: u8,
    /// frame_rate_code.
    pub frame_rate_code: u8,
    /// MPEG version, 2 once a sequence extension was seen.
    pub version: u8,
    frame_rate_ext: (u32, u32),
}

impl SequenceHeader {
    /// Parse the bytes following a `00 00 01 B3` start code.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut r = BitReader::new(data);
        let width = r.read_bits(12).ok()?;
        let height = r.read_bits(12).ok()?;
        let aspect_code = r.read_bits(4).ok()? as u8;
        let frame_rate_code = r.read_bits(4).ok()? as u8;

        if width == 0 || height == 0 || aspect_code == 0 {
            return None;
        }

        Some(Self {
            width,
            height,
            aspect_code,
            frame_rate_code,
            version: 1,
            frame_rate_ext: (0, 0),
        })
    }

    /// Apply a sequence extension (bytes after `00 00 01 B5`).
    pub fn apply_extension(&mut self, data: &[u8]) -> bool {
        let mut r = BitReader::new(data);
        let parsed = (|| -> demux_core::Result<bool> {
            if r.read_bits(4)? != SEQUENCE_EXTENSION_ID {
                return Ok(false);
            }
            r.skip(8 + 1 + 2)?; // profile_and_level, progressive, chroma_format
            let h_ext = r.read_bits(2)?;
            let v_ext = r.read_bits(2)?;
            r.skip(12 + 1 + 8 + 1)?; // bit rate ext, marker, vbv ext, low_delay
            let n = r.read_bits(2)?;
            let d = r.read_bits(5)?;

            self.width |= h_ext << 12;
            self.height |= v_ext << 12;
            self.frame_rate_ext = (n, d);
            self.version = 2;
            Ok(true)
        })();
        parsed.unwrap_or(false)
    }

    /// Frames per second, if the code is valid.
    pub fn frame_rate(&self) -> Option<f64> {
        let base = *FRAME_RATES.get(self.frame_rate_code as usize)?;
        if base == 0.0 {
            return None;
        }
        let (n, d) = self.frame_rate_ext;
        Some(base * (n + 1) as f64 / (d + 1) as f64)
    }

    /// Display aspect ratio.
    ///
    /// MPEG-2 codes name the display ratio directly; MPEG-1 codes give the
    /// pel shape. Square pels report `None`.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.version == 2 {
            match self.aspect_code {
                2 => Some(4.0 / 3.0),
                3 => Some(16.0 / 9.0),
                4 => Some(2.21),
                _ => None,
            }
        } else {
            let pel = *MPEG1_PEL_ASPECT.get(self.aspect_code as usize)?;
            if pel == 0.0 || pel == 1.0 {
                return None;
            }
            Some(self.width as f64 / (self.height as f64 * pel))
        }
    }

    /// Display dimensions derived from the aspect ratio.
    pub fn display_dimensions(&self) -> (u32, u32) {
        match self.aspect_ratio() {
            Some(aspect) if aspect > 0.0 && aspect != 1.0 => {
                ((self.height as f64 * aspect) as u32, self.height)
            }
            _ => (self.width, self.height),
        }
    }
}

/// Probe for MPEG-1/2 video.
///
/// Complete once a picture start code follows a sequence header. The raw
/// sequence header and its extensions become the codec private data.
#[derive(Debug, Default)]
pub struct Mpeg12Probe {
    buffer: Vec<u8>,
    cursor: usize,
    header: Option<SequenceHeader>,
    private_data: Vec<u8>,
    collecting: bool,
    complete: bool,
}

impl Mpeg12Probe {
    /// Create an empty probe.
    pub fn new() -> Self {
        Self::default()
    }

    fn handle_unit(&mut self, start: usize, end: usize) {
        let code = self.buffer[start + 3];
        let unit = &self.buffer[start..end];
        match code {
            SEQUENCE_HEADER => {
                self.header = SequenceHeader::parse(&unit[4..]);
                self.private_data = unit.to_vec();
                self.collecting = self.header.is_some();
            }
            EXTENSION_START if self.collecting => {
                if let Some(header) = self.header.as_mut() {
                    header.apply_extension(&unit[4..]);
                }
                self.private_data.extend_from_slice(unit);
            }
            _ => self.collecting = false,
        }
    }
}

impl StreamProbe for Mpeg12Probe {
    fn push(&mut self, payload: &[u8]) -> bool {
        if self.complete {
            return true;
        }
        self.buffer.extend_from_slice(payload);

        loop {
            let Some(start) = start_codes(&self.buffer, self.cursor).next() else {
                break;
            };
            let Some(&code) = self.buffer.get(start + 3) else {
                self.cursor = start;
                break;
            };
            if code == PICTURE_START && self.header.is_some() {
                self.complete = true;
                break;
            }
            let Some(end) = start_codes(&self.buffer, start + 4).next() else {
                self.cursor = start;
                break;
            };
            self.handle_unit(start, end);
            self.cursor = end;
        }
        self.complete
    }

    fn finish(self: Box<Self>) -> ProbeResult {
        let header = match self.header {
            Some(header) if self.complete => header,
            _ => return Err("no sequence header followed by a picture"),
        };

        let (display_width, display_height) = header.display_dimensions();
        let codec = if header.version == 2 {
            Codec::Mpeg2Video
        } else {
            Codec::Mpeg1Video
        };

        Ok(TrackInfo {
            codec,
            params: CodecParams::Video(VideoParams {
                version: header.version,
                width: header.width,
                height: header.height,
                display_width,
                display_height,
                frame_rate: header.frame_rate(),
                aspect_ratio: header.aspect_ratio(),
            }),
            private_data: Some(self.private_data),
            buffer_capacity: Some(MPEG12_BUFFER_CAPACITY),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use demux_core::BitWriter;

    pub(crate) fn sequence_header(width: u32, height: u32, aspect: u8, rate: u8) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(0x0000_01B3, 32);
        w.write_bits(width, 12);
        w.write_bits(height, 12);
        w.write_bits(aspect as u32, 4);
        w.write_bits(rate as u32, 4);
        w.write_bits(0x3FFFF, 18); // bit rate
        w.write_bit(true);
        w.write_bits(112, 10); // vbv
        w.write_bit(false); // constrained
        w.write_bit(false); // intra matrix
        w.write_bit(false); // non-intra matrix
        w.into_data()
    }

    pub(crate) fn sequence_extension() -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(0x0000_01B5, 32);
        w.write_bits(SEQUENCE_EXTENSION_ID, 4);
        w.write_bits(0x48, 8); // main profile, main level
        w.write_bit(false); // progressive
        w.write_bits(1, 2); // 4:2:0
        w.write_bits(0, 2);
        w.write_bits(0, 2);
        w.write_bits(0, 12);
        w.write_bit(true);
        w.write_bits(0, 8);
        w.write_bit(false);
        w.write_bits(0, 2);
        w.write_bits(0, 5);
        w.into_data()
    }

    pub(crate) fn gop_and_picture() -> Vec<u8> {
        vec![
            0x00, 0x00, 0x01, 0xB8, 0x00, 0x08, 0x00, 0x00, // GOP
            0x00, 0x00, 0x01, 0x00, 0x00, 0x0F, 0xFF, 0xF8, // picture
        ]
    }

    #[test]
    fn test_mpeg2_sequence() {
        let mut es = sequence_header(720, 576, 2, 3);
        let seq_len = es.len();
        es.extend(sequence_extension());
        let private_len = es.len();
        es.extend(gop_and_picture());

        let mut probe = Box::new(Mpeg12Probe::new());
        assert!(probe.push(&es));
        let info = probe.finish().unwrap();

        assert_eq!(info.codec, Codec::Mpeg2Video);
        assert_eq!(info.buffer_capacity, Some(128_000));
        assert_eq!(info.private_data.as_ref().map(Vec::len), Some(private_len));
        assert!(private_len > seq_len);

        let CodecParams::Video(video) = info.params else {
            panic!("expected video params");
        };
        assert_eq!(video.version, 2);
        assert_eq!((video.width, video.height), (720, 576));
        assert_eq!((video.display_width, video.display_height), (768, 576));
        assert_eq!(video.frame_rate, Some(25.0));
    }

    #[test]
    fn test_split_across_payloads() {
        let mut es = sequence_header(352, 288, 1, 3);
        es.extend(gop_and_picture());

        let mut probe = Box::new(Mpeg12Probe::new());
        for chunk in es.chunks(5) {
            if probe.push(chunk) {
                break;
            }
        }
        let info = probe.finish().unwrap();
        assert_eq!(info.codec, Codec::Mpeg1Video);
        let video = match info.params {
            CodecParams::Video(v) => v,
            _ => panic!("expected video params"),
        };
        assert_eq!(video.version, 1);
        assert_eq!(video.display_width, 352);
        assert_eq!(video.aspect_ratio, None);
    }

    #[test]
    fn test_incomplete_without_picture() {
        let mut probe = Box::new(Mpeg12Probe::new());
        assert!(!probe.push(&sequence_header(720, 480, 3, 4)));
        assert!(probe.finish().is_err());
    }

    #[test]
    fn test_frame_rate_table() {
        let mut header = SequenceHeader::parse(&sequence_header(720, 480, 2, 4)[4..]).unwrap();
        let fps = header.frame_rate().unwrap();
        assert!((fps - 29.97).abs() < 0.01);
        header.frame_rate_code = 0;
        assert_eq!(header.frame_rate(), None);
        header.frame_rate_code = 12;
        assert_eq!(header.frame_rate(), None);
    }

    #[test]
    fn test_invalid_header() {
        assert!(SequenceHeader::parse(&[0x00, 0x00, 0x00, 0x23]).is_none());
        assert!(SequenceHeader::parse(&[0x2D]).is_none());
    }
}

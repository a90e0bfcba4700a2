//! VC-1 advanced profile sequence headers.

use demux_core::bitstream::BitReader;
use demux_core::{Codec, CodecParams, VideoParams};

use super::{start_codes, ProbeResult, StreamProbe, TrackInfo};

/// Coalescing capacity for VC-1 tracks.
pub const VC1_BUFFER_CAPACITY: usize = 512_000;

const SEQUENCE_HEADER: u8 = 0x0F;
const ADVANCED_PROFILE: u32 = 3;

/// Probe for VC-1 streams.
///
/// Complete once an advanced profile sequence header (`00 00 01 0F`) is
/// bounded by the next start code.
#[derive(Debug, Default)]
pub struct Vc1Probe {
    buffer: Vec<u8>,
    cursor: usize,
    header: Option<(u32, u32, Vec<u8>)>,
}

impl Vc1Probe {
    /// Create an empty probe.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Read max coded width and height from a sequence header body.
fn coded_size(body: &[u8]) -> Option<(u32, u32)> {
    let mut r = BitReader::new(body);
    if r.read_bits(2).ok()? != ADVANCED_PROFILE {
        return None;
    }
    // level, colordiff_format, frmrtq_postproc, bitrtq_postproc, postprocflag
    r.skip(3 + 2 + 3 + 5 + 1).ok()?;
    let width = (r.read_bits(12).ok()? + 1) * 2;
    let height = (r.read_bits(12).ok()? + 1) * 2;
    Some((width, height))
}

impl StreamProbe for Vc1Probe {
    fn push(&mut self, payload: &[u8]) -> bool {
        if self.header.is_some() {
            return true;
        }
        self.buffer.extend_from_slice(payload);

        loop {
            let next = start_codes(&self.buffer, self.cursor).next();
            let Some(start) = next else {
                break;
            };
            let next = start_codes(&self.buffer, start + 3).next();
            let Some(end) = next else {
                self.cursor = start;
                break;
            };
            self.cursor = end;

            let unit = &self.buffer[start..end];
            if unit.get(3) == Some(&SEQUENCE_HEADER) {
                if let Some((width, height)) = coded_size(&unit[4..]) {
                    self.header = Some((width, height, unit.to_vec()));
                    break;
                }
            }
        }
        self.header.is_some()
    }

    fn finish(self: Box<Self>) -> ProbeResult {
        let (width, height, raw) = self
            .header
            .ok_or("no advanced profile sequence header found")?;

        Ok(TrackInfo {
            codec: Codec::Vc1,
            params: CodecParams::Video(VideoParams {
                version: 0,
                width,
                height,
                display_width: width,
                display_height: height,
                frame_rate: None,
                aspect_ratio: None,
            }),
            private_data: Some(raw),
            buffer_capacity: Some(VC1_BUFFER_CAPACITY),
        })
    }
}

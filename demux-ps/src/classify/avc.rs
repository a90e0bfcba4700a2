//! H.264/AVC parameter sets in Annex B byte streams.

use demux_core::bitstream::{remove_emulation_prevention, BitReader};
use demux_core::{Codec, CodecParams, Result, VideoParams};

use super::{start_codes, ProbeResult, StreamProbe, TrackInfo};

/// Coalescing capacity for AVC tracks.
pub const AVC_BUFFER_CAPACITY: usize = 256_000;

const NAL_SPS: u8 = 7;
const NAL_PPS: u8 = 8;

/// Sample aspect ratios indexed by aspect_ratio_idc.
const SAR_TABLE: [(u32, u32); 17] = [
    (0, 0),
    (1, 1),
    (12, 11),
    (10, 11),
    (16, 11),
    (40, 33),
    (24, 11),
    (20, 11),
    (32, 11),
    (80, 33),
    (18, 11),
    (15, 11),
    (64, 33),
    (160, 99),
    (4, 3),
    (3, 2),
    (2, 1),
];
const EXTENDED_SAR: u32 = 255;

/// The sequence parameter set fields needed to describe a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sps {
    /// profile_idc.
    pub profile_idc: u8,
    /// Constraint set flags.
    pub constraint_flags: u8,
    /// level_idc.
    pub level_idc: u8,
    /// Cropped width in pixels.
    pub width: u32,
    /// Cropped height in pixels.
    pub height: u32,
    /// Sample aspect ratio from the VUI.
    pub sar: Option<(u32, u32)>,
    /// VUI timing (num_units_in_tick, time_scale).
    pub timing: Option<(u32, u32)>,
}

fn has_chroma_info(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}

fn skip_scaling_list(r: &mut BitReader<'_>, size: usize) -> Result<()> {
    let mut last = 8i32;
    let mut next = 8i32;
    for _ in 0..size {
        if next != 0 {
            let delta = r.read_se()?;
            next = (last + delta + 256) % 256;
        }
        if next != 0 {
            last = next;
        }
    }
    Ok(())
}

impl Sps {
    /// Parse an SPS from its RBSP (NAL header byte removed, emulation
    /// prevention bytes stripped).
    pub fn parse(rbsp: &[u8]) -> Result<Self> {
        let mut r = BitReader::new(rbsp);
        let profile_idc = r.read_bits(8)? as u8;
        let constraint_flags = r.read_bits(8)? as u8;
        let level_idc = r.read_bits(8)? as u8;
        let _sps_id = r.read_ue()?;

        let mut chroma_format_idc = 1;
        if has_chroma_info(profile_idc) {
            chroma_format_idc = r.read_ue()?;
            if chroma_format_idc == 3 {
                r.skip(1)?; // separate_colour_plane_flag
            }
            r.read_ue()?; // bit_depth_luma_minus8
            r.read_ue()?; // bit_depth_chroma_minus8
            r.skip(1)?; // qpprime_y_zero_transform_bypass_flag
            if r.read_flag()? {
                let lists = if chroma_format_idc == 3 { 12 } else { 8 };
                for i in 0..lists {
                    if r.read_flag()? {
                        skip_scaling_list(&mut r, if i < 6 { 16 } else { 64 })?;
                    }
                }
            }
        }

        r.read_ue()?; // log2_max_frame_num_minus4
        match r.read_ue()? {
            0 => {
                r.read_ue()?; // log2_max_pic_order_cnt_lsb_minus4
            }
            1 => {
                r.skip(1)?;
                r.read_se()?;
                r.read_se()?;
                let cycle = r.read_ue()?;
                if cycle > 255 {
                    return Err(demux_core::Error::header(
                        "num_ref_frames_in_pic_order_cnt_cycle out of range",
                    ));
                }
                for _ in 0..cycle {
                    r.read_se()?;
                }
            }
            _ => {}
        }

        r.read_ue()?; // max_num_ref_frames
        r.skip(1)?; // gaps_in_frame_num_value_allowed_flag
        let width_mbs = r.read_ue()?.saturating_add(1);
        let height_map_units = r.read_ue()?.saturating_add(1);
        let frame_mbs_only = r.read_flag()?;
        if !frame_mbs_only {
            r.skip(1)?; // mb_adaptive_frame_field_flag
        }
        r.skip(1)?; // direct_8x8_inference_flag

        let mut width = width_mbs.saturating_mul(16);
        let mut height = height_map_units
            .saturating_mul(16)
            .saturating_mul(if frame_mbs_only { 1 } else { 2 });

        if r.read_flag()? {
            let left = r.read_ue()?;
            let right = r.read_ue()?;
            let top = r.read_ue()?;
            let bottom = r.read_ue()?;
            let crop_x = if chroma_format_idc == 0 { 1 } else { 2 };
            let crop_y = (if chroma_format_idc == 0 { 1 } else { 2 })
                * (if frame_mbs_only { 1 } else { 2 });
            width = width.saturating_sub(crop_x * left.saturating_add(right));
            height = height.saturating_sub(crop_y * top.saturating_add(bottom));
        }

        let mut sps = Self {
            profile_idc,
            constraint_flags,
            level_idc,
            width,
            height,
            sar: None,
            timing: None,
        };

        if r.read_flag()? {
            sps.parse_vui(&mut r)?;
        }
        Ok(sps)
    }

    fn parse_vui(&mut self, r: &mut BitReader<'_>) -> Result<()> {
        if r.read_flag()? {
            let idc = r.read_bits(8)?;
            let sar = if idc == EXTENDED_SAR {
                (r.read_bits(16)?, r.read_bits(16)?)
            } else {
                SAR_TABLE.get(idc as usize).copied().unwrap_or((0, 0))
            };
            if sar.0 != 0 && sar.1 != 0 {
                self.sar = Some(sar);
            }
        }

        if r.read_flag()? {
            r.skip(1)?; // overscan_appropriate_flag
        }
        if r.read_flag()? {
            r.skip(4)?; // video_format, video_full_range_flag
            if r.read_flag()? {
                r.skip(24)?; // colour description
            }
        }
        if r.read_flag()? {
            r.read_ue()?;
            r.read_ue()?;
        }
        if r.read_flag()? {
            let num_units_in_tick = r.read_bits(32)?;
            let time_scale = r.read_bits(32)?;
            if num_units_in_tick != 0 && time_scale != 0 {
                self.timing = Some((num_units_in_tick, time_scale));
            }
        }
        Ok(())
    }

    /// Frames per second from the VUI timing information.
    pub fn frame_rate(&self) -> Option<f64> {
        self.timing
            .map(|(tick, scale)| scale as f64 / (2.0 * tick as f64))
    }

    /// Display aspect ratio and display dimensions.
    ///
    /// Without a sample aspect ratio the coded size is the display size.
    pub fn display(&self) -> (Option<f64>, u32, u32) {
        let (Some((num, den)), true) = (self.sar, self.width > 0 && self.height > 0) else {
            return (None, self.width, self.height);
        };
        let coded = self.width as f64 / self.height as f64;
        let aspect = coded * num as f64 / den as f64;
        if aspect > coded {
            (Some(aspect), (self.height as f64 * aspect).round() as u32, self.height)
        } else {
            (Some(aspect), self.width, (self.width as f64 / aspect).round() as u32)
        }
    }
}

/// Build an `avcC` decoder configuration record.
pub fn avc_decoder_config(sps: &[Vec<u8>], pps: &[Vec<u8>]) -> Vec<u8> {
    let first = sps.first().map(Vec::as_slice).unwrap_or(&[]);
    let byte = |i: usize| first.get(i).copied().unwrap_or(0);

    let mut record = vec![1, byte(1), byte(2), byte(3), 0xFF, 0xE0 | (sps.len() as u8 & 0x1F)];
    for nal in sps {
        record.extend((nal.len() as u16).to_be_bytes());
        record.extend(nal);
    }
    record.push(pps.len() as u8);
    for nal in pps {
        record.extend((nal.len() as u16).to_be_bytes());
        record.extend(nal);
    }
    record
}

/// Probe for AVC elementary streams.
///
/// Complete once a sequence parameter set and a picture parameter set have
/// been seen. The codec private data is an `avcC` record.
#[derive(Debug, Default)]
pub struct AvcProbe {
    buffer: Vec<u8>,
    cursor: usize,
    sps: Vec<Vec<u8>>,
    pps: Vec<Vec<u8>>,
}

impl AvcProbe {
    /// Create an empty probe.
    pub fn new() -> Self {
        Self::default()
    }

    fn headers_parsed(&self) -> bool {
        !self.sps.is_empty() && !self.pps.is_empty()
    }

    fn handle_nal(&mut self, start: usize, end: usize) {
        let mut nal = &self.buffer[start + 3..end];
        // Trailing zero of a four-byte start code
        while let [rest @ .., 0] = nal {
            nal = rest;
        }
        let Some(&header) = nal.first() else {
            return;
        };
        match header & 0x1F {
            NAL_SPS if self.sps.is_empty() => self.sps.push(nal.to_vec()),
            NAL_PPS if self.pps.is_empty() => self.pps.push(nal.to_vec()),
            _ => {}
        }
    }
}

impl StreamProbe for AvcProbe {
    fn push(&mut self, payload: &[u8]) -> bool {
        if self.headers_parsed() {
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
            self.handle_nal(start, end);
            self.cursor = end;
            if self.headers_parsed() {
                break;
            }
        }
        self.headers_parsed()
    }

    fn finish(self: Box<Self>) -> ProbeResult {
        if !self.headers_parsed() {
            return Err("no sequence and picture parameter sets found");
        }
        let rbsp = remove_emulation_prevention(&self.sps[0][1..]);
        let sps = Sps::parse(&rbsp).map_err(|_| "invalid sequence parameter set")?;
        let (aspect_ratio, display_width, display_height) = sps.display();

        Ok(TrackInfo {
            codec: Codec::Avc,
            params: CodecParams::Video(VideoParams {
                version: 0,
                width: sps.width,
                height: sps.height,
                display_width,
                display_height,
                frame_rate: sps.frame_rate(),
                aspect_ratio,
            }),
            private_data: Some(avc_decoder_config(&self.sps, &self.pps)),
            buffer_capacity: Some(AVC_BUFFER_CAPACITY),
        })
    }
}

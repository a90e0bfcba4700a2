//! PES packet header parsing for program streams.
//!
//! Both the MPEG-1 header form (stuffing, optional STD buffer field, `0010`
//! or `0011` timestamp prefix, or `0x0F`) and the MPEG-2 form (`10` marker,
//! flags and header data length) are accepted. After a successful parse the
//! source sits on the first payload byte.

use std::io;

use demux_core::timestamp::mpeg_ticks_to_ns;
use demux_core::ByteSource;

use crate::error::{PsError, Result};

/// Private stream 1: DVD audio, carries a sub-stream id byte.
pub const PRIVATE_STREAM_1: u8 = 0xBD;
/// Padding stream.
pub const PADDING_STREAM: u8 = 0xBE;
/// Private stream 2: DVD navigation packets.
pub const PRIVATE_STREAM_2: u8 = 0xBF;
/// SMPTE VC-1 (extended stream id).
pub const VC1_STREAM: u8 = 0xFD;

/// Stream id classification helpers.
pub struct StreamId;

impl StreamId {
    /// MPEG audio stream ids (0xC0 - 0xDF).
    pub fn is_audio(id: u8) -> bool {
        (0xC0..=0xDF).contains(&id)
    }

    /// MPEG video stream ids (0xE0 - 0xEF).
    pub fn is_video(id: u8) -> bool {
        (0xE0..=0xEF).contains(&id)
    }

    /// Whether packets with this id can be parsed for payload.
    pub fn is_parseable(id: u8) -> bool {
        !(id < 0xBC || (id >= 0xF0 && id != VC1_STREAM) || id == PADDING_STREAM || id == PRIVATE_STREAM_2)
    }

    /// Whether the id can start a new track.
    pub fn is_demuxable(id: u8) -> bool {
        (0xC0..=0xEF).contains(&id) || id == PRIVATE_STREAM_1 || id == VC1_STREAM
    }

    /// Key used for track lookups: `256 + sub id` for private stream 1,
    /// the plain id otherwise.
    pub fn key(id: u8, sub_id: Option<u8>) -> u16 {
        match sub_id {
            Some(sub) if id == PRIVATE_STREAM_1 => 256 + sub as u16,
            _ => id as u16,
        }
    }
}

/// Header fields of a PES packet whose payload is ready to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PesPacket {
    /// Container stream id.
    pub stream_id: u8,
    /// Private stream 1 sub-stream id.
    pub sub_id: Option<u8>,
    /// Presentation timestamp in nanoseconds.
    pub pts: Option<i64>,
    /// Payload bytes following the header.
    pub payload_len: usize,
    /// Value of the PES packet length field.
    pub full_length: usize,
}

impl PesPacket {
    /// Lookup key for this packet's track.
    pub fn key(&self) -> u16 {
        StreamId::key(self.stream_id, self.sub_id)
    }
}

/// Outcome of [`parse_packet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedPes {
    /// The payload follows.
    Payload(PesPacket),
    /// The packet carries nothing to demultiplex. The caller skips it by
    /// its length field.
    Rejected {
        /// Value of the PES packet length field.
        full_length: usize,
    },
}

/// Decode a 33-bit timestamp whose first byte `c` was already read.
///
/// Returns `None` when a marker bit is missing.
pub fn read_timestamp<S: ByteSource + ?Sized>(source: &mut S, c: u8) -> io::Result<Option<i64>> {
    let d = source.read_u16_be()?;
    let e = source.read_u16_be()?;

    if c & 1 != 1 || d & 1 != 1 || e & 1 != 1 {
        return Ok(None);
    }

    let ticks = (((c as u64 >> 1) & 7) << 30) | ((d as u64 >> 1) << 15) | (e as u64 >> 1);
    Ok(Some(mpeg_ticks_to_ns(ticks)))
}

/// Parse the PES header following a `00 00 01 <id>` start code.
///
/// `offset` is the position of the start code and is only used in errors.
/// Scrambled MPEG-2 payloads are fatal.
pub fn parse_packet<S: ByteSource + ?Sized>(source: &mut S, id: u8, offset: u64) -> Result<ParsedPes> {
    let full_length = source.read_u16_be()? as usize;
    let rejected = ParsedPes::Rejected { full_length };

    if !StreamId::is_parseable(id) || full_length == 0 {
        return Ok(rejected);
    }

    let mut length = full_length as i64;
    let mut pts = None;
    let mut sub_id = None;

    let mut c = 0u8;
    while length > 0 {
        c = source.read_byte()?;
        length -= 1;
        if c != 0xFF {
            break;
        }
    }

    // STD buffer size
    if c & 0xC0 == 0x40 {
        if length < 2 {
            return Ok(rejected);
        }
        length -= 2;
        source.skip(1)?;
        c = source.read_byte()?;
    }

    if c & 0xF0 == 0x20 {
        pts = read_timestamp(source, c)?;
        if pts.is_none() {
            return Ok(rejected);
        }
        length -= 4;
    } else if c & 0xF0 == 0x30 {
        pts = read_timestamp(source, c)?;
        if pts.is_none() {
            return Ok(rejected);
        }
        source.skip(5)?; // DTS
        length -= 4 + 5;
    } else if c & 0xC0 == 0x80 {
        if c & 0x30 != 0 {
            return Err(PsError::Scrambled { offset });
        }

        let pts_flags = source.read_byte()? >> 6;
        let mut header_len = source.read_byte()? as i64;
        length -= 2;

        if header_len > length {
            return Ok(rejected);
        }

        if pts_flags & 0x02 != 0 {
            if header_len < 5 {
                return Ok(rejected);
            }
            let c = source.read_byte()?;
            pts = read_timestamp(source, c)?;
            if pts.is_none() {
                return Ok(rejected);
            }
            length -= 5;
            header_len -= 5;
        }

        if pts_flags & 0x01 != 0 {
            if header_len < 5 {
                return Ok(rejected);
            }
            source.skip(5)?; // DTS
            length -= 5;
            header_len -= 5;
        }

        if header_len > 0 {
            length -= header_len;
            source.skip(header_len)?;
        }

        if id == PRIVATE_STREAM_1 {
            if length < 4 {
                return Ok(rejected);
            }
            let aid = source.read_byte()?;
            length -= 1;

            if aid & 0xE0 == 0x20 {
                // subpictures
                return Ok(rejected);
            }

            if (0x80..=0x8F).contains(&aid)
                || (0x98..=0xAF).contains(&aid)
                || (0xC0..=0xCF).contains(&aid)
            {
                source.skip(3)?; // frame count, first access unit
                length -= 3;

                if aid & 0xE0 == 0xA0 && length >= 3 {
                    source.skip(3)?; // LPCM header
                    length -= 3;
                }
            }
            sub_id = Some(aid);
        }
    } else if c != 0x0F {
        return Ok(rejected);
    }

    if length <= 0 {
        return Ok(rejected);
    }

    Ok(ParsedPes::Payload(PesPacket {
        stream_id: id,
        sub_id,
        pts,
        payload_len: length as usize,
        full_length,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn timestamp_bytes(prefix: u8, ticks: u64) -> [u8; 5] {
        [
            prefix | ((((ticks >> 30) & 7) as u8) << 1) | 1,
            (ticks >> 22) as u8,
            ((((ticks >> 15) & 0x7F) as u8) << 1) | 1,
            (ticks >> 7) as u8,
            (((ticks & 0x7F) as u8) << 1) | 1,
        ]
    }

    /// Body of a PES packet after the start code: length + MPEG-2 header.
    fn mpeg2_packet(pts: Option<u64>, extra: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut header = vec![0x81, 0x00, 0x00];
        if let Some(ticks) = pts {
            header[1] = 0x80;
            header[2] = 5;
            header.extend(timestamp_bytes(0x20, ticks));
        }
        let mut body = header;
        body.extend_from_slice(extra);
        body.extend_from_slice(payload);

        let mut packet = (body.len() as u16).to_be_bytes().to_vec();
        packet.extend(body);
        packet
    }

    fn parse(id: u8, bytes: Vec<u8>) -> (Result<ParsedPes>, u64) {
        let mut src = Cursor::new(bytes);
        let result = parse_packet(&mut src, id, 0);
        (result, src.tell().unwrap())
    }

    #[test]
    fn test_mpeg2_video_packet() {
        let (result, pos) = parse(0xE0, mpeg2_packet(Some(90_000), &[], &[1, 2, 3, 4]));
        let ParsedPes::Payload(packet) = result.unwrap() else {
            panic!("expected a payload");
        };
        assert_eq!(packet.pts, Some(1_000_000_000));
        assert_eq!(packet.payload_len, 4);
        assert_eq!(packet.sub_id, None);
        assert_eq!(pos, 2 + 8);
    }

    #[test]
    fn test_private_stream_ac3() {
        let bytes = mpeg2_packet(Some(3600), &[0x80, 0x01, 0x00, 0x01], &[0x0B, 0x77, 0, 0]);
        let (result, pos) = parse(PRIVATE_STREAM_1, bytes);
        let ParsedPes::Payload(packet) = result.unwrap() else {
            panic!("expected a payload");
        };
        assert_eq!(packet.sub_id, Some(0x80));
        assert_eq!(packet.key(), 0x180);
        assert_eq!(packet.payload_len, 4);
        assert_eq!(packet.pts, Some(40_000_000));
        assert_eq!(pos, 2 + 8 + 4);
    }

    #[test]
    fn test_private_stream_lpcm_skips_extra_header() {
        let bytes = mpeg2_packet(None, &[0xA0, 0, 0, 0, 0, 0, 0], &[9; 10]);
        let (result, _) = parse(PRIVATE_STREAM_1, bytes);
        let ParsedPes::Payload(packet) = result.unwrap() else {
            panic!("expected a payload");
        };
        assert_eq!(packet.sub_id, Some(0xA0));
        assert_eq!(packet.payload_len, 10);
    }

    #[test]
    fn test_subpictures_are_rejected() {
        let bytes = mpeg2_packet(None, &[0x20], &[0; 16]);
        let len = bytes.len() - 2;
        let (result, _) = parse(PRIVATE_STREAM_1, bytes);
        assert_eq!(result.unwrap(), ParsedPes::Rejected { full_length: len });
    }

    #[test]
    fn test_scrambled_is_fatal() {
        let bytes = vec![0x00, 0x08, 0x90, 0x00, 0x00, 1, 2, 3, 4, 5];
        let (result, _) = parse(0xE0, bytes);
        assert!(matches!(result, Err(PsError::Scrambled { offset: 0 })));
    }

    #[test]
    fn test_mpeg1_forms() {
        // stuffing, STD buffer, PTS only
        let mut body = vec![0xFF, 0xFF, 0x40, 0x00];
        body.extend(timestamp_bytes(0x20, 45_000));
        body.extend([7; 6]);
        let mut bytes = (body.len() as u16).to_be_bytes().to_vec();
        bytes.extend(body);
        let (result, _) = parse(0xC0, bytes);
        let ParsedPes::Payload(packet) = result.unwrap() else {
            panic!("expected a payload");
        };
        assert_eq!(packet.pts, Some(500_000_000));
        assert_eq!(packet.payload_len, 6);

        // no timestamp
        let (result, pos) = parse(0xC0, vec![0x00, 0x04, 0x0F, 1, 2, 3]);
        assert!(matches!(
            result.unwrap(),
            ParsedPes::Payload(PesPacket { pts: None, payload_len: 3, .. })
        ));
        assert_eq!(pos, 3);
    }

    #[test]
    fn test_missing_marker_bit_rejects() {
        let mut body = vec![0x80, 0x80, 5];
        let mut ts = timestamp_bytes(0x20, 1000);
        ts[2] &= 0xFE;
        body.extend(ts);
        body.extend([0; 4]);
        let mut bytes = (body.len() as u16).to_be_bytes().to_vec();
        bytes.extend(body);
        let (result, _) = parse(0xE0, bytes);
        assert!(matches!(result.unwrap(), ParsedPes::Rejected { .. }));
    }

    #[test]
    fn test_unparseable_ids() {
        for id in [0xBB, PADDING_STREAM, PRIVATE_STREAM_2, 0xF0, 0xFF] {
            let (result, _) = parse(id, vec![0x00, 0x02, 0x0F, 0x00]);
            assert_eq!(result.unwrap(), ParsedPes::Rejected { full_length: 2 });
        }
        assert!(StreamId::is_parseable(VC1_STREAM));
    }
}

//! Program stream map (`00 00 01 BC`).

use std::io;

use demux_core::{ByteSource, Codec};
use tracing::debug;

use crate::error::{PsError, Result};

/// Largest accepted map length.
pub const MAX_PSM_LENGTH: u16 = 1018;

const FIRST_MAPPED_ID: u8 = 0xB0;
const LAST_MAPPED_ID: u8 = 0xEF;
const MAPPED_IDS: usize = (LAST_MAPPED_ID - FIRST_MAPPED_ID) as usize + 1;

/// Codec announced by an elementary stream map entry.
pub fn codec_for_stream_type(stream_type: u8) -> Option<Codec> {
    match stream_type {
        0x01 => Some(Codec::Mpeg1Video),
        0x02 => Some(Codec::Mpeg2Video),
        0x03 | 0x04 => Some(Codec::Mp2),
        0x0F | 0x11 => Some(Codec::Aac),
        0x10 => Some(Codec::Mpeg4Video),
        0x1B => Some(Codec::Avc),
        0x81 => Some(Codec::Ac3),
        _ => None,
    }
}

/// Stream types announced for container ids 0xB0 - 0xEF.
#[derive(Debug, Clone)]
pub struct ProgramStreamMap {
    entries: [Option<Codec>; MAPPED_IDS],
}

impl Default for ProgramStreamMap {
    fn default() -> Self {
        Self {
            entries: [None; MAPPED_IDS],
        }
    }
}

impl ProgramStreamMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec announced for `id`, if any.
    pub fn codec_for(&self, id: u8) -> Option<Codec> {
        if (FIRST_MAPPED_ID..=LAST_MAPPED_ID).contains(&id) {
            self.entries[(id - FIRST_MAPPED_ID) as usize]
        } else {
            None
        }
    }

    /// Parse a map whose start code was just consumed.
    ///
    /// Malformed maps are ignored. The source is left right after the map
    /// as announced by its length field.
    pub fn parse<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> io::Result<()> {
        let start = source.tell()?;
        let len = source.read_u16_be()?;

        if let Err(err) = self.parse_body(source, len) {
            debug!(offset = start, error = %err, "ignoring program stream map");
        }

        source.seek_to(start + 2 + len as u64)
    }

    fn parse_body<S: ByteSource + ?Sized>(&mut self, source: &mut S, len: u16) -> Result<()> {
        if len == 0 || len > MAX_PSM_LENGTH {
            return Err(PsError::InvalidPsm(format!("length {} out of range", len)));
        }

        if source.read_byte()? & 0x80 == 0 {
            return Err(PsError::InvalidPsm("current_next_indicator not set".into()));
        }
        source.skip(1)?;

        let info_len = source.read_u16_be()?;
        source.skip(info_len as i64)?;

        let map_len = source.read_u16_be()? as i64;
        let mut remaining = map_len.min(len as i64 - info_len as i64 - 8);

        while remaining > 0 {
            let stream_type = source.read_byte()?;
            let id = source.read_byte()?;

            if (FIRST_MAPPED_ID..=LAST_MAPPED_ID).contains(&id) {
                if let Some(codec) = codec_for_stream_type(stream_type) {
                    self.entries[(id - FIRST_MAPPED_ID) as usize] = Some(codec);
                }
            }

            let info = (source.read_u16_be()? as i64).min(remaining);
            source.skip(info)?;
            remaining -= 4 + info;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn psm(entries: &[(u8, u8)]) -> Vec<u8> {
        let mut map = Vec::new();
        for &(stream_type, id) in entries {
            map.extend([stream_type, id, 0x00, 0x00]);
        }
        let mut body = vec![0x80, 0x01, 0x00, 0x00];
        body.extend((map.len() as u16).to_be_bytes());
        body.extend(map);
        body.extend([0, 0, 0, 0]); // CRC
        let mut data = (body.len() as u16).to_be_bytes().to_vec();
        data.extend(body);
        data
    }

    #[test]
    fn test_parse_entries() {
        let mut data = psm(&[(0x02, 0xE0), (0x81, 0xBD), (0x1B, 0xE1), (0x03, 0xC0)]);
        data.extend([0xAA; 4]);
        let end = data.len() as u64 - 4;

        let mut src = Cursor::new(data);
        let mut map = ProgramStreamMap::new();
        map.parse(&mut src).unwrap();

        assert_eq!(map.codec_for(0xE0), Some(Codec::Mpeg2Video));
        assert_eq!(map.codec_for(0xBD), Some(Codec::Ac3));
        assert_eq!(map.codec_for(0xE1), Some(Codec::Avc));
        assert_eq!(map.codec_for(0xC0), Some(Codec::Mp2));
        assert_eq!(map.codec_for(0xC1), None);
        assert_eq!(map.codec_for(0xFD), None);
        assert_eq!(src.tell().unwrap(), end);
    }

    #[test]
    fn test_invalid_length_is_skipped() {
        let mut data = vec![0x04, 0x00];
        data.extend(vec![0u8; 1024]);
        let mut src = Cursor::new(data);
        let mut map = ProgramStreamMap::new();
        map.parse(&mut src).unwrap();
        assert_eq!(src.tell().unwrap(), 2 + 1024);
        assert_eq!(map.codec_for(0xE0), None);
    }

    #[test]
    fn test_stream_type_table() {
        assert_eq!(codec_for_stream_type(0x01), Some(Codec::Mpeg1Video));
        assert_eq!(codec_for_stream_type(0x04), Some(Codec::Mp2));
        assert_eq!(codec_for_stream_type(0x11), Some(Codec::Aac));
        assert_eq!(codec_for_stream_type(0x10), Some(Codec::Mpeg4Video));
        assert_eq!(codec_for_stream_type(0x06), None);
    }
}

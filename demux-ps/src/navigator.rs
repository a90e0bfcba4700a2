//! Start code navigation over a program stream.
//!
//! The navigator walks pack headers, system headers, program stream maps and
//! end codes, and stops in front of the next PES packet. Anything that is not
//! a start code triggers a byte-wise resync.

use std::io;

use demux_core::ByteSource;
use tracing::{debug, trace};

use crate::error::Result;
use crate::psm::ProgramStreamMap;

/// Pack header start code.
pub const PACK_START_CODE: u32 = 0x0000_01BA;
/// System header start code.
pub const SYSTEM_HEADER_START_CODE: u32 = 0x0000_01BB;
/// Program stream map start code.
pub const PROGRAM_STREAM_MAP_START_CODE: u32 = 0x0000_01BC;
/// Program end code.
pub const PROGRAM_END_CODE: u32 = 0x0000_01B9;
/// MPEG-1/2 video sequence header start code.
pub const SEQUENCE_START_CODE: u32 = 0x0000_01B3;

/// Whether `value` is a `00 00 01 xx` start code.
pub fn is_start_code(value: u32) -> bool {
    value & 0xFFFF_FF00 == 0x0000_0100
}

/// A PES packet start found by the navigator.
///
/// The source is positioned on the packet length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketStart {
    /// Stream id (low byte of the start code).
    pub id: u8,
    /// Offset of the start code.
    pub offset: u64,
}

/// Byte-level state machine over program stream structures.
pub struct Navigator<R> {
    source: R,
    version: Option<u8>,
    psm: ProgramStreamMap,
    resyncs: u64,
}

pub(crate) fn eof_as_none<T>(result: io::Result<T>) -> io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

impl<R: ByteSource> Navigator<R> {
    /// Create a navigator reading from the current position of `source`.
    pub fn new(source: R) -> Self {
        Self {
            source,
            version: None,
            psm: ProgramStreamMap::new(),
            resyncs: 0,
        }
    }

    /// The underlying source.
    pub fn source_mut(&mut self) -> &mut R {
        &mut self.source
    }

    /// Consume the navigator and return the source.
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Program stream version decided by the first pack header.
    pub fn version(&self) -> Option<u8> {
        self.version
    }

    /// Program stream map entries seen so far.
    pub fn psm(&self) -> &ProgramStreamMap {
        &self.psm
    }

    /// Number of successful resyncs.
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Advance to the next PES packet.
    ///
    /// Returns `None` at the end of the stream, when a program end code is
    /// not followed by further data, or once the position passes `limit`.
    pub fn next_packet(&mut self, limit: Option<u64>) -> Result<Option<PacketStart>> {
        Ok(eof_as_none(self.scan(limit))?.flatten())
    }

    /// Advance to the next PES packet with stream id `id`, skipping others
    /// by their length field.
    pub fn next_packet_for(&mut self, id: u8, limit: Option<u64>) -> Result<Option<PacketStart>> {
        while let Some(start) = self.next_packet(limit)? {
            if start.id == id {
                return Ok(Some(start));
            }
            if eof_as_none(self.skip_packet())?.is_none() {
                return Ok(None);
            }
        }
        Ok(None)
    }

    /// Skip a packet whose start code was just consumed, using its length
    /// field.
    pub fn skip_packet(&mut self) -> io::Result<()> {
        let len = self.source.read_u16_be()?;
        self.source.skip(len as i64)
    }

    fn scan(&mut self, limit: Option<u64>) -> io::Result<Option<PacketStart>> {
        let mut header = self.source.read_u32_be()?;

        loop {
            if let Some(limit) = limit {
                if self.source.tell()? > limit {
                    return Ok(None);
                }
            }

            header = match header {
                PACK_START_CODE => {
                    self.skip_pack_header()?;
                    self.source.read_u32_be()?
                }
                SYSTEM_HEADER_START_CODE => {
                    self.skip_system_header()?;
                    self.source.read_u32_be()?
                }
                PROGRAM_STREAM_MAP_START_CODE => {
                    self.psm.parse(&mut self.source)?;
                    self.source.read_u32_be()?
                }
                PROGRAM_END_CODE => match self.resync(header)? {
                    Some(next) => next,
                    None => return Ok(None),
                },
                code if is_start_code(code) => {
                    let offset = self.source.tell()? - 4;
                    trace!(id = code as u8, offset, "PES packet");
                    return Ok(Some(PacketStart {
                        id: code as u8,
                        offset,
                    }));
                }
                other => match self.resync(other)? {
                    Some(next) => next,
                    None => return Ok(None),
                },
            };
        }
    }

    fn skip_pack_header(&mut self) -> io::Result<()> {
        if self.version.is_none() {
            let marker = self.source.peek_byte()?;
            let version = if marker & 0xC0 != 0 { 2 } else { 1 };
            debug!(version, "program stream version");
            self.version = Some(version);
        }

        self.source.skip(8)?;
        if self.version == Some(2) {
            self.source.skip(1)?;
            let stuffing = self.source.read_byte()? & 0x07;
            self.source.skip(stuffing as i64)?;
        }
        Ok(())
    }

    fn skip_system_header(&mut self) -> io::Result<()> {
        self.source.skip(8)?;
        // P-STD entries
        while self.source.peek_byte()? & 0x80 != 0 {
            self.source.skip(3)?;
        }
        Ok(())
    }

    /// Shift in one byte at a time until the last four bytes form a start
    /// code. Returns `None` when the stream ends first.
    fn resync(&mut self, mut header: u32) -> io::Result<Option<u32>> {
        let lost_at = self.source.tell()?;
        debug!(
            offset = lost_at,
            header = format_args!("0x{:08X}", header),
            "synchronisation lost, looking for a start code"
        );

        loop {
            let Some(byte) = eof_as_none(self.source.read_byte())? else {
                debug!(offset = lost_at, "resync failed at end of stream");
                return Ok(None);
            };
            header = (header << 8) | byte as u32;
            if is_start_code(header) {
                self.resyncs += 1;
                debug!(
                    offset = self.source.tell()? - 4,
                    header = format_args!("0x{:08X}", header),
                    "resync succeeded"
                );
                return Ok(Some(header));
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    pub(crate) fn mpeg2_pack_header(stuffing: u8) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x01, 0xBA, 0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xC3];
        data.push(0xF8 | stuffing);
        data.extend(std::iter::repeat(0xFF).take(stuffing as usize));
        data
    }

    fn mpeg1_pack_header() -> Vec<u8> {
        vec![0x00, 0x00, 0x01, 0xBA, 0x21, 0x00, 0x01, 0x00, 0x01, 0x80, 0x1B, 0x91]
    }

    fn system_header(entries: usize) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x01, 0xBB];
        data.extend(((6 + entries * 3) as u16).to_be_bytes());
        data.extend([0x80, 0x1B, 0x91, 0x04, 0xE1, 0xFF]);
        for i in 0..entries {
            data.extend([0xE0 + i as u8, 0xE0, 0xE8]);
        }
        data
    }

    pub(crate) fn padding_packet(len: u16) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x01, 0xBE];
        data.extend(len.to_be_bytes());
        data.extend(std::iter::repeat(0xFF).take(len as usize));
        data
    }

    pub(crate) fn pes(id: u8, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x01, id];
        data.extend(((payload.len() + 3) as u16).to_be_bytes());
        data.extend([0x81, 0x00, 0x00]);
        data.extend(payload);
        data
    }

    #[test]
    fn test_mpeg2_pack_with_stuffing() {
        let mut data = mpeg2_pack_header(3);
        data.extend(system_header(2));
        let expected = data.len() as u64;
        data.extend(pes(0xE0, &[1, 2, 3]));

        let mut nav = Navigator::new(Cursor::new(data));
        let found = nav.next_packet(None).unwrap().unwrap();
        assert_eq!(found, PacketStart { id: 0xE0, offset: expected });
        assert_eq!(nav.version(), Some(2));
        assert_eq!(nav.source_mut().tell().unwrap(), expected + 4);
        assert_eq!(nav.resyncs(), 0);
    }

    #[test]
    fn test_mpeg1_pack() {
        let mut data = mpeg1_pack_header();
        data.extend(pes(0xC0, &[0xFF, 0xFD]));

        let mut nav = Navigator::new(Cursor::new(data));
        let found = nav.next_packet(None).unwrap().unwrap();
        assert_eq!(found.offset, 12);
        assert_eq!(nav.version(), Some(1));
    }

    #[test]
    fn test_resync_lands_on_start_code() {
        let mut data = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x12, 0x34, 0x00, 0x00, 0x56];
        let k = data.len() as u64;
        data.extend(pes(0xE0, &[9; 8]));

        let mut nav = Navigator::new(Cursor::new(data));
        let found = nav.next_packet(None).unwrap().unwrap();
        assert_eq!(found.offset, k);
        assert_eq!(nav.resyncs(), 1);
    }

    #[test]
    fn test_end_code_continues_after_resync() {
        let mut data = mpeg2_pack_header(0);
        data.extend([0x00, 0x00, 0x01, 0xB9, 0xAA, 0xBB]);
        let k = data.len() as u64;
        data.extend(pes(0xC0, &[1]));

        let mut nav = Navigator::new(Cursor::new(data));
        assert_eq!(nav.next_packet(None).unwrap().unwrap().offset, k);
    }

    #[test]
    fn test_end_code_at_end_of_stream() {
        let mut data = mpeg2_pack_header(0);
        data.extend([0x00, 0x00, 0x01, 0xB9]);
        let mut nav = Navigator::new(Cursor::new(data));
        assert_eq!(nav.next_packet(None).unwrap(), None);
    }

    #[test]
    fn test_psm_is_consumed() {
        let mut data = mpeg2_pack_header(0);
        data.extend([0x00, 0x00, 0x01, 0xBC, 0x00, 0x0E, 0x80, 0x01, 0x00, 0x00, 0x00, 0x04]);
        data.extend([0x1B, 0xE0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        let k = data.len() as u64;
        data.extend(pes(0xE0, &[0, 0, 0, 1]));

        let mut nav = Navigator::new(Cursor::new(data));
        assert_eq!(nav.next_packet(None).unwrap().unwrap().offset, k);
        assert_eq!(nav.psm().codec_for(0xE0), Some(demux_core::Codec::Avc));
    }

    #[test]
    fn test_next_packet_for_skips_others() {
        let mut data = mpeg2_pack_header(0);
        data.extend(padding_packet(20));
        data.extend(pes(0xC0, &[1, 2]));
        let k = data.len() as u64;
        data.extend(pes(0xE0, &[3, 4]));

        let mut nav = Navigator::new(Cursor::new(data));
        let found = nav.next_packet_for(0xE0, None).unwrap().unwrap();
        assert_eq!(found.offset, k);
        assert_eq!(nav.next_packet_for(0xE0, None).unwrap(), None);
    }

    #[test]
    fn test_limit_stops_scanning() {
        let mut data = mpeg2_pack_header(0);
        data.extend(padding_packet(100));
        data.extend(pes(0xE0, &[3, 4]));

        let mut nav = Navigator::new(Cursor::new(data));
        assert_eq!(nav.next_packet_for(0xE0, Some(64)).unwrap(), None);
    }

    #[test]
    fn test_empty_source() {
        let mut nav = Navigator::new(Cursor::new(Vec::new()));
        assert_eq!(nav.next_packet(None).unwrap(), None);
    }
}

//! The program stream reader.
//!
//! Opening scans the first [`PsConfig::probe_window`] bytes for PES packets
//! and classifies every new stream id. Reading then walks the whole stream,
//! routing payloads to the sinks attached to their tracks.

use std::io;

use demux_core::source::with_restored_position;
use demux_core::{
    ByteSource, Packet, PacketSink, ReadStatus, Reader, Result, SinkTable, TrackDescriptor,
};
use tracing::{debug, info, trace};

use crate::classify::probe_for;
use crate::config::PsConfig;
use crate::error::PsError;
use crate::navigator::{eof_as_none, Navigator, PacketStart, PACK_START_CODE};
use crate::pes::{parse_packet, ParsedPes, PesPacket, StreamId, PRIVATE_STREAM_1};
use crate::registry::{CoalesceBuffer, Registry};

fn is_eof(err: &PsError) -> bool {
    matches!(err, PsError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
}

/// Parse a PES header, mapping a truncated packet to `None`.
fn parse_or_eof<S: ByteSource + ?Sized>(
    source: &mut S,
    start: PacketStart,
) -> std::result::Result<Option<ParsedPes>, PsError> {
    match parse_packet(source, start.id, start.offset) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) if is_eof(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// MPEG-1/MPEG-2 program stream reader.
///
/// # Example
///
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
/// use demux_core::{PacketQueue, ReadStatus, Reader};
/// use demux_ps::PsReader;
///
/// let file = BufReader::new(File::open("movie.mpg").unwrap());
/// let mut reader = PsReader::open(file).unwrap();
/// let video = PacketQueue::new();
/// reader.attach_sink(0, Box::new(video.clone())).unwrap();
/// while reader.read().unwrap() == ReadStatus::MoreData {
///     for packet in video.drain() {
///         println!("{} bytes at {:?}", packet.size(), packet.timecode);
///     }
/// }
/// ```
pub struct PsReader<R> {
    nav: Navigator<R>,
    config: PsConfig,
    registry: Registry,
    tracks: Vec<TrackDescriptor>,
    sinks: SinkTable,
    buffers: Vec<Option<CoalesceBuffer>>,
    done: bool,
}

impl<R: ByteSource> PsReader<R> {
    /// Open with an explicit configuration.
    pub fn open_with_config(mut source: R, config: PsConfig) -> Result<Self> {
        source.seek_to(0)?;
        let header = source.read_u32_be()?;
        if header != PACK_START_CODE {
            return Err(PsError::NotProgramStream(header).into());
        }
        source.seek_to(0)?;

        let mut reader = Self {
            nav: Navigator::new(source),
            config,
            registry: Registry::new(),
            tracks: Vec::new(),
            sinks: SinkTable::new(0),
            buffers: Vec::new(),
            done: false,
        };
        reader.discover()?;
        Ok(reader)
    }

    /// Program stream version (1 or 2).
    pub fn version(&self) -> u8 {
        self.nav.version().unwrap_or(2)
    }

    /// Earliest timestamp over all tracks, subtracted from every packet.
    pub fn global_timecode_offset(&self) -> Option<i64> {
        self.registry.global_offset()
    }

    /// Number of times synchronisation was lost and recovered.
    pub fn resyncs(&self) -> u64 {
        self.nav.resyncs()
    }

    fn discover(&mut self) -> std::result::Result<(), PsError> {
        let window = self.config.probe_window;

        while let Some(start) = self.nav.next_packet(Some(window))? {
            self.found_new_stream(start)?;

            self.nav.source_mut().seek_to(start.offset + 4)?;
            if eof_as_none(self.nav.skip_packet())?.is_none() {
                break;
            }
        }

        self.registry.finalize();
        self.tracks = self.registry.descriptors();
        self.sinks = SinkTable::new(self.tracks.len());
        self.buffers = self
            .registry
            .tracks()
            .iter()
            .enumerate()
            .map(|(number, track)| match track.info.buffer_capacity {
                Some(capacity) if self.config.coalesce => {
                    Some(CoalesceBuffer::new(number, capacity))
                }
                _ => None,
            })
            .collect();

        self.nav.source_mut().seek_to(0)?;

        info!(
            version = self.version(),
            tracks = self.tracks.len(),
            global_offset = ?self.registry.global_offset(),
            "using the MPEG PS demultiplexer"
        );
        Ok(())
    }

    fn found_new_stream(&mut self, start: PacketStart) -> std::result::Result<(), PsError> {
        let id = start.id;
        if !StreamId::is_demuxable(id) {
            return Ok(());
        }

        let packet = match parse_or_eof(self.nav.source_mut(), start)? {
            Some(ParsedPes::Payload(packet)) => packet,
            Some(ParsedPes::Rejected { .. }) => {
                self.registry.blacklist(id as u16, "unparseable PES header");
                return Ok(());
            }
            None => {
                self.registry.blacklist(id as u16, "truncated PES packet");
                return Ok(());
            }
        };

        // MPEG-1 private stream 1 has no sub-stream id.
        if id == PRIVATE_STREAM_1 && packet.sub_id.is_none() {
            return Ok(());
        }

        let key = packet.key();
        if self.registry.is_blacklisted(key) {
            return Ok(());
        }
        if let Some(index) = self.registry.lookup(key) {
            self.registry.observe_timestamp(index, packet.pts);
            return Ok(());
        }

        let Some(first) = eof_as_none(self.nav.source_mut().read_vec(packet.payload_len))? else {
            self.registry.blacklist(key, "truncated PES payload");
            return Ok(());
        };

        debug!(
            stream = format_args!("0x{:04X}", key),
            offset = start.offset,
            psm_codec = ?self.nav.psm().codec_for(id),
            "new stream"
        );

        let mut probe = match probe_for(key, &first) {
            Ok(probe) => probe,
            Err(reason) => {
                self.registry.blacklist(key, reason);
                return Ok(());
            }
        };

        let mut complete = probe.push(&first);
        while !complete {
            match self.next_payload_for(id, key)? {
                Some(payload) => complete = probe.push(&payload),
                None => break,
            }
        }

        match probe.finish() {
            Ok(info) => {
                self.registry.insert(key, info, packet.pts);
            }
            Err(reason) => self.registry.blacklist(key, reason),
        }
        Ok(())
    }

    /// Next payload of the stream `key` inside the discovery window.
    fn next_payload_for(&mut self, id: u8, key: u16) -> std::result::Result<Option<Vec<u8>>, PsError> {
        let window = self.config.probe_window;

        while let Some(start) = self.nav.next_packet_for(id, Some(window))? {
            let source = self.nav.source_mut();
            match parse_or_eof(source, start)? {
                Some(ParsedPes::Payload(packet)) if packet.key() == key => {
                    return Ok(eof_as_none(source.read_vec(packet.payload_len))?);
                }
                Some(ParsedPes::Payload(packet)) => source.skip(packet.payload_len as i64)?,
                Some(ParsedPes::Rejected { full_length }) => {
                    source.seek_to(start.offset + 6 + full_length as u64)?
                }
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Track number for `key` if its packets have somewhere to go.
    fn wanted(&self, key: u16) -> Option<usize> {
        self.registry
            .lookup(key)
            .filter(|&number| self.sinks.is_attached(number))
    }

    fn deliver(&mut self, track: usize, packet: &PesPacket, data: Vec<u8>, pos: u64) -> Result<()> {
        let timecode = if self.config.provide_timecodes {
            self.registry.relative_timestamp(packet.pts)
        } else {
            None
        };

        match self.buffers.get_mut(track) {
            Some(Some(buffer)) => {
                for ready in buffer.push(data, timecode, pos) {
                    self.sinks.deliver(ready)?;
                }
                Ok(())
            }
            _ => self.sinks.deliver(
                Packet::new(data)
                    .with_track(track)
                    .with_timecode(timecode)
                    .with_pos(pos),
            ),
        }
    }
}

impl<R: ByteSource> Reader<R> for PsReader<R> {
    fn probe(source: &mut R, _size: u64) -> bool {
        with_restored_position(source, |s| {
            s.seek_to(0).is_ok() && matches!(s.read_u32_be(), Ok(PACK_START_CODE))
        })
        .unwrap_or(false)
    }

    fn open(source: R) -> Result<Self> {
        Self::open_with_config(source, PsConfig::default())
    }

    fn format_name(&self) -> String {
        format!("MPEG {} program stream (PS)", self.version())
    }

    fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    fn attach_sink(&mut self, track: usize, sink: Box<dyn PacketSink>) -> Result<()> {
        self.sinks.attach(track, sink)
    }

    fn read(&mut self) -> Result<ReadStatus> {
        if self.done {
            return Ok(ReadStatus::Done);
        }

        loop {
            let Some(start) = self.nav.next_packet(None)? else {
                return self.finish();
            };

            if start.id != PRIVATE_STREAM_1 && self.wanted(start.id as u16).is_none() {
                if eof_as_none(self.nav.skip_packet())?.is_none() {
                    return self.finish();
                }
                continue;
            }

            let packet = match parse_or_eof(self.nav.source_mut(), start)? {
                Some(ParsedPes::Payload(packet)) => packet,
                Some(ParsedPes::Rejected { full_length }) => {
                    trace!(offset = start.offset, "skipping unusable PES packet");
                    self.nav
                        .source_mut()
                        .seek_to(start.offset + 6 + full_length as u64)?;
                    continue;
                }
                None => return self.finish(),
            };

            let Some(track) = self.wanted(packet.key()) else {
                self.nav.source_mut().skip(packet.payload_len as i64)?;
                continue;
            };

            let Some(data) = eof_as_none(self.nav.source_mut().read_vec(packet.payload_len))? else {
                debug!(offset = start.offset, "PES payload truncated by end of stream");
                return self.finish();
            };

            self.deliver(track, &packet, data, start.offset)?;
            return Ok(ReadStatus::MoreData);
        }
    }

    fn finish(&mut self) -> Result<ReadStatus> {
        if self.done {
            return Ok(ReadStatus::Done);
        }
        self.done = true;

        let pending: Vec<Packet> = self
            .buffers
            .iter_mut()
            .flatten()
            .filter_map(CoalesceBuffer::take)
            .collect();
        for packet in pending {
            self.sinks.deliver(packet)?;
        }

        debug!(resyncs = self.nav.resyncs(), "MPEG PS demultiplexing finished");
        self.sinks.flush_all()?;
        Ok(ReadStatus::Done)
    }
}

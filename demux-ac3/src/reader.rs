//! Raw AC-3 elementary stream reader.

use demux_core::framing::{FrameAssembler, Scan};
use demux_core::source::with_restored_position;
use demux_core::{
    AudioParams, ByteSource, CodecParams, Error, PacketSink, RawConfig, ReadStatus, Reader,
    Result, SinkTable, TrackDescriptor,
};
use tracing::{debug, info};

use crate::header::{find_header, Ac3Header, AC3_HEADER_SIZE};

/// Bytes inspected by [`Ac3Reader::probe`].
pub const AC3_PROBE_SIZE: usize = 4096;

/// Reader for raw AC-3 / E-AC-3 files.
///
/// Emits one packet per sync frame with the frame duration set and the
/// timecode left for the packetizer to derive.
pub struct Ac3Reader<R> {
    source: R,
    config: RawConfig,
    header: Ac3Header,
    tracks: Vec<TrackDescriptor>,
    sinks: SinkTable,
    assembler: FrameAssembler,
    size: u64,
    done: bool,
}

impl<R: ByteSource> Ac3Reader<R> {
    /// Open with an explicit configuration.
    pub fn open_with_config(mut source: R, config: RawConfig) -> Result<Self> {
        let size = source.total_size()?;
        source.seek_to(0)?;

        let mut buf = vec![0u8; config.chunk_size.max(AC3_PROBE_SIZE)];
        let n = source.read_up_to(&mut buf)?;
        source.seek_to(0)?;

        let (offset, header) = find_header(&buf[..n])
            .ok_or_else(|| Error::header("no AC-3 header found in the first chunk"))?;

        info!(
            offset,
            bsid = header.bsid,
            sample_rate = header.sample_rate,
            channels = header.channels,
            "using the AC-3 demultiplexer"
        );

        let mut track = TrackDescriptor::new(0, 0, header.codec());
        track.params = CodecParams::Audio(AudioParams {
            sample_rate: header.sample_rate,
            channels: header.channels,
            bit_depth: None,
            bsid: Some(header.bsid),
        });

        Ok(Self {
            source,
            config,
            header,
            tracks: vec![track],
            sinks: SinkTable::new(1),
            assembler: FrameAssembler::new(0),
            size,
            done: false,
        })
    }

    /// The first header found while opening.
    pub fn header(&self) -> &Ac3Header {
        &self.header
    }

    /// Fraction of the source consumed so far, in percent.
    pub fn progress(&mut self) -> u32 {
        match (self.source.tell(), self.size) {
            (Ok(pos), size) if size > 0 => (pos * 100 / size) as u32,
            _ => 100,
        }
    }
}

/// Frame boundary decision for raw AC-3 data.
pub(crate) fn scan_ac3(data: &[u8], track: usize) -> Scan {
    if data.len() < AC3_HEADER_SIZE {
        return Scan::NeedMore;
    }
    match Ac3Header::parse(data) {
        Ok(h) => Scan::Frame {
            len: h.frame_size,
            duration: h.duration_ns(),
            track,
        },
        Err(_) => match crate::header::find_sync(&data[1..]) {
            Some(rel) => Scan::Skip(rel + 1),
            None => Scan::Skip(data.len() - 1),
        },
    }
}

impl<R: ByteSource> Reader<R> for Ac3Reader<R> {
    fn probe(source: &mut R, _size: u64) -> bool {
        with_restored_position(source, |s| {
            if s.seek_to(0).is_err() {
                return false;
            }
            let mut buf = [0u8; AC3_PROBE_SIZE];
            let n = match s.read_up_to(&mut buf) {
                Ok(n) => n,
                Err(_) => return false,
            };
            let buf = &buf[..n];
            let header = match Ac3Header::parse(buf) {
                Ok(h) => h,
                Err(_) => return false,
            };
            let next = header.frame_size;
            next + 2 > buf.len() || buf[next..next + 2] == [0x0B, 0x77]
        })
        .unwrap_or(false)
    }

    fn open(source: R) -> Result<Self> {
        Self::open_with_config(source, RawConfig::default())
    }

    fn format_name(&self) -> String {
        "AC3".to_string()
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

        let mut chunk = vec![0u8; self.config.chunk_size];
        let n = self.source.read_up_to(&mut chunk)?;
        if n == 0 {
            return self.finish();
        }
        self.assembler.push(&chunk[..n]);

        for packet in self.assembler.frames(|data| scan_ac3(data, 0)) {
            self.sinks.deliver(packet)?;
        }

        if n < chunk.len() {
            return self.finish();
        }
        Ok(ReadStatus::MoreData)
    }

    fn finish(&mut self) -> Result<ReadStatus> {
        if self.done {
            return Ok(ReadStatus::Done);
        }
        self.done = true;

        if let Some(rest) = self.assembler.take_rest(0) {
            debug!(bytes = rest.size(), "emitting trailing partial AC-3 frame");
            self.sinks.deliver(rest)?;
        }
        self.sinks.flush_all()?;
        Ok(ReadStatus::Done)
    }
}

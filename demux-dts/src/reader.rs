//! Raw DTS elementary stream reader.

use demux_core::framing::{FrameAssembler, Scan};
use demux_core::source::with_restored_position;
use demux_core::{
    AudioParams, ByteSource, Codec, CodecParams, Error, PacketSink, RawConfig, ReadStatus,
    Reader, Result, SinkTable, TrackDescriptor,
};
use tracing::{debug, info};

use crate::header::{find_header, find_sync, DtsHeader, DTS_HEADER_SIZE};
use crate::repack::DtsTransform;
use crate::DtsError;

/// Bytes inspected by [`DtsReader::probe`]. Smaller sources are rejected.
pub const DTS_PROBE_SIZE: usize = 16384;

/// Reader for raw DTS files in any of the four stored layouts.
///
/// Data is converted to the native layout chunk by chunk, so packets always
/// carry native 16-bit big-endian frames.
pub struct DtsReader<R> {
    source: R,
    config: RawConfig,
    transform: DtsTransform,
    header: DtsHeader,
    tracks: Vec<TrackDescriptor>,
    sinks: SinkTable,
    assembler: FrameAssembler,
    size: u64,
    done: bool,
}

impl<R: ByteSource> DtsReader<R> {
    /// Open with an explicit configuration.
    pub fn open_with_config(mut source: R, config: RawConfig) -> Result<Self> {
        let size = source.total_size()?;
        source.seek_to(0)?;

        let mut buf = vec![0u8; config.chunk_size.max(DTS_PROBE_SIZE)];
        let n = source.read_up_to(&mut buf)?;
        source.seek_to(0)?;
        let buf = &buf[..n];

        let transform = DtsTransform::detect(buf)
            .ok_or_else(|| Error::header("no DTS header found in the first chunk"))?;
        let (offset, header) = find_header(&transform.decode(buf))
            .ok_or_else(|| Error::header("no DTS header found in the first chunk"))?;

        info!(
            offset,
            layout = %transform,
            sample_rate = header.sample_rate,
            channels = header.channels,
            frame_size = header.frame_size,
            "using the DTS demultiplexer"
        );

        let mut track = TrackDescriptor::new(0, 0, Codec::Dts);
        track.params = CodecParams::Audio(AudioParams {
            sample_rate: header.sample_rate,
            channels: header.channels,
            bit_depth: header.bit_depth,
            bsid: None,
        });

        Ok(Self {
            source,
            config,
            transform,
            header,
            tracks: vec![track],
            sinks: SinkTable::new(1),
            assembler: FrameAssembler::new(0),
            size,
            done: false,
        })
    }

    /// The first header found while opening.
    pub fn header(&self) -> &DtsHeader {
        &self.header
    }

    /// The layout conversion applied to every chunk.
    pub fn transform(&self) -> DtsTransform {
        self.transform
    }

    /// Fraction of the source consumed so far, in percent.
    pub fn progress(&mut self) -> u32 {
        match (self.source.tell(), self.size) {
            (Ok(pos), size) if size > 0 => (pos * 100 / size) as u32,
            _ => 100,
        }
    }

    fn chunk_len(&self) -> usize {
        let granule = self.transform.granule();
        (self.config.chunk_size / granule).max(1) * granule
    }

    fn deliver_frames(&mut self, at_end: bool) -> Result<()> {
        let repacked = self.transform.repack_14_to_16;
        for mut packet in self.assembler.frames(|data| scan_dts(data, at_end)) {
            if repacked {
                // offsets of repacked data do not map onto the source
                packet.pos = None;
            }
            self.sinks.deliver(packet)?;
        }
        Ok(())
    }
}

/// Frame boundary decision for native DTS data. With `at_end` set, a core
/// frame at the very end of the data is accepted without looking for a
/// following DTS-HD substream.
pub(crate) fn scan_dts(data: &[u8], at_end: bool) -> Scan {
    if data.len() < DTS_HEADER_SIZE {
        return Scan::NeedMore;
    }
    match DtsHeader::parse(data) {
        Ok(header) => {
            let len = match header.frame_length(data) {
                Some(len) => len,
                None if at_end && data.len() >= header.frame_size => header.frame_size,
                None => return Scan::NeedMore,
            };
            Scan::Frame {
                len,
                duration: header.duration_ns(),
                track: 0,
            }
        }
        Err(DtsError::InsufficientData { .. }) => Scan::NeedMore,
        Err(_) => match find_sync(&data[1..]) {
            Some(rel) => Scan::Skip(rel + 1),
            None => Scan::Skip(data.len() - 3),
        },
    }
}

impl<R: ByteSource> Reader<R> for DtsReader<R> {
    fn probe(source: &mut R, size: u64) -> bool {
        if size < DTS_PROBE_SIZE as u64 {
            return false;
        }
        with_restored_position(source, |s| {
            if s.seek_to(0).is_err() {
                return false;
            }
            let mut buf = vec![0u8; DTS_PROBE_SIZE];
            match s.read_up_to(&mut buf) {
                Ok(n) if n == DTS_PROBE_SIZE => DtsTransform::detect(&buf).is_some(),
                _ => false,
            }
        })
        .unwrap_or(false)
    }

    fn open(source: R) -> Result<Self> {
        Self::open_with_config(source, RawConfig::default())
    }

    fn format_name(&self) -> String {
        "DTS".to_string()
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

        let mut chunk = vec![0u8; self.chunk_len()];
        let n = self.source.read_up_to(&mut chunk)?;
        if n == 0 {
            return self.finish();
        }

        let dropped = n % self.transform.granule();
        if dropped > 0 {
            debug!(bytes = dropped, "dropping trailing bytes that do not form a whole word");
        }
        self.assembler.push(&self.transform.decode(&chunk[..n]));
        self.deliver_frames(false)?;

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

        self.deliver_frames(true)?;
        if let Some(rest) = self.assembler.take_rest(0) {
            debug!(bytes = rest.size(), "emitting trailing partial DTS frame");
            self.sinks.deliver(rest)?;
        }
        self.sinks.flush_all()?;
        Ok(ReadStatus::Done)
    }
}

//! Raw TrueHD / MLP reader.

use demux_core::framing::FrameAssembler;
use demux_core::source::with_restored_position;
use demux_core::{
    AudioParams, ByteSource, CodecParams, Error, PacketSink, RawConfig, ReadStatus, Reader,
    Result, SinkTable, TrackDescriptor,
};
use tracing::{debug, info};

use crate::id3::{id3_tag_size_at_end, skip_id3v2_tag};
use crate::truehd::{survey, TrueHdFrame, TrueHdParser};

/// Chunk size for reading and probing TrueHD files.
pub const TRUEHD_CHUNK_SIZE: usize = 1024 * 1024;

/// Track number of the interleaved AC-3 stream.
pub const AC3_TRACK: usize = 1;

/// Reader for raw TrueHD and MLP files.
///
/// Track 0 is the TrueHD/MLP stream. When AC-3 frames are interleaved with
/// the access units they are exposed as track 1.
pub struct TrueHdReader<R> {
    source: R,
    config: RawConfig,
    parser: TrueHdParser,
    tracks: Vec<TrackDescriptor>,
    sinks: SinkTable,
    assembler: FrameAssembler,
    data_end: u64,
    done: bool,
}

fn audio_track(number: usize, frame: &TrueHdFrame) -> TrackDescriptor {
    let mut track = TrackDescriptor::new(number, number as u16, frame.codec);
    track.params = CodecParams::Audio(AudioParams {
        sample_rate: frame.sample_rate,
        channels: frame.channels,
        bit_depth: frame.bit_depth,
        bsid: None,
    });
    track
}

impl<R: ByteSource> TrueHdReader<R> {
    /// Open with an explicit configuration.
    pub fn open_with_config(mut source: R, config: RawConfig) -> Result<Self> {
        let total = source.total_size()?;
        let trailing_tag = id3_tag_size_at_end(&mut source)?;
        let data_start = skip_id3v2_tag(&mut source)?;
        let data_end = total.saturating_sub(trailing_tag).max(data_start);

        let window = (data_end - data_start).min(TRUEHD_CHUNK_SIZE as u64) as usize;
        let mut buf = vec![0u8; window];
        let n = source.read_up_to(&mut buf)?;
        source.seek_to(data_start)?;

        let found = survey(&buf[..n]);
        let sync = found
            .first_sync
            .ok_or_else(|| Error::header("no TrueHD or MLP major sync found in the first chunk"))?;

        info!(
            id3v2_size = data_start,
            trailing_tag,
            codec = %sync.codec,
            sample_rate = sync.sample_rate,
            channels = sync.channels,
            embedded_ac3 = found.first_ac3.is_some(),
            "using the TrueHD demultiplexer"
        );

        let mut tracks = vec![audio_track(0, &sync)];
        if let Some(ac3) = &found.first_ac3 {
            tracks.push(audio_track(AC3_TRACK, ac3));
        }
        let sinks = SinkTable::new(tracks.len());

        Ok(Self {
            source,
            config,
            parser: TrueHdParser::new(),
            tracks,
            sinks,
            assembler: FrameAssembler::new(data_start),
            data_end,
            done: false,
        })
    }

    /// Offset of the first byte after the payload (start of a trailing tag).
    pub fn data_end(&self) -> u64 {
        self.data_end
    }
}

impl<R: ByteSource> Reader<R> for TrueHdReader<R> {
    fn probe(source: &mut R, _size: u64) -> bool {
        with_restored_position(source, |s| {
            if skip_id3v2_tag(s).is_err() {
                return false;
            }
            let mut buf = vec![0u8; TRUEHD_CHUNK_SIZE];
            match s.read_up_to(&mut buf) {
                Ok(n) => survey(&buf[..n]).is_valid(),
                Err(_) => false,
            }
        })
        .unwrap_or(false)
    }

    fn open(source: R) -> Result<Self> {
        Self::open_with_config(source, RawConfig::new(TRUEHD_CHUNK_SIZE))
    }

    fn format_name(&self) -> String {
        "TrueHD".to_string()
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

        let pos = self.source.tell()?;
        let remaining = self.data_end.saturating_sub(pos);
        if remaining == 0 {
            return self.finish();
        }

        let want = (self.config.chunk_size as u64).min(remaining) as usize;
        let mut chunk = vec![0u8; want];
        let n = self.source.read_up_to(&mut chunk)?;
        self.assembler.push(&chunk[..n]);

        let parser = &mut self.parser;
        for packet in self.assembler.frames(|data| parser.scan(data)) {
            self.sinks.deliver(packet)?;
        }

        if n < want || pos + n as u64 >= self.data_end {
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
            debug!(bytes = rest.size(), "emitting trailing partial TrueHD frame");
            self.sinks.deliver(rest)?;
        }
        self.sinks.flush_all()?;
        Ok(ReadStatus::Done)
    }
}

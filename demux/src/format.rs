//! Format detection and a reader over every supported format.

use std::fmt;

use demux_ac3::Ac3Reader;
use demux_core::{ByteSource, Error, PacketSink, ReadStatus, Reader, Result, TrackDescriptor};
use demux_dts::{DtsReader, TrueHdReader};
use demux_ps::PsReader;
use tracing::{debug, info};

/// Supported input formats, in probing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Format {
    /// MPEG-1/2 program stream.
    ProgramStream,
    /// Raw Dolby TrueHD or MLP.
    TrueHd,
    /// Raw DTS.
    Dts,
    /// Raw AC-3 or E-AC-3.
    Ac3,
}

impl Format {
    /// Formats in the order they are probed. Containers come before raw
    /// elementary streams, and the stricter raw probes before AC-3.
    pub const PROBE_ORDER: [Format; 4] = [
        Format::ProgramStream,
        Format::TrueHd,
        Format::Dts,
        Format::Ac3,
    ];

    /// Short name.
    pub fn name(self) -> &'static str {
        match self {
            Format::ProgramStream => "MPEG PS",
            Format::TrueHd => "TrueHD",
            Format::Dts => "DTS",
            Format::Ac3 => "AC3",
        }
    }

    /// Check whether `source` holds this format. The read position is
    /// preserved.
    pub fn matches<R: ByteSource>(self, source: &mut R, size: u64) -> bool {
        match self {
            Format::ProgramStream => PsReader::<R>::probe(source, size),
            Format::TrueHd => TrueHdReader::<R>::probe(source, size),
            Format::Dts => DtsReader::<R>::probe(source, size),
            Format::Ac3 => Ac3Reader::<R>::probe(source, size),
        }
    }

    /// First format in [`Format::PROBE_ORDER`] that matches `source`.
    pub fn detect<R: ByteSource>(source: &mut R) -> Result<Option<Format>> {
        let size = source.total_size()?;
        for format in Format::PROBE_ORDER {
            let matched = format.matches(source, size);
            debug!(format = format.name(), size, matched, "probed");
            if matched {
                return Ok(Some(format));
            }
        }
        Ok(None)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the format readers, chosen at open time.
pub enum AnyReader<R> {
    /// Program stream.
    ProgramStream(PsReader<R>),
    /// Raw TrueHD/MLP.
    TrueHd(TrueHdReader<R>),
    /// Raw DTS.
    Dts(DtsReader<R>),
    /// Raw AC-3.
    Ac3(Ac3Reader<R>),
}

macro_rules! dispatch {
    ($self:expr, $reader:ident => $body:expr) => {
        match $self {
            AnyReader::ProgramStream($reader) => $body,
            AnyReader::TrueHd($reader) => $body,
            AnyReader::Dts($reader) => $body,
            AnyReader::Ac3($reader) => $body,
        }
    };
}

impl<R> AnyReader<R> {
    /// Format of the open reader.
    pub fn format(&self) -> Format {
        match self {
            AnyReader::ProgramStream(_) => Format::ProgramStream,
            AnyReader::TrueHd(_) => Format::TrueHd,
            AnyReader::Dts(_) => Format::Dts,
            AnyReader::Ac3(_) => Format::Ac3,
        }
    }
}

impl<R: ByteSource> AnyReader<R> {
    /// Open `source` with the reader of an already known format.
    pub fn open_as(format: Format, source: R) -> Result<Self> {
        let reader = match format {
            Format::ProgramStream => AnyReader::ProgramStream(PsReader::open(source)?),
            Format::TrueHd => AnyReader::TrueHd(TrueHdReader::open(source)?),
            Format::Dts => AnyReader::Dts(DtsReader::open(source)?),
            Format::Ac3 => AnyReader::Ac3(Ac3Reader::open(source)?),
        };
        info!(
            format = format.name(),
            tracks = reader.tracks().len(),
            "opened input"
        );
        Ok(reader)
    }
}

impl<R: ByteSource> Reader<R> for AnyReader<R> {
    fn probe(source: &mut R, size: u64) -> bool {
        Format::PROBE_ORDER
            .iter()
            .any(|format| format.matches(source, size))
    }

    fn open(mut source: R) -> Result<Self> {
        match Format::detect(&mut source)? {
            Some(format) => Self::open_as(format, source),
            None => Err(Error::Open("unsupported or unrecognized input format".into())),
        }
    }

    fn format_name(&self) -> String {
        dispatch!(self, r => r.format_name())
    }

    fn tracks(&self) -> &[TrackDescriptor] {
        dispatch!(self, r => r.tracks())
    }

    fn attach_sink(&mut self, track: usize, sink: Box<dyn PacketSink>) -> Result<()> {
        dispatch!(self, r => r.attach_sink(track, sink))
    }

    fn read(&mut self) -> Result<ReadStatus> {
        dispatch!(self, r => r.read())
    }

    fn finish(&mut self) -> Result<ReadStatus> {
        dispatch!(self, r => r.finish())
    }
}

impl<R> fmt::Debug for AnyReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyReader").field("format", &self.format()).finish()
    }
}

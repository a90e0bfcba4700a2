//! Human-readable summary of an opened input.

use std::fmt;

use demux_core::{ByteSource, Reader, TrackDescriptor, TrackKind};

use crate::format::{AnyReader, Format};

/// One track line of an [`Identification`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackSummary {
    /// Track number.
    pub number: usize,
    /// Kind of track.
    pub kind: TrackKind,
    /// Codec name.
    pub codec: String,
    /// `key:value` properties.
    pub properties: Vec<String>,
}

/// What an input contains: the container and its tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identification {
    /// Name of the input.
    pub source: String,
    /// Container description.
    pub container: String,
    /// Tracks in track number order.
    pub tracks: Vec<TrackSummary>,
}

fn summarize(track: &TrackDescriptor, with_stream_id: bool) -> TrackSummary {
    let mut properties = Vec::new();
    if with_stream_id {
        properties.push(format!("stream_id:{:#x}", track.id));
    }
    if let Some(video) = track.video() {
        if video.display_width > 0 && video.display_height > 0 {
            properties.push(format!(
                "display_dimensions:{}x{}",
                video.display_width, video.display_height
            ));
        }
    }
    TrackSummary {
        number: track.number,
        kind: track.kind,
        codec: track.codec.name().to_string(),
        properties,
    }
}

impl<R: ByteSource> AnyReader<R> {
    /// Summarize the container and the discovered tracks. `source` names
    /// the input in the first line.
    pub fn identify(&self, source: &str) -> Identification {
        let with_stream_id = self.format() == Format::ProgramStream;
        Identification {
            source: source.to_string(),
            container: self.format_name(),
            tracks: self
                .tracks()
                .iter()
                .map(|track| summarize(track, with_stream_id))
                .collect(),
        }
    }
}

impl fmt::Display for TrackSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Track {}: {} ({})", self.number, self.kind, self.codec)?;
        if !self.properties.is_empty() {
            write!(f, " [{}]", self.properties.join(" "))?;
        }
        Ok(())
    }
}

impl fmt::Display for Identification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File '{}': container: {}", self.source, self.container)?;
        for track in &self.tracks {
            write!(f, "\n{}", track)?;
        }
        Ok(())
    }
}

//! # Demux
//!
//! Demultiplexing of MPEG program streams and raw AC-3, DTS and TrueHD
//! files into timestamped packets.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use demux::prelude::*;
//!
//! fn main() -> demux::Result<()> {
//!     let mut reader = demux::open_file("movie.vob")?;
//!     println!("{}", reader.identify("movie.vob"));
//!
//!     let queue = PacketQueue::new();
//!     reader.attach_sink(0, Box::new(queue.clone()))?;
//!     while reader.read()? == ReadStatus::MoreData {
//!         for packet in queue.drain() {
//!             println!("{:?}", packet.timecode);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several crates:
//! - `demux-core`: byte sources, packets, tracks and the reader contract
//! - `demux-ps`: the MPEG-1/2 program stream demultiplexer
//! - `demux-ac3`, `demux-dts`: raw AC-3, DTS and TrueHD readers
//! - `demux-timecode`: external timecode files
//! - `demux-packetizer`: displacement, speed and keyframe policy
//!
//! This crate re-exports the commonly used types, detects the input format
//! and dispatches to the matching reader through [`AnyReader`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod format;
pub mod identify;
pub mod prelude;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// Re-export core types
pub use demux_core::{
    error::{BitstreamError, Error, Result},
    ByteSource, Codec, CodecParams, Linear, Packet, PacketFlags, PacketQueue, PacketSink,
    RawConfig, ReadStatus, Reader, TrackDescriptor, TrackKind,
};

// Re-export readers
pub use demux_ac3::Ac3Reader;
pub use demux_dts::{DtsReader, TrueHdReader};
pub use demux_ps::{PsConfig, PsReader};

// Re-export timing
pub use demux_packetizer::{Packetizer, SyncConfig, SyncError};
pub use demux_timecode::{NextTimecode, TimecodeError, TimecodeFactory};

pub use format::{AnyReader, Format};
pub use identify::{Identification, TrackSummary};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Open `source`, detect its format and discover its tracks.
pub fn open<R: ByteSource>(source: R) -> Result<AnyReader<R>> {
    AnyReader::open(source)
}

/// Open a file by path.
pub fn open_file(path: impl AsRef<Path>) -> Result<AnyReader<BufReader<File>>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| Error::Open(format!("{}: {}", path.display(), e)))?;
    open(BufReader::new(file))
}

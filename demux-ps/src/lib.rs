//! # demux-ps
//!
//! MPEG-1 and MPEG-2 Program Stream demultiplexer.
//!
//! Opening a stream walks pack headers, system headers and program stream
//! maps, and classifies every elementary stream found in the first
//! megabyte:
//!
//! - MPEG-1/2 video (sequence header and extensions)
//! - AVC/H.264 (SPS and PPS, exported as an `avcC` record)
//! - VC-1 advanced profile
//! - MPEG audio layers 1-3
//! - AC-3, E-AC-3 and DTS carried in private stream 1
//!
//! Streams that cannot be identified are blacklisted and skipped. Timestamps
//! are shifted so that the earliest stream starts at zero.
//!
//! ## Example
//!
//! ```no_run
//! use std::fs::File;
//! use demux_core::Reader;
//! use demux_ps::{PsConfig, PsReader};
//!
//! let file = File::open("dvd.vob").unwrap();
//! let reader = PsReader::open_with_config(file, PsConfig::default().with_coalescing(false)).unwrap();
//! for track in reader.tracks() {
//!     println!("{}: {} {}", track.number, track.kind, track.codec);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod config;
pub mod demuxer;
pub mod error;
pub mod navigator;
pub mod pes;
pub mod psm;
pub mod registry;

pub use classify::{probe_for, StreamProbe, TrackInfo};
pub use config::{PsConfig, PS_PROBE_SIZE};
pub use demuxer::PsReader;
pub use error::{PsError, Result};
pub use navigator::{is_start_code, Navigator, PacketStart};
pub use pes::{parse_packet, ParsedPes, PesPacket, StreamId};
pub use psm::ProgramStreamMap;
pub use registry::{CoalesceBuffer, Registry};

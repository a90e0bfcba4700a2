//! # demux-core
//!
//! Core types shared by the demux readers:
//!
//! - [`ByteSource`]: big-endian reads and relative seeks over `Read + Seek`
//! - [`BitReader`] / [`BitWriter`]: bit-level header access
//! - [`Packet`]: an owned payload with nanosecond timing
//! - [`TrackDescriptor`]: what a reader discovered
//! - [`Reader`] and [`PacketSink`]: the pull-based demultiplexer contract
//!
//! All times are nanoseconds in an `i64`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitstream;
pub mod config;
pub mod error;
pub mod framing;
pub mod packet;
pub mod reader;
pub mod source;
pub mod timestamp;
pub mod track;

pub use bitstream::{BitReader, BitWriter};
pub use config::RawConfig;
pub use error::{BitstreamError, Error, Result};
pub use framing::{FrameAssembler, Scan};
pub use packet::{Packet, PacketFlags};
pub use reader::{PacketQueue, PacketSink, ReadStatus, Reader, SinkTable};
pub use source::ByteSource;
pub use timestamp::Linear;
pub use track::{AudioParams, Codec, CodecParams, TrackDescriptor, TrackKind, VideoParams};

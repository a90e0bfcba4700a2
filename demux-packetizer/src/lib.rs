//! # demux-packetizer
//!
//! Timestamp synchronization for demultiplexed packets.
//!
//! A [`Packetizer`] sits between a reader and the final [`PacketSink`]. It
//! fills in missing timecodes, substitutes external timecodes, applies a
//! per-track displacement and a linear speed factor, and enforces the
//! keyframe policy after leading frames were dropped.
//!
//! ## Example
//!
//! ```rust
//! use demux_core::{Packet, PacketQueue, PacketSink};
//! use demux_packetizer::{Packetizer, SyncConfig};
//!
//! let queue = PacketQueue::new();
//! let config: SyncConfig = "-40,1/1".parse().unwrap();
//! let mut packetizer = Packetizer::new(config, queue.clone());
//!
//! for i in 0..3 {
//!     let frame = Packet::new(vec![0; 8])
//!         .with_timecode(Some(i * 40_000_000))
//!         .with_duration(Some(40_000_000));
//!     packetizer.process(frame).unwrap();
//! }
//!
//! // The first frame was dropped, the rest moved 40 ms earlier.
//! let timecodes: Vec<_> = queue.drain().into_iter().map(|p| p.timecode).collect();
//! assert_eq!(timecodes, vec![Some(0), Some(40_000_000)]);
//! ```
//!
//! [`PacketSink`]: demux_core::PacketSink

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod sync;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use sync::{Packetizer, SyncStats};

//! External timecode files for demuxed tracks.
//!
//! A timecode file replaces the timestamps found in the container with a
//! user-supplied schedule. Three formats are understood, selected by the
//! first line of the file:
//!
//! - **v1**: `Assume <fps>` followed by `<start>,<end>,<fps>` frame ranges
//! - **v2**: one timestamp in milliseconds per frame
//! - **v3**: `Assume <fps>` followed by `<seconds>[,<fps>]` durations and
//!   `gap,<seconds>` entries
//!
//! # Quick Start
//!
//! ```rust
//! use std::io::Cursor;
//! use demux_timecode::TimecodeFactory;
//!
//! let schedule = "# timecode format v1\nAssume 25\n0,9,30\n";
//! let mut factory = TimecodeFactory::from_reader(Cursor::new(schedule), "inline").unwrap();
//!
//! let first = factory.get_next(None, false);
//! assert_eq!(first.timecode, 0);
//! assert_eq!(first.duration, Some(33_333_333));
//! ```
//!
//! Lines that cannot be used are reported through `tracing` with their line
//! number and skipped. Structural problems (missing header, unsupported
//! version, missing `Assume` line) are returned as [`TimecodeError`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod factory;
pub mod parse;
pub mod v1;
pub mod v2;
pub mod v3;

pub use error::{Result, TimecodeError};
pub use factory::{NextTimecode, TimecodeFactory};
pub use v1::{TimecodeRange, V1Schedule};
pub use v2::V2Schedule;
pub use v3::{DurationEntry, V3Schedule};

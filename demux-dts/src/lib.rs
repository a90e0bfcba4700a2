//! # demux-dts
//!
//! DTS and Dolby TrueHD/MLP frame synchronization and raw stream readers.
//!
//! ## Supported layouts
//!
//! - **DTS core** in its native 16-bit big-endian layout
//! - **DTS 14-bit** ("padded") layout, where every 16-bit word carries 14
//!   payload bits, and byte-swapped (little-endian) variants of both
//! - **DTS-HD** substreams following a core frame (passed through with it)
//! - **TrueHD / MLP** access units, including AC-3 frames interleaved in the
//!   same stream (exposed as a second track)
//!
//! ## Example
//!
//! ```rust
//! use demux_dts::repack::{dts_14_to_16, dts_16_to_14};
//!
//! let native = vec![0x7F, 0xFE, 0x80, 0x01, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0, 0x11, 0x22];
//! let padded = dts_16_to_14(&native);
//! assert_eq!(padded.len(), 16);
//! assert_eq!(dts_14_to_16(&padded), native);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod header;
pub mod id3;
pub mod reader;
pub mod repack;
pub mod truehd;
pub mod truehd_reader;

pub use header::{find_header, DtsHeader};
pub use reader::DtsReader;
pub use repack::DtsTransform;
pub use truehd::{TrueHdFrame, TrueHdFrameKind, TrueHdParser};
pub use truehd_reader::TrueHdReader;

use thiserror::Error;

/// DTS sync word (big endian, 16-bit layout).
pub const DTS_SYNC_WORD_BE: u32 = 0x7FFE_8001;

/// DTS sync word as it appears in byte-swapped 16-bit streams.
pub const DTS_SYNC_WORD_LE: u32 = 0xFE7F_0180;

/// DTS-HD substream sync word.
pub const DTS_HD_SYNC: u32 = 0x6458_2025;

/// TrueHD major sync word.
pub const TRUEHD_SYNC: u32 = 0xF872_6FBA;

/// MLP major sync word.
pub const MLP_SYNC: u32 = 0xF872_6FBB;

/// DTS/TrueHD error types.
#[derive(Error, Debug)]
pub enum DtsError {
    /// Invalid sync word.
    #[error("Invalid sync word: expected DTS or TrueHD sync, got {0:#010x}")]
    InvalidSyncWord(u32),

    /// Invalid frame header.
    #[error("Invalid frame header: {0}")]
    InvalidHeader(String),

    /// Unsupported sample rate code.
    #[error("Unsupported sample rate code: {0}")]
    UnsupportedSampleRate(u8),

    /// Insufficient data.
    #[error("Insufficient data: need {needed} bytes, have {available}")]
    InsufficientData {
        /// Bytes needed.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// Header fields ran past the available bits.
    #[error("Bitstream error: {0}")]
    Bitstream(#[from] demux_core::Error),
}

impl DtsError {
    /// Create an invalid header error.
    pub fn invalid_header(msg: impl Into<String>) -> Self {
        DtsError::InvalidHeader(msg.into())
    }
}

impl From<DtsError> for demux_core::Error {
    fn from(err: DtsError) -> Self {
        match err {
            DtsError::Bitstream(inner) => inner,
            other => demux_core::Error::HeaderParsing(other.to_string()),
        }
    }
}

/// Result type for DTS operations.
pub type Result<T> = std::result::Result<T, DtsError>;

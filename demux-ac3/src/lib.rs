//! # demux-ac3
//!
//! AC-3 (Dolby Digital) and E-AC-3 frame synchronization, plus a reader for
//! raw AC-3 elementary stream files.
//!
//! The header synchronizer is shared with the other readers: the MPEG PS
//! demultiplexer uses it to classify private stream 1 sub-streams and the
//! TrueHD reader uses it to find embedded AC-3 cores.
//!
//! ## Example
//!
//! ```rust
//! use demux_ac3::{find_header, Ac3Header};
//!
//! let data = [0u8; 16];
//! assert!(find_header(&data).is_none());
//! assert!(Ac3Header::parse(&data).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod header;
pub mod reader;

pub use header::{find_consecutive_headers, find_header, find_sync, Ac3Header};
pub use reader::Ac3Reader;

use thiserror::Error;

/// AC-3 sync word.
pub const AC3_SYNC_WORD: u16 = 0x0B77;

/// AC-3 error types.
#[derive(Error, Debug)]
pub enum Ac3Error {
    /// Invalid sync word in bitstream.
    #[error("Invalid sync word: expected 0x0B77, got {0:#06x}")]
    InvalidSyncWord(u16),

    /// Invalid bitstream ID.
    #[error("Invalid bitstream ID: {0}")]
    InvalidBsid(u8),

    /// Unsupported sample rate.
    #[error("Unsupported sample rate code: {0}")]
    UnsupportedSampleRate(u8),

    /// Unsupported frame size.
    #[error("Unsupported frame size code: {0}")]
    UnsupportedFrameSize(u8),

    /// Bitstream corruption detected.
    #[error("Bitstream corruption: {0}")]
    BitstreamCorruption(String),

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

impl From<Ac3Error> for demux_core::Error {
    fn from(err: Ac3Error) -> Self {
        match err {
            Ac3Error::Bitstream(inner) => inner,
            other => demux_core::Error::HeaderParsing(other.to_string()),
        }
    }
}

/// Result type for AC-3 operations.
pub type Result<T> = std::result::Result<T, Ac3Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Ac3Error::InvalidSyncWord(0x1234);
        assert_eq!(err.to_string(), "Invalid sync word: expected 0x0B77, got 0x1234");
    }

    #[test]
    fn test_conversion_to_core_error() {
        let core: demux_core::Error = Ac3Error::InvalidBsid(20).into();
        assert!(matches!(core, demux_core::Error::HeaderParsing(_)));
    }
}

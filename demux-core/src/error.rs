//! Error types shared by every reader in the workspace.
//!
//! Expected negatives (a probe that does not match, a single corrupt packet
//! that is skipped) are not errors; they surface as `bool`, `Option` or
//! [`ReadStatus`](crate::reader::ReadStatus) values. Everything in here ends
//! the operation that produced it.

use thiserror::Error;

/// Main error type for the demux workspace.
#[derive(Error, Debug)]
pub enum Error {
    /// The format was recognised but its headers are malformed.
    #[error("Header parsing failed: {0}")]
    HeaderParsing(String),

    /// The byte source could not be opened or is unusable.
    #[error("Open failed: {0}")]
    Open(String),

    /// Invalid or unsupported configuration (e.g. a timecode file version).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Synchronization was lost and could not be recovered.
    #[error("Unrecoverable stream corruption at offset {offset}: {message}")]
    Corruption {
        /// Byte offset where the corruption was detected.
        offset: u64,
        /// What went wrong.
        message: String,
    },

    /// The stream uses a feature that cannot be demultiplexed.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A track number that the reader does not know.
    #[error("Track {0} not found")]
    TrackNotFound(usize),

    /// Bitstream parsing errors.
    #[error("Bitstream error: {0}")]
    Bitstream(#[from] BitstreamError),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bit-level parsing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BitstreamError {
    /// Unexpected end of bitstream.
    #[error("Unexpected end of bitstream")]
    UnexpectedEnd,

    /// Invalid syntax element value.
    #[error("Invalid syntax element: {element} = {value}")]
    InvalidSyntax {
        /// Name of the element.
        element: String,
        /// Value that was read.
        value: i64,
    },

    /// Exp-Golomb decoding error.
    #[error("Exp-Golomb decoding error: value too large")]
    ExpGolombOverflow,

    /// More bits requested than a single read can return.
    #[error("Cannot read {0} bits at once")]
    TooManyBits(u8),
}

impl Error {
    /// Create a header parsing error.
    pub fn header(msg: impl Into<String>) -> Self {
        Error::HeaderParsing(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an unsupported feature error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create an unrecoverable corruption error.
    pub fn corruption(offset: u64, msg: impl Into<String>) -> Self {
        Error::Corruption {
            offset,
            message: msg.into(),
        }
    }

    /// Check if this error only signals the end of the input.
    pub fn is_eof(&self) -> bool {
        match self {
            Error::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            Error::Bitstream(BitstreamError::UnexpectedEnd) => true,
            _ => false,
        }
    }

    /// Check if this error aborts the whole run rather than one track.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::Unsupported(_) | Error::Open(_)
        )
    }
}

/// Result type for demux operations.
pub type Result<T> = std::result::Result<T, Error>;

//! MPEG Program Stream error types.

use std::io;

use thiserror::Error;

/// MPEG-PS specific errors.
#[derive(Error, Debug)]
pub enum PsError {
    /// The first four bytes are not a pack start code.
    #[error("Not an MPEG program stream: expected pack start code, got 0x{0:08X}")]
    NotProgramStream(u32),

    /// A PES packet with scrambling control bits set.
    #[error("Reading encrypted VOBs is not supported (scrambled PES packet at offset {offset})")]
    Scrambled {
        /// Offset of the packet start code.
        offset: u64,
    },

    /// An elementary stream could not be identified from its first packets.
    #[error("Stream 0x{id:04X} cannot be demultiplexed: {reason}")]
    Classification {
        /// Container id (`256 + sub id` for private stream 1).
        id: u16,
        /// What was missing or invalid.
        reason: String,
    },

    /// Invalid program stream map.
    #[error("Invalid program stream map: {0}")]
    InvalidPsm(String),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PsError {
    /// Create a classification error.
    pub fn classification(id: u16, reason: impl Into<String>) -> Self {
        PsError::Classification {
            id,
            reason: reason.into(),
        }
    }

    /// Whether the error ends the session rather than one stream.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PsError::Scrambled { .. } | PsError::NotProgramStream(_))
    }
}

impl From<PsError> for demux_core::Error {
    fn from(err: PsError) -> Self {
        match err {
            PsError::Io(e) => demux_core::Error::Io(e),
            PsError::Scrambled { .. } => demux_core::Error::Unsupported(err.to_string()),
            PsError::NotProgramStream(_) => demux_core::Error::Open(err.to_string()),
            other => demux_core::Error::HeaderParsing(other.to_string()),
        }
    }
}

/// Result type for MPEG-PS operations.
pub type Result<T> = std::result::Result<T, PsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrambled_is_fatal_and_unsupported() {
        let err = PsError::Scrambled { offset: 2048 };
        assert!(err.is_fatal());
        let core: demux_core::Error = err.into();
        assert!(matches!(core, demux_core::Error::Unsupported(_)));
        assert!(core.is_fatal());
    }

    #[test]
    fn test_classification_is_not_fatal() {
        let err = PsError::classification(0x180, "no AC-3 header");
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Stream 0x0180 cannot be demultiplexed: no AC-3 header"
        );
    }
}

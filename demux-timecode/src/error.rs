//! Error types for timecode schedule files.

use std::io;

use thiserror::Error;

/// Result type for timecode schedule operations.
pub type Result<T> = std::result::Result<T, TimecodeError>;

/// Structural problems with a timecode file.
///
/// Malformed individual lines are not errors; they are logged and skipped.
#[derive(Debug, Error)]
pub enum TimecodeError {
    /// The file could not be opened.
    #[error("The timecode file '{name}' could not be opened for reading: {error}")]
    Open {
        /// File name.
        name: String,
        /// Underlying error.
        error: io::Error,
    },

    /// The first line is not a `# timecode format vN` header.
    #[error(
        "The timecode file '{name}' contains an unsupported/unrecognized format line. \
         The very first line must look like '# timecode format v1'"
    )]
    UnrecognizedFormat {
        /// Source name.
        name: String,
    },

    /// The header names a version other than 1, 2 or 3.
    #[error("The timecode file '{name}' contains an unsupported/unrecognized format (version {version})")]
    UnsupportedVersion {
        /// Source name.
        name: String,
        /// Version from the header.
        version: i64,
    },

    /// v1 and v3 files need an `Assume <fps>` line. v1 needs a positive
    /// rate, v3 also accepts zero.
    #[error("The timecode file '{name}' does not contain a valid 'Assume' line with the default number of frames per second")]
    MissingAssume {
        /// Source name.
        name: String,
    },

    /// No usable entry was found.
    #[error("The timecode file '{name}' does not contain any valid entry")]
    NoEntries {
        /// Source name.
        name: String,
    },

    /// I/O errors while reading lines.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TimecodeError {
    /// Whether the error came from the file contents rather than I/O.
    pub fn is_format_error(&self) -> bool {
        !matches!(self, TimecodeError::Open { .. } | TimecodeError::Io(_))
    }
}

impl From<TimecodeError> for demux_core::Error {
    fn from(err: TimecodeError) -> Self {
        match err {
            TimecodeError::Io(e) => demux_core::Error::Io(e),
            TimecodeError::Open { .. } => demux_core::Error::Open(err.to_string()),
            other => demux_core::Error::Config(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion() {
        let err = TimecodeError::UnsupportedVersion {
            name: "tc.txt".into(),
            version: 7,
        };
        assert!(err.is_format_error());
        assert!(err.to_string().contains("version 7"));
        assert!(matches!(
            demux_core::Error::from(err),
            demux_core::Error::Config(_)
        ));
    }
}

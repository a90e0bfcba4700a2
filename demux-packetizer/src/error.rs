//! Error types for sync configuration.

use thiserror::Error;

/// Result type for sync configuration.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Invalid sync settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The sync argument does not have the `d[,o[/p]]` shape.
    #[error("Invalid sync argument '{0}': expected 'displacement[,numerator[/denominator]]'")]
    InvalidSyntax(String),

    /// The linear factor has a zero or negative part.
    #[error("Invalid linear factor {num}/{den}: both parts must be positive")]
    InvalidLinear {
        /// Numerator.
        num: i64,
        /// Denominator.
        den: i64,
    },
}

impl SyncError {
    /// Create a syntax error for `arg`.
    pub fn syntax(arg: impl Into<String>) -> Self {
        SyncError::InvalidSyntax(arg.into())
    }
}

impl From<SyncError> for demux_core::Error {
    fn from(err: SyncError) -> Self {
        demux_core::Error::Config(err.to_string())
    }
}

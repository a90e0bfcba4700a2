//! Reader configuration shared by the raw elementary stream readers.

/// Configuration for raw AC-3, DTS and TrueHD readers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawConfig {
    /// Bytes pulled from the source per `read()` call.
    pub chunk_size: usize,
}

impl RawConfig {
    /// Create a configuration with the given chunk size.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Set the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl Default for RawConfig {
    fn default() -> Self {
        Self::new(16 * 1024)
    }
}

//! Program stream reader configuration.

/// Default discovery window (1 MiB).
pub const PS_PROBE_SIZE: u64 = 1024 * 1024;

/// Configuration for [`PsReader`](crate::PsReader).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PsConfig {
    /// Stream discovery stops once the read position passes this offset.
    pub probe_window: u64,
    /// Whether video payloads are coalesced into larger packets.
    pub coalesce: bool,
    /// Whether packets carry container timestamps. When disabled the
    /// packetizer derives timecodes from durations and the per-track offset.
    pub provide_timecodes: bool,
}

impl PsConfig {
    /// Set the discovery window.
    pub fn with_probe_window(mut self, bytes: u64) -> Self {
        self.probe_window = bytes;
        self
    }

    /// Enable or disable payload coalescing.
    pub fn with_coalescing(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    /// Enable or disable container timestamps on packets.
    pub fn with_timecodes(mut self, provide: bool) -> Self {
        self.provide_timecodes = provide;
        self
    }
}

impl Default for PsConfig {
    fn default() -> Self {
        Self {
            probe_window: PS_PROBE_SIZE,
            coalesce: true,
            provide_timecodes: true,
        }
    }
}

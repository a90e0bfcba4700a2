//! Per-track synchronization settings.

use std::str::FromStr;

use demux_core::timestamp::NS_PER_MS;
use demux_core::Linear;
use demux_timecode::TimecodeFactory;

use crate::error::{Result, SyncError};

/// How a track's timestamps are shifted and scaled before they reach the
/// sink.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncConfig {
    /// Time shift in nanoseconds. Negative values drop leading frames,
    /// positive values repeat them.
    pub displacement: i64,
    /// Speed factor applied after the shift.
    pub linear: Linear,
    /// External timecodes replacing the container timestamps.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub timecodes: Option<TimecodeFactory>,
    /// Whether the track carries video.
    pub is_video: bool,
}

impl SyncConfig {
    /// Settings that leave timestamps untouched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the displacement in nanoseconds.
    pub fn with_displacement(mut self, displacement: i64) -> Self {
        self.displacement = displacement;
        self
    }

    /// Set the linear factor `num / den`.
    pub fn with_linear(mut self, num: i64, den: i64) -> Result<Self> {
        self.linear = Linear::new(num, den).ok_or(SyncError::InvalidLinear { num, den })?;
        Ok(self)
    }

    /// Attach external timecodes.
    pub fn with_timecodes(mut self, factory: TimecodeFactory) -> Self {
        self.timecodes = Some(factory);
        self
    }

    /// Mark the track as video.
    pub fn video(mut self, is_video: bool) -> Self {
        self.is_video = is_video;
        self
    }
}

/// Parses `d[,o[/p]]`: a displacement in milliseconds, optionally followed
/// by a linear factor `o/p` (`p` defaults to 1).
impl FromStr for SyncConfig {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (displacement, linear) = match s.split_once(',') {
            Some((d, l)) => (d.trim(), Some(l.trim())),
            None => (s, None),
        };

        let ms: f64 = displacement
            .parse()
            .map_err(|_| SyncError::syntax(s))?;
        let config = SyncConfig::new().with_displacement((ms * NS_PER_MS as f64).round() as i64);

        let Some(linear) = linear else {
            return Ok(config);
        };
        let (num, den) = match linear.split_once('/') {
            Some((num, den)) => (num.trim(), den.trim()),
            None => (linear, "1"),
        };
        let num: i64 = num.parse().map_err(|_| SyncError::syntax(s))?;
        let den: i64 = den.parse().map_err(|_| SyncError::syntax(s))?;
        config.with_linear(num, den)
    }
}

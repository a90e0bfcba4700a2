//! Timestamp arithmetic.
//!
//! Every instant and duration inside the workspace is a signed 64-bit count
//! of nanoseconds. Unknown values are `None` in the Rust API; the legacy
//! `-1` sentinel only appears at the conversion helpers below.

/// Nanoseconds per second.
pub const NS_PER_SEC: i64 = 1_000_000_000;

/// Nanoseconds per millisecond.
pub const NS_PER_MS: i64 = 1_000_000;

/// MPEG system clock ticks per second (PTS/DTS resolution).
pub const MPEG_TICKS_PER_SEC: i64 = 90_000;

/// The legacy "unknown" sentinel.
pub const UNKNOWN: i64 = -1;

/// Convert 90 kHz PTS/DTS ticks to nanoseconds.
///
/// Uses `ticks * 100000 / 9`, which is exact for every 33-bit tick value.
pub fn mpeg_ticks_to_ns(ticks: u64) -> i64 {
    (ticks as i64) * 100_000 / 9
}

/// Convert nanoseconds to 90 kHz ticks, truncating.
pub fn ns_to_mpeg_ticks(ns: i64) -> u64 {
    (ns.max(0) * 9 / 100_000) as u64
}

/// Duration of one frame at `fps` frames per second, rounded to the nearest
/// nanosecond. Returns `None` for non-positive or non-finite rates.
pub fn frame_duration_ns(fps: f64) -> Option<i64> {
    if fps.is_finite() && fps > 0.0 {
        Some((1e9 / fps).round() as i64)
    } else {
        None
    }
}

/// Duration of `samples` audio samples at `sample_rate`.
pub fn samples_to_ns(samples: u64, sample_rate: u32) -> Option<i64> {
    if sample_rate == 0 {
        return None;
    }
    Some((samples as i128 * NS_PER_SEC as i128 / sample_rate as i128) as i64)
}

/// Turn an optional timestamp into the legacy `-1` form.
pub fn to_legacy(value: Option<i64>) -> i64 {
    value.unwrap_or(UNKNOWN)
}

/// Read a legacy timestamp, treating every negative value as unknown.
pub fn from_legacy(value: i64) -> Option<i64> {
    (value >= 0).then_some(value)
}

/// A rational speed factor applied to timestamps (`value * num / den`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Linear {
    /// Numerator.
    pub num: i64,
    /// Denominator.
    pub den: i64,
}

impl Linear {
    /// Identity factor.
    pub const IDENTITY: Linear = Linear { num: 1, den: 1 };

    /// Create a new factor. Both parts must be positive.
    pub fn new(num: i64, den: i64) -> Option<Self> {
        (num > 0 && den > 0).then_some(Self { num, den })
    }

    /// Whether this factor leaves values unchanged.
    pub fn is_identity(&self) -> bool {
        self.num == self.den
    }

    /// Scale a nanosecond value, rounding to the nearest nanosecond.
    pub fn apply(&self, value: i64) -> i64 {
        if self.is_identity() {
            return value;
        }
        let scaled = value as i128 * self.num as i128;
        let den = self.den as i128;
        let rounded = if scaled >= 0 {
            (scaled + den / 2) / den
        } else {
            (scaled - den / 2) / den
        };
        rounded as i64
    }
}

impl Default for Linear {
    fn default() -> Self {
        Self::IDENTITY
    }
}

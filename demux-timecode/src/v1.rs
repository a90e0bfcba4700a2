//! Format v1: frame ranges with their own frame rate.
//!
//! ```text
//! # timecode format v1
//! Assume 25
//! 0,99,29.97
//! 500,599,23.976
//! ```
//!
//! Frames outside every listed range run at the assumed rate.

use std::io::BufRead;

use tracing::debug;

use crate::error::{Result, TimecodeError};
use crate::factory::NextTimecode;
use crate::parse::{fields, ScheduleLines};

/// End frame of the trailing open-ended range.
const SENTINEL_END: i64 = 0x0FFF_FFFF_FFFF_FFFF;

/// A run of frames at one frame rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimecodeRange {
    /// First frame (inclusive).
    pub start_frame: i64,
    /// Last frame (inclusive).
    pub end_frame: i64,
    /// Frames per second.
    pub fps: f64,
    /// Timecode of `start_frame` in nanoseconds.
    pub base_timecode: f64,
}

impl TimecodeRange {
    fn new(start_frame: i64, end_frame: i64, fps: f64) -> Self {
        Self {
            start_frame,
            end_frame,
            fps,
            base_timecode: 0.0,
        }
    }

    fn timecode_at(&self, frame: i64) -> i64 {
        (self.base_timecode + 1_000_000_000.0 * (frame as f64 - self.start_frame as f64) / self.fps) as i64
    }
}

/// Parsed v1 schedule.
#[derive(Debug, Clone)]
pub struct V1Schedule {
    ranges: Vec<TimecodeRange>,
    default_fps: f64,
    frame: i64,
}

fn parse_range(line: &str) -> Option<TimecodeRange> {
    let parts = fields(line);
    if parts.len() != 3 {
        return None;
    }
    Some(TimecodeRange::new(
        parts[0].parse().ok()?,
        parts[1].parse().ok()?,
        parts[2].parse().ok()?,
    ))
}

/// Sort, fill gaps and frame-zero start at `default_fps`, append the open
/// sentinel range, then compute base timecodes.
///
/// A range overlapping an earlier one only takes effect after the earlier
/// one ends, so end frames are strictly increasing afterwards.
fn normalize(mut explicit: Vec<TimecodeRange>, default_fps: f64) -> Vec<TimecodeRange> {
    explicit.sort_by_key(|r| r.start_frame);

    let mut ranges = Vec::with_capacity(explicit.len() * 2 + 2);
    let mut max_end: Option<i64> = None;
    for mut range in explicit {
        let free = max_end.map_or(0, |end| end.saturating_add(1));
        if range.end_frame < free {
            debug!(
                start = range.start_frame,
                end = range.end_frame,
                "range covered by an earlier range"
            );
            continue;
        }
        if range.start_frame > free {
            ranges.push(TimecodeRange::new(free, range.start_frame - 1, default_fps));
        }
        range.start_frame = range.start_frame.max(free);
        max_end = Some(range.end_frame);
        ranges.push(range);
    }
    let sentinel_start = max_end.map_or(0, |end| end.saturating_add(1));
    ranges.push(TimecodeRange::new(
        sentinel_start,
        SENTINEL_END.max(sentinel_start),
        default_fps,
    ));

    for i in 1..ranges.len() {
        let prev = ranges[i - 1];
        ranges[i].base_timecode = prev.base_timecode
            + (prev.end_frame as f64 - prev.start_frame as f64 + 1.0) * 1_000_000_000.0 / prev.fps;
    }
    ranges
}

impl V1Schedule {
    /// Parse the lines following the format header.
    pub fn parse<B: BufRead>(lines: &mut ScheduleLines<B>) -> Result<Self> {
        let default_fps = lines.assume_line(false)?;

        let mut explicit = Vec::new();
        while let Some((line_no, line)) = lines.next_entry()? {
            let Some(range) = parse_range(&line) else {
                lines.warn_line(line_no, "line could not be parsed");
                continue;
            };
            if range.fps <= 0.0
                || range.start_frame < 0
                || range.end_frame < 0
                || range.end_frame < range.start_frame
            {
                lines.warn_line(
                    line_no,
                    "inconsistent data (start frame after end frame, or negative values)",
                );
                continue;
            }
            explicit.push(range);
        }

        if explicit.is_empty() {
            return Err(TimecodeError::NoEntries {
                name: lines.name().to_string(),
            });
        }

        let ranges = normalize(explicit, default_fps);
        debug!(
            source = %lines.name(),
            default_fps,
            ranges = ranges.len(),
            "parsed v1 timecodes"
        );
        Ok(Self::from_ranges(ranges, default_fps))
    }

    fn from_ranges(ranges: Vec<TimecodeRange>, default_fps: f64) -> Self {
        Self {
            ranges,
            default_fps,
            frame: 0,
        }
    }

    /// Frame rate assumed outside the listed ranges.
    pub fn default_fps(&self) -> f64 {
        self.default_fps
    }

    /// Normalized ranges, sentinel included.
    pub fn ranges(&self) -> &[TimecodeRange] {
        &self.ranges
    }

    fn range_for(&self, frame: i64) -> &TimecodeRange {
        let index = self
            .ranges
            .partition_point(|r| r.end_frame < frame)
            .min(self.ranges.len() - 1);
        &self.ranges[index]
    }

    /// Timecode of `frame` in nanoseconds.
    pub fn timecode_at(&self, frame: i64) -> i64 {
        self.range_for(frame).timecode_at(frame)
    }

    /// Pull the timecode and duration of the next frame.
    pub fn get_next(&mut self, peek_only: bool) -> NextTimecode {
        let frame = self.frame;
        let timecode = self.timecode_at(frame);
        let duration = self.timecode_at(frame.saturating_add(1)).saturating_sub(timecode);
        if !peek_only {
            self.frame = self.frame.saturating_add(1);
        }
        NextTimecode {
            timecode,
            duration: Some(duration),
            new_segment: self.range_for(frame).start_frame == frame,
        }
    }
}

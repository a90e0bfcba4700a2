//! Format v3: durations in seconds, optionally with their own frame rate,
//! interleaved with gaps.
//!
//! ```text
//! # timecode format v3
//! Assume 25
//! 10.0
//! gap,2.5
//! 5.0,29.97
//! ```

use std::io::BufRead;

use tracing::debug;

use crate::error::{Result, TimecodeError};
use crate::factory::NextTimecode;
use crate::parse::{fields, ScheduleLines};

/// Duration of the trailing open-ended entry.
const SENTINEL_DURATION: i64 = 0x0FFF_FFFF_FFFF_FFFF;

/// One line of a v3 schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationEntry {
    /// Length of the entry in nanoseconds.
    pub duration: i64,
    /// Frame rate inside the entry. Zero keeps the caller's durations.
    pub fps: f64,
    /// Time with no frames.
    pub is_gap: bool,
}

/// Parsed v3 schedule.
#[derive(Debug, Clone)]
pub struct V3Schedule {
    entries: Vec<DurationEntry>,
    default_fps: f64,
    index: usize,
    position: i64,
    offset: i64,
}

fn seconds_to_ns(seconds: f64) -> i64 {
    (1_000_000_000.0 * seconds) as i64
}

fn parse_entry(line: &str, default_fps: f64) -> Option<DurationEntry> {
    let parts = fields(line);
    if parts.len() == 2 && parts[0].eq_ignore_ascii_case("gap") {
        return Some(DurationEntry {
            duration: seconds_to_ns(parts[1].parse().ok()?),
            fps: default_fps,
            is_gap: true,
        });
    }

    let seconds: f64 = parts[0].parse().ok()?;
    let fps = match parts.len() {
        1 => default_fps,
        2 => parts[1].parse().ok()?,
        _ => return None,
    };
    Some(DurationEntry {
        duration: seconds_to_ns(seconds),
        fps,
        is_gap: false,
    })
}

impl V3Schedule {
    /// Parse the lines following the format header.
    pub fn parse<B: BufRead>(lines: &mut ScheduleLines<B>) -> Result<Self> {
        let default_fps = lines.assume_line(true)?;

        let mut entries = Vec::new();
        while let Some((line_no, line)) = lines.next_entry()? {
            let Some(entry) = parse_entry(&line, default_fps) else {
                lines.warn_line(line_no, "line could not be parsed");
                continue;
            };
            if entry.fps < 0.0 || entry.duration <= 0 {
                lines.warn_line(
                    line_no,
                    "inconsistent data (the duration or the FPS are smaller than zero)",
                );
                continue;
            }
            entries.push(entry);
        }

        if entries.is_empty() {
            return Err(TimecodeError::NoEntries {
                name: lines.name().to_string(),
            });
        }

        debug!(
            source = %lines.name(),
            default_fps,
            entries = entries.len(),
            gaps = entries.iter().filter(|e| e.is_gap).count(),
            "parsed v3 timecodes"
        );
        Ok(Self::from_entries(entries, default_fps))
    }

    /// Build a schedule from explicit entries. The open-ended entry at
    /// `default_fps` is appended.
    pub fn from_entries(mut entries: Vec<DurationEntry>, default_fps: f64) -> Self {
        entries.push(DurationEntry {
            duration: SENTINEL_DURATION,
            fps: default_fps,
            is_gap: false,
        });
        Self {
            entries,
            default_fps,
            index: 0,
            position: 0,
            offset: 0,
        }
    }

    /// Frame rate from the `Assume` line.
    pub fn default_fps(&self) -> f64 {
        self.default_fps
    }

    /// Entries, sentinel included.
    pub fn entries(&self) -> &[DurationEntry] {
        &self.entries
    }

    /// Pull the timecode and duration of the next frame.
    ///
    /// `caller_duration` is returned unchanged for entries with a zero
    /// frame rate. A run of gaps before the frame is resolved into one
    /// offset; with `peek_only` nothing is committed.
    pub fn get_next(&mut self, caller_duration: Option<i64>, peek_only: bool) -> NextTimecode {
        let mut new_segment = self.position == 0;

        let mut index = self.index;
        let mut offset = self.offset;
        while self.entries[index].is_gap {
            offset = offset.saturating_add(self.entries[index].duration);
            index += 1;
            new_segment = true;
        }

        let entry = self.entries[index];
        let duration = if entry.fps != 0.0 {
            Some((1_000_000_000.0 / entry.fps) as i64)
        } else {
            caller_duration
        };
        let timecode = offset.saturating_add(self.position);

        if !peek_only {
            self.index = index;
            self.offset = offset;
            self.position = self.position.saturating_add(duration.unwrap_or(0));
            if self.position >= entry.duration {
                self.offset = self.offset.saturating_add(entry.duration);
                self.position = 0;
                self.index = (self.index + 1).min(self.entries.len() - 1);
            }
        }

        NextTimecode {
            timecode,
            duration,
            new_segment,
        }
    }
}

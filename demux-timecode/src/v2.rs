//! Format v2: one timestamp in milliseconds per frame.

use std::collections::BTreeMap;
use std::io::BufRead;

use tracing::{debug, warn};

use crate::error::Result;
use crate::factory::NextTimecode;
use crate::parse::ScheduleLines;

/// Parsed v2 schedule.
#[derive(Debug, Clone)]
pub struct V2Schedule {
    name: String,
    timecodes: Vec<i64>,
    durations: Vec<i64>,
    default_fps: f64,
    frame: usize,
    warned: bool,
}

fn ms_to_ns(ms: f64) -> i64 {
    (ms * 1_000_000.0).round() as i64
}

/// Most frequent duration, the smallest one on ties. Zero when there is
/// none.
fn most_frequent(durations: &[i64]) -> i64 {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for &d in durations {
        *counts.entry(d).or_default() += 1;
    }
    let mut best: Option<(i64, usize)> = None;
    for (duration, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((duration, count));
        }
    }
    best.map_or(0, |(duration, _)| duration)
}

impl V2Schedule {
    /// Parse the lines following the format header.
    pub fn parse<B: BufRead>(lines: &mut ScheduleLines<B>) -> Result<Self> {
        let mut timecodes = Vec::new();
        while let Some((line_no, line)) = lines.next_entry()? {
            match line.parse::<f64>() {
                Ok(ms) if ms.is_finite() => timecodes.push(ms_to_ns(ms)),
                _ => lines.warn_line(line_no, "line does not contain a valid floating point number"),
            }
        }

        if timecodes.is_empty() {
            warn!(source = %lines.name(), "the timecode file does not contain any valid entry");
        }
        Ok(Self::from_timecodes(lines.name(), timecodes))
    }

    /// Build a schedule from nanosecond timecodes.
    pub fn from_timecodes(name: &str, mut timecodes: Vec<i64>) -> Self {
        timecodes.sort_unstable();

        let mut durations: Vec<i64> = timecodes.windows(2).map(|w| w[1].saturating_sub(w[0])).collect();
        let trailing = most_frequent(&durations);
        durations.push(trailing);

        let default_fps = if trailing > 0 {
            1_000_000_000.0 / trailing as f64
        } else {
            0.0
        };

        debug!(
            source = %name,
            entries = timecodes.len(),
            trailing_duration = trailing,
            default_fps,
            "parsed v2 timecodes"
        );

        Self {
            name: name.to_string(),
            timecodes,
            durations,
            default_fps,
            frame: 0,
            warned: false,
        }
    }

    /// Frame rate implied by the most frequent duration, 0 if unknown.
    pub fn default_fps(&self) -> f64 {
        self.default_fps
    }

    /// Number of timestamps in the file.
    pub fn len(&self) -> usize {
        self.timecodes.len()
    }

    /// Whether the file held no timestamps.
    pub fn is_empty(&self) -> bool {
        self.timecodes.is_empty()
    }

    /// Pull the timecode and duration of the next frame.
    ///
    /// Past the last listed timestamp the trailing duration is used to
    /// extrapolate, after one warning.
    pub fn get_next(&mut self, peek_only: bool) -> NextTimecode {
        let frame = self.frame;
        let next = if let Some(&timecode) = self.timecodes.get(frame) {
            NextTimecode {
                timecode,
                duration: Some(self.durations[frame]),
                new_segment: frame == 0,
            }
        } else {
            if !self.warned {
                warn!(
                    source = %self.name,
                    timecodes = self.timecodes.len(),
                    "the number of external timecodes is smaller than the number of frames in this track"
                );
                self.warned = true;
            }
            let trailing = self.durations.last().copied().unwrap_or(0);
            let last = self.timecodes.last().copied().unwrap_or(0);
            let beyond = (frame + 1 - self.timecodes.len().max(1)) as i64;
            NextTimecode {
                timecode: last.saturating_add(beyond.saturating_mul(trailing)),
                duration: Some(trailing),
                new_segment: frame == 0,
            }
        };

        if !peek_only {
            self.frame += 1;
        }
        next
    }
}

//! Format detection and the per-track timecode source.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, trace};

use crate::error::{Result, TimecodeError};
use crate::parse::{parse_header, ScheduleLines};
use crate::v1::V1Schedule;
use crate::v2::V2Schedule;
use crate::v3::V3Schedule;

/// One pull from a timecode schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NextTimecode {
    /// Timecode in nanoseconds.
    pub timecode: i64,
    /// Duration in nanoseconds, `None` when neither the schedule nor the
    /// caller knows it.
    pub duration: Option<i64>,
    /// The frame opens a new range, entry or follows a gap.
    pub new_segment: bool,
}

/// External timecodes for one track, replacing the container timestamps.
#[derive(Debug, Clone)]
pub enum TimecodeFactory {
    /// Frame ranges with per-range frame rates.
    V1(V1Schedule),
    /// One timestamp per frame.
    V2(V2Schedule),
    /// Durations and gaps.
    V3(V3Schedule),
}

impl TimecodeFactory {
    /// Open and parse a timecode file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = File::open(path).map_err(|error| TimecodeError::Open {
            name: name.clone(),
            error,
        })?;
        Self::from_reader(BufReader::new(file), name)
    }

    /// Parse a timecode schedule from `reader`. `name` is used in
    /// diagnostics.
    pub fn from_reader<B: BufRead>(reader: B, name: impl Into<String>) -> Result<Self> {
        let mut lines = ScheduleLines::new(reader, name);
        let header = lines.raw_line()?;

        let version = match header.as_deref().and_then(parse_header) {
            Some(Ok(version)) => version,
            _ => {
                return Err(TimecodeError::UnrecognizedFormat {
                    name: lines.name().to_string(),
                })
            }
        };

        let factory = match version {
            1 => TimecodeFactory::V1(V1Schedule::parse(&mut lines)?),
            2 => TimecodeFactory::V2(V2Schedule::parse(&mut lines)?),
            3 => TimecodeFactory::V3(V3Schedule::parse(&mut lines)?),
            other => {
                return Err(TimecodeError::UnsupportedVersion {
                    name: lines.name().to_string(),
                    version: other,
                })
            }
        };

        debug!(
            source = %lines.name(),
            version,
            default_fps = factory.default_fps(),
            "loaded external timecodes"
        );
        Ok(factory)
    }

    /// Format version from the header line.
    pub fn version(&self) -> u8 {
        match self {
            TimecodeFactory::V1(_) => 1,
            TimecodeFactory::V2(_) => 2,
            TimecodeFactory::V3(_) => 3,
        }
    }

    /// Default frame rate. For v2 this is implied by the most frequent
    /// frame duration and may be 0.
    pub fn default_fps(&self) -> f64 {
        match self {
            TimecodeFactory::V1(s) => s.default_fps(),
            TimecodeFactory::V2(s) => s.default_fps(),
            TimecodeFactory::V3(s) => s.default_fps(),
        }
    }

    /// Next timecode and duration. The cursor only moves when `peek_only`
    /// is false.
    pub fn get_next(&mut self, caller_duration: Option<i64>, peek_only: bool) -> NextTimecode {
        let next = match self {
            TimecodeFactory::V1(s) => s.get_next(peek_only),
            TimecodeFactory::V2(s) => s.get_next(peek_only),
            TimecodeFactory::V3(s) => s.get_next(caller_duration, peek_only),
        };
        trace!(
            version = self.version(),
            timecode = next.timecode,
            duration = ?next.duration,
            peek_only,
            "external timecode"
        );
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn factory(body: &str) -> Result<TimecodeFactory> {
        TimecodeFactory::from_reader(Cursor::new(body.to_string()), "tc.txt")
    }

    #[test]
    fn test_version_dispatch() {
        assert_eq!(factory("# timecode format v1\nAssume 25\n0,9,30\n").unwrap().version(), 1);
        assert_eq!(factory("# timecode format v2\n0\n40\n").unwrap().version(), 2);
        assert_eq!(factory("# timecode format v3\nassume 25\n1.0\n").unwrap().version(), 3);
    }

    #[test]
    fn test_bad_headers() {
        assert!(matches!(
            factory("Assume 25\n0,9,30\n"),
            Err(TimecodeError::UnrecognizedFormat { .. })
        ));
        assert!(matches!(factory(""), Err(TimecodeError::UnrecognizedFormat { .. })));
        assert!(matches!(
            factory("# timecode format v4\n"),
            Err(TimecodeError::UnsupportedVersion { version: 4, .. })
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let err = TimecodeFactory::open("/nonexistent/timecodes.txt").unwrap_err();
        assert!(matches!(err, TimecodeError::Open { .. }));
        assert!(!err.is_format_error());
    }

    #[test]
    fn test_caller_duration_only_used_by_v3() {
        let mut v2 = factory("# timecode format v2\n0\n40\n").unwrap();
        assert_eq!(v2.get_next(Some(1), false).duration, Some(40_000_000));

        let mut v3 = factory("# timecode format v3\nAssume 25\n1.0,0\n").unwrap();
        assert_eq!(v3.get_next(Some(21_333_333), false).duration, Some(21_333_333));
        assert_eq!(v3.get_next(None, true).duration, None);

        let mut audio = factory("# timecode format v3\nAssume 0\n10.0\ngap,1\n5.0\n").unwrap();
        assert_eq!(audio.default_fps(), 0.0);
        let first = audio.get_next(Some(32_000_000), false);
        assert_eq!((first.timecode, first.duration), (0, Some(32_000_000)));
        assert_eq!(audio.get_next(Some(32_000_000), false).timecode, 32_000_000);

        assert!(matches!(
            factory("# timecode format v1\nAssume 0\n0,9,30\n"),
            Err(TimecodeError::MissingAssume { .. })
        ));
    }
}

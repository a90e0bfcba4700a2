//! Line handling shared by the schedule parsers.

use std::io::BufRead;

use tracing::warn;

use crate::error::{Result, TimecodeError};

const BOM: char = '\u{FEFF}';
const HEADER_PREFIX: &str = "# timecode format v";

/// Non-blank, non-comment lines of a schedule with their 1-based line
/// numbers. Surrounding whitespace is removed.
pub struct ScheduleLines<B> {
    reader: B,
    name: String,
    line_no: usize,
}

impl<B: BufRead> ScheduleLines<B> {
    /// Wrap `reader`. `name` identifies the source in diagnostics.
    pub fn new(reader: B, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            line_no: 0,
        }
    }

    /// Source name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the raw next line, without skipping comments.
    pub fn raw_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        if self.line_no == 1 {
            if let Some(stripped) = line.strip_prefix(BOM) {
                line = stripped.to_string();
            }
        }
        Ok(Some(line.trim().to_string()))
    }

    /// The next line carrying data, or `None` at the end of the input.
    pub fn next_entry(&mut self) -> Result<Option<(usize, String)>> {
        while let Some(line) = self.raw_line()? {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return Ok(Some((self.line_no, line)));
        }
        Ok(None)
    }

    /// Log a line that could not be used.
    pub fn warn_line(&self, line: usize, message: &str) {
        warn!(source = %self.name, line, "{}", message);
    }

    /// Parse the `Assume <fps>` line that opens v1 and v3 schedules. A rate
    /// of zero is only accepted when `allow_zero` is set.
    pub fn assume_line(&mut self, allow_zero: bool) -> Result<f64> {
        let fps = self.next_entry()?.and_then(|(_, line)| parse_assume(&line));
        match fps {
            Some(fps) if fps > 0.0 || (allow_zero && fps == 0.0) => Ok(fps),
            _ => Err(TimecodeError::MissingAssume {
                name: self.name.clone(),
            }),
        }
    }
}

/// Version number from a `# timecode format vN` header line.
///
/// `Some(Err(..))` means the prefix matched but the number did not parse.
pub fn parse_header(line: &str) -> Option<std::result::Result<i64, ()>> {
    let head = line.get(..HEADER_PREFIX.len())?;
    if !head.eq_ignore_ascii_case(HEADER_PREFIX) {
        return None;
    }
    Some(line[HEADER_PREFIX.len()..].trim().parse().map_err(|_| ()))
}

/// Frame rate from an `Assume <fps>` line. The keyword is matched without
/// regard to case and may be followed by any whitespace.
pub fn parse_assume(line: &str) -> Option<f64> {
    let head = line.get(..6)?;
    if !head.eq_ignore_ascii_case("assume") {
        return None;
    }
    let rest = &line[6..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    rest.trim().parse().ok()
}

/// Split a comma-separated line into trimmed fields.
pub fn fields(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header() {
        assert_eq!(parse_header("# timecode format v2"), Some(Ok(2)));
        assert_eq!(parse_header("# Timecode Format V3"), Some(Ok(3)));
        assert_eq!(parse_header("# timecode format vX"), Some(Err(())));
        assert_eq!(parse_header("# timecodes v1"), None);
        assert_eq!(parse_header(""), None);
    }

    #[test]
    fn test_assume() {
        assert_eq!(parse_assume("Assume 25"), Some(25.0));
        assert_eq!(parse_assume("assume\t29.97"), Some(29.97));
        assert_eq!(parse_assume("ASSUME   23.976"), Some(23.976));
        assert_eq!(parse_assume("Assume25"), None);
        assert_eq!(parse_assume("Assume abc"), None);
        assert_eq!(parse_assume("0,10,25"), None);
    }

    #[test]
    fn test_lines_skip_comments_and_bom() {
        let input = "\u{FEFF}# timecode format v1\n\n  # note\n Assume 25 \n0,9,30\n";
        let mut lines = ScheduleLines::new(Cursor::new(input), "test");
        assert_eq!(lines.raw_line().unwrap().as_deref(), Some("# timecode format v1"));
        assert_eq!(lines.next_entry().unwrap(), Some((4, "Assume 25".to_string())));
        assert_eq!(lines.next_entry().unwrap(), Some((5, "0,9,30".to_string())));
        assert_eq!(lines.next_entry().unwrap(), None);
    }

    #[test]
    fn test_assume_zero() {
        let mut lines = ScheduleLines::new(Cursor::new("Assume 0\n"), "test");
        assert!(matches!(lines.assume_line(false), Err(TimecodeError::MissingAssume { .. })));

        let mut lines = ScheduleLines::new(Cursor::new("Assume 0\n"), "test");
        assert_eq!(lines.assume_line(true).unwrap(), 0.0);

        let mut lines = ScheduleLines::new(Cursor::new("Assume -1\n"), "test");
        assert!(lines.assume_line(true).is_err());
    }

    #[test]
    fn test_fields() {
        assert_eq!(fields("0, 9 ,30"), vec!["0", "9", "30"]);
        assert_eq!(fields("gap,1.5"), vec!["gap", "1.5"]);
    }
}

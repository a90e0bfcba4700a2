#![no_main]

//! Fuzz target for external timecode files.
//!
//! Any text must either be rejected with a structural error or produce a
//! factory whose pulls never panic.

use std::io::Cursor;

use arbitrary::Arbitrary;
use demux_timecode::TimecodeFactory;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct TimecodeInput {
    version: u8,
    body: String,
    pulls: Vec<(bool, Option<u16>)>,
}

fuzz_target!(|input: TimecodeInput| {
    if input.body.len() > 16 * 1024 {
        return;
    }

    let text = format!("# timecode format v{}\n{}", input.version % 4, input.body);
    let Ok(mut factory) = TimecodeFactory::from_reader(Cursor::new(text), "fuzz") else {
        return;
    };

    let _ = factory.default_fps();
    for (peek_only, duration) in input.pulls.into_iter().take(1024) {
        let _ = factory.get_next(duration.map(i64::from), peek_only);
    }
});

#![no_main]

//! Fuzz target for program stream discovery and reading.
//!
//! Prefixes the input with a pack start code so that it reaches stream
//! discovery, then reads every track to the end.

use std::io::Cursor;

use demux_core::{PacketQueue, ReadStatus, Reader};
use demux_ps::{PsConfig, PsReader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 256 * 1024 {
        return;
    }

    let mut stream = vec![0x00, 0x00, 0x01, 0xBA];
    stream.extend_from_slice(data);

    let config = PsConfig::default().with_probe_window(64 * 1024);
    let Ok(mut reader) = PsReader::open_with_config(Cursor::new(stream), config) else {
        return;
    };

    let queues: Vec<PacketQueue> = (0..reader.tracks().len()).map(|_| PacketQueue::new()).collect();
    for (track, queue) in queues.iter().enumerate() {
        let _ = reader.attach_sink(track, Box::new(queue.clone()));
    }

    for _ in 0..100_000 {
        match reader.read() {
            Ok(ReadStatus::MoreData) => {}
            Ok(ReadStatus::Done) | Err(_) => break,
        }
        for queue in &queues {
            queue.drain();
        }
    }
    let _ = reader.finish();
});

#![no_main]

//! Fuzz target for program stream PES header parsing.
//!
//! Feeds arbitrary bytes after a stream id and checks that the parser
//! either rejects the packet or reports a payload that fits in the
//! packet length.

use std::io::Cursor;

use arbitrary::Arbitrary;
use demux_ps::{parse_packet, ParsedPes, StreamId};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct PesInput {
    stream_id: u8,
    data: Vec<u8>,
}

fuzz_target!(|input: PesInput| {
    if input.data.len() > 64 * 1024 {
        return;
    }

    let mut source = Cursor::new(input.data);
    match parse_packet(&mut source, input.stream_id, 0) {
        Ok(ParsedPes::Payload(packet)) => {
            assert!(StreamId::is_parseable(packet.stream_id));
            assert!(packet.payload_len <= packet.full_length);
            let _ = packet.key();
        }
        Ok(ParsedPes::Rejected { .. }) | Err(_) => {}
    }
});

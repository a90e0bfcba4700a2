//! Sync policy over realistic frame sequences.

use std::io::Cursor;

use demux_core::{Codec, Packet, PacketFlags, PacketQueue, PacketSink, TrackDescriptor};
use demux_packetizer::{Packetizer, SyncConfig};
use demux_timecode::TimecodeFactory;
use pretty_assertions::assert_eq;

const FRAME: i64 = 40_000_000;

/// Six-frame GOPs: one intra frame followed by predicted frames that point
/// back at their predecessor.
fn gop_frames(gops: usize) -> Vec<Packet> {
    (0..gops * 6)
        .map(|i| {
            let timecode = i as i64 * FRAME;
            let backward = (i % 6 != 0).then(|| timecode - FRAME);
            Packet::new(vec![i as u8; 32])
                .with_timecode(Some(timecode))
                .with_duration(Some(FRAME))
                .with_refs(backward, None)
        })
        .collect()
}

fn run(
    mut packetizer: Packetizer<PacketQueue>,
    frames: Vec<Packet>,
) -> (Vec<Packet>, Packetizer<PacketQueue>) {
    for frame in frames {
        packetizer.process(frame).unwrap();
    }
    packetizer.flush().unwrap();
    let out = packetizer.sink().drain();
    (out, packetizer)
}

// =============================================================================
// Displacement
// =============================================================================

#[test]
fn test_negative_displacement_resumes_on_next_intra_frame() {
    let config = SyncConfig::new().with_displacement(-3 * FRAME).video(true);
    let (out, packetizer) = run(Packetizer::new(config, PacketQueue::new()), gop_frames(3));

    // Three frames pay the deficit, two more are skipped until frame 6.
    assert_eq!(out.len(), 12);
    assert_eq!(out[0].data()[0], 6);
    assert_eq!(out[0].timecode, Some(3 * FRAME));
    assert!(out[0].is_keyframe());
    assert_eq!(out[1].backward_ref, Some(3 * FRAME));
    assert_eq!(packetizer.stats().dropped, 6);
}

#[test]
fn test_must_keep_frames_survive_the_keyframe_wait() {
    let mut frames = gop_frames(2);
    frames[4].flags |= PacketFlags::MUST_KEEP;

    let config = SyncConfig::new().with_displacement(-FRAME);
    let (out, _) = run(Packetizer::new(config, PacketQueue::new()), frames);

    let sent: Vec<u8> = out.iter().map(|p| p.data()[0]).collect();
    assert_eq!(sent, vec![4, 6, 7, 8, 9, 10, 11]);
}

#[test]
fn test_positive_displacement_repeats_with_duplicate_flag() {
    let config = SyncConfig::new().with_displacement(FRAME + FRAME / 4);
    let (out, packetizer) = run(Packetizer::new(config, PacketQueue::new()), gop_frames(1));

    assert_eq!(packetizer.stats().duplicated, 1);
    assert_eq!(out.len(), 7);
    assert!(out[0].flags.contains(PacketFlags::MUST_DUPLICATE));
    assert_eq!(out[0].data(), out[1].data());
    assert_eq!(out[1].timecode, Some(FRAME));
}

// =============================================================================
// External timecodes and speed
// =============================================================================

#[test]
fn test_external_timecodes_then_linear_scaling() {
    let schedule = "# timecode format v1\nAssume 25\n0,2,50\n";
    let factory = TimecodeFactory::from_reader(Cursor::new(schedule), "slowmo.txt").unwrap();
    let config = SyncConfig::new()
        .with_timecodes(factory)
        .with_linear(2, 1)
        .unwrap();

    let (out, _) = run(Packetizer::new(config, PacketQueue::new()), gop_frames(1));
    let timing: Vec<(Option<i64>, Option<i64>)> =
        out.iter().map(|p| (p.timecode, p.duration)).collect();
    assert_eq!(
        timing,
        vec![
            (Some(0), Some(40_000_000)),
            (Some(40_000_000), Some(40_000_000)),
            (Some(80_000_000), Some(40_000_000)),
            (Some(120_000_000), Some(80_000_000)),
            (Some(200_000_000), Some(80_000_000)),
            (Some(280_000_000), Some(80_000_000)),
        ]
    );
}

#[test]
fn test_track_offset_and_configured_displacement_add_up() {
    let mut track = TrackDescriptor::new(0, 0xE0, Codec::Mpeg2Video);
    track.timecode_offset = Some(2 * FRAME);
    let config = SyncConfig::new().with_displacement(-2 * FRAME);

    let (out, packetizer) = run(
        Packetizer::from_track(&track, config, PacketQueue::new()),
        gop_frames(1),
    );
    assert_eq!(packetizer.stats().dropped, 0);
    assert_eq!(packetizer.stats().duplicated, 0);
    assert_eq!(out[0].timecode, Some(0));
    assert_eq!(out.len(), 6);
}

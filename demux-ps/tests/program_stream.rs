//! End-to-end tests over synthetic program streams.

use std::io::Cursor;

use demux_core::{BitWriter, ByteSource, Codec, PacketQueue, ReadStatus, Reader, TrackKind};
use demux_ps::{Navigator, PsConfig, PsReader};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

// =============================================================================
// Stream builders
// =============================================================================

fn pack_header() -> Vec<u8> {
    vec![0x00, 0x00, 0x01, 0xBA, 0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xC3, 0xF8]
}

fn system_header() -> Vec<u8> {
    vec![
        0x00, 0x00, 0x01, 0xBB, 0x00, 0x0C, 0x80, 0x1B, 0x91, 0x04, 0xE1, 0xFF, 0xE0, 0xE0, 0xE8,
        0xBD, 0xE0, 0x20,
    ]
}

fn pes(id: u8, sub: Option<u8>, pts: u64, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![
        0x81,
        0x80,
        0x05,
        0x21 | ((((pts >> 30) & 7) as u8) << 1),
        (pts >> 22) as u8,
        ((((pts >> 15) & 0x7F) as u8) << 1) | 1,
        (pts >> 7) as u8,
        (((pts & 0x7F) as u8) << 1) | 1,
    ];
    if let Some(sub) = sub {
        body.extend([sub, 0x01, 0x00, 0x01]);
    }
    body.extend_from_slice(payload);

    let mut data = vec![0x00, 0x00, 0x01, id];
    data.extend((body.len() as u16).to_be_bytes());
    data.extend(body);
    data
}

fn mpeg2_video_es() -> Vec<u8> {
    let mut w = BitWriter::new();
    // sequence header: 720x576, 16:9, 25 fps
    w.write_bits(0x0000_01B3, 32);
    w.write_bits(720, 12);
    w.write_bits(576, 12);
    w.write_bits(3, 4);
    w.write_bits(3, 4);
    w.write_bits(0x3FFFF, 18);
    w.write_bit(true);
    w.write_bits(112, 10);
    w.write_bits(0, 3);
    // sequence extension
    w.write_bits(0x0000_01B5, 32);
    w.write_bits(1, 4);
    w.write_bits(0x48, 8);
    w.write_bit(true);
    w.write_bits(1, 2);
    w.write_bits(0, 16);
    w.write_bit(true);
    w.write_bits(0, 16);
    w.align_to_byte();

    let mut es = w.into_data();
    es.extend([0x00, 0x00, 0x01, 0xB8, 0x00, 0x08, 0x00, 0x00]);
    es.extend([0x00, 0x00, 0x01, 0x00, 0x00, 0x0F, 0xFF, 0xF8]);
    es
}

fn ac3_frame() -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bits(0x0B77, 16);
    w.write_bits(0, 16);
    w.write_bits(0, 2); // 48 kHz
    w.write_bits(8, 6); // 64 kbps, 256 bytes
    w.write_bits(8, 5); // bsid
    w.write_bits(0, 3);
    w.write_bits(2, 3); // stereo
    w.write_bits(0, 2);
    w.write_bit(false);
    w.align_to_byte();
    let mut frame = w.into_data();
    frame.resize(256, 0);
    frame
}

fn two_track_stream() -> Vec<u8> {
    let mut data = pack_header();
    data.extend(system_header());
    data.extend(pes(0xE0, None, 90_000, &mpeg2_video_es()));
    data.extend(pes(0xBD, Some(0x80), 90_000, &ac3_frame()));
    for i in 1..4u64 {
        data.extend(pack_header());
        data.extend(pes(0xE0, None, 90_000 + i * 3600, &[0, 0, 1, 0, 0, 0x17, 0xFF, 0xF8]));
        data.extend(pes(0xBD, Some(0x80), 90_000 + i * 2880, &ac3_frame()));
    }
    data.extend([0x00, 0x00, 0x01, 0xB9]);
    data
}

// =============================================================================
// Discovery and reading
// =============================================================================

#[test]
fn test_discovers_video_then_audio() {
    let mut source = Cursor::new(two_track_stream());
    assert!(PsReader::probe(&mut source, 0));

    let reader = PsReader::open(source).unwrap();
    let tracks = reader.tracks();

    assert_eq!(tracks.len(), 2);
    assert_eq!((tracks[0].kind, tracks[0].codec), (TrackKind::Video, Codec::Mpeg2Video));
    assert_eq!((tracks[1].kind, tracks[1].codec), (TrackKind::Audio, Codec::Ac3));

    let video = tracks[0].video().unwrap();
    assert_eq!((video.width, video.height), (720, 576));
    assert_eq!((video.display_width, video.display_height), (1024, 576));
    assert_eq!(video.frame_rate, Some(25.0));

    let audio = tracks[1].audio().unwrap();
    assert_eq!(audio.sample_rate, 48000);
    assert_eq!(audio.channels, 2);
}

#[test]
fn test_timestamps_start_at_zero() {
    let config = PsConfig::default().with_coalescing(false);
    let mut reader = PsReader::open_with_config(Cursor::new(two_track_stream()), config).unwrap();

    let video = PacketQueue::new();
    let audio = PacketQueue::new();
    reader.attach_sink(0, Box::new(video.clone())).unwrap();
    reader.attach_sink(1, Box::new(audio.clone())).unwrap();
    while reader.read().unwrap() == ReadStatus::MoreData {}

    let video: Vec<_> = video.drain().into_iter().map(|p| p.timecode).collect();
    assert_eq!(
        video,
        vec![Some(0), Some(40_000_000), Some(80_000_000), Some(120_000_000)]
    );
    let audio: Vec<_> = audio.drain().into_iter().map(|p| p.timecode).collect();
    assert_eq!(
        audio,
        vec![Some(0), Some(32_000_000), Some(64_000_000), Some(96_000_000)]
    );
}

#[test]
fn test_garbage_between_packs_is_skipped() {
    let clean = two_track_stream();
    let mut noisy = clean[..clean.len() - 4].to_vec();
    noisy.extend([0x12, 0x00, 0x00, 0x02, 0x00, 0x01]);
    noisy.extend(pack_header());
    noisy.extend(pes(0xBD, Some(0x80), 90_000 + 4 * 2880, &ac3_frame()));

    let mut reader = PsReader::open(Cursor::new(noisy)).unwrap();
    let audio = PacketQueue::new();
    reader.attach_sink(1, Box::new(audio.clone())).unwrap();
    while reader.read().unwrap() == ReadStatus::MoreData {}

    assert_eq!(audio.len(), 5);
    assert!(reader.resyncs() >= 1);
}

#[test]
fn test_unattached_tracks_are_not_delivered() {
    let mut reader = PsReader::open(Cursor::new(two_track_stream())).unwrap();
    let audio = PacketQueue::new();
    reader.attach_sink(1, Box::new(audio.clone())).unwrap();
    while reader.read().unwrap() == ReadStatus::MoreData {}

    let packets = audio.drain();
    assert_eq!(packets.len(), 4);
    assert!(packets.iter().all(|p| p.track == 1));
    assert!(audio.is_flushed());
}

// =============================================================================
// Resynchronisation
// =============================================================================

proptest! {
    /// Junk without a start code prefix is skipped and the navigator lands
    /// exactly on the next packet.
    #[test]
    fn resync_lands_on_next_start_code(junk in prop::collection::vec(1u8..=0xFF, 4..64)) {
        let mut data = junk.clone();
        let k = data.len() as u64;
        data.extend(pes(0xE0, None, 0, &[0xAA; 4]));

        let mut nav = Navigator::new(Cursor::new(data));
        let found = nav.next_packet(None).unwrap().unwrap();
        prop_assert_eq!(found.offset, k);
        prop_assert_eq!(found.id, 0xE0);
        prop_assert_eq!(nav.source_mut().tell().unwrap(), k + 4);
    }
}

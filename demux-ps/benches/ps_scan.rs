//! Program stream navigation and demultiplexing benchmarks.

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use demux_core::{PacketQueue, ReadStatus, Reader};
use demux_ps::{Navigator, PsConfig, PsReader};

/// Build a stream of `packs` packs, each holding one MPEG audio PES packet
/// of `payload` bytes.
fn create_test_stream(packs: usize, payload: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(packs * (payload + 40));
    for i in 0..packs {
        data.extend([0x00, 0x00, 0x01, 0xBA, 0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xC3, 0xF8]);

        let pts = (i as u64) * 2160;
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
        body.extend([0xFF, 0xFD, 0xA4, 0x04]);
        body.resize(8 + payload, 0x55);

        data.extend([0x00, 0x00, 0x01, 0xC0]);
        data.extend((body.len() as u16).to_be_bytes());
        data.extend(body);
    }
    data.extend([0x00, 0x00, 0x01, 0xB9]);
    data
}

// ============================================================================
// Navigation
// ============================================================================

fn bench_navigate(c: &mut Criterion) {
    let mut group = c.benchmark_group("ps_navigate");

    for &payload in &[512usize, 2016] {
        let data = create_test_stream(1000, payload);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(payload), &data, |b, data| {
            b.iter(|| {
                let mut nav = Navigator::new(Cursor::new(data.as_slice()));
                let mut count = 0;
                while let Ok(Some(_)) = nav.next_packet(None) {
                    if nav.skip_packet().is_err() {
                        break;
                    }
                    count += 1;
                }
                black_box(count)
            });
        });
    }

    group.finish();
}

// ============================================================================
// Full demultiplexing
// ============================================================================

fn bench_demux(c: &mut Criterion) {
    let mut group = c.benchmark_group("ps_demux");
    let data = create_test_stream(1000, 2016);
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("mpeg_audio", |b| {
        b.iter(|| {
            let config = PsConfig::default().with_coalescing(false);
            let mut reader =
                PsReader::open_with_config(Cursor::new(data.as_slice()), config).unwrap();
            let queue = PacketQueue::new();
            reader.attach_sink(0, Box::new(queue.clone())).unwrap();
            while reader.read().unwrap() == ReadStatus::MoreData {
                black_box(queue.drain());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_navigate, bench_demux);
criterion_main!(benches);

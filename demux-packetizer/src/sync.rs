//! The sync stage between a reader and its sink.
//!
//! Every packet passes through four steps:
//!
//! 1. a missing timecode continues from the previous packet, a missing
//!    duration falls back to the track's frame duration;
//! 2. external timecodes, when configured, replace the container ones;
//! 3. the displacement policy drops or repeats leading frames;
//! 4. the final timecode is `(timecode + displacement) * linear`.
//!
//! A negative displacement drops frames until the deficit is used up and
//! then waits for the next keyframe. A positive displacement repeats the
//! first frame until the surplus is filled.

use demux_core::timestamp::frame_duration_ns;
use demux_core::{Linear, Packet, PacketFlags, PacketSink, Result, TrackDescriptor, TrackKind};
use demux_timecode::TimecodeFactory;
use tracing::{debug, trace};

use crate::config::SyncConfig;

/// Counters kept by a [`Packetizer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Packets received from the reader.
    pub packets: u64,
    /// Payload bytes received.
    pub bytes: u64,
    /// Packets dropped by a negative displacement or the keyframe wait.
    pub dropped: u64,
    /// Extra copies emitted for a positive displacement.
    pub duplicated: u64,
}

/// A [`PacketSink`] that rewrites packet timing and forwards to `S`.
pub struct Packetizer<S> {
    sink: S,
    track: usize,
    linear: Linear,
    timecodes: Option<TimecodeFactory>,
    is_video: bool,
    default_duration: Option<i64>,
    initial_displacement: i64,
    displacement: i64,
    sync_to_keyframe: bool,
    last_timecode: Option<i64>,
    last_duration: i64,
    stats: SyncStats,
}

impl<S: PacketSink> Packetizer<S> {
    /// Wrap `sink` with the given settings.
    pub fn new(config: SyncConfig, sink: S) -> Self {
        Self {
            sink,
            track: 0,
            linear: config.linear,
            timecodes: config.timecodes,
            is_video: config.is_video,
            default_duration: None,
            initial_displacement: config.displacement,
            displacement: 0,
            sync_to_keyframe: false,
            last_timecode: None,
            last_duration: 0,
            stats: SyncStats::default(),
        }
    }

    /// Wrap `sink` for a discovered track. The track's timecode offset is
    /// added to the configured displacement, and packets without a duration
    /// get one frame at the track's frame rate.
    ///
    /// Meant for readers that leave packets unstamped, e.g. a program stream
    /// opened with `with_timecodes(false)`.
    pub fn from_track(track: &TrackDescriptor, config: SyncConfig, sink: S) -> Self {
        let offset = track.timecode_offset.unwrap_or(0);
        let is_video = config.is_video || track.kind == TrackKind::Video;
        let displacement = config.displacement + offset;
        debug!(
            track = track.number,
            codec = %track.codec,
            offset,
            displacement,
            "sync configured"
        );

        let mut packetizer = Self::new(config.with_displacement(displacement).video(is_video), sink);
        packetizer.track = track.number;
        packetizer.default_duration = track
            .video()
            .and_then(|v| v.frame_rate)
            .and_then(frame_duration_ns);
        packetizer
    }

    /// Duration assumed for packets that carry none.
    pub fn with_default_duration(mut self, duration: Option<i64>) -> Self {
        self.default_duration = duration;
        self
    }

    /// Displacement still to be applied.
    pub fn displacement(&self) -> i64 {
        self.displacement
    }

    /// Whether the track is waiting for a keyframe after dropping frames.
    pub fn waiting_for_keyframe(&self) -> bool {
        self.sync_to_keyframe
    }

    /// Counters so far.
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// The wrapped sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Unwrap the sink.
    pub fn into_inner(self) -> S {
        self.sink
    }

    fn needs_negative_displacement(&self) -> bool {
        self.initial_displacement < 0 && self.displacement > self.initial_displacement
    }

    fn needs_positive_displacement(&self, duration: i64) -> bool {
        self.initial_displacement > 0
            && (self.initial_displacement - self.displacement).abs() > duration / 2
    }

    fn shift(&self, value: i64) -> i64 {
        self.linear.apply(value + self.displacement)
    }

    /// Apply displacement and speed to every instant in `packet`.
    fn rewrite(&self, mut packet: Packet, timecode: i64) -> Packet {
        packet.timecode = Some(self.shift(timecode));
        packet.duration = packet.duration.map(|d| self.linear.apply(d));
        packet.backward_ref = packet.backward_ref.map(|r| self.shift(r));
        packet.forward_ref = packet.forward_ref.map(|r| self.shift(r));
        packet
    }

    fn complete_timing(&mut self, packet: &mut Packet) -> i64 {
        if packet.duration.is_none() {
            packet.duration = self.default_duration;
        }
        let mut timecode = packet
            .timecode
            .unwrap_or_else(|| self.last_timecode.map_or(0, |tc| tc + self.last_duration));

        if let Some(factory) = self.timecodes.as_mut() {
            let next = factory.get_next(packet.duration, false);
            if next.new_segment {
                debug!(
                    track = self.track,
                    timecode = next.timecode,
                    "external timecodes start a new segment"
                );
            }
            timecode = next.timecode;
            packet.duration = next.duration;
        }

        self.last_timecode = Some(timecode);
        self.last_duration = packet.duration.unwrap_or(0);
        timecode
    }
}

impl<S: PacketSink> PacketSink for Packetizer<S> {
    fn process(&mut self, mut packet: Packet) -> Result<()> {
        self.stats.packets += 1;
        self.stats.bytes += packet.size() as u64;

        let timecode = self.complete_timing(&mut packet);
        let duration = packet.duration.unwrap_or(0);

        if duration > 0 && packet.is_droppable() && self.needs_negative_displacement() {
            self.displacement -= duration;
            self.sync_to_keyframe = true;
            self.stats.dropped += 1;
            trace!(
                track = self.track,
                timecode,
                displacement = self.displacement,
                "dropped for negative displacement"
            );
            return Ok(());
        }

        while duration > 0 && self.needs_positive_displacement(duration) {
            let mut copy = self.rewrite(packet.clone(), timecode);
            copy.flags |= PacketFlags::MUST_DUPLICATE;
            self.sink.process(copy)?;
            self.displacement += duration;
            self.stats.duplicated += 1;
            trace!(
                track = self.track,
                timecode,
                displacement = self.displacement,
                "repeated for positive displacement"
            );
        }

        if self.sync_to_keyframe {
            if packet.is_keyframe() {
                self.sync_to_keyframe = false;
            } else if packet.is_droppable() {
                self.stats.dropped += 1;
                trace!(track = self.track, timecode, "dropped while waiting for a keyframe");
                return Ok(());
            }
        }

        let packet = self.rewrite(packet, timecode);
        trace!(
            track = self.track,
            timecode = ?packet.timecode,
            duration = ?packet.duration,
            size = packet.size(),
            "packet"
        );
        self.sink.process(packet)
    }

    fn flush(&mut self) -> Result<()> {
        debug!(
            track = self.track,
            video = self.is_video,
            packets = self.stats.packets,
            bytes = self.stats.bytes,
            dropped = self.stats.dropped,
            duplicated = self.stats.duplicated,
            "packetizer finished"
        );
        self.sink.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use demux_core::{Codec, PacketQueue};
    use pretty_assertions::assert_eq;

    const FRAME: i64 = 40_000_000;

    fn frame(timecode: Option<i64>) -> Packet {
        Packet::new(vec![0u8; 16])
            .with_timecode(timecode)
            .with_duration(Some(FRAME))
    }

    fn timecodes(queue: &PacketQueue) -> Vec<Option<i64>> {
        queue.drain().into_iter().map(|p| p.timecode).collect()
    }

    #[test]
    fn test_passthrough() {
        let queue = PacketQueue::new();
        let mut p = Packetizer::new(SyncConfig::new(), queue.clone());
        p.process(frame(Some(0))).unwrap();
        p.process(frame(Some(FRAME))).unwrap();
        assert_eq!(timecodes(&queue), vec![Some(0), Some(FRAME)]);
    }

    #[test]
    fn test_missing_timecodes_continue() {
        let queue = PacketQueue::new();
        let mut p = Packetizer::new(SyncConfig::new(), queue.clone());
        p.process(frame(None)).unwrap();
        p.process(frame(None)).unwrap();
        p.process(frame(Some(500_000_000))).unwrap();
        p.process(frame(None)).unwrap();
        assert_eq!(
            timecodes(&queue),
            vec![Some(0), Some(FRAME), Some(500_000_000), Some(500_000_000 + FRAME)]
        );
    }

    #[test]
    fn test_negative_displacement_drops_then_waits_for_keyframe() {
        let queue = PacketQueue::new();
        let config = SyncConfig::new().with_displacement(-2 * FRAME);
        let mut p = Packetizer::new(config, queue.clone());

        p.process(frame(Some(0))).unwrap();
        p.process(frame(Some(FRAME)).with_refs(Some(0), None)).unwrap();
        assert!(p.waiting_for_keyframe());
        p.process(frame(Some(2 * FRAME)).with_refs(Some(FRAME), None)).unwrap();
        p.process(frame(Some(3 * FRAME))).unwrap();

        assert_eq!(timecodes(&queue), vec![Some(FRAME)]);
        assert_eq!(p.stats().dropped, 3);
        assert!(!p.waiting_for_keyframe());
    }

    #[test]
    fn test_must_keep_is_never_dropped() {
        let queue = PacketQueue::new();
        let mut p = Packetizer::new(SyncConfig::new().with_displacement(-FRAME), queue.clone());

        let mut kept = frame(Some(0));
        kept.flags |= PacketFlags::MUST_KEEP;
        p.process(kept).unwrap();
        assert_eq!(p.displacement(), 0);
        assert_eq!(timecodes(&queue), vec![Some(0)]);
    }

    #[test]
    fn test_positive_displacement_duplicates() {
        let queue = PacketQueue::new();
        let mut p = Packetizer::new(SyncConfig::new().with_displacement(2 * FRAME), queue.clone());
        p.process(frame(Some(0))).unwrap();
        p.process(frame(Some(FRAME))).unwrap();

        let out = queue.drain();
        let got: Vec<(Option<i64>, bool)> = out
            .iter()
            .map(|p| (p.timecode, p.flags.contains(PacketFlags::MUST_DUPLICATE)))
            .collect();
        assert_eq!(
            got,
            vec![
                (Some(0), true),
                (Some(FRAME), true),
                (Some(2 * FRAME), false),
                (Some(3 * FRAME), false),
            ]
        );
        assert_eq!(p.stats().duplicated, 2);
    }

    #[test]
    fn test_linear_scaling() {
        let queue = PacketQueue::new();
        let config = SyncConfig::new().with_linear(1, 2).unwrap();
        let mut p = Packetizer::new(config, queue.clone());
        p.process(frame(Some(4 * FRAME)).with_refs(Some(2 * FRAME), Some(6 * FRAME)))
            .unwrap();

        let out = queue.pop().unwrap();
        assert_eq!(out.timecode, Some(2 * FRAME));
        assert_eq!(out.duration, Some(FRAME / 2));
        assert_eq!(out.backward_ref, Some(FRAME));
        assert_eq!(out.forward_ref, Some(3 * FRAME));
    }

    #[test]
    fn test_external_timecodes_override() {
        let factory = TimecodeFactory::from_reader(
            std::io::Cursor::new("# timecode format v2\n0\n100\n250\n"),
            "tc.txt",
        )
        .unwrap();
        let queue = PacketQueue::new();
        let mut p = Packetizer::new(SyncConfig::new().with_timecodes(factory), queue.clone());
        for i in 0..3 {
            p.process(frame(Some(i * FRAME))).unwrap();
        }

        let out = queue.drain();
        let got: Vec<(Option<i64>, Option<i64>)> =
            out.iter().map(|p| (p.timecode, p.duration)).collect();
        assert_eq!(
            got,
            vec![
                (Some(0), Some(100_000_000)),
                (Some(100_000_000), Some(150_000_000)),
                (Some(250_000_000), Some(100_000_000)),
            ]
        );
    }

    #[test]
    fn test_from_track_adds_offset() {
        let mut track = TrackDescriptor::new(1, 0xC0, Codec::Mp2);
        track.timecode_offset = Some(2 * FRAME);
        let queue = PacketQueue::new();
        let mut p = Packetizer::from_track(&track, SyncConfig::new(), queue.clone());
        p.process(frame(None)).unwrap();
        p.process(frame(None)).unwrap();
        p.flush().unwrap();

        // The late start is filled by repeating the first frame.
        assert_eq!(
            timecodes(&queue),
            vec![Some(0), Some(FRAME), Some(2 * FRAME), Some(3 * FRAME)]
        );
        assert!(queue.is_flushed());
    }
}

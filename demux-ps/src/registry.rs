//! Discovered streams: track table, blacklist, timestamp offsets and
//! payload coalescing.

use std::collections::{HashMap, HashSet};

use demux_core::{Packet, TrackDescriptor};
use tracing::debug;

use crate::classify::TrackInfo;
use crate::error::PsError;

/// A stream that survived classification.
#[derive(Debug, Clone)]
pub struct PsTrack {
    /// Lookup key (`256 + sub id` for private stream 1).
    pub key: u16,
    /// What the classifier found.
    pub info: TrackInfo,
    /// Smallest timestamp seen during discovery.
    pub min_pts: Option<i64>,
}

impl PsTrack {
    /// Ordering key: class first, then the stream key with plain ids lifted
    /// into the private sub-stream range.
    pub fn sort_key(&self) -> u32 {
        let class = self.info.codec.kind().sort_class();
        let id = if self.key < 256 {
            self.key as u32 + 256
        } else {
            self.key as u32
        };
        class * 0x10000 + id
    }
}

/// Track table built during discovery.
#[derive(Debug, Default)]
pub struct Registry {
    tracks: Vec<PsTrack>,
    index: HashMap<u16, usize>,
    blacklist: HashSet<u16>,
    global_offset: Option<i64>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` was rejected earlier.
    pub fn is_blacklisted(&self, key: u16) -> bool {
        self.blacklist.contains(&key)
    }

    /// Reject `key` for the rest of the session.
    pub fn blacklist(&mut self, key: u16, reason: &str) {
        if self.blacklist.insert(key) {
            debug!(error = %PsError::classification(key, reason), "stream blacklisted");
        }
    }

    /// Track index for `key`.
    pub fn lookup(&self, key: u16) -> Option<usize> {
        self.index.get(&key).copied()
    }

    /// Record a timestamp for an already known track.
    pub fn observe_timestamp(&mut self, index: usize, pts: Option<i64>) {
        if let (Some(track), Some(pts)) = (self.tracks.get_mut(index), pts) {
            track.min_pts = Some(track.min_pts.map_or(pts, |min| min.min(pts)));
        }
    }

    /// Add a classified stream.
    pub fn insert(&mut self, key: u16, info: TrackInfo, pts: Option<i64>) -> usize {
        debug!(
            stream = format_args!("0x{:04X}", key),
            codec = %info.codec,
            "stream classified"
        );
        let index = self.tracks.len();
        self.tracks.push(PsTrack {
            key,
            info,
            min_pts: pts,
        });
        self.index.insert(key, index);
        index
    }

    /// Sort the tracks, rebuild the lookup index and compute the global
    /// timestamp offset.
    pub fn finalize(&mut self) {
        self.tracks.sort_by_key(PsTrack::sort_key);
        self.index = self
            .tracks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.key, i))
            .collect();
        self.global_offset = self.tracks.iter().filter_map(|t| t.min_pts).min();
        debug!(
            tracks = self.tracks.len(),
            global_offset = ?self.global_offset,
            "stream table finalized"
        );
    }

    /// Earliest timestamp over all tracks.
    pub fn global_offset(&self) -> Option<i64> {
        self.global_offset
    }

    /// Shift a container timestamp by the global offset. Negative results
    /// become `None`.
    pub fn relative_timestamp(&self, pts: Option<i64>) -> Option<i64> {
        let pts = pts? - self.global_offset.unwrap_or(0);
        (pts >= 0).then_some(pts)
    }

    /// Tracks in sorted order.
    pub fn tracks(&self) -> &[PsTrack] {
        &self.tracks
    }

    /// Number of tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether no track was found.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Frozen descriptors, numbered in sorted order.
    pub fn descriptors(&self) -> Vec<TrackDescriptor> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(number, track)| {
                let mut desc = TrackDescriptor::new(number, track.key, track.info.codec);
                desc.params = track.info.params.clone();
                desc.private_data = track.info.private_data.clone();
                desc.timecode_offset = track
                    .min_pts
                    .map(|pts| pts - self.global_offset.unwrap_or(0));
                desc
            })
            .collect()
    }
}

/// Accumulates payloads of one track into larger packets.
#[derive(Debug)]
pub struct CoalesceBuffer {
    track: usize,
    capacity: usize,
    data: Vec<u8>,
    timecode: Option<i64>,
    pos: Option<u64>,
}

impl CoalesceBuffer {
    /// Create an empty buffer for `track`.
    pub fn new(track: usize, capacity: usize) -> Self {
        Self {
            track,
            capacity,
            data: Vec::with_capacity(capacity),
            timecode: None,
            pos: None,
        }
    }

    /// Append a payload. Returns the packets that became ready.
    ///
    /// The pending data is flushed first when the payload would not fit.
    /// A payload larger than the capacity is emitted on its own.
    pub fn push(&mut self, payload: Vec<u8>, timecode: Option<i64>, pos: u64) -> Vec<Packet> {
        let mut ready = Vec::new();

        if self.data.len() + payload.len() > self.capacity {
            ready.extend(self.take());
        }

        if payload.len() > self.capacity {
            ready.push(
                Packet::new(payload)
                    .with_track(self.track)
                    .with_timecode(timecode)
                    .with_pos(pos),
            );
            return ready;
        }

        if self.data.is_empty() {
            self.timecode = timecode;
            self.pos = Some(pos);
        }
        self.data.extend_from_slice(&payload);
        ready
    }

    /// Take the pending data as one packet.
    pub fn take(&mut self) -> Option<Packet> {
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::replace(&mut self.data, Vec::with_capacity(self.capacity));
        let mut packet = Packet::new(data)
            .with_track(self.track)
            .with_timecode(self.timecode.take());
        packet.pos = self.pos.take();
        Some(packet)
    }

    /// Bytes pending.
    pub fn pending(&self) -> usize {
        self.data.len()
    }
}

//! Demultiplexed packets.
//!
//! A packet owns its payload. Readers create packets, the packetizer rewrites
//! their timing once, and the sink receives them by value.

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Flags for packet handling downstream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct PacketFlags: u32 {
        /// The sink must copy the payload before retaining it.
        const MUST_DUPLICATE = 0x0001;
        /// The packet is never dropped by the keyframe policy.
        const MUST_KEEP = 0x0002;
    }
}

/// A demultiplexed packet.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    /// The packet payload.
    data: Vec<u8>,
    /// Presentation instant in nanoseconds. `None` means "continue from the
    /// previous packet".
    pub timecode: Option<i64>,
    /// Duration in nanoseconds.
    pub duration: Option<i64>,
    /// Reference to a prior frame this one depends on.
    pub backward_ref: Option<i64>,
    /// Reference to a future frame this one depends on.
    pub forward_ref: Option<i64>,
    /// Track number this packet belongs to.
    pub track: usize,
    /// Position in the input stream (bytes).
    pub pos: Option<u64>,
    /// Packet flags.
    pub flags: PacketFlags,
}

impl Packet {
    /// Create a new packet owning `data`.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            timecode: None,
            duration: None,
            backward_ref: None,
            forward_ref: None,
            track: 0,
            pos: None,
            flags: PacketFlags::empty(),
        }
    }

    /// Set the timecode.
    pub fn with_timecode(mut self, timecode: Option<i64>) -> Self {
        self.timecode = timecode;
        self
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration: Option<i64>) -> Self {
        self.duration = duration;
        self
    }

    /// Set the track number.
    pub fn with_track(mut self, track: usize) -> Self {
        self.track = track;
        self
    }

    /// Set the source position.
    pub fn with_pos(mut self, pos: u64) -> Self {
        self.pos = Some(pos);
        self
    }

    /// Set both reference markers.
    pub fn with_refs(mut self, backward: Option<i64>, forward: Option<i64>) -> Self {
        self.backward_ref = backward;
        self.forward_ref = forward;
        self
    }

    /// Get the packet payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the payload out of the packet.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Get the size of the payload.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Check if this packet has no payload.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A packet without a backward reference can be decoded on its own.
    pub fn is_keyframe(&self) -> bool {
        self.backward_ref.is_none()
    }

    /// Whether the keyframe policy may drop this packet.
    pub fn is_droppable(&self) -> bool {
        !self.flags.contains(PacketFlags::MUST_KEEP)
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("size", &self.data.len())
            .field("timecode", &self.timecode)
            .field("duration", &self.duration)
            .field("backward_ref", &self.backward_ref)
            .field("forward_ref", &self.forward_ref)
            .field("track", &self.track)
            .field("pos", &self.pos)
            .field("flags", &self.flags)
            .finish()
    }
}

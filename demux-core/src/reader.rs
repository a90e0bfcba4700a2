//! The reader and sink contracts.
//!
//! Every format implements [`Reader`]: probe a source, open it (header
//! discovery), then call [`Reader::read`] until it reports
//! [`ReadStatus::Done`]. Packets go to the [`PacketSink`] attached to their
//! track.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::source::ByteSource;
use crate::track::TrackDescriptor;

/// Outcome of one unit of reader work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Call `read()` again.
    MoreData,
    /// The input is exhausted and every pending packet has been delivered.
    Done,
}

/// Receiver of demultiplexed packets for one track.
pub trait PacketSink: Send {
    /// Accept a packet.
    fn process(&mut self, packet: Packet) -> Result<()>;

    /// Called once when the reader finishes.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: PacketSink + ?Sized> PacketSink for Box<S> {
    fn process(&mut self, packet: Packet) -> Result<()> {
        (**self).process(packet)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// A per-format demultiplexer.
pub trait Reader<R: ByteSource>: Sized {
    /// Cheap check whether `source` holds this format.
    ///
    /// Never fails; I/O errors and malformed data count as "no match". The
    /// read position is restored before returning.
    fn probe(source: &mut R, size: u64) -> bool;

    /// Open the source and discover its tracks.
    fn open(source: R) -> Result<Self>;

    /// Name of the container format for identification output.
    fn format_name(&self) -> String;

    /// Tracks found during discovery, in track number order.
    fn tracks(&self) -> &[TrackDescriptor];

    /// Route the packets of `track` to `sink`.
    fn attach_sink(&mut self, track: usize, sink: Box<dyn PacketSink>) -> Result<()>;

    /// Perform one bounded unit of work.
    fn read(&mut self) -> Result<ReadStatus>;

    /// Flush pending buffers and sinks. Idempotent.
    fn finish(&mut self) -> Result<ReadStatus>;
}

/// Sinks indexed by track number.
#[derive(Default)]
pub struct SinkTable {
    sinks: Vec<Option<Box<dyn PacketSink>>>,
    flushed: bool,
}

impl SinkTable {
    /// Create a table for `tracks` tracks with nothing attached.
    pub fn new(tracks: usize) -> Self {
        Self {
            sinks: (0..tracks).map(|_| None).collect(),
            flushed: false,
        }
    }

    /// Attach a sink, replacing any previous one.
    pub fn attach(&mut self, track: usize, sink: Box<dyn PacketSink>) -> Result<()> {
        let slot = self
            .sinks
            .get_mut(track)
            .ok_or(Error::TrackNotFound(track))?;
        *slot = Some(sink);
        Ok(())
    }

    /// Whether a sink is attached to `track`.
    pub fn is_attached(&self, track: usize) -> bool {
        matches!(self.sinks.get(track), Some(Some(_)))
    }

    /// Whether any sink is attached.
    pub fn any_attached(&self) -> bool {
        self.sinks.iter().any(Option::is_some)
    }

    /// Deliver a packet to its track's sink. Packets for tracks without a
    /// sink are dropped.
    pub fn deliver(&mut self, packet: Packet) -> Result<()> {
        match self.sinks.get_mut(packet.track) {
            Some(Some(sink)) => {
                trace!(
                    track = packet.track,
                    size = packet.size(),
                    timecode = ?packet.timecode,
                    "delivering packet"
                );
                sink.process(packet)
            }
            _ => Ok(()),
        }
    }

    /// Flush every attached sink once.
    pub fn flush_all(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;
        for sink in self.sinks.iter_mut().flatten() {
            sink.flush()?;
        }
        Ok(())
    }
}

/// A cloneable in-memory sink.
///
/// The driver keeps one handle and drains packets from it while the reader
/// owns the other.
#[derive(Debug, Clone, Default)]
pub struct PacketQueue {
    inner: Arc<Mutex<QueueState>>,
}

#[derive(Debug, Default)]
struct QueueState {
    packets: VecDeque<Packet>,
    flushed: bool,
}

impl PacketQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest queued packet.
    pub fn pop(&self) -> Option<Packet> {
        self.inner.lock().packets.pop_front()
    }

    /// Take every queued packet.
    pub fn drain(&self) -> Vec<Packet> {
        self.inner.lock().packets.drain(..).collect()
    }

    /// Number of queued packets.
    pub fn len(&self) -> usize {
        self.inner.lock().packets.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the producing reader has flushed this sink.
    pub fn is_flushed(&self) -> bool {
        self.inner.lock().flushed
    }
}

impl PacketSink for PacketQueue {
    fn process(&mut self, packet: Packet) -> Result<()> {
        self.inner.lock().packets.push_back(packet);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.lock().flushed = true;
        Ok(())
    }
}

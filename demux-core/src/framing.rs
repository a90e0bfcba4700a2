//! Frame splitting for raw elementary streams.
//!
//! Raw readers pull fixed-size chunks from the byte source and cut them into
//! frames at sync words. The [`FrameAssembler`] keeps the partial tail
//! between chunks and tracks absolute stream offsets; the format-specific
//! decision of where a frame starts and how long it is comes from a scan
//! callback.

use tracing::debug;

use crate::packet::Packet;

/// Result of scanning the start of the pending bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// A complete frame of `len` bytes starts at offset 0.
    Frame {
        /// Frame length in bytes.
        len: usize,
        /// Frame duration in nanoseconds.
        duration: Option<i64>,
        /// Track the frame belongs to.
        track: usize,
    },
    /// Not enough bytes to decide; wait for the next chunk.
    NeedMore,
    /// No frame starts in the first `n` bytes; drop them.
    Skip(usize),
}

/// Accumulates chunks and emits whole frames as packets.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    pending: Vec<u8>,
    base: u64,
    skipped: u64,
}

impl FrameAssembler {
    /// Create an assembler whose first byte sits at `offset` in the source.
    pub fn new(offset: u64) -> Self {
        Self {
            pending: Vec::new(),
            base: offset,
            skipped: 0,
        }
    }

    /// Append a chunk.
    pub fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Number of bytes waiting for a frame boundary.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Total number of bytes dropped while looking for sync.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Cut every complete frame out of the pending bytes.
    pub fn frames<F>(&mut self, mut scan: F) -> Vec<Packet>
    where
        F: FnMut(&[u8]) -> Scan,
    {
        let mut out = Vec::new();
        let mut pos = 0usize;
        let mut garbage = 0usize;

        while pos < self.pending.len() {
            match scan(&self.pending[pos..]) {
                Scan::Frame {
                    len,
                    duration,
                    track,
                } if len > 0 && pos + len <= self.pending.len() => {
                    if garbage > 0 {
                        debug!(
                            offset = self.base + (pos - garbage) as u64,
                            bytes = garbage,
                            "skipped bytes without a frame header"
                        );
                        garbage = 0;
                    }
                    let data = self.pending[pos..pos + len].to_vec();
                    out.push(
                        Packet::new(data)
                            .with_duration(duration)
                            .with_track(track)
                            .with_pos(self.base + pos as u64),
                    );
                    pos += len;
                }
                Scan::Frame { .. } | Scan::NeedMore => break,
                Scan::Skip(n) => {
                    let n = n.max(1).min(self.pending.len() - pos);
                    garbage += n;
                    self.skipped += n as u64;
                    pos += n;
                }
            }
        }

        if garbage > 0 {
            debug!(
                offset = self.base + (pos - garbage) as u64,
                bytes = garbage,
                "skipped bytes without a frame header"
            );
        }

        self.pending.drain(..pos);
        self.base += pos as u64;
        out
    }

    /// Hand out whatever is left as a final packet for `track`.
    pub fn take_rest(&mut self, track: usize) -> Option<Packet> {
        if self.pending.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.pending);
        let pos = self.base;
        self.base += data.len() as u64;
        Some(Packet::new(data).with_track(track).with_pos(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Frames are "0xAA <len>" followed by len - 2 filler bytes.
    fn scan(data: &[u8]) -> Scan {
        if data[0] != 0xAA {
            return Scan::Skip(1);
        }
        if data.len() < 2 {
            return Scan::NeedMore;
        }
        Scan::Frame {
            len: data[1] as usize,
            duration: Some(10),
            track: 0,
        }
    }

    #[test]
    fn test_frames_across_chunks() {
        let mut asm = FrameAssembler::new(100);
        asm.push(&[0xAA, 4, 0, 0, 0xAA, 3]);
        let first = asm.frames(scan);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].pos, Some(100));
        assert_eq!(asm.pending_len(), 2);

        asm.push(&[9]);
        let second = asm.frames(scan);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].data(), &[0xAA, 3, 9]);
        assert_eq!(second[0].pos, Some(104));
    }

    #[test]
    fn test_skips_garbage() {
        let mut asm = FrameAssembler::new(0);
        asm.push(&[1, 2, 3, 0xAA, 2]);
        let frames = asm.frames(scan);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].pos, Some(3));
        assert_eq!(asm.skipped(), 3);
    }

    #[test]
    fn test_take_rest() {
        let mut asm = FrameAssembler::new(0);
        asm.push(&[0xAA, 9, 1]);
        assert!(asm.frames(scan).is_empty());
        let rest = asm.take_rest(0).unwrap();
        assert_eq!(rest.size(), 3);
        assert!(asm.take_rest(0).is_none());
    }
}

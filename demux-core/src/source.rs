//! Byte source access used by every reader.
//!
//! Readers work on any seekable byte stream. [`ByteSource`] adds the handful
//! of big-endian reads and relative seeks the navigators need on top of
//! `Read + Seek`.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

/// Big-endian reads, relative seeks and position queries over a seekable
/// stream.
///
/// Blanket-implemented for every `Read + Seek` type, so files, cursors and
/// buffered readers can be handed to a reader directly.
pub trait ByteSource: Read + Seek {
    /// Current absolute read position.
    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    /// Move the read position to an absolute offset.
    fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.seek(SeekFrom::Start(pos)).map(|_| ())
    }

    /// Move the read position relative to the current one.
    fn skip(&mut self, delta: i64) -> io::Result<()> {
        self.seek(SeekFrom::Current(delta)).map(|_| ())
    }

    /// Total size of the stream in bytes. The read position is preserved.
    fn total_size(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let size = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(size)
    }

    /// Whether the read position is at or past the end of the stream.
    fn is_eof(&mut self) -> io::Result<bool> {
        let pos = self.stream_position()?;
        Ok(pos >= self.total_size()?)
    }

    /// Read one byte.
    fn read_byte(&mut self) -> io::Result<u8> {
        self.read_u8()
    }

    /// Read a big-endian u16.
    fn read_u16_be(&mut self) -> io::Result<u16> {
        self.read_u16::<BigEndian>()
    }

    /// Read a big-endian u32.
    fn read_u32_be(&mut self) -> io::Result<u32> {
        self.read_u32::<BigEndian>()
    }

    /// Read the next byte without consuming it.
    fn peek_byte(&mut self) -> io::Result<u8> {
        let byte = self.read_u8()?;
        self.seek(SeekFrom::Current(-1))?;
        Ok(byte)
    }

    /// Read up to `buf.len()` bytes, stopping early only at end of stream.
    ///
    /// Returns the number of bytes read.
    fn read_up_to(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Read exactly `len` bytes into a new buffer.
    fn read_vec(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<T: Read + Seek + ?Sized> ByteSource for T {}

/// Run `f` against the source and restore the read position afterwards,
/// whatever `f` returned.
///
/// Probes use this so that a failed probe leaves the source untouched.
pub fn with_restored_position<S, T, F>(source: &mut S, f: F) -> io::Result<T>
where
    S: ByteSource + ?Sized,
    F: FnOnce(&mut S) -> T,
{
    let pos = source.tell()?;
    let result = f(source);
    source.seek_to(pos)?;
    Ok(result)
}

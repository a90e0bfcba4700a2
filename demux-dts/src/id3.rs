//! ID3 tag detection for raw audio files.
//!
//! Raw TrueHD and DTS files ripped by some tools carry an ID3v2 tag in front
//! of the first frame and an ID3v1 or ID3v2 tag at the very end.

use std::io;

use demux_core::ByteSource;

const ID3V2_HEADER_SIZE: u64 = 10;
const ID3V1_SIZE: u64 = 128;
const ID3V2_FOOTER_FLAG: u8 = 0x10;

fn syncsafe(bytes: &[u8]) -> Option<u64> {
    bytes.iter().try_fold(0u64, |acc, &b| {
        (b & 0x80 == 0).then_some((acc << 7) | b as u64)
    })
}

/// Size of the ID3v2 tag described by a 10-byte header or footer with the
/// given magic.
fn id3v2_size(header: &[u8], magic: &[u8; 3]) -> Option<u64> {
    if header.len() < ID3V2_HEADER_SIZE as usize || &header[..3] != magic {
        return None;
    }
    if header[3] == 0xFF || header[4] == 0xFF {
        return None;
    }
    let body = syncsafe(&header[6..10])?;
    let footer = if header[5] & ID3V2_FOOTER_FLAG != 0 {
        ID3V2_HEADER_SIZE
    } else {
        0
    };
    Some(ID3V2_HEADER_SIZE + body + footer)
}

/// If the source starts with an ID3v2 tag, position it right after the tag
/// and return the tag size. Otherwise rewind to the start and return 0.
pub fn skip_id3v2_tag<S: ByteSource + ?Sized>(source: &mut S) -> io::Result<u64> {
    source.seek_to(0)?;
    let mut header = [0u8; ID3V2_HEADER_SIZE as usize];
    let n = source.read_up_to(&mut header)?;

    match id3v2_size(&header[..n], b"ID3") {
        Some(size) => {
            source.seek_to(size)?;
            Ok(size)
        }
        None => {
            source.seek_to(0)?;
            Ok(0)
        }
    }
}

/// Size of a tag at the end of the source (ID3v1 or an ID3v2 tag with a
/// footer), or 0. The source position is preserved.
pub fn id3_tag_size_at_end<S: ByteSource + ?Sized>(source: &mut S) -> io::Result<u64> {
    let start = source.tell()?;
    let size = source.total_size()?;
    let mut found = 0;

    if size >= ID3V1_SIZE {
        source.seek_to(size - ID3V1_SIZE)?;
        let mut magic = [0u8; 3];
        if source.read_up_to(&mut magic)? == 3 && &magic == b"TAG" {
            found = ID3V1_SIZE;
        }
    }

    if found == 0 && size >= ID3V2_HEADER_SIZE {
        source.seek_to(size - ID3V2_HEADER_SIZE)?;
        let mut footer = [0u8; ID3V2_HEADER_SIZE as usize];
        let n = source.read_up_to(&mut footer)?;
        if let Some(tag) = id3v2_size(&footer[..n], b"3DI") {
            if tag <= size {
                found = tag;
            }
        }
    }

    source.seek_to(start)?;
    Ok(found)
}

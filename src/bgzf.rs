//! BGZF block decompression.
//!
//! BGZF is a concatenation of RFC1952 gzip members, each holding one
//! deflate block of at most 64 KiB uncompressed output and carrying its
//! own compressed size in a `BC` extra subfield:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Header (18 bytes)                                    │
//! │  - Magic 0x1f 0x8b, method 0x08, flags 0x04 (FEXTRA) │
//! │  - MTIME, XFL, OS: 6 bytes                           │
//! │  - XLEN (= 6), "BC", subfield len (= 2), BSIZE       │
//! │    where BSIZE = total member size - 1               │
//! ├──────────────────────────────────────────────────────┤
//! │ Deflate-compressed data                              │
//! ├──────────────────────────────────────────────────────┤
//! │ Footer: CRC32, ISIZE (4 bytes each)                  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The BAI index addresses this stream with virtual offsets; decoding a
//! [`Chunk`] trims the first member's output at `start.data_pos` and the
//! last member's output at `end.data_pos`.

use flate2::read::DeflateDecoder;
use std::io::Read;

use crate::bam::index::Chunk;
use crate::error::{Result, TrackError};

/// Size of the BGZF member header.
pub const BGZF_HEADER_SIZE: usize = 18;

/// Size of the BGZF member footer (CRC32 + ISIZE).
pub const BGZF_FOOTER_SIZE: usize = 8;

/// Maximum size of one compressed BGZF member.
pub const MAX_BLOCK_SIZE: usize = 65536;

/// One decoded member: its compressed span and inflated payload.
struct Member {
    compressed_size: usize,
    data: Vec<u8>,
}

/// Parse and inflate the member starting at `data[pos..]`.
///
/// Returns `None` when fewer than a whole member remains at `pos` —
/// callers that fetched a bounded prefix of the stream treat that as a
/// clean stop; callers holding the whole resource treat it as truncation.
fn next_member(data: &[u8], pos: usize) -> Result<Option<Member>> {
    let rest = &data[pos..];
    if rest.len() < BGZF_HEADER_SIZE {
        return Ok(None);
    }
    if rest[0] != 0x1f || rest[1] != 0x8b {
        return Err(TrackError::format(format!(
            "invalid BGZF magic at offset {}: {:02x} {:02x}",
            pos, rest[0], rest[1]
        )));
    }
    if rest[2] != 0x08 {
        return Err(TrackError::format(format!(
            "invalid BGZF compression method at offset {}: {:#04x}",
            pos, rest[2]
        )));
    }
    if rest[3] & 0x04 == 0 {
        return Err(TrackError::format(format!(
            "BGZF member at offset {} missing FEXTRA flag",
            pos
        )));
    }
    if rest[12] != b'B' || rest[13] != b'C' {
        return Err(TrackError::format(format!(
            "BGZF member at offset {} missing BC subfield",
            pos
        )));
    }

    // BSIZE is the total member size minus one.
    let bsize = u16::from_le_bytes([rest[16], rest[17]]) as usize;
    let total = bsize + 1;
    if total < BGZF_HEADER_SIZE + BGZF_FOOTER_SIZE {
        return Err(TrackError::format(format!(
            "BGZF member at offset {} too small: {} bytes",
            pos, total
        )));
    }
    if rest.len() < total {
        return Ok(None);
    }

    let uncompressed_size = u32::from_le_bytes([
        rest[total - 4],
        rest[total - 3],
        rest[total - 2],
        rest[total - 1],
    ]) as usize;
    let compressed = &rest[BGZF_HEADER_SIZE..total - BGZF_FOOTER_SIZE];

    let mut out = Vec::with_capacity(uncompressed_size);
    DeflateDecoder::new(compressed)
        .read_to_end(&mut out)
        .map_err(|e| {
            TrackError::format(format!("BGZF inflate failed at offset {}: {}", pos, e))
        })?;

    let expected_crc = u32::from_le_bytes([
        rest[total - 8],
        rest[total - 7],
        rest[total - 6],
        rest[total - 5],
    ]);
    let mut crc = flate2::Crc::new();
    crc.update(&out);
    if crc.sum() != expected_crc {
        return Err(TrackError::format(format!(
            "BGZF CRC mismatch at offset {}: expected {:#010x}, got {:#010x}",
            pos,
            expected_crc,
            crc.sum()
        )));
    }

    Ok(Some(Member {
        compressed_size: total,
        data: out,
    }))
}

/// Decompress a complete concatenation of BGZF members.
///
/// Fails on a truncated trailing member; use [`decompress_prefix`] when
/// the input is a bounded slice of a longer stream.
pub fn decompress_all(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        match next_member(data, pos)? {
            Some(member) => {
                out.extend_from_slice(&member.data);
                pos += member.compressed_size;
            }
            None => {
                return Err(TrackError::format(format!(
                    "truncated BGZF member at offset {}",
                    pos
                )))
            }
        }
    }
    Ok(out)
}

/// Decompress whole members from the front of `data`, stopping cleanly at
/// a trailing partial member. Used when only a bounded prefix of the
/// stream was fetched (the BAM header path).
pub fn decompress_prefix(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        match next_member(data, pos)? {
            Some(member) => {
                out.extend_from_slice(&member.data);
                pos += member.compressed_size;
            }
            None => break,
        }
    }
    Ok(out)
}

/// Decompress the members covering `chunk`, where `data` begins at the
/// compressed offset `chunk.start.block_pos`.
///
/// The first member's output is trimmed by `chunk.start.data_pos`; the
/// member whose relative compressed offset reaches the chunk end is
/// truncated to `chunk.end.data_pos + 1` bytes of output and decoding
/// stops there.
pub fn decompress_chunk(data: &[u8], chunk: &Chunk) -> Result<Vec<u8>> {
    let rel_end = chunk
        .end
        .block_pos()
        .checked_sub(chunk.start.block_pos())
        .ok_or_else(|| {
            TrackError::format(format!(
                "chunk end {} precedes chunk start {}",
                chunk.end.block_pos(),
                chunk.start.block_pos()
            ))
        })?;

    let mut out = Vec::new();
    let mut pos: u64 = 0;
    let mut first = true;
    while (pos as usize) < data.len() {
        let member = match next_member(data, pos as usize)? {
            Some(m) => m,
            None => break,
        };
        let mut lo = 0usize;
        if first {
            lo = (chunk.start.data_pos() as usize).min(member.data.len());
            first = false;
        }
        if pos >= rel_end {
            // Final member of the chunk: keep output through end.data_pos.
            let hi = (chunk.end.data_pos() as usize + 1).min(member.data.len());
            if lo < hi {
                out.extend_from_slice(&member.data[lo..hi]);
            }
            return Ok(out);
        }
        out.extend_from_slice(&member.data[lo..]);
        pos += member.compressed_size as u64;
    }
    Ok(out)
}

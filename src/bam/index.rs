//! BAI index support for random-access BAM queries.
//!
//! # Format
//!
//! ```text
//! magic[4]       "BAI\1"
//! n_ref[4]       Number of reference sequences (int32)
//! For each reference:
//!   n_bin[4]     Number of bins (int32)
//!   For each bin:
//!     bin[4]     Bin number (uint32)
//!     n_chunk[4] Number of chunks (int32)
//!     For each chunk:
//!       chunk_beg[8]  Virtual offset
//!       chunk_end[8]  Virtual offset
//!   n_intv[4]    Number of 16 kbp intervals (int32)
//!   For each interval:
//!     ioffset[8] Virtual offset
//! n_no_coor[8]   Unplaced read count (optional)
//! ```
//!
//! Bin number 37450 is a pseudo-bin carrying per-reference statistics
//! rather than chunks; it is parsed into [`RefStats`] and excluded from
//! interval queries. All BAI integers are little-endian regardless of any
//! other file's byte order.

use std::collections::HashMap;

use crate::binary::{BinaryCursor, ByteOrder};
use crate::error::{Result, TrackError};

/// BAI magic bytes ("BAI\x01", the value 21 578 050 little-endian).
const BAI_MAGIC: &[u8; 4] = b"BAI\x01";

/// The pseudo-bin number carrying reference statistics.
pub const PSEUDO_BIN: u32 = 37450;

/// Coalescing bound for adjacent chunks: one byte under the maximum BGZF
/// member, matching observed reference behavior. Chunks whose compressed
/// gap is smaller than this are fetched as one range.
pub const CHUNK_MERGE_DISTANCE: u64 = 65_000;

/// Largest representable reference position in the binning scheme.
const MAX_BIN_END: u32 = 1 << 29;

/// Virtual file offset into a BGZF stream.
///
/// The high 48 bits address the compressed member; the low 16 bits
/// address a byte within its inflated output. The raw ordering is the
/// total order (block position, then data position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    /// Compose an offset from its block and in-block positions.
    pub fn new(block_pos: u64, data_pos: u16) -> Self {
        VirtualOffset((block_pos << 16) | data_pos as u64)
    }

    /// Interpret a raw 64-bit value.
    pub fn from_raw(raw: u64) -> Self {
        VirtualOffset(raw)
    }

    /// The raw 64-bit encoding.
    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// Compressed offset of the containing BGZF member.
    pub fn block_pos(self) -> u64 {
        self.0 >> 16
    }

    /// Byte position within the member's inflated output.
    pub fn data_pos(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// True for the all-zero offset, which linear indexes use for
    /// windows with no data.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// A `[start, end)` span of BAM records addressed by virtual offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// First record's virtual offset
    pub start: VirtualOffset,
    /// Virtual offset just past the last record
    pub end: VirtualOffset,
}

impl Chunk {
    /// Create a chunk; `start` must not exceed `end`.
    pub fn new(start: VirtualOffset, end: VirtualOffset) -> Self {
        Chunk { start, end }
    }
}

/// Statistics from a reference's pseudo-bin.
#[derive(Debug, Clone, Copy)]
pub struct RefStats {
    /// Number of mapped reads on this reference
    pub mapped: u64,
    /// Number of unmapped reads placed on this reference
    pub unmapped: u64,
}

/// Index data for one reference sequence.
#[derive(Debug, Clone, Default)]
pub struct BaiRef {
    /// Binning index: bin number to chunk list
    bins: HashMap<u32, Vec<Chunk>>,
    /// Linear index: lowest virtual offset per 16 kbp window
    linear: Vec<VirtualOffset>,
    /// Pseudo-bin statistics, when present
    pub stats: Option<RefStats>,
}

/// Parsed BAI index. Immutable once built.
#[derive(Debug, Clone)]
pub struct BaiIndex {
    refs: Vec<BaiRef>,
    /// Count of reads without coordinates, when the index records it
    pub unplaced: Option<u64>,
}

impl BaiIndex {
    /// Parse a complete BAI byte buffer.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 8 || &data[..4] != BAI_MAGIC {
            return Err(TrackError::format("invalid BAI magic"));
        }
        let mut c = BinaryCursor::new(data, ByteOrder::LittleEndian);
        c.pos = 4;

        let n_ref = c.read_i32()?;
        if n_ref < 0 {
            return Err(TrackError::format(format!(
                "invalid BAI reference count: {}",
                n_ref
            )));
        }

        let mut refs = Vec::with_capacity(n_ref as usize);
        for _ in 0..n_ref {
            refs.push(Self::parse_ref(&mut c)?);
        }

        let unplaced = if c.remaining() >= 8 {
            Some(c.read_u64()?)
        } else {
            None
        };

        Ok(BaiIndex { refs, unplaced })
    }

    fn parse_ref(c: &mut BinaryCursor<'_>) -> Result<BaiRef> {
        let n_bin = c.read_i32()?;
        if n_bin < 0 {
            return Err(TrackError::format(format!("invalid bin count: {}", n_bin)));
        }

        let mut bins = HashMap::with_capacity(n_bin as usize);
        let mut stats = None;
        for _ in 0..n_bin {
            let bin = c.read_u32()?;
            let n_chunk = c.read_i32()?;
            if n_chunk < 0 {
                return Err(TrackError::format(format!(
                    "invalid chunk count: {}",
                    n_chunk
                )));
            }
            if bin == PSEUDO_BIN {
                // Normally two pseudo-chunks: placed span, then read counts.
                let mut vals = Vec::with_capacity(2 * n_chunk as usize);
                for _ in 0..2 * n_chunk {
                    vals.push(c.read_u64()?);
                }
                if let [_, _, mapped, unmapped] = vals[..] {
                    stats = Some(RefStats { mapped, unmapped });
                }
                continue;
            }
            let entry: &mut Vec<Chunk> = bins.entry(bin).or_default();
            for _ in 0..n_chunk {
                let start = VirtualOffset::from_raw(c.read_u64()?);
                let end = VirtualOffset::from_raw(c.read_u64()?);
                entry.push(Chunk::new(start, end));
            }
        }

        let n_intv = c.read_i32()?;
        if n_intv < 0 {
            return Err(TrackError::format(format!(
                "invalid interval count: {}",
                n_intv
            )));
        }
        let mut linear = Vec::with_capacity(n_intv as usize);
        for _ in 0..n_intv {
            linear.push(VirtualOffset::from_raw(c.read_u64()?));
        }

        Ok(BaiRef {
            bins,
            linear,
            stats,
        })
    }

    /// Number of references the index covers.
    pub fn reference_count(&self) -> usize {
        self.refs.len()
    }

    /// Pseudo-bin statistics for a reference, when recorded.
    pub fn stats(&self, ref_id: usize) -> Option<RefStats> {
        self.refs.get(ref_id).and_then(|r| r.stats)
    }

    /// The smallest compressed offset any indexed record starts at, used
    /// to bound the header fetch. Zero when the index is empty.
    pub fn first_alignment_block(&self) -> u64 {
        self.refs
            .iter()
            .flat_map(|r| r.linear.iter())
            .filter(|v| !v.is_zero())
            .map(|v| v.block_pos())
            .min()
            .unwrap_or(0)
    }

    /// Chunks that may contain alignments overlapping `[start, end)` on
    /// `ref_id`, pruned by the linear index, sorted and coalesced under
    /// the [`CHUNK_MERGE_DISTANCE`] rule.
    pub fn chunks_for(&self, ref_id: usize, start: u32, end: u32) -> Vec<Chunk> {
        let r = match self.refs.get(ref_id) {
            Some(r) => r,
            None => return Vec::new(),
        };

        let mut chunks: Vec<Chunk> = Vec::new();
        for bin in reg2bins(start, end) {
            if let Some(c) = r.bins.get(&bin) {
                chunks.extend_from_slice(c);
            }
        }
        if chunks.is_empty() {
            return chunks;
        }

        if let Some(lowest) = linear_lower_bound(&r.linear, start, end) {
            chunks.retain(|c| c.end >= lowest);
        }

        chunks.sort_by_key(|c| c.start);
        coalesce(chunks)
    }
}

/// Lowest virtual offset of any record overlapping the query's 16 kbp
/// windows. `None` when the linear index is absent or records nothing
/// for the span.
fn linear_lower_bound(linear: &[VirtualOffset], start: u32, end: u32) -> Option<VirtualOffset> {
    if linear.is_empty() {
        return None;
    }
    let last = linear.len() - 1;
    let i_start = ((start >> 14) as usize).min(last);
    let i_end = ((end >> 14) as usize).min(last);
    linear[i_start..=i_end]
        .iter()
        .copied()
        .filter(|v| !v.is_zero())
        .min()
}

/// Bin numbers whose span overlaps `[start, end)` under the UCSC 5-level
/// scheme. Bin 0 (the root) is always included; `end` is capped at 2^29.
pub fn reg2bins(start: u32, end: u32) -> Vec<u32> {
    let mut bins = vec![0u32];
    if end <= start {
        return bins;
    }
    let start = start.min(MAX_BIN_END);
    let end = end.min(MAX_BIN_END) - 1; // inclusive

    for (shift, offset) in [(26u32, 1u32), (23, 9), (20, 73), (17, 585), (14, 4681)] {
        for bin in (offset + (start >> shift))..=(offset + (end >> shift)) {
            bins.push(bin);
        }
    }
    bins
}

/// Merge sorted chunks whose compressed gap is under
/// [`CHUNK_MERGE_DISTANCE`], widening the merged end to the larger of
/// the two. Amortizes round trips when chunks sit in nearby members.
fn coalesce(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match merged.last_mut() {
            Some(cur)
                if chunk.start.block_pos() < cur.end.block_pos() + CHUNK_MERGE_DISTANCE =>
            {
                cur.end = cur.end.max(chunk.end);
            }
            _ => merged.push(chunk),
        }
    }
    merged
}

//! R+ tree traversal.
//!
//! The R+ tree indexes data blocks by rectangles over `(chromosome id,
//! base)` pairs. A 48-byte header sits at the index offset; the root node
//! follows immediately. Each node is a 4-byte preamble `(is_leaf,
//! reserved, count)` and `count` items — 32 bytes for leaves (rectangle
//! plus data offset and size), 24 bytes for children (rectangle plus
//! child offset). The same overlap test prunes at every level, so the
//! walker carries no state besides the query.

use super::RTREE_MAGIC;
use crate::binary::{BinaryCursor, ByteOrder};
use crate::error::{Result, TrackError};
use crate::source::RangeSource;

/// A query rectangle over `(chromosome id, base)` pairs.
#[derive(Debug, Clone, Copy)]
pub struct RegionQuery {
    /// First chromosome id
    pub start_chrom: u32,
    /// Start base on the first chromosome
    pub start_base: u32,
    /// Last chromosome id
    pub end_chrom: u32,
    /// End base (exclusive) on the last chromosome
    pub end_base: u32,
}

/// A leaf of the R+ tree: one data block and the rectangle it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RTreeLeaf {
    /// First chromosome id covered
    pub start_chrom: u32,
    /// Start base on the first chromosome
    pub start_base: u32,
    /// Last chromosome id covered
    pub end_chrom: u32,
    /// End base on the last chromosome
    pub end_base: u32,
    /// File offset of the encoded block
    pub data_offset: u64,
    /// Size of the encoded block in bytes
    pub data_size: u64,
}

/// Does the query rectangle overlap an item spanning
/// `(start_chrom, start_base)` to `(end_chrom, end_base)`?
fn overlaps(q: &RegionQuery, start_chrom: u32, start_base: u32, end_chrom: u32, end_base: u32) -> bool {
    (q.end_chrom > start_chrom || (q.end_chrom == start_chrom && q.end_base >= start_base))
        && (q.start_chrom < end_chrom || (q.start_chrom == end_chrom && q.start_base <= end_base))
}

/// Validate the 48-byte R+ tree header at `index_offset` and walk the
/// tree, returning leaves whose rectangles overlap `query` in file
/// (ascending chromosome, base) order.
pub fn find_leaves(
    source: &mut dyn RangeSource,
    order: ByteOrder,
    index_offset: u64,
    query: &RegionQuery,
) -> Result<Vec<RTreeLeaf>> {
    let head = source.read(index_offset, Some(48))?;
    let mut c = BinaryCursor::new(&head, order);
    let magic = c.read_u32()?;
    if magic != RTREE_MAGIC {
        return Err(TrackError::format(format!(
            "invalid R+ tree magic {:#010x} at offset {}",
            magic, index_offset
        )));
    }

    let mut leaves = Vec::new();
    walk(source, order, index_offset + 48, query, &mut leaves)?;
    Ok(leaves)
}

fn walk(
    source: &mut dyn RangeSource,
    order: ByteOrder,
    node_offset: u64,
    query: &RegionQuery,
    out: &mut Vec<RTreeLeaf>,
) -> Result<()> {
    let preamble = source.read(node_offset, Some(4))?;
    let mut c = BinaryCursor::new(&preamble, order);
    let is_leaf = c.read_u8()?;
    let _reserved = c.read_u8()?;
    let count = c.read_u16()? as u64;

    if is_leaf > 1 {
        return Err(TrackError::format(format!(
            "invalid R+ tree node flag {} at offset {}",
            is_leaf, node_offset
        )));
    }

    let item_size: u64 = if is_leaf == 1 { 32 } else { 24 };
    let items = source.read(node_offset + 4, Some(count * item_size))?;
    let mut c = BinaryCursor::new(&items, order);

    if is_leaf == 1 {
        for _ in 0..count {
            let start_chrom = c.read_u32()?;
            let start_base = c.read_u32()?;
            let end_chrom = c.read_u32()?;
            let end_base = c.read_u32()?;
            let data_offset = c.read_long()?;
            let data_size = c.read_long()?;
            if overlaps(query, start_chrom, start_base, end_chrom, end_base) {
                out.push(RTreeLeaf {
                    start_chrom,
                    start_base,
                    end_chrom,
                    end_base,
                    data_offset,
                    data_size,
                });
            }
        }
    } else {
        let mut children = Vec::new();
        for _ in 0..count {
            let start_chrom = c.read_u32()?;
            let start_base = c.read_u32()?;
            let end_chrom = c.read_u32()?;
            let end_base = c.read_u32()?;
            let child_offset = c.read_long()?;
            if overlaps(query, start_chrom, start_base, end_chrom, end_base) {
                children.push(child_offset);
            }
        }
        for child in children {
            walk(source, order, child, query, out)?;
        }
    }
    Ok(())
}

//! BBI header, zoom table and chromosome B+ tree.
//!
//! The common header is 64 bytes. Everything between it and the start of
//! the full data section — the zoom level table, optional autosql text,
//! optional total summary and the chromosome B+ tree — is fetched as one
//! contiguous range and decoded in place, so opening a file costs two
//! round trips.

use std::collections::HashMap;

use super::{CHROM_TREE_MAGIC, BIGBED_MAGIC, BIGWIG_MAGIC};
use crate::binary::{BinaryCursor, ByteOrder};
use crate::error::{Result, TrackError};
use crate::source::RangeSource;
use crate::types::FileKind;

/// The fixed-size BBI common header.
#[derive(Debug, Clone, Copy)]
pub struct CommonHeader {
    /// BigWig or BigBed
    pub kind: FileKind,
    /// Byte order every multi-byte field in the file uses
    pub byte_order: ByteOrder,
    /// Format version
    pub version: u16,
    /// Number of zoom levels
    pub zoom_levels: u16,
    /// Offset of the chromosome B+ tree
    pub chrom_tree_offset: u64,
    /// Offset of the full data section
    pub full_data_offset: u64,
    /// Offset of the full-resolution R+ tree
    pub full_index_offset: u64,
    /// Number of bed columns (BigBed)
    pub field_count: u16,
    /// Number of columns with autosql definitions (BigBed)
    pub defined_field_count: u16,
    /// Offset of the autosql text, 0 when absent
    pub auto_sql_offset: u64,
    /// Offset of the total summary, 0 when absent
    pub total_summary_offset: u64,
    /// Decompressed block size hint; 0 means blocks are stored raw
    pub uncompress_buf_size: u32,
}

/// One zoom level: reduction factor and the offsets of its data and index.
#[derive(Debug, Clone, Copy)]
pub struct ZoomLevelHeader {
    /// Bases summarized per zoom record
    pub reduction_level: u32,
    /// Offset of the zoom data section
    pub data_offset: u64,
    /// Offset of the zoom R+ tree
    pub index_offset: u64,
}

/// Whole-file summary statistics.
#[derive(Debug, Clone, Copy)]
pub struct TotalSummary {
    /// Bases with data
    pub valid_count: u64,
    /// Minimum value
    pub min_val: f64,
    /// Maximum value
    pub max_val: f64,
    /// Sum of values
    pub sum_data: f64,
    /// Sum of squared values
    pub sum_squares: f64,
}

/// Chromosome dictionary from the B+ tree: dense ids, name and size per id.
#[derive(Debug, Clone, Default)]
pub struct ChromDict {
    by_name: HashMap<String, u32>,
    by_id: HashMap<u32, (String, u32)>,
}

impl ChromDict {
    /// Record one chromosome.
    fn insert(&mut self, name: String, id: u32, size: u32) {
        self.by_name.insert(name.clone(), id);
        self.by_id.insert(id, (name, size));
    }

    #[cfg(test)]
    pub(crate) fn insert_for_tests(&mut self, name: &str, id: u32, size: u32) {
        self.insert(name.to_owned(), id, size);
    }

    /// Numeric id for a chromosome name.
    pub fn id(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    /// Name for a numeric id.
    pub fn name(&self, id: u32) -> Option<&str> {
        self.by_id.get(&id).map(|(n, _)| n.as_str())
    }

    /// Chromosome size for a numeric id.
    pub fn size(&self, id: u32) -> Option<u32> {
        self.by_id.get(&id).map(|(_, s)| *s)
    }

    /// Number of chromosomes.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Everything learned from the head of a BBI file.
#[derive(Debug, Clone)]
pub struct BigHeader {
    /// The common header
    pub common: CommonHeader,
    /// Zoom levels, indexed as the zoom query operations expect
    /// (the on-disk table in reverse order)
    pub zoom_headers: Vec<ZoomLevelHeader>,
    /// Autosql column definitions (BigBed), when present
    pub auto_sql: Option<String>,
    /// Whole-file summary, when present
    pub total_summary: Option<TotalSummary>,
    /// Chromosome dictionary
    pub chroms: ChromDict,
    /// Number of records in the full data section
    pub data_count: u32,
}

/// Read and decode the head of a BBI file from a range source.
pub fn read_big_header(source: &mut dyn RangeSource) -> Result<BigHeader> {
    let head = source.read(0, Some(64))?;
    let (kind, byte_order) = match FileKind::detect(&head) {
        Some(k @ (FileKind::BigWig | FileKind::BigBed, _)) => k,
        Some((other, _)) => {
            return Err(TrackError::format(format!(
                "not a BigWig or BigBed file (detected {:?})",
                other
            )))
        }
        None => return Err(TrackError::format("unrecognized magic number")),
    };

    let mut c = BinaryCursor::new(&head, byte_order);
    let magic = c.read_u32()?;
    debug_assert!(magic == BIGWIG_MAGIC || magic == BIGBED_MAGIC);

    let version = c.read_u16()?;
    let zoom_levels = c.read_u16()?;
    let chrom_tree_offset = c.read_long()?;
    let full_data_offset = c.read_long()?;
    let full_index_offset = c.read_long()?;
    let field_count = c.read_u16()?;
    let defined_field_count = c.read_u16()?;
    let auto_sql_offset = c.read_long()?;
    let total_summary_offset = c.read_long()?;
    let uncompress_buf_size = c.read_u32()?;

    let common = CommonHeader {
        kind,
        byte_order,
        version,
        zoom_levels,
        chrom_tree_offset,
        full_data_offset,
        full_index_offset,
        field_count,
        defined_field_count,
        auto_sql_offset,
        total_summary_offset,
        uncompress_buf_size,
    };

    if full_data_offset < 64 {
        return Err(TrackError::format(format!(
            "full data offset {} precedes the header end",
            full_data_offset
        )));
    }

    // One range covering the zoom table, autosql, total summary, chromosome
    // tree and the record count at the start of the data section.
    let block = source.read(64, Some(full_data_offset + 4 - 64))?;
    let rel = |file_offset: u64| (file_offset - 64) as usize;

    let mut c = BinaryCursor::new(&block, byte_order);
    let mut zoom_headers = Vec::with_capacity(zoom_levels as usize);
    for _ in 0..zoom_levels {
        let reduction_level = c.read_u32()?;
        let _reserved = c.read_u32()?;
        let data_offset = c.read_long()?;
        let index_offset = c.read_long()?;
        zoom_headers.push(ZoomLevelHeader {
            reduction_level,
            data_offset,
            index_offset,
        });
    }
    // Zoom operations index the table in reverse of its on-disk order.
    zoom_headers.reverse();

    let auto_sql = if auto_sql_offset > 0 {
        if auto_sql_offset < 64 || rel(auto_sql_offset) >= block.len() {
            return Err(TrackError::format(format!(
                "autosql offset {} outside the header block",
                auto_sql_offset
            )));
        }
        let mut c = BinaryCursor::new(&block, byte_order);
        c.pos = rel(auto_sql_offset);
        Some(c.read_cstring(None)?)
    } else {
        None
    };

    let total_summary = if total_summary_offset > 0 {
        if total_summary_offset < 64 || rel(total_summary_offset) >= block.len() {
            return Err(TrackError::format(format!(
                "total summary offset {} outside the header block",
                total_summary_offset
            )));
        }
        let mut c = BinaryCursor::new(&block, byte_order);
        c.pos = rel(total_summary_offset);
        Some(TotalSummary {
            valid_count: c.read_long()?,
            min_val: c.read_f64()?,
            max_val: c.read_f64()?,
            sum_data: c.read_f64()?,
            sum_squares: c.read_f64()?,
        })
    } else {
        None
    };

    if chrom_tree_offset < 64 || rel(chrom_tree_offset) >= block.len() {
        return Err(TrackError::format(format!(
            "chromosome tree offset {} outside the header block",
            chrom_tree_offset
        )));
    }
    let chroms = read_chrom_tree(&block, rel(chrom_tree_offset), byte_order)?;

    let mut c = BinaryCursor::new(&block, byte_order);
    c.pos = rel(full_data_offset);
    let data_count = c.read_u32()?;

    Ok(BigHeader {
        common,
        zoom_headers,
        auto_sql,
        total_summary,
        chroms,
        data_count,
    })
}

impl BigHeader {
    /// The zoom level at `index`, or a format error naming the valid range.
    pub fn zoom_level(&self, index: usize) -> Result<&ZoomLevelHeader> {
        self.zoom_headers.get(index).ok_or_else(|| {
            TrackError::format(format!(
                "invalid zoom level index {} (file has {} levels)",
                index,
                self.zoom_headers.len()
            ))
        })
    }
}

/// Decode the chromosome B+ tree rooted at `root` within `block`.
fn read_chrom_tree(block: &[u8], root: usize, order: ByteOrder) -> Result<ChromDict> {
    let mut c = BinaryCursor::new(block, order);
    c.pos = root;

    let magic = c.read_u32()?;
    if magic != CHROM_TREE_MAGIC {
        return Err(TrackError::format(format!(
            "invalid chromosome tree magic {:#010x} at offset {}",
            magic,
            root + 64
        )));
    }
    let _block_size = c.read_u32()?;
    let key_size = c.read_u32()? as usize;
    let val_size = c.read_u32()?;
    let _item_count = c.read_long()?;
    let _reserved = c.read_u64()?;

    if val_size != 8 {
        return Err(TrackError::format(format!(
            "invalid chromosome tree value size: {}",
            val_size
        )));
    }

    let mut dict = ChromDict::default();
    let node_pos = c.pos;
    read_chrom_tree_node(block, node_pos, key_size, order, &mut dict)?;
    Ok(dict)
}

/// Walk one tree node depth-first. Child offsets are absolute file
/// offsets; the block was fetched from file offset 64.
fn read_chrom_tree_node(
    block: &[u8],
    pos: usize,
    key_size: usize,
    order: ByteOrder,
    dict: &mut ChromDict,
) -> Result<()> {
    let mut c = BinaryCursor::new(block, order);
    c.pos = pos;

    let is_leaf = c.read_u8()?;
    let _reserved = c.read_u8()?;
    let count = c.read_u16()?;

    if is_leaf == 1 {
        for _ in 0..count {
            let key = c.read_string_trimmed(key_size)?;
            let id = c.read_u32()?;
            let size = c.read_u32()?;
            dict.insert(key, id, size);
        }
    } else {
        let mut children = Vec::with_capacity(count as usize);
        for _ in 0..count {
            c.pos += key_size;
            children.push(c.read_long()?);
        }
        for child in children {
            if child < 64 {
                return Err(TrackError::format(format!(
                    "chromosome tree child offset {} precedes the header end",
                    child
                )));
            }
            read_chrom_tree_node(block, (child - 64) as usize, key_size, order, dict)?;
        }
    }
    Ok(())
}

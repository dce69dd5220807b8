//! Decoding of BBI data block payloads.
//!
//! A leaf's payload (after optional inflation) is one of three record
//! layouts: wig value intervals in three encodings, bed rows, or 32-byte
//! zoom summaries. All three share the interval filter: records ending
//! before the query start are skipped, and decoding stops at the first
//! record starting at or past the query end.

use flate2::read::ZlibDecoder;
use std::io::Read;

use super::bed::ColumnParser;
use super::header::ChromDict;
use super::rtree::RegionQuery;
use super::{BedRecord, WigRecord, ZoomRecord};
use crate::binary::{BinaryCursor, ByteOrder};
use crate::error::{Result, TrackError};

/// Wig block encodings.
const WIG_TYPE_BEDGRAPH: u8 = 1;
const WIG_TYPE_VARIABLE_STEP: u8 = 2;

/// Inflate a raw leaf payload when the header says blocks are compressed.
pub fn inflate_block(raw: &[u8], uncompress_buf_size: u32) -> Result<Vec<u8>> {
    if uncompress_buf_size == 0 {
        return Ok(raw.to_vec());
    }
    let mut out = Vec::with_capacity(uncompress_buf_size as usize);
    ZlibDecoder::new(raw)
        .read_to_end(&mut out)
        .map_err(|e| TrackError::format(format!("block inflate failed: {}", e)))?;
    Ok(out)
}

/// Is `(chrom, start)` at or past the query's end corner?
fn past_end(q: &RegionQuery, chrom: u32, start: u32) -> bool {
    chrom > q.end_chrom || (chrom == q.end_chrom && start >= q.end_base)
}

/// Is `(chrom, end)` before the query's start corner?
fn before_start(q: &RegionQuery, chrom: u32, end: u32) -> bool {
    chrom < q.start_chrom || (chrom == q.start_chrom && end < q.start_base)
}

fn chrom_name(chroms: &ChromDict, id: u32) -> Result<String> {
    chroms
        .name(id)
        .map(str::to_owned)
        .ok_or_else(|| TrackError::format(format!("block references unknown chromosome id {}", id)))
}

/// Decode a wig block, keeping records inside the query rectangle.
pub fn decode_wig_block(
    data: &[u8],
    order: ByteOrder,
    query: &RegionQuery,
    chroms: &ChromDict,
) -> Result<Vec<WigRecord>> {
    let mut c = BinaryCursor::new(data, order);
    let chrom_id = c.read_u32()?;
    let block_start = c.read_u32()?;
    let _block_end = c.read_u32()?;
    let item_step = c.read_u32()?;
    let item_span = c.read_u32()?;
    let kind = c.read_u8()?;
    let _reserved = c.read_u8()?;
    let item_count = c.read_u16()?;

    // A block entirely outside the queried chromosomes contributes nothing.
    if chrom_id < query.start_chrom || chrom_id > query.end_chrom {
        return Ok(Vec::new());
    }
    let chrom = chrom_name(chroms, chrom_id)?;

    let mut out = Vec::new();
    let mut fixed_start = block_start;
    for _ in 0..item_count {
        let (start, end, value) = match kind {
            WIG_TYPE_BEDGRAPH => {
                let start = c.read_u32()?;
                let end = c.read_u32()?;
                (start, end, c.read_f32()?)
            }
            WIG_TYPE_VARIABLE_STEP => {
                let start = c.read_u32()?;
                (start, start + item_span, c.read_f32()?)
            }
            _ => {
                let start = fixed_start;
                fixed_start += item_step;
                (start, start + item_span, c.read_f32()?)
            }
        };

        if past_end(query, chrom_id, start) {
            break;
        }
        if before_start(query, chrom_id, end) {
            continue;
        }
        out.push(WigRecord {
            chrom: chrom.clone(),
            start,
            end,
            value,
        });
    }
    Ok(out)
}

/// Decode a bed block, handing each record's remaining columns to the
/// column parser.
pub fn decode_bed_block(
    data: &[u8],
    order: ByteOrder,
    query: &RegionQuery,
    chroms: &ChromDict,
    parser: ColumnParser,
) -> Result<Vec<BedRecord>> {
    let mut c = BinaryCursor::new(data, order);
    let mut out = Vec::new();
    while c.remaining() > 0 {
        let chrom_id = c.read_u32()?;
        let start = c.read_u32()?;
        let end = c.read_u32()?;
        let rest = c.read_cstring(None)?;

        if past_end(query, chrom_id, start) {
            break;
        }
        if before_start(query, chrom_id, end) {
            continue;
        }
        out.push(BedRecord {
            chrom: chrom_name(chroms, chrom_id)?,
            start,
            end,
            details: parser(&rest, start),
            rest,
        });
    }
    Ok(out)
}

/// Decode a zoom block of 32-byte summary records.
pub fn decode_zoom_block(
    data: &[u8],
    order: ByteOrder,
    query: &RegionQuery,
    chroms: &ChromDict,
) -> Result<Vec<ZoomRecord>> {
    let mut c = BinaryCursor::new(data, order);
    let mut out = Vec::new();
    while c.remaining() >= 32 {
        let chrom_id = c.read_u32()?;
        let start = c.read_u32()?;
        let end = c.read_u32()?;
        let valid_count = c.read_u32()?;
        let min_val = c.read_f32()?;
        let max_val = c.read_f32()?;
        let sum_data = c.read_f32()?;
        let sum_squares = c.read_f32()?;

        if past_end(query, chrom_id, start) {
            break;
        }
        if before_start(query, chrom_id, end) {
            continue;
        }
        out.push(ZoomRecord {
            chrom: chrom_name(chroms, chrom_id)?,
            start,
            end,
            valid_count,
            min_val,
            max_val,
            sum_data,
            sum_squares,
        });
    }
    Ok(out)
}

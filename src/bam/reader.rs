//! Indexed BAM reading over a byte-range source.
//!
//! [`IndexedBamReader`] holds one source for the BAM and one for its BAI.
//! The index and header are parsed lazily on first use and memoized; each
//! query then walks index → chunks → ranged fetch → BGZF inflate →
//! alignment decode.

use super::header::BamHeader;
use super::index::BaiIndex;
use super::record::{decode_alignments, BamAlignment};
use crate::bgzf;
use crate::error::{Result, TrackError};
use crate::source::{BufferedRangeSource, FileRangeSource, RangeSource};
use bytes::Bytes;
use std::path::Path;

/// Random-access BAM reader driven by a BAI index.
pub struct IndexedBamReader {
    source: BufferedRangeSource,
    index_source: Box<dyn RangeSource>,
    header: Option<BamHeader>,
    index: Option<BaiIndex>,
}

impl IndexedBamReader {
    /// Create a reader over a BAM source and its BAI source.
    pub fn new(bam: impl RangeSource + 'static, bai: impl RangeSource + 'static) -> Self {
        IndexedBamReader {
            source: BufferedRangeSource::new(bam),
            index_source: Box::new(bai),
            header: None,
            index: None,
        }
    }

    /// Open local `.bam` and `.bai` files.
    pub fn from_paths<P: AsRef<Path>, Q: AsRef<Path>>(bam: P, bai: Q) -> Result<Self> {
        Ok(Self::new(
            FileRangeSource::open(bam)?,
            FileRangeSource::open(bai)?,
        ))
    }

    /// The parsed BAI index, loaded on first use.
    pub fn index(&mut self) -> Result<&BaiIndex> {
        if self.index.is_none() {
            let bytes = self.index_source.read(0, None)?;
            self.index = Some(BaiIndex::parse(&bytes)?);
        }
        Ok(self.index.as_ref().unwrap())
    }

    /// The parsed BAM header, loaded on first use. The fetch is bounded by
    /// the index's first alignment block plus one maximum BGZF member.
    pub fn header(&mut self) -> Result<&BamHeader> {
        if self.header.is_none() {
            let bound = self.index()?.first_alignment_block() + bgzf::MAX_BLOCK_SIZE as u64;
            let compressed = self.read_clamped(0, bound)?;
            let inflated = bgzf::decompress_prefix(&compressed)?;
            self.header = Some(BamHeader::parse(&inflated)?);
        }
        Ok(self.header.as_ref().unwrap())
    }

    /// Alignments overlapping `[start, end)` on `chrom`, in file order.
    pub fn read(&mut self, chrom: &str, start: u32, end: u32) -> Result<Vec<BamAlignment>> {
        let ref_id = self
            .header()?
            .reference_id(chrom)
            .ok_or_else(|| TrackError::DataMissing {
                name: chrom.to_owned(),
            })?;
        let chunks = self.index()?.chunks_for(ref_id, start, end);

        let mut alignments = Vec::new();
        for chunk in chunks {
            let fetch_start = chunk.start.block_pos();
            let fetch_len =
                chunk.end.block_pos() + bgzf::MAX_BLOCK_SIZE as u64 - fetch_start;
            let compressed = self.read_clamped(fetch_start, fetch_len)?;
            let inflated = bgzf::decompress_chunk(&compressed, &chunk)?;
            alignments.extend(decode_alignments(&inflated, ref_id as i32, start, end, chrom)?);
        }
        Ok(alignments)
    }

    /// Fetch `[offset, offset+size)`, falling back to the resource tail
    /// when the span runs past the end.
    fn read_clamped(&mut self, offset: u64, size: u64) -> Result<Bytes> {
        match self.source.read(offset, Some(size)) {
            Ok(b) => Ok(b),
            Err(e) if e.is_out_of_range() => self.source.read(offset, None),
            Err(e) => Err(e),
        }
    }
}

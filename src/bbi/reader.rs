//! BigWig and BigBed readers.
//!
//! Both readers memoize the decoded header on first use and serve each
//! query by walking the R+ tree for overlapping leaves, fetching and
//! inflating each leaf's block, and decoding records under the interval
//! filter. The streaming surfaces decode one block at a time; the
//! collected surfaces just drain the stream.

use std::path::Path;

use super::bed::{parse_ucsc, ColumnParser};
use super::header::{read_big_header, BigHeader, ChromDict};
use super::records::{decode_bed_block, decode_wig_block, decode_zoom_block, inflate_block};
use super::rtree::{find_leaves, RTreeLeaf, RegionQuery};
use super::{BedRecord, WigRecord, ZoomRecord};
use crate::binary::ByteOrder;
use crate::error::{Result, TrackError};
use crate::source::{BufferedRangeSource, FileRangeSource, RangeSource};
use crate::types::FileKind;

/// Shared plumbing behind the BigWig and BigBed readers.
struct BbiReader {
    source: BufferedRangeSource,
    header: Option<BigHeader>,
}

/// Header fields a query needs after the borrow on the header ends.
struct QueryPlan {
    order: ByteOrder,
    uncompress_buf_size: u32,
    index_offset: u64,
    query: RegionQuery,
    chroms: ChromDict,
}

impl BbiReader {
    fn new(source: impl RangeSource + 'static) -> Self {
        BbiReader {
            source: BufferedRangeSource::new(source),
            header: None,
        }
    }

    fn header(&mut self, expect: FileKind) -> Result<&BigHeader> {
        if self.header.is_none() {
            let header = read_big_header(&mut self.source)?;
            if header.common.kind != expect {
                return Err(TrackError::format(format!(
                    "expected a {:?} file but found {:?}",
                    expect, header.common.kind
                )));
            }
            self.header = Some(header);
        }
        Ok(self.header.as_ref().unwrap())
    }

    /// Resolve chromosome names and pick the index to walk: the full
    /// index, or a zoom level's when `zoom_index` is given.
    fn plan(
        &mut self,
        expect: FileKind,
        start_chrom: &str,
        start_base: u32,
        end_chrom: &str,
        end_base: u32,
        zoom_index: Option<usize>,
    ) -> Result<QueryPlan> {
        let header = self.header(expect)?;
        let missing = |name: &str| TrackError::DataMissing {
            name: name.to_owned(),
        };
        let query = RegionQuery {
            start_chrom: header.chroms.id(start_chrom).ok_or_else(|| missing(start_chrom))?,
            start_base,
            end_chrom: header.chroms.id(end_chrom).ok_or_else(|| missing(end_chrom))?,
            end_base,
        };
        let index_offset = match zoom_index {
            Some(i) => header.zoom_level(i)?.index_offset,
            None => header.common.full_index_offset,
        };
        Ok(QueryPlan {
            order: header.common.byte_order,
            uncompress_buf_size: header.common.uncompress_buf_size,
            index_offset,
            query,
            chroms: header.chroms.clone(),
        })
    }

    fn leaves(&mut self, plan: &QueryPlan) -> Result<Vec<RTreeLeaf>> {
        find_leaves(&mut self.source, plan.order, plan.index_offset, &plan.query)
    }

    fn block_data(&mut self, leaf: &RTreeLeaf, uncompress_buf_size: u32) -> Result<Vec<u8>> {
        let raw = self.source.read(leaf.data_offset, Some(leaf.data_size))?;
        inflate_block(&raw, uncompress_buf_size)
    }
}

/// Record stream over the blocks of one query, emitting records in file
/// order one block at a time.
pub struct RecordStream<'a, T> {
    reader: &'a mut BbiReader,
    leaves: std::vec::IntoIter<RTreeLeaf>,
    pending: std::vec::IntoIter<T>,
    uncompress_buf_size: u32,
    decode: Box<dyn Fn(&[u8]) -> Result<Vec<T>>>,
    failed: bool,
}

impl<T> Iterator for RecordStream<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(record) = self.pending.next() {
                return Some(Ok(record));
            }
            let leaf = self.leaves.next()?;
            let decoded = self
                .reader
                .block_data(&leaf, self.uncompress_buf_size)
                .and_then(|data| (self.decode)(&data));
            match decoded {
                Ok(records) => self.pending = records.into_iter(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn make_stream<T>(
    reader: &mut BbiReader,
    plan: QueryPlan,
    decode: impl Fn(&[u8], ByteOrder, &RegionQuery, &ChromDict) -> Result<Vec<T>> + 'static,
) -> Result<RecordStream<'_, T>> {
    let leaves = reader.leaves(&plan)?;
    let QueryPlan {
        order,
        uncompress_buf_size,
        query,
        chroms,
        ..
    } = plan;
    Ok(RecordStream {
        reader,
        leaves: leaves.into_iter(),
        pending: Vec::new().into_iter(),
        uncompress_buf_size,
        decode: Box::new(move |data| decode(data, order, &query, &chroms)),
        failed: false,
    })
}

/// Random-access BigWig reader.
pub struct BigWigReader {
    inner: BbiReader,
}

impl BigWigReader {
    /// Create a reader over any range source.
    pub fn new(source: impl RangeSource + 'static) -> Self {
        BigWigReader {
            inner: BbiReader::new(source),
        }
    }

    /// Open a local BigWig file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(FileRangeSource::open(path)?))
    }

    /// The decoded header, read on first use.
    pub fn header(&mut self) -> Result<&BigHeader> {
        self.inner.header(FileKind::BigWig)
    }

    /// Wig records overlapping the query rectangle, in file order.
    pub fn read_data(
        &mut self,
        start_chrom: &str,
        start_base: u32,
        end_chrom: &str,
        end_base: u32,
    ) -> Result<Vec<WigRecord>> {
        self.stream_data(start_chrom, start_base, end_chrom, end_base)?
            .collect()
    }

    /// Streaming variant of [`read_data`](Self::read_data).
    pub fn stream_data(
        &mut self,
        start_chrom: &str,
        start_base: u32,
        end_chrom: &str,
        end_base: u32,
    ) -> Result<RecordStream<'_, WigRecord>> {
        let plan = self.inner.plan(
            FileKind::BigWig,
            start_chrom,
            start_base,
            end_chrom,
            end_base,
            None,
        )?;
        make_stream(&mut self.inner, plan, decode_wig_block)
    }

    /// Zoom records from level `zoom_index` overlapping the query.
    pub fn read_zoom_data(
        &mut self,
        start_chrom: &str,
        start_base: u32,
        end_chrom: &str,
        end_base: u32,
        zoom_index: usize,
    ) -> Result<Vec<ZoomRecord>> {
        self.stream_zoom_data(start_chrom, start_base, end_chrom, end_base, zoom_index)?
            .collect()
    }

    /// Streaming variant of [`read_zoom_data`](Self::read_zoom_data).
    pub fn stream_zoom_data(
        &mut self,
        start_chrom: &str,
        start_base: u32,
        end_chrom: &str,
        end_base: u32,
        zoom_index: usize,
    ) -> Result<RecordStream<'_, ZoomRecord>> {
        let plan = self.inner.plan(
            FileKind::BigWig,
            start_chrom,
            start_base,
            end_chrom,
            end_base,
            Some(zoom_index),
        )?;
        make_stream(&mut self.inner, plan, decode_zoom_block)
    }
}

/// Random-access BigBed reader.
pub struct BigBedReader {
    inner: BbiReader,
}

impl BigBedReader {
    /// Create a reader over any range source.
    pub fn new(source: impl RangeSource + 'static) -> Self {
        BigBedReader {
            inner: BbiReader::new(source),
        }
    }

    /// Open a local BigBed file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(FileRangeSource::open(path)?))
    }

    /// The decoded header, read on first use.
    pub fn header(&mut self) -> Result<&BigHeader> {
        self.inner.header(FileKind::BigBed)
    }

    /// Bed records overlapping the query rectangle. `parser` interprets
    /// the columns after the interval; the UCSC parser is the default.
    pub fn read_data(
        &mut self,
        start_chrom: &str,
        start_base: u32,
        end_chrom: &str,
        end_base: u32,
        parser: Option<ColumnParser>,
    ) -> Result<Vec<BedRecord>> {
        self.stream_data(start_chrom, start_base, end_chrom, end_base, parser)?
            .collect()
    }

    /// Streaming variant of [`read_data`](Self::read_data).
    pub fn stream_data(
        &mut self,
        start_chrom: &str,
        start_base: u32,
        end_chrom: &str,
        end_base: u32,
        parser: Option<ColumnParser>,
    ) -> Result<RecordStream<'_, BedRecord>> {
        let parser = parser.unwrap_or(parse_ucsc);
        let plan = self.inner.plan(
            FileKind::BigBed,
            start_chrom,
            start_base,
            end_chrom,
            end_base,
            None,
        )?;
        make_stream(&mut self.inner, plan, move |data, order, query, chroms| {
            decode_bed_block(data, order, query, chroms, parser)
        })
    }

    /// Zoom records from level `zoom_index` overlapping the query.
    pub fn read_zoom_data(
        &mut self,
        start_chrom: &str,
        start_base: u32,
        end_chrom: &str,
        end_base: u32,
        zoom_index: usize,
    ) -> Result<Vec<ZoomRecord>> {
        self.stream_zoom_data(start_chrom, start_base, end_chrom, end_base, zoom_index)?
            .collect()
    }

    /// Streaming variant of [`read_zoom_data`](Self::read_zoom_data).
    pub fn stream_zoom_data(
        &mut self,
        start_chrom: &str,
        start_base: u32,
        end_chrom: &str,
        end_base: u32,
        zoom_index: usize,
    ) -> Result<RecordStream<'_, ZoomRecord>> {
        let plan = self.inner.plan(
            FileKind::BigBed,
            start_chrom,
            start_base,
            end_chrom,
            end_base,
            Some(zoom_index),
        )?;
        make_stream(&mut self.inner, plan, decode_zoom_block)
    }
}

//! rangetrack: random-access range queries over genomics binary formats
//!
//! # Overview
//!
//! rangetrack reads records overlapping a half-open genomic interval from
//! BigWig, BigBed, 2bit and indexed BAM files without reading the whole
//! file: each format's own index is walked to find the byte ranges that
//! matter, only those are fetched and decoded.
//!
//! ## Key features
//!
//! - **Byte-range transports**: readers pull bytes through the
//!   [`RangeSource`] trait — local files (with mmap for large ones) and
//!   HTTP range requests are built in, anything else is one impl away
//! - **Index-driven fetches**: BBI R+ trees, the BAI binning and linear
//!   indexes, and the 2bit sequence table decide what to download
//! - **Both byte orders**: BigWig/BigBed/2bit headers pick the order once
//!   and every decoder follows it
//! - **Streaming surfaces**: record-at-a-time iterators beside the
//!   collected variants
//!
//! ## Quick start
//!
//! ```no_run
//! use rangetrack::BigWigReader;
//!
//! # fn main() -> rangetrack::Result<()> {
//! let mut bw = BigWigReader::from_path("signal.bw")?;
//! for record in bw.read_data("chr14", 19_485_000, "chr14", 20_000_100)? {
//!     println!("{}:{}-{} = {}", record.chrom, record.start, record.end, record.value);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Indexed BAM queries work the same way over a BAM/BAI pair:
//!
//! ```no_run
//! use rangetrack::IndexedBamReader;
//!
//! # fn main() -> rangetrack::Result<()> {
//! let mut bam = IndexedBamReader::from_paths("aln.bam", "aln.bam.bai")?;
//! for aln in bam.read("chr22", 20_890_000, 20_910_000)? {
//!     println!("{} @ {} {}", aln.read_name, aln.start, aln.cigar_string());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module organization
//!
//! - [`source`]: the byte-range transport seam and its implementations
//! - [`bbi`]: BigWig/BigBed headers, R+ tree, record decoding
//! - [`bam`]: BAI index, BAM header and alignment decoding
//! - [`twobit`]: packed sequence decoding with N and mask overlays
//! - [`bgzf`]: BGZF member decompression with chunk trimming

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bam;
pub mod bbi;
pub mod bgzf;
pub mod binary;
pub mod error;
pub mod source;
pub mod twobit;
pub mod types;

// Re-export commonly used types
pub use bam::{BamAlignment, BamHeader, IndexedBamReader};
pub use bbi::{BedRecord, BigBedReader, BigWigReader, WigRecord, ZoomRecord};
pub use binary::{BinaryCursor, ByteOrder};
pub use error::{Result, TrackError};
pub use source::{BufferedRangeSource, FileRangeSource, RangeSource};
#[cfg(feature = "network")]
pub use source::HttpRangeSource;
pub use twobit::TwoBitReader;
pub use types::FileKind;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

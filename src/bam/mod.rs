//! Indexed BAM reading.
//!
//! A BAM file is a BGZF-compressed stream of alignment records preceded by
//! a header with the reference dictionary. Its companion BAI index maps
//! genomic intervals to chunks of the compressed stream via UCSC
//! hierarchical binning, a 16 kbp linear index and virtual offsets.

pub mod header;
pub mod index;
pub mod reader;
pub mod record;

pub use header::BamHeader;
pub use index::{BaiIndex, Chunk, VirtualOffset};
pub use reader::IndexedBamReader;
pub use record::{flags, BamAlignment, CigarOp};

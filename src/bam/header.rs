//! BAM header and reference dictionary.
//!
//! The header sits at the front of the BGZF stream: magic `BAM\x01`, the
//! SAM header text, then the reference dictionary whose list position is
//! the reference id used by records and the BAI.

use std::collections::HashMap;

use crate::binary::{BinaryCursor, ByteOrder};
use crate::error::{Result, TrackError};

/// BAM magic bytes.
const BAM_MAGIC: &[u8; 4] = b"BAM\x01";

/// One reference sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Reference name (e.g. "chr1")
    pub name: String,
    /// Reference length in bases
    pub length: u32,
}

/// Decoded BAM header.
#[derive(Debug, Clone)]
pub struct BamHeader {
    /// SAM header text (@HD, @SQ, @RG, @PG lines)
    pub text: String,
    references: Vec<Reference>,
    by_name: HashMap<String, usize>,
}

impl BamHeader {
    /// Parse the header from the inflated head of the BGZF stream.
    /// Trailing alignment bytes after the dictionary are ignored.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 || &data[..4] != BAM_MAGIC {
            return Err(TrackError::format("invalid BAM magic"));
        }
        let mut c = BinaryCursor::new(data, ByteOrder::LittleEndian);
        c.pos = 4;

        let l_text = c.read_i32()?;
        if l_text < 0 {
            return Err(TrackError::format(format!(
                "invalid SAM header length: {}",
                l_text
            )));
        }
        let text = c.read_string(l_text as usize)?;

        let n_ref = c.read_i32()?;
        if n_ref < 0 {
            return Err(TrackError::format(format!(
                "invalid reference count: {}",
                n_ref
            )));
        }

        let mut references = Vec::with_capacity(n_ref as usize);
        let mut by_name = HashMap::with_capacity(n_ref as usize);
        for i in 0..n_ref {
            let l_name = c.read_i32()?;
            if l_name <= 0 {
                return Err(TrackError::format(format!(
                    "invalid name length {} for reference {}",
                    l_name, i
                )));
            }
            let name = c.read_cstring(Some(l_name as usize))?;
            let length = c.read_u32()?;
            by_name.insert(name.clone(), i as usize);
            references.push(Reference { name, length });
        }

        Ok(BamHeader {
            text,
            references,
            by_name,
        })
    }

    /// Reference id for a name; ids are dictionary positions.
    pub fn reference_id(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Reference name for an id.
    pub fn reference_name(&self, id: usize) -> Option<&str> {
        self.references.get(id).map(|r| r.name.as_str())
    }

    /// The reference dictionary in file order.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Number of references.
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }
}

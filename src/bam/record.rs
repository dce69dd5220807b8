//! BAM alignment record decoding.
//!
//! # Binary format (little-endian)
//!
//! ```text
//! block_size (int32): record size excluding this field
//! refID (int32), pos (int32)
//! l_read_name (uint8), mapq (uint8), bin (uint16)
//! n_cigar_op (uint16), flag (uint16), l_seq (int32)
//! next_refID (int32), next_pos (int32), tlen (int32)
//! read_name (char[l_read_name], NUL-terminated)
//! cigar (uint32[n_cigar_op]): length << 4 | op
//! seq (uint8[(l_seq+1)/2]): two 4-bit base codes per byte
//! qual (char[l_seq]), then optional tags to block end
//! ```

use crate::binary::{BinaryCursor, ByteOrder};
use crate::error::{Result, TrackError};

/// SAM flag bits.
pub mod flags {
    /// Template has multiple segments
    pub const READ_PAIRED: u16 = 0x1;
    /// Each segment properly aligned
    pub const PROPER_PAIR: u16 = 0x2;
    /// Segment unmapped
    pub const READ_UNMAPPED: u16 = 0x4;
    /// Next segment unmapped
    pub const MATE_UNMAPPED: u16 = 0x8;
    /// Segment on the reverse strand
    pub const READ_STRAND: u16 = 0x10;
    /// Next segment on the reverse strand
    pub const MATE_STRAND: u16 = 0x20;
    /// First segment in the template
    pub const FIRST_OF_PAIR: u16 = 0x40;
    /// Last segment in the template
    pub const SECOND_OF_PAIR: u16 = 0x80;
    /// Secondary alignment
    pub const SECONDARY: u16 = 0x100;
    /// Failed quality checks
    pub const QC_FAIL: u16 = 0x200;
    /// PCR or optical duplicate
    pub const DUPLICATE: u16 = 0x400;
    /// Supplementary alignment
    pub const SUPPLEMENTARY: u16 = 0x800;
}

/// CIGAR operation characters, indexed by the 4-bit op code.
const CIGAR_OPS: &[u8; 9] = b"MIDNSHP=X";

/// Two base codes per sequence byte, high nibble first.
const SEQ_CODES: &[u8; 16] = b"=ACMGRSVTWYHKDBN";

/// One CIGAR operation with its offset into the read sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    /// Operation character from `MIDNSHP=X`
    pub op: char,
    /// Operation length
    pub len: u32,
    /// Offset into the read sequence where this operation begins
    pub seq_offset: u32,
}

impl std::fmt::Display for CigarOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.len, self.op)
    }
}

/// A decoded alignment overlapping the queried interval.
#[derive(Debug, Clone, PartialEq)]
pub struct BamAlignment {
    /// Reference name, resolved through the header dictionary
    pub chrom: String,
    /// 0-based leftmost reference position
    pub start: i32,
    /// Bitwise SAM flags (see [`flags`])
    pub flags: u16,
    /// Forward strand (`flags & READ_STRAND == 0`)
    pub strand: bool,
    /// Read name
    pub read_name: String,
    /// CIGAR operations
    pub cigar: Vec<CigarOp>,
    /// Template length (TLEN)
    pub template_length: i32,
    /// Mapping quality
    pub mapping_quality: u8,
    /// Read bases
    pub sequence: String,
    /// Phred base qualities
    pub qualities: Vec<u8>,
    /// Reference bases consumed by the CIGAR (`MDN=X` ops)
    pub length_on_ref: u32,
}

impl BamAlignment {
    /// The CIGAR rendered as a SAM string.
    pub fn cigar_string(&self) -> String {
        self.cigar.iter().map(|op| op.to_string()).collect()
    }
}

/// Decode alignments from an inflated chunk, keeping those overlapping
/// `[start, end)` on `ref_id`. Skipped records are jumped over by their
/// block size; a partial record at the end of the buffer terminates the
/// walk (chunk trimming ends on a record boundary, so trailing partials
/// only occur on over-fetched tails).
pub fn decode_alignments(
    data: &[u8],
    ref_id: i32,
    start: u32,
    end: u32,
    chrom: &str,
) -> Result<Vec<BamAlignment>> {
    let mut c = BinaryCursor::new(data, ByteOrder::LittleEndian);
    let mut out = Vec::new();

    while c.remaining() >= 4 {
        let block_size = c.read_i32()?;
        if block_size <= 0 {
            break;
        }
        let block_end = c.pos + block_size as usize;
        if block_end > data.len() {
            break;
        }

        let block_ref_id = c.read_i32()?;
        let pos = c.read_i32()?;
        let l_read_name = c.read_u8()? as usize;
        let mapq = c.read_u8()?;
        let _bin = c.read_u16()?;
        let n_cigar_op = c.read_u16()? as usize;
        let flag = c.read_u16()?;
        let l_seq = c.read_i32()?;
        let _mate_ref_id = c.read_i32()?;
        let _mate_pos = c.read_i32()?;
        let tlen = c.read_i32()?;

        if l_seq < 0 {
            return Err(TrackError::format(format!(
                "negative sequence length {} at offset {}",
                l_seq,
                c.pos - 16
            )));
        }

        let overlaps = block_ref_id != -1
            && block_ref_id == ref_id
            && i64::from(pos) <= i64::from(end)
            && i64::from(pos) + i64::from(l_seq) >= i64::from(start);
        if !overlaps {
            c.pos = block_end;
            continue;
        }

        if l_read_name == 0 {
            return Err(TrackError::format(format!(
                "zero read name length at offset {}",
                c.pos
            )));
        }
        let name_bytes = c.read_bytes(l_read_name)?;
        let name_end = if name_bytes.last() == Some(&0) {
            l_read_name - 1
        } else {
            l_read_name
        };
        let read_name = std::str::from_utf8(&name_bytes[..name_end])
            .map_err(|e| TrackError::format(format!("invalid UTF-8 read name: {}", e)))?
            .to_owned();

        let mut cigar = Vec::with_capacity(n_cigar_op);
        let mut seq_offset = 0u32;
        let mut length_on_ref = 0u32;
        for _ in 0..n_cigar_op {
            let raw = c.read_u32()?;
            let len = raw >> 4;
            let code = (raw & 0xF) as usize;
            if code >= CIGAR_OPS.len() {
                return Err(TrackError::format(format!(
                    "invalid CIGAR op code {} at offset {}",
                    code,
                    c.pos - 4
                )));
            }
            let op = CIGAR_OPS[code] as char;
            cigar.push(CigarOp {
                op,
                len,
                seq_offset,
            });
            if matches!(op, 'M' | 'I' | 'S' | '=' | 'X') {
                seq_offset += len;
            }
            if matches!(op, 'M' | 'D' | 'N' | '=' | 'X') {
                length_on_ref += len;
            }
        }

        let l_seq = l_seq as usize;
        let seq_bytes = c.read_bytes(l_seq.div_ceil(2))?;
        let mut sequence = String::with_capacity(l_seq);
        for (i, byte) in seq_bytes.iter().enumerate() {
            sequence.push(SEQ_CODES[(byte >> 4) as usize] as char);
            if 2 * i + 1 < l_seq {
                sequence.push(SEQ_CODES[(byte & 0xF) as usize] as char);
            }
        }
        sequence.truncate(l_seq);

        let qualities = c.read_bytes(l_seq)?.to_vec();

        // Optional tags run to the block boundary.
        c.pos = block_end;

        out.push(BamAlignment {
            chrom: chrom.to_owned(),
            start: pos,
            flags: flag,
            strand: flag & flags::READ_STRAND == 0,
            read_name,
            cigar,
            template_length: tlen,
            mapping_quality: mapq,
            sequence,
            qualities,
            length_on_ref,
        });
    }

    Ok(out)
}

//! Shared types.

use crate::bbi::{BIGBED_MAGIC, BIGWIG_MAGIC};
use crate::binary::ByteOrder;
use crate::twobit::TWOBIT_MAGIC;

/// The file kinds this crate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// BigWig track
    BigWig,
    /// BigBed track
    BigBed,
    /// 2bit packed sequence
    TwoBit,
    /// BGZF-compressed BAM
    Bam,
}

impl FileKind {
    /// Determine the file kind from its first bytes. Magic numbers are
    /// probed little-endian first, then big-endian; BAM is recognized by
    /// the gzip framing of its BGZF stream.
    pub fn detect(head: &[u8]) -> Option<(FileKind, ByteOrder)> {
        if head.len() >= 2 && head[0] == 0x1f && head[1] == 0x8b {
            return Some((FileKind::Bam, ByteOrder::LittleEndian));
        }
        if head.len() < 4 {
            return None;
        }
        let bytes: [u8; 4] = head[..4].try_into().ok()?;
        for (order, magic) in [
            (ByteOrder::LittleEndian, u32::from_le_bytes(bytes)),
            (ByteOrder::BigEndian, u32::from_be_bytes(bytes)),
        ] {
            let kind = match magic {
                BIGWIG_MAGIC => Some(FileKind::BigWig),
                BIGBED_MAGIC => Some(FileKind::BigBed),
                TWOBIT_MAGIC => Some(FileKind::TwoBit),
                _ => None,
            };
            if let Some(kind) = kind {
                return Some((kind, order));
            }
        }
        None
    }
}

//! 2bit sequence reading.
//!
//! A 2bit file packs four bases per byte over the alphabet `TCAG`,
//! most-significant pair first. Two run lists overlay the packed bases:
//! N-blocks (positions that read as `N`) and mask blocks (positions
//! reported lowercase). The header is a flat table of `(name, offset)`
//! entries; each sequence record at its offset carries the sizes, both
//! run lists, and the packed data position.

use std::collections::HashMap;
use std::path::Path;

use crate::binary::{BinaryCursor, ByteOrder};
use crate::error::{Result, TrackError};
use crate::source::{BufferedRangeSource, FileRangeSource, RangeSource};

/// 2bit magic number.
pub const TWOBIT_MAGIC: u32 = 0x1A41_2743;

/// Decode table: each byte expands to four bases over `TCAG`.
static BASE_TABLE: [[u8; 4]; 256] = build_base_table();

const fn build_base_table() -> [[u8; 4]; 256] {
    let alphabet = [b'T', b'C', b'A', b'G'];
    let mut table = [[0u8; 4]; 256];
    let mut byte = 0usize;
    while byte < 256 {
        let mut slot = 0usize;
        while slot < 4 {
            table[byte][slot] = alphabet[(byte >> (2 * (3 - slot))) & 0x3];
            slot += 1;
        }
        byte += 1;
    }
    table
}

/// The on-disk layout of one sequence: its size, the two run lists and
/// where its packed bases start. Loaded once per sequence and memoized.
#[derive(Debug, Clone)]
pub struct SequenceRecord {
    /// Number of bases in the sequence
    pub dna_size: u32,
    /// `(start, size)` runs that read as `N`, sorted, non-overlapping
    pub n_blocks: Vec<(u32, u32)>,
    /// `(start, size)` soft-masked runs, sorted, non-overlapping
    pub mask_blocks: Vec<(u32, u32)>,
    /// File offset of the packed bases
    pub packed_offset: u64,
}

/// Random-access 2bit reader.
pub struct TwoBitReader {
    source: BufferedRangeSource,
    order: Option<ByteOrder>,
    index: Option<HashMap<String, u32>>,
    records: HashMap<String, SequenceRecord>,
}

impl TwoBitReader {
    /// Create a reader over any range source.
    pub fn new(source: impl RangeSource + 'static) -> Self {
        TwoBitReader {
            source: BufferedRangeSource::new(source),
            order: None,
            index: None,
            records: HashMap::new(),
        }
    }

    /// Open a local 2bit file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(FileRangeSource::open(path)?))
    }

    /// Load the header and sequence table on first use.
    fn ensure_index(&mut self) -> Result<()> {
        if self.index.is_some() {
            return Ok(());
        }

        let head = self.source.read(0, Some(16))?;
        let order = match u32::from_le_bytes(head[..4].try_into().unwrap()) {
            TWOBIT_MAGIC => ByteOrder::LittleEndian,
            _ if u32::from_be_bytes(head[..4].try_into().unwrap()) == TWOBIT_MAGIC => {
                ByteOrder::BigEndian
            }
            other => {
                return Err(TrackError::format(format!(
                    "invalid 2bit magic {:#010x}",
                    other
                )))
            }
        };

        let mut c = BinaryCursor::new(&head, order);
        c.pos = 4;
        let version = c.read_u32()?;
        let sequence_count = c.read_u32()?;
        let reserved = c.read_u32()?;
        if version != 0 || reserved != 0 {
            return Err(TrackError::format(format!(
                "unsupported 2bit version/reserved: {}/{}",
                version, reserved
            )));
        }

        let mut index = HashMap::with_capacity(sequence_count as usize);
        let mut offset = 16u64;
        for _ in 0..sequence_count {
            let name_len = self.source.read(offset, Some(1))?[0] as u64;
            let entry = self.source.read(offset + 1, Some(name_len + 4))?;
            let mut c = BinaryCursor::new(&entry, order);
            let name = c.read_string(name_len as usize)?;
            let seq_offset = c.read_u32()?;
            index.insert(name, seq_offset);
            offset += 1 + name_len + 4;
        }

        self.order = Some(order);
        self.index = Some(index);
        Ok(())
    }

    /// Names of the sequences in the file.
    pub fn sequence_names(&mut self) -> Result<Vec<String>> {
        self.ensure_index()?;
        Ok(self.index.as_ref().unwrap().keys().cloned().collect())
    }

    /// The sequence record for `name`, loaded and memoized on first use.
    pub fn sequence_record(&mut self, name: &str) -> Result<&SequenceRecord> {
        self.ensure_index()?;
        if !self.records.contains_key(name) {
            let offset = *self
                .index
                .as_ref()
                .unwrap()
                .get(name)
                .ok_or_else(|| TrackError::DataMissing {
                    name: name.to_owned(),
                })?;
            let record = self.load_record(offset as u64)?;
            self.records.insert(name.to_owned(), record);
        }
        Ok(self.records.get(name).unwrap())
    }

    fn load_record(&mut self, offset: u64) -> Result<SequenceRecord> {
        let order = self.order.unwrap();
        let head = self.source.read(offset, Some(8))?;
        let mut c = BinaryCursor::new(&head, order);
        let dna_size = c.read_u32()?;
        let n_block_count = c.read_u32()? as u64;

        let mut pos = offset + 8;
        let n_blocks = self.read_block_lists(pos, n_block_count, order)?;
        pos += 8 * n_block_count;

        let count_bytes = self.source.read(pos, Some(4))?;
        let mask_block_count =
            BinaryCursor::new(&count_bytes, order).read_u32()? as u64;
        pos += 4;
        // The mask lists run to their own count, independent of the N lists.
        let mask_blocks = self.read_block_lists(pos, mask_block_count, order)?;
        pos += 8 * mask_block_count;

        let reserved_bytes = self.source.read(pos, Some(4))?;
        let reserved = BinaryCursor::new(&reserved_bytes, order).read_u32()?;
        if reserved != 0 {
            return Err(TrackError::format(format!(
                "nonzero reserved field {} in sequence record at offset {}",
                reserved, offset
            )));
        }

        Ok(SequenceRecord {
            dna_size,
            n_blocks,
            mask_blocks,
            packed_offset: pos + 4,
        })
    }

    /// Read parallel start/size arrays into `(start, size)` pairs.
    fn read_block_lists(
        &mut self,
        offset: u64,
        count: u64,
        order: ByteOrder,
    ) -> Result<Vec<(u32, u32)>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let bytes = self.source.read(offset, Some(8 * count))?;
        let mut c = BinaryCursor::new(&bytes, order);
        let mut starts = Vec::with_capacity(count as usize);
        for _ in 0..count {
            starts.push(c.read_u32()?);
        }
        let mut blocks = Vec::with_capacity(count as usize);
        for &start in &starts {
            blocks.push((start, c.read_u32()?));
        }
        Ok(blocks)
    }

    /// Bases of `[start, end)` from `name`, uppercase except soft-masked
    /// runs, with N-blocks overlaid.
    pub fn read(&mut self, name: &str, start: u32, end: u32) -> Result<String> {
        let record = self.sequence_record(name)?;
        if end > record.dna_size || start > end {
            return Err(TrackError::format(format!(
                "interval [{}, {}) outside sequence {} of size {}",
                start, end, name, record.dna_size
            )));
        }
        let (packed_offset, n_blocks, mask_blocks) = (
            record.packed_offset,
            overlapping_blocks(&record.n_blocks, start, end),
            overlapping_blocks(&record.mask_blocks, start, end),
        );
        self.decode_span(packed_offset, start, end, &n_blocks, &mask_blocks)
    }

    /// Stream `[start, end)` of `name` in pieces of `chunk_size` bases.
    pub fn read_chunked(
        &mut self,
        name: &str,
        start: u32,
        end: u32,
        chunk_size: u32,
    ) -> Result<SequenceChunks<'_>> {
        // Validate bounds up front; chunks then decode independently.
        let record = self.sequence_record(name)?;
        if end > record.dna_size || start > end {
            return Err(TrackError::format(format!(
                "interval [{}, {}) outside sequence {} of size {}",
                start, end, name, record.dna_size
            )));
        }
        Ok(SequenceChunks {
            reader: self,
            name: name.to_owned(),
            next: start,
            end,
            chunk_size: chunk_size.max(1),
        })
    }

    /// One-hot encode `[start, end)` over the `ACGT` channels. N bases
    /// and soft-masked bases encode as the zero vector.
    pub fn read_one_hot(&mut self, name: &str, start: u32, end: u32) -> Result<Vec<[u8; 4]>> {
        let bases = self.read(name, start, end)?;
        Ok(bases
            .bytes()
            .map(|b| match b {
                b'A' => [1, 0, 0, 0],
                b'C' => [0, 1, 0, 0],
                b'G' => [0, 0, 1, 0],
                b'T' => [0, 0, 0, 1],
                _ => [0, 0, 0, 0],
            })
            .collect())
    }

    /// Fetch and decode one packed span, then overlay runs.
    fn decode_span(
        &mut self,
        packed_offset: u64,
        start: u32,
        end: u32,
        n_blocks: &[(u32, u32)],
        mask_blocks: &[(u32, u32)],
    ) -> Result<String> {
        if start == end {
            return Ok(String::new());
        }
        let first_byte = u64::from(start / 4);
        let last_byte = u64::from((end - 1) / 4);
        let bytes = self
            .source
            .read(packed_offset + first_byte, Some(last_byte - first_byte + 1))?;

        let mut decoded = Vec::with_capacity(bytes.len() * 4);
        for byte in bytes.iter() {
            decoded.extend_from_slice(&BASE_TABLE[*byte as usize]);
        }
        let lead = (start % 4) as usize;
        let mut span = decoded[lead..lead + (end - start) as usize].to_vec();

        for &(block_start, block_size) in n_blocks {
            let from = block_start.max(start);
            let to = (block_start + block_size).min(end);
            for p in from..to {
                span[(p - start) as usize] = b'N';
            }
        }
        for &(block_start, block_size) in mask_blocks {
            let from = block_start.max(start);
            let to = (block_start + block_size).min(end);
            for p in from..to {
                let b = &mut span[(p - start) as usize];
                *b = b.to_ascii_lowercase();
            }
        }

        String::from_utf8(span).map_err(|_| TrackError::format("non-ASCII decode output"))
    }
}

/// Runs intersecting `[start, end)`.
fn overlapping_blocks(blocks: &[(u32, u32)], start: u32, end: u32) -> Vec<(u32, u32)> {
    blocks
        .iter()
        .copied()
        .filter(|&(bs, size)| bs < end && bs + size > start)
        .collect()
}

/// Iterator of sequence pieces from
/// [`read_chunked`](TwoBitReader::read_chunked).
pub struct SequenceChunks<'a> {
    reader: &'a mut TwoBitReader,
    name: String,
    next: u32,
    end: u32,
    chunk_size: u32,
}

impl Iterator for SequenceChunks<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let chunk_end = self.end.min(self.next + self.chunk_size);
        let piece = self.reader.read(&self.name, self.next, chunk_end);
        self.next = chunk_end;
        if piece.is_err() {
            self.next = self.end;
        }
        Some(piece)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    //! 2bit file serialization for tests.

    use super::TWOBIT_MAGIC;

    /// One sequence to serialize: bases given uppercase, with explicit
    /// N and mask runs.
    pub struct SeqSpec {
        /// Sequence name
        pub name: &'static str,
        /// Bases over `ACGTN` (N positions must also be in `n_blocks`)
        pub bases: &'static str,
        /// `(start, size)` N runs
        pub n_blocks: Vec<(u32, u32)>,
        /// `(start, size)` mask runs
        pub mask_blocks: Vec<(u32, u32)>,
    }

    /// Serialize a 2bit file from sequence specs.
    pub fn build_twobit(seqs: &[SeqSpec]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&TWOBIT_MAGIC.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // version
        out.extend_from_slice(&(seqs.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // reserved

        let table_len: usize = seqs.iter().map(|s| 1 + s.name.len() + 4).sum();
        let mut record_offset = 16 + table_len;
        let mut records = Vec::new();
        for seq in seqs {
            out.push(seq.name.len() as u8);
            out.extend_from_slice(seq.name.as_bytes());
            out.extend_from_slice(&(record_offset as u32).to_le_bytes());
            let record = encode_record(seq);
            record_offset += record.len();
            records.push(record);
        }
        for record in records {
            out.extend_from_slice(&record);
        }
        out
    }

    fn encode_record(seq: &SeqSpec) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(seq.bases.len() as u32).to_le_bytes());
        out.extend_from_slice(&(seq.n_blocks.len() as u32).to_le_bytes());
        for (start, _) in &seq.n_blocks {
            out.extend_from_slice(&start.to_le_bytes());
        }
        for (_, size) in &seq.n_blocks {
            out.extend_from_slice(&size.to_le_bytes());
        }
        out.extend_from_slice(&(seq.mask_blocks.len() as u32).to_le_bytes());
        for (start, _) in &seq.mask_blocks {
            out.extend_from_slice(&start.to_le_bytes());
        }
        for (_, size) in &seq.mask_blocks {
            out.extend_from_slice(&size.to_le_bytes());
        }
        out.extend_from_slice(&0u32.to_le_bytes()); // reserved

        let code = |b: u8| -> u8 {
            match b {
                b'T' => 0,
                b'C' => 1,
                b'A' => 2,
                b'G' => 3,
                // N has no packed representation; T fills the slot
                _ => 0,
            }
        };
        let bases = seq.bases.as_bytes();
        let mut i = 0;
        while i < bases.len() {
            let mut byte = 0u8;
            for slot in 0..4 {
                let c = if i + slot < bases.len() {
                    code(bases[i + slot])
                } else {
                    0
                };
                byte |= c << (2 * (3 - slot));
            }
            out.push(byte);
            i += 4;
        }
        out
    }
}

//! Synthetic file fixtures shared by the integration tests.
//!
//! Everything here serializes small but structurally complete files:
//! real headers, real trees, real BGZF members, written to temp files
//! and read back through the public API.

#![allow(dead_code)]

use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;
use std::io::Write;
use tempfile::NamedTempFile;

/// Write bytes to a temp file and keep the handle alive.
pub fn temp_file(bytes: &[u8]) -> NamedTempFile {
    let mut f = NamedTempFile::new().expect("temp file");
    f.write_all(bytes).expect("write fixture");
    f
}

// ---------------------------------------------------------------------------
// BGZF
// ---------------------------------------------------------------------------

/// Build one BGZF member around `payload`.
pub fn bgzf_member(payload: &[u8]) -> Vec<u8> {
    let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
    enc.write_all(payload).unwrap();
    let deflated = enc.finish().unwrap();

    let total = 18 + deflated.len() + 8;
    let mut block = Vec::with_capacity(total);
    block.extend_from_slice(&[0x1f, 0x8b, 0x08, 0x04, 0, 0, 0, 0, 0, 0xff]);
    block.extend_from_slice(&6u16.to_le_bytes());
    block.extend_from_slice(b"BC");
    block.extend_from_slice(&2u16.to_le_bytes());
    block.extend_from_slice(&((total - 1) as u16).to_le_bytes());
    block.extend_from_slice(&deflated);
    let mut crc = flate2::Crc::new();
    crc.update(payload);
    block.extend_from_slice(&crc.sum().to_le_bytes());
    block.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    block
}

// ---------------------------------------------------------------------------
// BAM + BAI
// ---------------------------------------------------------------------------

/// Serialize a BAM header payload (uncompressed).
pub fn bam_header(text: &str, refs: &[(&str, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"BAM\x01");
    out.extend_from_slice(&(text.len() as i32).to_le_bytes());
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(&(refs.len() as i32).to_le_bytes());
    for (name, len) in refs {
        out.extend_from_slice(&((name.len() + 1) as i32).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        out.extend_from_slice(&len.to_le_bytes());
    }
    out
}

/// Serialize one alignment record (block-size prefixed, no tags).
pub fn bam_record(
    ref_id: i32,
    pos: i32,
    name: &str,
    mapq: u8,
    flag: u16,
    cigar: &[(u32, u8)],
    seq: &[u8],
    quals: &[u8],
) -> Vec<u8> {
    const SEQ_CODES: &[u8; 16] = b"=ACMGRSVTWYHKDBN";
    const CIGAR_OPS: &[u8; 9] = b"MIDNSHP=X";

    let mut body = Vec::new();
    body.extend_from_slice(&ref_id.to_le_bytes());
    body.extend_from_slice(&pos.to_le_bytes());
    body.push((name.len() + 1) as u8);
    body.push(mapq);
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&(cigar.len() as u16).to_le_bytes());
    body.extend_from_slice(&flag.to_le_bytes());
    body.extend_from_slice(&(seq.len() as i32).to_le_bytes());
    body.extend_from_slice(&(-1i32).to_le_bytes());
    body.extend_from_slice(&(-1i32).to_le_bytes());
    body.extend_from_slice(&0i32.to_le_bytes());
    body.extend_from_slice(name.as_bytes());
    body.push(0);
    for &(len, op) in cigar {
        let code = CIGAR_OPS.iter().position(|&c| c == op).unwrap() as u32;
        body.extend_from_slice(&((len << 4) | code).to_le_bytes());
    }
    let mut i = 0;
    while i < seq.len() {
        let hi = SEQ_CODES.iter().position(|&c| c == seq[i]).unwrap() as u8;
        let lo = if i + 1 < seq.len() {
            SEQ_CODES.iter().position(|&c| c == seq[i + 1]).unwrap() as u8
        } else {
            0
        };
        body.push((hi << 4) | lo);
        i += 2;
    }
    body.extend_from_slice(quals);

    let mut out = Vec::with_capacity(body.len() + 4);
    out.extend_from_slice(&(body.len() as i32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// A BAM/BAI pair: the header in its own member, each record group in its
/// own member, every group indexed as one chunk in the level-5 bin of its
/// first record's position, plus a matching 16 kbp linear index.
pub struct BamFixture {
    /// Serialized `.bam` bytes
    pub bam: Vec<u8>,
    /// Serialized `.bai` bytes
    pub bai: Vec<u8>,
}

/// Virtual offset raw encoding.
fn voffset(block: u64, data: u16) -> u64 {
    (block << 16) | data as u64
}

/// Level-5 bin number for a position.
fn bin_for(pos: u32) -> u32 {
    4681 + (pos >> 14)
}

/// Build a single-reference BAM/BAI pair from record groups. Each group
/// is `(records, first_pos)` and lands in one BGZF member.
pub fn build_bam_pair(
    ref_name: &str,
    ref_len: u32,
    groups: &[Vec<(i32, &str, &[u8])>],
) -> BamFixture {
    let header_member = bgzf_member(&bam_header("@HD\tVN:1.6\n", &[(ref_name, ref_len)]));

    let mut bam = header_member.clone();
    let mut chunks: Vec<(u32, u64, u64)> = Vec::new(); // (bin, start_raw, end_raw)
    let mut linear: Vec<u64> = Vec::new();

    for group in groups {
        let mut payload = Vec::new();
        for &(pos, name, seq) in group {
            let quals = vec![30u8; seq.len()];
            payload.extend(bam_record(
                0,
                pos,
                name,
                37,
                0,
                &[(seq.len() as u32, b'M')],
                seq,
                &quals,
            ));
        }
        let member_start = bam.len() as u64;
        bam.extend(bgzf_member(&payload));

        let start_raw = voffset(member_start, 0);
        let end_raw = voffset(member_start, (payload.len() - 1) as u16);
        let first_pos = group.first().map(|g| g.0).unwrap_or(0) as u32;
        chunks.push((bin_for(first_pos), start_raw, end_raw));

        let window = (first_pos >> 14) as usize;
        if linear.len() <= window {
            linear.resize(window + 1, 0);
        }
        if linear[window] == 0 {
            linear[window] = start_raw;
        }
    }

    // Backfill empty linear windows with the next known offset, the way
    // real indexers do, so lower-bound pruning stays conservative.
    let mut next = 0u64;
    for slot in linear.iter_mut().rev() {
        if *slot == 0 {
            *slot = next;
        } else {
            next = *slot;
        }
    }

    let mut bai = Vec::new();
    bai.extend_from_slice(b"BAI\x01");
    bai.extend_from_slice(&1i32.to_le_bytes());
    bai.extend_from_slice(&(chunks.len() as i32).to_le_bytes());
    for (bin, start, end) in &chunks {
        bai.extend_from_slice(&bin.to_le_bytes());
        bai.extend_from_slice(&1i32.to_le_bytes());
        bai.extend_from_slice(&start.to_le_bytes());
        bai.extend_from_slice(&end.to_le_bytes());
    }
    bai.extend_from_slice(&(linear.len() as i32).to_le_bytes());
    for v in &linear {
        bai.extend_from_slice(&v.to_le_bytes());
    }

    BamFixture { bam, bai }
}

// ---------------------------------------------------------------------------
// BBI (BigWig / BigBed)
// ---------------------------------------------------------------------------

/// BigWig magic.
pub const BIGWIG_MAGIC: u32 = 0x888F_FC26;
/// BigBed magic.
pub const BIGBED_MAGIC: u32 = 0x8789_F2EB;
const CHROM_TREE_MAGIC: u32 = 0x78CA_8C91;
const RTREE_MAGIC: u32 = 0x2468_ACE0;

/// One data block and the `(start_chrom, start_base, end_chrom,
/// end_base)` rectangle its R+ tree leaf advertises.
pub struct BbiBlock {
    /// Leaf rectangle
    pub rect: (u32, u32, u32, u32),
    /// Raw (pre-compression) payload
    pub payload: Vec<u8>,
}

/// Serialize a wig block (kind 1 = bedgraph, 2 = variable, 3 = fixed).
pub fn wig_block(
    chrom_id: u32,
    block_start: u32,
    block_end: u32,
    step: u32,
    span: u32,
    kind: u8,
    items: &[(u32, u32, f32)],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&chrom_id.to_le_bytes());
    out.extend_from_slice(&block_start.to_le_bytes());
    out.extend_from_slice(&block_end.to_le_bytes());
    out.extend_from_slice(&step.to_le_bytes());
    out.extend_from_slice(&span.to_le_bytes());
    out.push(kind);
    out.push(0);
    out.extend_from_slice(&(items.len() as u16).to_le_bytes());
    for &(start, end, value) in items {
        match kind {
            1 => {
                out.extend_from_slice(&start.to_le_bytes());
                out.extend_from_slice(&end.to_le_bytes());
                out.extend_from_slice(&value.to_le_bytes());
            }
            2 => {
                out.extend_from_slice(&start.to_le_bytes());
                out.extend_from_slice(&value.to_le_bytes());
            }
            _ => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
    out
}

/// Serialize a bed block from `(chrom_id, start, end, rest)` rows.
pub fn bed_block(rows: &[(u32, u32, u32, &str)]) -> Vec<u8> {
    let mut out = Vec::new();
    for &(chrom_id, start, end, rest) in rows {
        out.extend_from_slice(&chrom_id.to_le_bytes());
        out.extend_from_slice(&start.to_le_bytes());
        out.extend_from_slice(&end.to_le_bytes());
        out.extend_from_slice(rest.as_bytes());
        out.push(0);
    }
    out
}

/// Serialize a zoom block of full 8-field summary records.
pub fn zoom_block(rows: &[(u32, u32, u32, u32, f32, f32, f32, f32)]) -> Vec<u8> {
    let mut out = Vec::new();
    for &(chrom_id, start, end, valid, min, max, sum, sumsq) in rows {
        out.extend_from_slice(&chrom_id.to_le_bytes());
        out.extend_from_slice(&start.to_le_bytes());
        out.extend_from_slice(&end.to_le_bytes());
        out.extend_from_slice(&valid.to_le_bytes());
        out.extend_from_slice(&min.to_le_bytes());
        out.extend_from_slice(&max.to_le_bytes());
        out.extend_from_slice(&sum.to_le_bytes());
        out.extend_from_slice(&sumsq.to_le_bytes());
    }
    out
}

fn zlib(payload: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(payload).unwrap();
    enc.finish().unwrap()
}

fn rtree(leaves: &[(u32, u32, u32, u32, u64, u64)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&RTREE_MAGIC.to_le_bytes());
    out.extend_from_slice(&256u32.to_le_bytes());
    out.extend_from_slice(&(leaves.len() as u64).to_le_bytes());
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.push(1);
    out.push(0);
    out.extend_from_slice(&(leaves.len() as u16).to_le_bytes());
    for &(sc, sb, ec, eb, off, size) in leaves {
        out.extend_from_slice(&sc.to_le_bytes());
        out.extend_from_slice(&sb.to_le_bytes());
        out.extend_from_slice(&ec.to_le_bytes());
        out.extend_from_slice(&eb.to_le_bytes());
        out.extend_from_slice(&off.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
    }
    out
}

/// Assemble a complete BBI file: common header, zoom table, chromosome
/// tree, data section, R+ tree — and optionally one zoom level with its
/// own data and tree. When `compress` is set, block payloads are
/// zlib-compressed and the header advertises the buffer size.
pub fn build_bbi(
    magic: u32,
    chroms: &[(&str, u32, u32)],
    blocks: &[BbiBlock],
    zoom: Option<(u32, Vec<BbiBlock>)>,
    compress: bool,
) -> Vec<u8> {
    let key_size = 16usize;
    let n_zooms = usize::from(zoom.is_some());
    let zoom_len = 24 * n_zooms as u64;
    let chrom_tree_offset = 64 + zoom_len;
    let tree_len = 32 + 4 + (key_size as u64 + 8) * chroms.len() as u64;
    let full_data_offset = chrom_tree_offset + tree_len;

    let uncompress_buf_size: u32 = if compress {
        blocks
            .iter()
            .chain(zoom.iter().flat_map(|(_, b)| b.iter()))
            .map(|b| b.payload.len() as u32)
            .max()
            .unwrap_or(0)
            .max(1)
    } else {
        0
    };

    let mut out = Vec::new();
    out.extend_from_slice(&magic.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&(n_zooms as u16).to_le_bytes());
    out.extend_from_slice(&chrom_tree_offset.to_le_bytes());
    out.extend_from_slice(&full_data_offset.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes()); // full index offset, patched below
    out.extend_from_slice(&3u16.to_le_bytes());
    out.extend_from_slice(&3u16.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&uncompress_buf_size.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    assert_eq!(out.len(), 64);

    // Zoom table entry (offsets patched below).
    if let Some((reduction, _)) = &zoom {
        out.extend_from_slice(&reduction.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
    }

    // Chromosome B+ tree, one leaf node.
    out.extend_from_slice(&CHROM_TREE_MAGIC.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&(key_size as u32).to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&(chroms.len() as u64).to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.push(1);
    out.push(0);
    out.extend_from_slice(&(chroms.len() as u16).to_le_bytes());
    for (name, id, size) in chroms {
        let mut key = name.as_bytes().to_vec();
        key.resize(key_size, 0);
        out.extend_from_slice(&key);
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
    }
    assert_eq!(out.len() as u64, full_data_offset);

    // Data section: record count then the blocks.
    out.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
    let mut leaves = Vec::new();
    for block in blocks {
        let data = if compress {
            zlib(&block.payload)
        } else {
            block.payload.clone()
        };
        let (sc, sb, ec, eb) = block.rect;
        leaves.push((sc, sb, ec, eb, out.len() as u64, data.len() as u64));
        out.extend_from_slice(&data);
    }

    let index_offset = out.len() as u64;
    out.extend_from_slice(&rtree(&leaves));
    out[24..32].copy_from_slice(&index_offset.to_le_bytes());

    if let Some((_, zoom_blocks)) = &zoom {
        let zoom_data_offset = out.len() as u64;
        let mut zoom_leaves = Vec::new();
        for block in zoom_blocks {
            let data = if compress {
                zlib(&block.payload)
            } else {
                block.payload.clone()
            };
            let (sc, sb, ec, eb) = block.rect;
            zoom_leaves.push((sc, sb, ec, eb, out.len() as u64, data.len() as u64));
            out.extend_from_slice(&data);
        }
        let zoom_index_offset = out.len() as u64;
        out.extend_from_slice(&rtree(&zoom_leaves));
        out[72..80].copy_from_slice(&zoom_data_offset.to_le_bytes());
        out[80..88].copy_from_slice(&zoom_index_offset.to_le_bytes());
    }

    out
}

// ---------------------------------------------------------------------------
// 2bit
// ---------------------------------------------------------------------------

/// One sequence for the 2bit builder.
pub struct TwoBitSeq {
    /// Sequence name
    pub name: &'static str,
    /// Bases over `ACGTN`
    pub bases: String,
    /// `(start, size)` N runs
    pub n_blocks: Vec<(u32, u32)>,
    /// `(start, size)` mask runs
    pub mask_blocks: Vec<(u32, u32)>,
}

/// Serialize a 2bit file.
pub fn build_twobit(seqs: &[TwoBitSeq]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0x1A41_2743u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(seqs.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    let table_len: usize = seqs.iter().map(|s| 1 + s.name.len() + 4).sum();
    let mut record_offset = 16 + table_len;
    let mut records = Vec::new();
    for seq in seqs {
        out.push(seq.name.len() as u8);
        out.extend_from_slice(seq.name.as_bytes());
        out.extend_from_slice(&(record_offset as u32).to_le_bytes());

        let mut rec = Vec::new();
        rec.extend_from_slice(&(seq.bases.len() as u32).to_le_bytes());
        rec.extend_from_slice(&(seq.n_blocks.len() as u32).to_le_bytes());
        for (start, _) in &seq.n_blocks {
            rec.extend_from_slice(&start.to_le_bytes());
        }
        for (_, size) in &seq.n_blocks {
            rec.extend_from_slice(&size.to_le_bytes());
        }
        rec.extend_from_slice(&(seq.mask_blocks.len() as u32).to_le_bytes());
        for (start, _) in &seq.mask_blocks {
            rec.extend_from_slice(&start.to_le_bytes());
        }
        for (_, size) in &seq.mask_blocks {
            rec.extend_from_slice(&size.to_le_bytes());
        }
        rec.extend_from_slice(&0u32.to_le_bytes());

        let code = |b: u8| -> u8 {
            match b {
                b'T' => 0,
                b'C' => 1,
                b'A' => 2,
                b'G' => 3,
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
            rec.push(byte);
            i += 4;
        }

        record_offset += rec.len();
        records.push(rec);
    }
    for rec in records {
        out.extend_from_slice(&rec);
    }
    out
}

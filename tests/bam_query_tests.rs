//! End-to-end indexed BAM queries over synthetic BGZF files on disk.

mod common;

use common::{build_bam_pair, temp_file};
use rangetrack::{IndexedBamReader, TrackError};

fn reader_for(
    groups: &[Vec<(i32, &str, &[u8])>],
) -> (
    IndexedBamReader,
    (tempfile::NamedTempFile, tempfile::NamedTempFile),
) {
    let fixture = build_bam_pair("chr22", 50_818_468, groups);
    let bam = temp_file(&fixture.bam);
    let bai = temp_file(&fixture.bai);
    let reader = IndexedBamReader::from_paths(bam.path(), bai.path()).unwrap();
    (reader, (bam, bai))
}

#[test]
fn header_and_index_load_lazily() {
    let (mut reader, _files) = reader_for(&[vec![(100, "r1", b"ACGT".as_slice())]]);

    let index = reader.index().unwrap();
    assert_eq!(index.reference_count(), 1);

    let header = reader.header().unwrap();
    assert_eq!(header.reference_count(), 1);
    assert_eq!(header.reference_name(0), Some("chr22"));
    assert!(header.text.contains("VN:1.6"));
}

#[test]
fn query_returns_only_overlapping_records() {
    let (mut reader, _files) = reader_for(&[vec![
        (100, "before", b"ACGT".as_slice()),
        (500, "inside", b"ACGTACGT".as_slice()),
        (2000, "after", b"ACGT".as_slice()),
    ]]);

    let hits = reader.read("chr22", 400, 1000).unwrap();
    assert_eq!(hits.len(), 1);
    let a = &hits[0];
    assert_eq!(a.read_name, "inside");
    assert_eq!(a.chrom, "chr22");
    assert_eq!(a.start, 500);
    assert_eq!(a.sequence, "ACGTACGT");
    assert_eq!(a.mapping_quality, 37);
    assert_eq!(a.cigar_string(), "8M");
    assert_eq!(a.length_on_ref, 8);
    assert!(a.strand);
}

#[test]
fn emitted_alignment_laws_hold() {
    let (mut reader, _files) = reader_for(&[
        vec![
            (50, "a", b"ACGTACGTAC".as_slice()),
            (95, "b", b"ACGTACGTAC".as_slice()),
        ],
        vec![
            (150, "c", b"ACGTACGTAC".as_slice()),
            (20_000, "d", b"ACGTACGTAC".as_slice()),
        ],
    ]);

    let (start, end) = (100u32, 200u32);
    let hits = reader.read("chr22", start, end).unwrap();
    // "a" ends at 60 < 100; "d" starts past 200
    assert_eq!(
        hits.iter().map(|a| a.read_name.as_str()).collect::<Vec<_>>(),
        vec!["b", "c"]
    );
    for a in &hits {
        assert!(a.start <= end as i32);
        assert!(a.start + a.sequence.len() as i32 >= start as i32);
    }
}

#[test]
fn records_span_multiple_bgzf_members() {
    // Two record groups in separate members, both inside the query
    let (mut reader, _files) = reader_for(&[
        vec![(100, "m1r1", b"ACGT".as_slice()), (200, "m1r2", b"ACGT".as_slice())],
        vec![(300, "m2r1", b"ACGT".as_slice())],
    ]);

    let hits = reader.read("chr22", 0, 1000).unwrap();
    assert_eq!(hits.len(), 3);
    // File order is preserved across chunks
    assert_eq!(
        hits.iter().map(|a| a.start).collect::<Vec<_>>(),
        vec![100, 200, 300]
    );
}

#[test]
fn distant_groups_prune_via_linear_index() {
    let (mut reader, _files) = reader_for(&[
        vec![(100, "near", b"ACGT".as_slice())],
        // 10 Mbp away: a different 16 kbp window and level-5 bin
        vec![(10_000_000, "far", b"ACGT".as_slice())],
    ]);

    let near = reader.read("chr22", 0, 1000).unwrap();
    assert_eq!(near.len(), 1);
    assert_eq!(near[0].read_name, "near");

    let far = reader.read("chr22", 9_999_000, 10_001_000).unwrap();
    assert_eq!(far.len(), 1);
    assert_eq!(far[0].read_name, "far");
}

#[test]
fn unknown_reference_is_data_missing() {
    let (mut reader, _files) = reader_for(&[vec![(100, "r", b"ACGT".as_slice())]]);
    let err = reader.read("chrX", 0, 100).unwrap_err();
    assert!(matches!(err, TrackError::DataMissing { .. }));
}

#[test]
fn empty_window_returns_no_records() {
    let (mut reader, _files) = reader_for(&[vec![(100, "r", b"ACGT".as_slice())]]);
    let hits = reader.read("chr22", 40_000_000, 40_010_000).unwrap();
    assert!(hits.is_empty());
}

//! BigBed column parsers.
//!
//! BigBed stores everything after `(chrom, start, end)` as one
//! tab-separated string. What those columns mean depends on the track's
//! autosql; callers pick a parser (a plain function value) and get typed
//! fields back. The default parser follows the standard UCSC BED columns
//! through the block/exon table; the others cover the common ENCODE
//! autosql layouts. Numeric columns follow the BED declared types, so
//! signal, p-value and q-value columns parse as floats.

/// A column parser: maps the record's remaining columns and its chrom
/// start (block starts are stored relative to it) to typed fields.
pub type ColumnParser = fn(rest: &str, chrom_start: u32) -> BedDetails;

/// Typed columns from one bed row, tagged by the parser that read them.
#[derive(Debug, Clone, PartialEq)]
pub enum BedDetails {
    /// Standard UCSC BED columns
    Ucsc(UcscFields),
    /// ENCODE narrow peak (BED6+4)
    NarrowPeak(NarrowPeakFields),
    /// ENCODE broad peak (BED6+3)
    BroadPeak(BroadPeakFields),
    /// Methylation bed (BED9+2)
    Methyl(MethylFields),
    /// ENCODE TSS peak (BED6+4)
    TssPeak(TssPeakFields),
    /// ENCODE IDR peak (BED6+5)
    IdrPeak(IdrPeakFields),
}

/// One exon from the BED block table, in absolute coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exon {
    /// Exon start
    pub start: u32,
    /// Exon end
    pub end: u32,
}

/// Standard UCSC BED columns 4 through 12.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UcscFields {
    /// Feature name
    pub name: Option<String>,
    /// Score, 0-1000
    pub score: Option<u32>,
    /// Strand, '+' or '-'
    pub strand: Option<char>,
    /// Thick-drawing start
    pub thick_start: Option<u32>,
    /// Thick-drawing end
    pub thick_end: Option<u32>,
    /// Item color, normalized to `rgb(r,g,b)`
    pub color: Option<String>,
    /// Exons from the block table
    pub exons: Vec<Exon>,
}

/// ENCODE narrowPeak extra columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NarrowPeakFields {
    /// Peak name
    pub name: Option<String>,
    /// Score, 0-1000
    pub score: Option<u32>,
    /// Strand
    pub strand: Option<char>,
    /// Overall enrichment
    pub signal_value: Option<f32>,
    /// -log10 p-value
    pub p_value: Option<f32>,
    /// -log10 q-value
    pub q_value: Option<f32>,
    /// Point-source offset from start, -1 when absent
    pub peak: Option<i32>,
}

/// ENCODE broadPeak extra columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BroadPeakFields {
    /// Peak name
    pub name: Option<String>,
    /// Score, 0-1000
    pub score: Option<u32>,
    /// Strand
    pub strand: Option<char>,
    /// Overall enrichment
    pub signal_value: Option<f32>,
    /// -log10 p-value
    pub p_value: Option<f32>,
    /// -log10 q-value
    pub q_value: Option<f32>,
}

/// Methylation bed columns (BED9+2).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethylFields {
    /// Site name
    pub name: Option<String>,
    /// Score, 0-1000
    pub score: Option<u32>,
    /// Strand
    pub strand: Option<char>,
    /// Thick-drawing start
    pub thick_start: Option<u32>,
    /// Thick-drawing end
    pub thick_end: Option<u32>,
    /// Item color, normalized to `rgb(r,g,b)`
    pub color: Option<String>,
    /// Reads covering the site
    pub read_count: Option<u32>,
    /// Percentage of reads showing methylation
    pub percent_methylated: Option<f32>,
}

/// ENCODE TSS peak columns (RAMPAGE).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TssPeakFields {
    /// Peak name
    pub name: Option<String>,
    /// Score, 0-1000
    pub score: Option<u32>,
    /// Strand
    pub strand: Option<char>,
    /// Read count supporting the TSS
    pub count: Option<f32>,
    /// Associated gene id
    pub gene_id: Option<String>,
    /// Associated gene name
    pub gene_name: Option<String>,
    /// TSS id
    pub tss_id: Option<String>,
}

/// ENCODE IDR peak columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdrPeakFields {
    /// Peak name
    pub name: Option<String>,
    /// Score, 0-1000
    pub score: Option<u32>,
    /// Strand
    pub strand: Option<char>,
    /// Local IDR value
    pub local_idr: Option<f32>,
    /// Global IDR value
    pub global_idr: Option<f32>,
    /// Start of the IDR region
    pub rep1_start: Option<u32>,
    /// End of the IDR region
    pub rep1_end: Option<u32>,
}

fn col<'a>(cols: &'a [&'a str], i: usize) -> Option<&'a str> {
    cols.get(i).copied().filter(|s| !s.is_empty() && *s != ".")
}

fn col_string(cols: &[&str], i: usize) -> Option<String> {
    col(cols, i).map(str::to_owned)
}

fn col_u32(cols: &[&str], i: usize) -> Option<u32> {
    col(cols, i).and_then(|s| s.parse().ok())
}

fn col_i32(cols: &[&str], i: usize) -> Option<i32> {
    col(cols, i).and_then(|s| s.parse().ok())
}

fn col_f32(cols: &[&str], i: usize) -> Option<f32> {
    col(cols, i).and_then(|s| s.parse().ok())
}

fn col_strand(cols: &[&str], i: usize) -> Option<char> {
    col(cols, i).and_then(|s| s.chars().next()).filter(|c| *c == '+' || *c == '-')
}

/// Normalize a color column to an `rgb(r,g,b)` form: comma-separated
/// triples are wrapped unless already `rgb`-prefixed; anything else is
/// kept as written.
fn normalize_color(raw: &str) -> String {
    if raw.contains(',') && !raw.starts_with("rgb") {
        format!("rgb({})", raw)
    } else {
        raw.to_owned()
    }
}

fn col_color(cols: &[&str], i: usize) -> Option<String> {
    col(cols, i).map(normalize_color)
}

/// Parse the block table columns (counts, sizes, starts) into absolute
/// exons. Starts are stored relative to the record's chrom start.
fn parse_exons(cols: &[&str], first: usize, chrom_start: u32) -> Vec<Exon> {
    let count: usize = match col(cols, first).and_then(|s| s.parse().ok()) {
        Some(n) => n,
        None => return Vec::new(),
    };
    let sizes = match col(cols, first + 1) {
        Some(s) => s,
        None => return Vec::new(),
    };
    let starts = match col(cols, first + 2) {
        Some(s) => s,
        None => return Vec::new(),
    };

    let sizes: Vec<u32> = sizes
        .split(',')
        .filter(|t| !t.is_empty())
        .filter_map(|t| t.parse().ok())
        .collect();
    let starts: Vec<u32> = starts
        .split(',')
        .filter(|t| !t.is_empty())
        .filter_map(|t| t.parse().ok())
        .collect();

    starts
        .iter()
        .zip(sizes.iter())
        .take(count)
        .map(|(&rel, &size)| Exon {
            start: chrom_start + rel,
            end: chrom_start + rel + size,
        })
        .collect()
}

/// Default UCSC BED parser: name, score, strand, thick interval, color
/// and the exon table when present.
pub fn parse_ucsc(rest: &str, chrom_start: u32) -> BedDetails {
    let cols: Vec<&str> = rest.split('\t').collect();
    BedDetails::Ucsc(UcscFields {
        name: col_string(&cols, 0),
        score: col_u32(&cols, 1),
        strand: col_strand(&cols, 2),
        thick_start: col_u32(&cols, 3),
        thick_end: col_u32(&cols, 4),
        color: col_color(&cols, 5),
        exons: parse_exons(&cols, 6, chrom_start),
    })
}

/// ENCODE narrowPeak parser (BED6+4).
pub fn parse_narrow_peak(rest: &str, _chrom_start: u32) -> BedDetails {
    let cols: Vec<&str> = rest.split('\t').collect();
    BedDetails::NarrowPeak(NarrowPeakFields {
        name: col_string(&cols, 0),
        score: col_u32(&cols, 1),
        strand: col_strand(&cols, 2),
        signal_value: col_f32(&cols, 3),
        p_value: col_f32(&cols, 4),
        q_value: col_f32(&cols, 5),
        peak: col_i32(&cols, 6),
    })
}

/// ENCODE broadPeak parser (BED6+3).
pub fn parse_broad_peak(rest: &str, _chrom_start: u32) -> BedDetails {
    let cols: Vec<&str> = rest.split('\t').collect();
    BedDetails::BroadPeak(BroadPeakFields {
        name: col_string(&cols, 0),
        score: col_u32(&cols, 1),
        strand: col_strand(&cols, 2),
        signal_value: col_f32(&cols, 3),
        p_value: col_f32(&cols, 4),
        q_value: col_f32(&cols, 5),
    })
}

/// Methylation bed parser (BED9+2).
pub fn parse_methyl(rest: &str, _chrom_start: u32) -> BedDetails {
    let cols: Vec<&str> = rest.split('\t').collect();
    BedDetails::Methyl(MethylFields {
        name: col_string(&cols, 0),
        score: col_u32(&cols, 1),
        strand: col_strand(&cols, 2),
        thick_start: col_u32(&cols, 3),
        thick_end: col_u32(&cols, 4),
        color: col_color(&cols, 5),
        read_count: col_u32(&cols, 6),
        percent_methylated: col_f32(&cols, 7),
    })
}

/// ENCODE TSS peak parser.
pub fn parse_tss_peak(rest: &str, _chrom_start: u32) -> BedDetails {
    let cols: Vec<&str> = rest.split('\t').collect();
    BedDetails::TssPeak(TssPeakFields {
        name: col_string(&cols, 0),
        score: col_u32(&cols, 1),
        strand: col_strand(&cols, 2),
        count: col_f32(&cols, 3),
        gene_id: col_string(&cols, 4),
        gene_name: col_string(&cols, 5),
        tss_id: col_string(&cols, 6),
    })
}

/// ENCODE IDR peak parser.
pub fn parse_idr_peak(rest: &str, _chrom_start: u32) -> BedDetails {
    let cols: Vec<&str> = rest.split('\t').collect();
    BedDetails::IdrPeak(IdrPeakFields {
        name: col_string(&cols, 0),
        score: col_u32(&cols, 1),
        strand: col_strand(&cols, 2),
        local_idr: col_f32(&cols, 3),
        global_idr: col_f32(&cols, 4),
        rep1_start: col_u32(&cols, 5),
        rep1_end: col_u32(&cols, 6),
    })
}

//! Builders for small coordinate-sorted SAM inputs.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

/// Header used by every generated file.
pub const HEADER: &str = "@HD\tVN:1.6\tSO:coordinate\n\
                          @SQ\tSN:chr1\tLN:100000\n\
                          @SQ\tSN:chr2\tLN:100000\n\
                          @RG\tID:A\tSM:sample\n";

/// One read pair: a forward left mate and a reverse right mate by default.
#[derive(Debug, Clone)]
pub struct PairBuilder {
    name: String,
    reference: String,
    flags: (u16, u16),
    starts: (u32, u32),
    cigars: (String, String),
    seqs: (String, String),
    quals: (String, String),
    umi: Option<String>,
}

impl PairBuilder {
    /// A pair of 10-base reads at `left_start` and `right_start` on chr1.
    pub fn new(name: &str, left_start: u32, right_start: u32) -> Self {
        Self {
            name: name.to_string(),
            reference: "chr1".to_string(),
            flags: (99, 147),
            starts: (left_start, right_start),
            cigars: ("10M".to_string(), "10M".to_string()),
            seqs: ("ACGTACGTAC".to_string(), "TTGGCCAATT".to_string()),
            quals: ("I".repeat(10), "I".repeat(10)),
            umi: None,
        }
    }

    pub fn reference(mut self, reference: &str) -> Self {
        self.reference = reference.to_string();
        self
    }

    pub fn flags(mut self, left: u16, right: u16) -> Self {
        self.flags = (left, right);
        self
    }

    pub fn cigars(mut self, left: &str, right: &str) -> Self {
        self.cigars = (left.to_string(), right.to_string());
        self
    }

    pub fn left_read(mut self, seq: &str, qual: &str) -> Self {
        self.seqs.0 = seq.to_string();
        self.quals.0 = qual.to_string();
        self
    }

    pub fn right_read(mut self, seq: &str, qual: &str) -> Self {
        self.seqs.1 = seq.to_string();
        self.quals.1 = qual.to_string();
        self
    }

    pub fn umi(mut self, umi: &str) -> Self {
        self.umi = Some(umi.to_string());
        self
    }

    fn line(&self, flag: u16, start: u32, mate_start: u32, cigar: &str, seq: &str, qual: &str) -> String {
        let mut line = format!(
            "{}\t{flag}\t{}\t{start}\t60\t{cigar}\t=\t{mate_start}\t0\t{seq}\t{qual}\tRG:Z:A",
            self.name, self.reference
        );
        if let Some(umi) = &self.umi {
            line.push_str(&format!("\tRX:Z:{umi}"));
        }
        line
    }

    /// The two SAM lines with their sort keys.
    fn lines(&self) -> [(String, u32, String); 2] {
        let (left, right) = self.starts;
        [
            (
                self.reference.clone(),
                left,
                self.line(self.flags.0, left, right, &self.cigars.0, &self.seqs.0, &self.quals.0),
            ),
            (
                self.reference.clone(),
                right,
                self.line(self.flags.1, right, left, &self.cigars.1, &self.seqs.1, &self.quals.1),
            ),
        ]
    }
}

/// Collects pairs and renders them as a coordinate-sorted SAM file.
#[derive(Debug, Default)]
pub struct SamBuilder {
    lines: Vec<(String, u32, String)>,
}

impl SamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pair(&mut self, pair: PairBuilder) -> &mut Self {
        self.lines.extend(pair.lines());
        self
    }

    /// Adds a raw record line as-is.
    pub fn add_line(&mut self, reference: &str, position: u32, line: &str) -> &mut Self {
        self.lines.push((reference.to_string(), position, line.to_string()));
        self
    }

    /// Header plus records sorted by (reference, position); ties keep insertion order.
    pub fn to_sam(&self) -> String {
        let mut lines: Vec<&(String, u32, String)> = self.lines.iter().collect();
        lines.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        let mut text = HEADER.to_string();
        for (_, _, line) in lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    /// Header plus records in insertion order, without sorting.
    pub fn to_sam_unsorted(&self) -> String {
        let mut text = HEADER.to_string();
        for (_, _, line) in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    pub fn write(&self, path: &Path) {
        fs::write(path, self.to_sam()).expect("Failed to write SAM");
    }
}

/// `n` identical duplicate pairs named `{prefix}_{i}`.
pub fn duplicate_pairs(prefix: &str, n: usize, left_start: u32, right_start: u32) -> Vec<PairBuilder> {
    (0..n).map(|i| PairBuilder::new(&format!("{prefix}_{i}"), left_start, right_start)).collect()
}

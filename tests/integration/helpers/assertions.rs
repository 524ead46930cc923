//! Output parsing and assertion helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

/// Runs the `cfdedup` binary with `args`.
pub fn run_cfdedup(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cfdedup"))
        .args(args)
        .output()
        .expect("Failed to run cfdedup")
}

/// Asserts that the command succeeded, printing stderr otherwise.
pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "cfdedup failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// A parsed SAM record line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamRecord {
    fields: Vec<String>,
}

impl SamRecord {
    pub fn name(&self) -> &str {
        &self.fields[0]
    }

    pub fn flag(&self) -> u16 {
        self.fields[1].parse().expect("FLAG")
    }

    pub fn position(&self) -> u32 {
        self.fields[3].parse().expect("POS")
    }

    pub fn mapq(&self) -> u8 {
        self.fields[4].parse().expect("MAPQ")
    }

    pub fn cigar(&self) -> &str {
        &self.fields[5]
    }

    pub fn sequence(&self) -> &str {
        &self.fields[9]
    }

    pub fn qualities(&self) -> &str {
        &self.fields[10]
    }

    /// The value of a tag, without its `XX:T:` prefix.
    pub fn tag(&self, tag: &str) -> Option<&str> {
        self.fields[11..]
            .iter()
            .find(|f| f.len() > 5 && f.starts_with(tag) && f.as_bytes()[2] == b':')
            .map(|f| &f[5..])
    }

    pub fn is_read1(&self) -> bool {
        self.flag() & 0x40 != 0
    }
}

/// Splits SAM text into header lines and parsed records.
pub fn parse_sam(text: &str) -> (Vec<String>, Vec<SamRecord>) {
    let mut header = Vec::new();
    let mut records = Vec::new();
    for line in text.lines() {
        if line.starts_with('@') {
            header.push(line.to_string());
        } else if !line.is_empty() {
            records.push(SamRecord { fields: line.split('\t').map(str::to_string).collect() });
        }
    }
    (header, records)
}

/// Reads and parses a SAM file.
pub fn read_sam(path: &Path) -> (Vec<String>, Vec<SamRecord>) {
    parse_sam(&fs::read_to_string(path).expect("Failed to read SAM output"))
}

/// Reads a statistics JSON document.
pub fn read_stats(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("Failed to read stats"))
        .expect("Stats should be valid JSON")
}

/// Finds the record for a read name and mate.
pub fn find<'a>(records: &'a [SamRecord], name: &str, read1: bool) -> &'a SamRecord {
    records
        .iter()
        .find(|r| r.name() == name && r.is_read1() == read1)
        .unwrap_or_else(|| panic!("No record for {name} (read1: {read1})"))
}

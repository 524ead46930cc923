//! Fatal input conditions: each must exit non-zero without writing records.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::helpers::{HEADER, PairBuilder, SamBuilder, run_cfdedup};

fn run_on(dir: &TempDir, sam: &str, extra: &[&str]) -> (bool, String, String) {
    let input = dir.path().join("input.sam");
    let output = dir.path().join("output.sam");
    fs::write(&input, sam).unwrap();
    let mut args = vec!["dedup", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap()];
    args.extend_from_slice(extra);
    let result = run_cfdedup(&args);
    let written = fs::read_to_string(&output).unwrap_or_default();
    (result.status.success(), written, String::from_utf8_lossy(&result.stderr).into_owned())
}

fn no_records(output: &str) -> bool {
    output.lines().all(|l| l.starts_with('@'))
}

#[test]
fn test_record_without_read1_or_read2_is_fatal() {
    let dir = TempDir::new().unwrap();
    let sam = format!("{HEADER}bad\t1\tchr1\t100\t60\t10M\t=\t100\t0\tACGTACGTAC\tIIIIIIIIII\n");
    let (ok, output, stderr) = run_on(&dir, &sam, &[]);
    assert!(!ok);
    assert!(output.is_empty(), "nothing should be written: {output}");
    assert!(stderr.contains("READ1"), "{stderr}");
}

#[test]
fn test_unsorted_input_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut builder = SamBuilder::new();
    builder.add_pair(PairBuilder::new("late", 500, 700)).add_pair(PairBuilder::new("early", 100, 300));
    let (ok, output, stderr) = run_on(&dir, &builder.to_sam_unsorted(), &[]);
    assert!(!ok);
    assert!(no_records(&output));
    assert!(stderr.contains("not coordinate sorted"), "{stderr}");
}

#[test]
fn test_missing_umi_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut builder = SamBuilder::new();
    builder.add_pair(PairBuilder::new("a", 100, 300)).add_pair(PairBuilder::new("b", 100, 300));
    for threads in ["1", "3"] {
        let (ok, output, stderr) =
            run_on(&dir, &builder.to_sam(), &["--umi", "exact", "--threads", threads]);
        assert!(!ok);
        assert!(no_records(&output));
        assert!(stderr.contains("missing the RX UMI tag"), "{stderr}");
    }
}

#[test]
fn test_fuzzy_mode_rejects_single_part_umi() {
    let dir = TempDir::new().unwrap();
    let mut builder = SamBuilder::new();
    builder.add_pair(PairBuilder::new("a", 100, 300).umi("ACGTACGT"));
    let (ok, _, stderr) = run_on(&dir, &builder.to_sam(), &["--umi", "fuzzy"]);
    assert!(!ok);
    assert!(stderr.contains("<left>-<right>"), "{stderr}");
}

#[test]
fn test_malformed_cigar_is_fatal() {
    let dir = TempDir::new().unwrap();
    let sam = format!("{HEADER}bad\t99\tchr1\t100\t60\t10Q\t=\t300\t0\tACGTACGTAC\tIIIIIIIIII\n");
    let (ok, output, stderr) = run_on(&dir, &sam, &[]);
    assert!(!ok);
    assert!(output.is_empty());
    assert!(stderr.contains("Malformed CIGAR"), "{stderr}");
}

#[test]
fn test_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.sam");
    let result = run_cfdedup(&[
        "dedup",
        "-i",
        "/nonexistent/input.sam",
        "-o",
        output.to_str().unwrap(),
    ]);
    assert!(!result.status.success());
    assert!(!Path::new(&output).exists());
}

#[test]
fn test_discard_off_target_without_targets() {
    let dir = TempDir::new().unwrap();
    let (ok, _, stderr) = run_on(&dir, HEADER, &["--discard-off-target"]);
    assert!(!ok);
    assert!(stderr.contains("--discard-off-target requires --targets"), "{stderr}");
}

#[test]
fn test_invalid_bed_is_fatal() {
    let dir = TempDir::new().unwrap();
    let bed = dir.path().join("panel.bed");
    fs::write(&bed, "chr1\tten\t400\n").unwrap();
    let (ok, _, stderr) = run_on(&dir, HEADER, &["--targets", bed.to_str().unwrap()]);
    assert!(!ok);
    assert!(stderr.contains("Invalid BED file"), "{stderr}");
}

#[test]
fn test_zero_threads_rejected() {
    let dir = TempDir::new().unwrap();
    let (ok, _, stderr) = run_on(&dir, HEADER, &["--threads", "0"]);
    assert!(!ok);
    assert!(stderr.contains("threads"), "{stderr}");
}

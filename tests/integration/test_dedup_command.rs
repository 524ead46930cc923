//! End-to-end CLI tests for the dedup command.
//!
//! These tests run the actual `cfdedup dedup` binary and validate:
//! 1. Family collapsing and majority consensus
//! 2. The CIGAR agreement filter
//! 3. Overlap reconciliation and read-through trimming
//! 4. Target classification and the statistics document
//! 5. Identical results across thread counts

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde_json::json;
use tempfile::TempDir;

use crate::helpers::{
    HEADER, PairBuilder, SamBuilder, assert_success, duplicate_pairs, find, parse_sam, read_sam,
    read_stats, run_cfdedup,
};

struct Paths {
    _dir: TempDir,
    input: PathBuf,
    output: PathBuf,
    stats: PathBuf,
}

fn paths(builder: &SamBuilder) -> Paths {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    let output = dir.path().join("output.sam");
    let stats = dir.path().join("stats.json");
    builder.write(&input);
    Paths { _dir: dir, input, output, stats }
}

fn dedup(paths: &Paths, extra: &[&str]) {
    let mut args = vec![
        "dedup",
        "-i",
        paths.input.to_str().unwrap(),
        "-o",
        paths.output.to_str().unwrap(),
        "-s",
        paths.stats.to_str().unwrap(),
    ];
    args.extend_from_slice(extra);
    assert_success(&run_cfdedup(&args));
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_duplicates_collapse_to_majority_consensus() {
    let mut builder = SamBuilder::new();
    builder
        .add_pair(PairBuilder::new("dup_0", 100, 300))
        .add_pair(PairBuilder::new("dup_1", 100, 300).left_read("ACGGACGTAC", "IIIIIIIIII"))
        .add_pair(PairBuilder::new("dup_2", 100, 300))
        .add_pair(PairBuilder::new("solo", 500, 700));
    let paths = paths(&builder);
    dedup(&paths, &[]);

    let (header, records) = read_sam(&paths.output);
    assert_eq!(header.join("\n") + "\n", HEADER);
    assert_eq!(records.len(), 4);

    let left = find(&records, "dup_0", true);
    assert_eq!(left.sequence(), "ACGTACGTAC");
    assert_eq!(left.qualities(), "IIIIIIIIII");
    assert_eq!(left.mapq(), 60);
    assert_eq!(left.tag("cD"), Some("3"));
    assert_eq!(find(&records, "dup_0", false).tag("cD"), Some("3"));

    let solo = find(&records, "solo", true);
    assert_eq!(solo.tag("cD"), None);
    assert_eq!(solo.tag("RG"), Some("A"));

    let stats = read_stats(&paths.stats);
    assert_eq!(stats["family_sizes"], json!({"1": 1, "3": 1}));
    assert_eq!(stats["fragment_sizes"], json!({"210": 2}));
    assert_eq!(stats["records_read"], json!(8));
    assert_eq!(stats["families_emitted"], json!(2));
}

#[test]
fn test_cigar_agreement_keeps_dominant_bucket() {
    let mut builder = SamBuilder::new();
    for (i, cigar) in ["10M", "9M1S", "10M", "9M1S", "10M"].iter().enumerate() {
        builder.add_pair(PairBuilder::new(&format!("thr_{i}"), 100, 300).cigars(cigar, "10M"));
    }
    let paths = paths(&builder);
    dedup(&paths, &[]);

    let (_, records) = read_sam(&paths.output);
    assert_eq!(records.len(), 2);
    let left = find(&records, "thr_0", true);
    assert_eq!(left.cigar(), "10M");
    assert_eq!(left.tag("cD"), Some("3"));

    let stats = read_stats(&paths.stats);
    assert_eq!(stats["family_sizes"], json!({"5": 1}));
    assert_eq!(stats["families_failed_consistency"], json!(0));
}

#[test]
fn test_family_without_cigar_majority_is_dropped() {
    let mut builder = SamBuilder::new();
    builder
        .add_pair(PairBuilder::new("a", 100, 300))
        .add_pair(PairBuilder::new("b", 100, 300).cigars("9M1S", "10M"));
    let paths = paths(&builder);
    dedup(&paths, &[]);

    let (_, records) = read_sam(&paths.output);
    assert!(records.is_empty());
    let stats = read_stats(&paths.stats);
    assert_eq!(stats["families_failed_consistency"], json!(1));
    assert_eq!(stats["family_sizes"], json!({"2": 1}));
}

#[test]
fn test_min_family_size_drops_small_families() {
    let mut builder = SamBuilder::new();
    for pair in duplicate_pairs("big", 3, 100, 300) {
        builder.add_pair(pair);
    }
    builder.add_pair(PairBuilder::new("small", 1000, 1200));
    let paths = paths(&builder);
    dedup(&paths, &["--min-family-size", "2"]);

    let (_, records) = read_sam(&paths.output);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.name() == "big_0"));
    assert_eq!(read_stats(&paths.stats)["families_below_min_size"], json!(1));
}

#[test]
fn test_overlap_arbitration_corrects_low_quality_base() {
    let mut builder = SamBuilder::new();
    builder.add_pair(PairBuilder::new("ov", 100, 105).right_read("GGTACTTTTT", "5IIIIIIIII"));
    let paths = paths(&builder);
    dedup(&paths, &[]);

    let (_, records) = read_sam(&paths.output);
    let right = find(&records, "ov", false);
    assert_eq!(right.sequence(), "CGTACTTTTT");
    assert_eq!(right.qualities(), "IIIIIIIIII");
    assert_eq!(find(&records, "ov", true).sequence(), "ACGTACGTAC");

    let stats = read_stats(&paths.stats);
    assert_eq!(stats["fragment_sizes"], json!({"15": 1}));
    assert_eq!(stats["overlap_bases_examined"], json!(5));
    assert_eq!(stats["overlap_bases_corrected"], json!(1));
}

#[test]
fn test_overlap_disagreement_within_margin_is_masked() {
    let mut builder = SamBuilder::new();
    builder.add_pair(PairBuilder::new("ov", 100, 105).right_read("GGTACTTTTT", "?IIIIIIIII"));
    let paths = paths(&builder);
    dedup(&paths, &[]);

    let (_, records) = read_sam(&paths.output);
    let left = find(&records, "ov", true);
    assert_eq!(left.sequence(), "ACGTANGTAC");
    assert_eq!(left.qualities(), "IIIII#IIII");
    let right = find(&records, "ov", false);
    assert_eq!(right.sequence(), "NGTACTTTTT");
    assert_eq!(right.qualities(), "#IIIIIIIII");
    assert_eq!(read_stats(&paths.stats)["overlap_bases_masked"], json!(1));
}

#[test]
fn test_read_through_pair_is_trimmed_to_fragment() {
    let mut builder = SamBuilder::new();
    builder.add_pair(
        PairBuilder::new("rt", 100, 104)
            .flags(83, 163)
            .right_read("ACGTACAATT", "IIIIIIIIII"),
    );
    let paths = paths(&builder);
    dedup(&paths, &[]);

    let (_, records) = read_sam(&paths.output);
    for read1 in [true, false] {
        let record = find(&records, "rt", read1);
        assert_eq!(record.position(), 104);
        assert_eq!(record.cigar(), "6M");
        assert_eq!(record.sequence(), "ACGTAC");
    }
    let stats = read_stats(&paths.stats);
    assert_eq!(stats["fragment_sizes"], json!({"6": 1}));
    assert_eq!(stats["read_through_pairs_trimmed"], json!(1));
    assert_eq!(stats["overlap_bases_masked"], json!(0));
}

#[test]
fn test_max_fragment_size_suppresses_fragment_call() {
    let mut builder = SamBuilder::new();
    builder.add_pair(PairBuilder::new("long", 100, 900));
    let paths = paths(&builder);
    dedup(&paths, &["--max-fragment-size", "500"]);

    assert_eq!(read_stats(&paths.stats)["fragment_sizes"], json!({"0": 1}));
}

#[test]
fn test_targets_and_discard_off_target() {
    let mut builder = SamBuilder::new();
    builder.add_pair(PairBuilder::new("on", 100, 300)).add_pair(PairBuilder::new("off", 5000, 5200));
    let paths = paths(&builder);
    let bed = paths.input.with_file_name("panel.bed");
    fs::write(&bed, "track name=panel\nchr1\t90\t400\tpanelA\nchr2\t0\t100\tpanelB\n").unwrap();
    dedup(&paths, &["--targets", path_str(&bed), "--discard-off-target"]);

    let (_, records) = read_sam(&paths.output);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.name() == "on"));

    let stats = read_stats(&paths.stats);
    assert_eq!(stats["fragments_per_target"], json!({"panelA": 1}));
    assert_eq!(stats["ontarget_deduplicated_reads"], json!(2));
    assert_eq!(stats["offtarget_deduplicated_reads"], json!(2));
    assert_eq!(stats["families_discarded_off_target"], json!(1));
}

#[test]
fn test_exact_umi_splits_families() {
    let mut builder = SamBuilder::new();
    builder
        .add_pair(PairBuilder::new("u0", 100, 300).umi("AAA-CCC"))
        .add_pair(PairBuilder::new("u1", 100, 300).umi("AAA-GGG"))
        .add_pair(PairBuilder::new("u2", 100, 300).umi("AAA-CCC"));
    let paths = paths(&builder);
    dedup(&paths, &["--umi", "exact"]);

    let stats = read_stats(&paths.stats);
    assert_eq!(stats["family_sizes"], json!({"1": 1, "2": 1}));
    let (_, records) = read_sam(&paths.output);
    assert_eq!(records.len(), 4);
}

#[test]
fn test_fuzzy_umi_joins_on_either_half() {
    let mut builder = SamBuilder::new();
    builder
        .add_pair(PairBuilder::new("f0", 100, 300).umi("AAA-CCC"))
        .add_pair(PairBuilder::new("f1", 100, 300).umi("AAA-GGG"))
        .add_pair(PairBuilder::new("f2", 100, 300).umi("TTT-GGG"))
        .add_pair(PairBuilder::new("f3", 100, 300).umi("CCC-TTT"));
    let paths = paths(&builder);
    dedup(&paths, &["--umi", "fuzzy"]);

    let stats = read_stats(&paths.stats);
    assert_eq!(stats["family_sizes"], json!({"1": 1, "3": 1}));
    let (_, records) = read_sam(&paths.output);
    assert_eq!(find(&records, "f0", true).tag("cD"), Some("3"));
    assert_eq!(find(&records, "f3", true).tag("cD"), None);
}

#[test]
fn test_thread_counts_produce_identical_results() {
    let mut builder = SamBuilder::new();
    for family in 0..40u32 {
        let start = 100 + family * 37;
        for pair in duplicate_pairs(&format!("fam{family}"), (family % 4 + 1) as usize, start, start + 250) {
            builder.add_pair(pair);
        }
    }
    builder.add_pair(PairBuilder::new("other_ref", 100, 300).reference("chr2"));
    let paths = paths(&builder);
    dedup(&paths, &[]);
    let serial_output = fs::read_to_string(&paths.output).unwrap();
    let serial_stats = read_stats(&paths.stats);

    let parallel_output = paths.output.with_file_name("parallel.sam");
    let parallel_stats = paths.stats.with_file_name("parallel.json");
    assert_success(&run_cfdedup(&[
        "dedup",
        "-i",
        path_str(&paths.input),
        "-o",
        path_str(&parallel_output),
        "-s",
        path_str(&parallel_stats),
        "--threads",
        "4",
    ]));

    let (serial_header, mut serial_records) = parse_sam(&serial_output);
    let (parallel_header, mut parallel_records) =
        parse_sam(&fs::read_to_string(&parallel_output).unwrap());
    assert_eq!(serial_header, parallel_header);
    let key = |r: &crate::helpers::SamRecord| (r.name().to_string(), r.flag());
    serial_records.sort_by_key(key);
    parallel_records.sort_by_key(key);
    assert_eq!(serial_records, parallel_records);
    assert_eq!(serial_records.len(), 82);
    assert_eq!(serial_stats, read_stats(&parallel_stats));
}

#[test]
fn test_stats_document_accumulates_across_runs() {
    let mut builder = SamBuilder::new();
    for pair in duplicate_pairs("d", 2, 100, 300) {
        builder.add_pair(pair);
    }
    let paths = paths(&builder);
    fs::write(&paths.stats, r#"{"sample": "plasma-01", "family_sizes": {"7": 1}}"#).unwrap();

    dedup(&paths, &[]);
    dedup(&paths, &[]);

    let stats = read_stats(&paths.stats);
    assert_eq!(stats["sample"], json!("plasma-01"));
    assert_eq!(stats["family_sizes"], json!({"2": 2, "7": 1}));
    assert_eq!(stats["records_read"], json!(8));
}

#[test]
fn test_family_size_histogram() {
    let mut builder = SamBuilder::new();
    for pair in duplicate_pairs("d", 3, 100, 300) {
        builder.add_pair(pair);
    }
    builder.add_pair(PairBuilder::new("s", 1000, 1200));
    let paths = paths(&builder);
    let histogram = paths.output.with_file_name("family_sizes.txt");
    dedup(&paths, &["--family-size-histogram", path_str(&histogram)]);

    let text = fs::read_to_string(&histogram).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "family_size\tcount\tfraction\tfraction_gt_or_eq_family_size");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("1\t1\t0.5\t1"));
    assert!(lines[2].starts_with("3\t1\t0.5\t0.5"));
}

#[test]
fn test_streams_stdin_to_stdout() {
    let mut builder = SamBuilder::new();
    for pair in duplicate_pairs("d", 2, 100, 300) {
        builder.add_pair(pair);
    }

    let mut child = Command::new(env!("CARGO_BIN_EXE_cfdedup"))
        .args(["dedup", "-i", "-", "-o", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(builder.to_sam().as_bytes()).unwrap();
    let output = child.wait_with_output().unwrap();
    assert_success(&output);

    let (header, records) = parse_sam(&String::from_utf8(output.stdout).unwrap());
    assert_eq!(header.len(), 4);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.tag("cD") == Some("2")));
}

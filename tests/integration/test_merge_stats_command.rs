//! End-to-end CLI tests for the merge-stats command.

use std::fs;

use serde_json::json;
use tempfile::TempDir;

use crate::helpers::{PairBuilder, SamBuilder, assert_success, read_stats, run_cfdedup};

#[test]
fn test_merging_shard_statistics_matches_single_run() {
    let dir = TempDir::new().unwrap();
    let path = |name: &str| dir.path().join(name).to_str().unwrap().to_string();

    let mut shard_a = SamBuilder::new();
    shard_a
        .add_pair(PairBuilder::new("a0", 100, 300))
        .add_pair(PairBuilder::new("a1", 100, 300));
    let mut shard_b = SamBuilder::new();
    shard_b.add_pair(PairBuilder::new("b0", 100, 300).reference("chr2"));
    let mut combined = SamBuilder::new();
    combined
        .add_pair(PairBuilder::new("a0", 100, 300))
        .add_pair(PairBuilder::new("a1", 100, 300))
        .add_pair(PairBuilder::new("b0", 100, 300).reference("chr2"));

    for (name, builder) in [("a", &shard_a), ("b", &shard_b), ("all", &combined)] {
        builder.write(&dir.path().join(format!("{name}.sam")));
        assert_success(&run_cfdedup(&[
            "dedup",
            "-i",
            &path(&format!("{name}.sam")),
            "-o",
            &path(&format!("{name}.out.sam")),
            "-s",
            &path(&format!("{name}.json")),
        ]));
    }

    assert_success(&run_cfdedup(&[
        "merge-stats",
        "-i",
        &path("a.json"),
        &path("b.json"),
        "-o",
        &path("merged.json"),
    ]));

    let merged = read_stats(&dir.path().join("merged.json"));
    assert_eq!(merged, read_stats(&dir.path().join("all.json")));
    assert_eq!(merged["family_sizes"], json!({"1": 1, "2": 1}));
}

#[test]
fn test_merge_preserves_unknown_keys() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.json");
    let b = dir.path().join("b.json");
    let out = dir.path().join("out.json");
    fs::write(&a, r#"{"sample": "s1", "pairs": 2, "nested": {"x": 1.5}}"#).unwrap();
    fs::write(&b, r#"{"pairs": 3, "nested": {"x": 1.0, "y": 2}}"#).unwrap();

    assert_success(&run_cfdedup(&[
        "merge-stats",
        "-i",
        a.to_str().unwrap(),
        b.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
    ]));

    assert_eq!(
        read_stats(&out),
        json!({"sample": "s1", "pairs": 5, "nested": {"x": 2.5, "y": 2}})
    );
}

#[test]
fn test_merge_rejects_non_object_document() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.json");
    fs::write(&a, "[1, 2, 3]").unwrap();
    let result = run_cfdedup(&[
        "merge-stats",
        "-i",
        a.to_str().unwrap(),
        "-o",
        dir.path().join("out.json").to_str().unwrap(),
    ]);
    assert!(!result.status.success());
}

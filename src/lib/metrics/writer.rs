//! Utilities for writing metrics files.
//!
//! Tabular metrics go through fgoxide's [`DelimFile`]. The statistics document is JSON and is
//! merged into whatever document already exists at the destination, so several runs (or
//! shards of one run) can accumulate into one file.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use super::{Metric, Stats};
use crate::errors::DedupError;

/// Write metrics to a TSV file with consistent error handling.
///
/// # Errors
/// Returns an error if the file cannot be created or written to
///
/// # Example
/// ```no_run
/// use cfdedup_lib::metrics::writer::write_metrics;
/// use cfdedup_lib::metrics::FamilySizeMetrics;
/// use std::path::Path;
///
/// let metrics = vec![FamilySizeMetrics::default()];
/// write_metrics(Path::new("family_sizes.txt"), &metrics).unwrap();
/// ```
pub fn write_metrics<P: AsRef<Path>, T: Metric>(path: P, metrics: &[T]) -> Result<()> {
    let path_ref = path.as_ref();
    DelimFile::default().write_tsv(&path_ref, metrics).with_context(|| {
        format!("Failed to write {} metrics: {}", T::metric_name(), path_ref.display())
    })
}

/// Reads a statistics document, returning an empty document if the file does not exist.
///
/// # Errors
/// Returns an error if the file exists but is not a JSON object
pub fn read_stats_document<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Ok(Value::Object(Map::new()));
    }
    let invalid = |reason: String| DedupError::InvalidFileFormat {
        file_type: "statistics JSON".to_string(),
        path: path_ref.display().to_string(),
        reason,
    };

    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open statistics: {}", path_ref.display()))?;
    let value: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| invalid(e.to_string()))?;
    if !value.is_object() {
        return Err(invalid("top-level value is not an object".to_string()).into());
    }
    Ok(value)
}

/// Merges `update` into `document`.
///
/// Objects are merged key by key, integers and floats are added, and anything else in `update`
/// replaces the existing value. Keys present only in `document` are left untouched.
pub fn merge_stats_document(document: &mut Value, update: &Value) {
    match (document, update) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(key) {
                    Some(slot) => merge_stats_document(slot, value),
                    None => {
                        existing.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Number(existing), Value::Number(incoming)) => {
            let sum = match (existing.as_u64(), incoming.as_u64()) {
                (Some(a), Some(b)) => Some(Number::from(a.saturating_add(b))),
                _ => existing
                    .as_f64()
                    .zip(incoming.as_f64())
                    .and_then(|(a, b)| Number::from_f64(a + b)),
            };
            if let Some(sum) = sum {
                *existing = sum;
            }
        }
        (slot, incoming) => *slot = incoming.clone(),
    }
}

/// Serializes a value as pretty-printed JSON.
fn write_json<P: AsRef<Path>, T: Serialize + ?Sized>(path: P, value: &T) -> Result<()> {
    let path_ref = path.as_ref();
    let file = File::create(path_ref)
        .with_context(|| format!("Failed to create statistics: {}", path_ref.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to write statistics: {}", path_ref.display()))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Merges `stats` into the statistics document at `path`, creating it if needed.
///
/// # Errors
/// Returns an error if an existing document is malformed or the file cannot be written
pub fn write_stats_document<P: AsRef<Path>>(path: P, stats: &Stats) -> Result<()> {
    let path_ref = path.as_ref();
    let mut document = read_stats_document(path_ref)?;
    let update = serde_json::to_value(stats).context("Failed to serialize statistics")?;
    merge_stats_document(&mut document, &update);
    replace_stats_document(path_ref, &document)
}

/// Writes `document` to `path`, replacing any existing file only once the write has succeeded.
///
/// # Errors
/// Returns an error if the file cannot be written
pub fn replace_stats_document<P: AsRef<Path>>(path: P, document: &Value) -> Result<()> {
    let path_ref = path.as_ref();
    let tmp = path_ref.with_extension("json.tmp");
    write_json(&tmp, document)?;
    fs::rename(&tmp, path_ref)
        .with_context(|| format!("Failed to replace statistics: {}", path_ref.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::FamilySizeMetrics;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_merge_adds_numbers_and_keeps_unknown_keys() {
        let mut document = json!({
            "family_sizes": {"1": 4, "3": 1},
            "ontarget_deduplicated_reads": 10,
            "sample": "plasma-01",
        });
        let update = json!({
            "family_sizes": {"3": 2, "7": 1},
            "ontarget_deduplicated_reads": 5,
            "offtarget_deduplicated_reads": 1,
        });
        merge_stats_document(&mut document, &update);
        assert_eq!(
            document,
            json!({
                "family_sizes": {"1": 4, "3": 3, "7": 1},
                "ontarget_deduplicated_reads": 15,
                "offtarget_deduplicated_reads": 1,
                "sample": "plasma-01",
            })
        );
    }

    #[test]
    fn test_merge_floats() {
        let mut document = json!({"ratio": 0.5});
        merge_stats_document(&mut document, &json!({"ratio": 0.25}));
        assert_eq!(document, json!({"ratio": 0.75}));
    }

    #[test]
    fn test_write_stats_document_merges_existing() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("stats.json");
        fs::write(&path, r#"{"family_sizes": {"2": 1}, "run": "a"}"#)?;

        let mut stats = Stats::new();
        stats.record_family_size(2);
        stats.record_family_size(5);
        write_stats_document(&path, &stats)?;

        let document: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(document["family_sizes"]["2"], 2);
        assert_eq!(document["family_sizes"]["5"], 1);
        assert_eq!(document["families"], 2);
        assert_eq!(document["run"], "a");
        Ok(())
    }

    #[test]
    fn test_read_stats_document_missing_file_is_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let document = read_stats_document(dir.path().join("absent.json"))?;
        assert_eq!(document, json!({}));
        Ok(())
    }

    #[test]
    fn test_read_stats_document_rejects_non_object() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("stats.json");
        fs::write(&path, "[1, 2, 3]")?;
        assert!(read_stats_document(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_write_family_size_metrics() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("family_sizes.txt");
        let rows = FamilySizeMetrics::from_histogram(&[(1, 3), (2, 1)].into_iter().collect());
        write_metrics(&path, &rows)?;

        let read_back: Vec<FamilySizeMetrics> = DelimFile::default().read_tsv(&path)?;
        assert_eq!(read_back, rows);
        let content = fs::read_to_string(&path)?;
        assert!(content.starts_with("family_size\tcount\tfraction\tfraction_gt_or_eq_family_size"));
        Ok(())
    }

    #[test]
    fn test_write_metrics_invalid_path() {
        let rows = vec![FamilySizeMetrics::default()];
        let err = write_metrics("/invalid/path/metrics.txt", &rows).unwrap_err();
        assert!(err.to_string().contains("Failed to write family size metrics"));
    }
}

//! Target interval loading and fragment classification.
//!
//! Targets come from a BED file (0-based start, end-exclusive) and are held internally as
//! 1-based closed intervals. Overlapping intervals on the same reference are merged at load
//! time, so classification only ever sees disjoint, sorted intervals per reference.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ahash::AHashMap;
use anyhow::{Context, Result};

use crate::errors::DedupError;

/// A named target region, 1-based and inclusive at both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInterval {
    /// Reference sequence name.
    pub reference: String,
    /// First covered position.
    pub start: u32,
    /// Last covered position.
    pub stop: u32,
    /// Target name used as the `fragments_per_target` key.
    pub name: String,
}

impl TargetInterval {
    fn overlaps(&self, start: u32, stop: u32) -> bool {
        self.start <= stop && start <= self.stop
    }

    /// Twice the midpoint, so midpoints can be compared without rounding.
    fn doubled_midpoint(&self) -> i64 {
        i64::from(self.start) + i64::from(self.stop)
    }
}

/// A stretch of reference to be classified against the targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Reference sequence name.
    pub reference: &'a str,
    /// First covered position, 1-based.
    pub start: u32,
    /// Last covered position, inclusive.
    pub stop: u32,
}

/// The merged target intervals, indexed by reference.
#[derive(Debug, Default)]
pub struct TargetSet {
    by_reference: AHashMap<String, Vec<TargetInterval>>,
}

impl TargetSet {
    /// Loads and merges targets from a BED file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a line is not valid BED
    pub fn from_bed<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)
            .with_context(|| format!("Failed to open targets: {}", path_ref.display()))?;
        Self::from_reader(BufReader::new(file), &path_ref.display().to_string())
    }

    /// Loads and merges targets from BED text; `source` names the input in error messages.
    ///
    /// # Errors
    /// Returns an error if the input cannot be read or a line is not valid BED
    pub fn from_reader<R: BufRead>(reader: R, source: &str) -> Result<Self> {
        let mut raw: Vec<TargetInterval> = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read targets: {source}"))?;
            let line = line.trim();
            if line.is_empty()
                || line.starts_with('#')
                || line.starts_with("track")
                || line.starts_with("browser")
            {
                continue;
            }
            raw.push(parse_bed_line(line, index + 1, source)?);
        }
        Ok(Self::from_intervals(raw))
    }

    /// Builds a set from already-parsed intervals, merging any that overlap.
    #[must_use]
    pub fn from_intervals(intervals: Vec<TargetInterval>) -> Self {
        let mut by_reference: AHashMap<String, Vec<TargetInterval>> = AHashMap::new();
        for interval in intervals {
            by_reference.entry(interval.reference.clone()).or_default().push(interval);
        }
        for intervals in by_reference.values_mut() {
            // Stable sort keeps file order among equal starts, so the first name survives.
            intervals.sort_by_key(|i| i.start);
            let mut merged: Vec<TargetInterval> = Vec::with_capacity(intervals.len());
            for interval in intervals.drain(..) {
                match merged.last_mut() {
                    Some(last) if interval.start <= last.stop => {
                        last.stop = last.stop.max(interval.stop);
                    }
                    _ => merged.push(interval),
                }
            }
            *intervals = merged;
        }
        Self { by_reference }
    }

    /// Number of merged intervals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_reference.values().map(Vec::len).sum()
    }

    /// True when no targets were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds the overlapping target whose midpoint is closest to the segment's midpoint.
    ///
    /// When several targets are equally close, the left-most one is returned.
    #[must_use]
    pub fn classify(&self, segment: Segment<'_>) -> Option<&TargetInterval> {
        let intervals = self.by_reference.get(segment.reference)?;
        let first = intervals.partition_point(|i| i.stop < segment.start);
        let midpoint = i64::from(segment.start) + i64::from(segment.stop);

        let mut best: Option<(&TargetInterval, i64)> = None;
        for interval in intervals[first..].iter().take_while(|i| i.start <= segment.stop) {
            if !interval.overlaps(segment.start, segment.stop) {
                continue;
            }
            let offset = (interval.doubled_midpoint() - midpoint).abs();
            if best.is_none_or(|(_, best_offset)| offset < best_offset) {
                best = Some((interval, offset));
            }
        }
        best.map(|(interval, _)| interval)
    }
}

fn parse_bed_line(line: &str, line_number: usize, source: &str) -> Result<TargetInterval> {
    let invalid = |reason: String| DedupError::InvalidFileFormat {
        file_type: "BED".to_string(),
        path: source.to_string(),
        reason: format!("line {line_number}: {reason}"),
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 {
        return Err(invalid(format!("expected at least 3 fields, found {}", fields.len())).into());
    }
    let start: u32 =
        fields[1].parse().map_err(|_| invalid(format!("invalid start '{}'", fields[1])))?;
    let end: u32 = fields[2].parse().map_err(|_| invalid(format!("invalid end '{}'", fields[2])))?;
    if end <= start {
        return Err(invalid(format!("end {end} is not after start {start}")).into());
    }

    let reference = fields[0].to_string();
    let start = start + 1;
    let name = match fields.get(3).map(|s| s.trim()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{reference}:{start}-{end}"),
    };
    Ok(TargetInterval { reference, start, stop: end, name })
}

//! Mergeable run statistics.
//!
//! Every worker owns one [`Stats`] for the whole run. Nothing is shared while families are being
//! processed; the per-worker values are folded together with [`Stats::merge`] once the workers
//! have been joined.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pairing::PairingCounts;

/// Histograms and counters describing one deduplication run (or a shard of one).
///
/// Field names are the keys of the JSON statistics document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    /// Families by original (pre-filter) size.
    pub family_sizes: BTreeMap<usize, u64>,
    /// Emitted families by fragment size; 0 means no confident fragment call.
    pub fragment_sizes: BTreeMap<u64, u64>,
    /// Emitted fragments per target interval name.
    pub fragments_per_target: BTreeMap<String, u64>,
    /// Reads in on-target segments of emitted families.
    pub ontarget_deduplicated_reads: u64,
    /// Reads in off-target segments of emitted families.
    pub offtarget_deduplicated_reads: u64,

    /// Input records read.
    pub records_read: u64,
    /// Secondary, supplementary and both-unmapped records dropped before pairing.
    pub records_filtered: u64,
    /// Read pairs formed.
    pub pairs: u64,
    /// Reads whose mate never arrived.
    pub unpaired_reads: u64,
    /// Families (or UMI sub-families) processed.
    pub families: u64,
    /// Families that produced an output pair.
    pub families_emitted: u64,
    /// Families whose largest CIGAR bucket was below the agreement threshold.
    pub families_failed_consistency: u64,
    /// Families whose filtered size was below the minimum family size.
    pub families_below_min_size: u64,
    /// Families dropped because no segment was on target.
    pub families_discarded_off_target: u64,
    /// Overlapping base positions compared between mates.
    pub overlap_bases_examined: u64,
    /// Overlapping disagreements resolved in favour of the higher quality base.
    pub overlap_bases_corrected: u64,
    /// Overlapping disagreements masked to a no-call.
    pub overlap_bases_masked: u64,
    /// Member pairs trimmed for adapter read-through.
    pub read_through_pairs_trimmed: u64,
}

impl Stats {
    /// Creates empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one family at its original size.
    pub fn record_family_size(&mut self, size: usize) {
        self.families += 1;
        *self.family_sizes.entry(size).or_default() += 1;
    }

    /// Counts one emitted family's fragment size.
    pub fn record_fragment_size(&mut self, size: u64) {
        *self.fragment_sizes.entry(size).or_default() += 1;
    }

    /// Counts a segment classified to `target` covering `reads` reads.
    pub fn record_on_target(&mut self, target: &str, reads: u64) {
        *self.fragments_per_target.entry(target.to_string()).or_default() += 1;
        self.ontarget_deduplicated_reads += reads;
    }

    /// Counts a segment that overlapped no target.
    pub fn record_off_target(&mut self, reads: u64) {
        self.offtarget_deduplicated_reads += reads;
    }

    /// Copies the pairing stage counters.
    pub fn record_pairing(&mut self, counts: PairingCounts, unpaired_reads: u64) {
        self.records_read += counts.records_read;
        self.records_filtered += counts.records_filtered;
        self.pairs += counts.pairs;
        self.unpaired_reads += unpaired_reads;
    }

    /// Adds another shard's statistics into this one, element-wise.
    pub fn merge(&mut self, other: &Stats) {
        for (&size, &count) in &other.family_sizes {
            *self.family_sizes.entry(size).or_default() += count;
        }
        for (&size, &count) in &other.fragment_sizes {
            *self.fragment_sizes.entry(size).or_default() += count;
        }
        for (name, &count) in &other.fragments_per_target {
            *self.fragments_per_target.entry(name.clone()).or_default() += count;
        }
        self.ontarget_deduplicated_reads += other.ontarget_deduplicated_reads;
        self.offtarget_deduplicated_reads += other.offtarget_deduplicated_reads;
        self.records_read += other.records_read;
        self.records_filtered += other.records_filtered;
        self.pairs += other.pairs;
        self.unpaired_reads += other.unpaired_reads;
        self.families += other.families;
        self.families_emitted += other.families_emitted;
        self.families_failed_consistency += other.families_failed_consistency;
        self.families_below_min_size += other.families_below_min_size;
        self.families_discarded_off_target += other.families_discarded_off_target;
        self.overlap_bases_examined += other.overlap_bases_examined;
        self.overlap_bases_corrected += other.overlap_bases_corrected;
        self.overlap_bases_masked += other.overlap_bases_masked;
        self.read_through_pairs_trimmed += other.read_through_pairs_trimmed;
    }

    /// Families removed by any filter.
    #[must_use]
    pub fn families_dropped(&self) -> u64 {
        self.families_failed_consistency
            + self.families_below_min_size
            + self.families_discarded_off_target
    }
}

//! Per-family processing: UMI partitioning, alignment filtering, overlap reconciliation,
//! consensus calling and target classification.
//!
//! Everything here is a pure function of one sealed [`Family`] plus the worker's own
//! [`Stats`], so families can be processed on any thread in any order.

pub mod caller;
pub mod consistency;
pub mod overlapping;

use std::sync::Arc;

pub use caller::{CONSENSUS_DEPTH_TAG, ConsensusReadPair, call_consensus};
pub use consistency::{agreement_threshold, filter_consistent_alignments};
pub use overlapping::{CorrectionStats, OverlapReconciler, PairGeometry};

use noodles::sam::Header;

use crate::errors::Result;
use crate::grouper::Family;
use crate::metrics::Stats;
use crate::pairing::ReadPair;
use crate::pipeline::DedupConfig;
use crate::record::AlignmentRecord;
use crate::targets::{Segment, TargetSet};
use crate::umi::UmiPartitioner;

/// Turns sealed families into output records.
pub struct FamilyProcessor {
    partitioner: UmiPartitioner,
    reconciler: OverlapReconciler,
    min_family_size: usize,
    targets: Option<Arc<TargetSet>>,
    discard_off_target: bool,
    header: Arc<Header>,
}

impl FamilyProcessor {
    /// Builds a processor for one worker, encoding output records against `header`.
    #[must_use]
    pub fn new(config: &DedupConfig, targets: Option<Arc<TargetSet>>, header: Arc<Header>) -> Self {
        Self {
            partitioner: UmiPartitioner::new(config.umi_mode, config.umi_tag),
            reconciler: OverlapReconciler::new(config.max_fragment_size),
            min_family_size: config.min_family_size,
            targets,
            discard_off_target: config.discard_off_target,
            header,
        }
    }

    /// Processes one family, appending any surviving pairs to `out` as SAM lines.
    ///
    /// # Errors
    ///
    /// Returns an error if UMI partitioning fails (missing or malformed UMI) or a consensus
    /// record cannot be encoded.
    pub fn process(&self, family: Family, stats: &mut Stats, out: &mut Vec<u8>) -> Result<()> {
        for members in self.partitioner.partition(family.into_pairs())? {
            self.process_members(members, stats, out)?;
        }
        Ok(())
    }

    fn process_members(
        &self,
        members: Vec<ReadPair>,
        stats: &mut Stats,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        stats.record_family_size(members.len());

        let Some(mut members) = filter_consistent_alignments(members) else {
            stats.families_failed_consistency += 1;
            return Ok(());
        };
        if members.len() < self.min_family_size {
            stats.families_below_min_size += 1;
            return Ok(());
        }

        let mut corrections = CorrectionStats::default();
        let fragment_size = self.reconciler.reconcile(&mut members, &mut corrections);
        stats.overlap_bases_examined += corrections.bases_examined;
        stats.overlap_bases_corrected += corrections.bases_corrected;
        stats.overlap_bases_masked += corrections.bases_masked;
        stats.read_through_pairs_trimmed += corrections.pairs_trimmed;
        stats.record_fragment_size(fragment_size);

        let Some(consensus) = call_consensus(members) else {
            return Ok(());
        };
        let on_target = self.classify(consensus.pair(), fragment_size, stats);
        if self.discard_off_target && !on_target {
            stats.families_discarded_off_target += 1;
            return Ok(());
        }

        stats.families_emitted += 1;
        consensus.pair().write_sam_lines(&self.header, out)
    }

    fn reference_name(&self, record: &AlignmentRecord) -> &str {
        record
            .reference_id()
            .and_then(|id| self.header.reference_sequences().get_index(id))
            .and_then(|(name, _)| std::str::from_utf8(name.as_ref()).ok())
            .unwrap_or("*")
    }

    /// Records target hits for the pair's segments; returns true if any segment was on target.
    ///
    /// Without a target set every pair counts as on target and nothing is recorded.
    fn classify(&self, pair: &ReadPair, fragment_size: u64, stats: &mut Stats) -> bool {
        let Some(targets) = &self.targets else {
            return true;
        };

        let mut segments: Vec<(Segment<'_>, u64)> = Vec::with_capacity(2);
        let (left, right) = (pair.left(), pair.right());
        if fragment_size > 0 {
            segments.push((
                Segment {
                    reference: self.reference_name(left),
                    start: left.position().min(right.position()),
                    stop: left.alignment_end().max(right.alignment_end()),
                },
                2,
            ));
        } else {
            for mate in [left, right].into_iter().filter(|m| m.is_mapped()) {
                segments.push((
                    Segment {
                        reference: self.reference_name(mate),
                        start: mate.position(),
                        stop: mate.alignment_end(),
                    },
                    1,
                ));
            }
        }

        let mut on_target = false;
        for (segment, reads) in segments {
            match targets.classify(segment) {
                Some(target) => {
                    stats.record_on_target(&target.name, reads);
                    on_target = true;
                }
                None => stats.record_off_target(reads),
            }
        }
        on_target
    }
}

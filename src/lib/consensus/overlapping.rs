//! Overlap reconciliation for duplicate families.
//!
//! When the two mates of a fragment cover the same reference positions, those positions are
//! one molecule read twice. Before consensus calling, every member pair is made
//! self-consistent in that overlap:
//!
//! - When the forward mate starts at or before the reverse mate's 5' end and neither runs past
//!   the other, each disagreeing overlapping base is arbitrated by quality.
//! - When either mate runs past its partner's 5' end (adapter read-through) both reads are
//!   first trimmed back to the fragment, then arbitrated.
//!
//! Geometry depends only on strand, never on which mate is READ1 or sorts first. All members
//! of a family share both CIGARs and start positions, so it is decided once from the
//! representative (first) pair and applied to every member.

use std::ops::Range;

use itertools::{EitherOrBoth, Itertools};
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;

use crate::pairing::ReadPair;
use crate::phred::{MIN_PHRED, NO_CALL_BASE};
use crate::record::{AlignmentRecord, is_aligned, merge_ops};

/// A base must beat its mate's quality by more than this to overwrite it.
pub const ARBITRATION_MARGIN: u8 = 10;

/// Statistics tracking corrections made while reconciling overlaps
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CorrectionStats {
    /// Overlapping base positions compared between mates
    pub bases_examined: u64,
    /// Disagreements resolved in favour of the higher quality base
    pub bases_corrected: u64,
    /// Disagreements masked to a no-call in both mates
    pub bases_masked: u64,
    /// Member pairs trimmed for adapter read-through
    pub pairs_trimmed: u64,
}

/// How the forward and reverse mates of the representative pair sit relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairGeometry {
    /// Not a concordant pair: an unmapped mate, different references or the same strand.
    Discordant,
    /// The forward mate starts at or before the reverse mate ends, and neither mate extends
    /// past the other's 5' end.
    Inward {
        /// 1-based start of the reverse mate.
        reverse_start: u32,
        /// Last aligned position of the forward mate.
        forward_end: u32,
        /// Span from the forward mate's start to the reverse mate's end.
        fragment_size: u64,
    },
    /// A mate extends past its partner's 5' end: the sequenced fragment is
    /// `[forward_start, reverse_end]` and anything outside it is adapter.
    ReadThrough {
        /// 1-based start of the forward mate, the fragment's 5' end.
        forward_start: u32,
        /// Last aligned position of the reverse mate, the fragment's 3' end.
        reverse_end: u32,
    },
    /// The forward mate starts after the reverse mate ends.
    Outward,
}

impl PairGeometry {
    /// Classifies a pair by strand.
    #[must_use]
    pub fn of(pair: &ReadPair) -> Self {
        let (left, right) = (pair.left(), pair.right());
        if !left.is_mapped()
            || !right.is_mapped()
            || left.reference_id() != right.reference_id()
            || left.is_reverse() == right.is_reverse()
        {
            return Self::Discordant;
        }

        let (forward, reverse) = if left.is_reverse() { (right, left) } else { (left, right) };
        let forward_start = forward.position();
        let reverse_end = reverse.alignment_end();
        if forward_start > reverse_end {
            Self::Outward
        } else if forward.alignment_end() > reverse_end || reverse.position() < forward_start {
            Self::ReadThrough { forward_start, reverse_end }
        } else {
            Self::Inward {
                reverse_start: reverse.position(),
                forward_end: forward.alignment_end(),
                fragment_size: u64::from(reverse_end - forward_start) + 1,
            }
        }
    }

    /// Fragment size implied by this geometry, 0 when there is no confident call.
    #[must_use]
    pub fn fragment_size(&self) -> u64 {
        match *self {
            Self::Inward { fragment_size, .. } => fragment_size,
            Self::ReadThrough { forward_start, reverse_end } => {
                u64::from(reverse_end - forward_start) + 1
            }
            Self::Discordant | Self::Outward => 0,
        }
    }
}

/// Reconciles overlapping mates across a family.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapReconciler {
    max_fragment_size: u32,
}

impl OverlapReconciler {
    /// Creates a reconciler; `max_fragment_size` of 0 means unbounded.
    #[must_use]
    pub fn new(max_fragment_size: u32) -> Self {
        Self { max_fragment_size }
    }

    /// Reconciles every member of a family in place and returns the fragment size.
    ///
    /// A fragment size above the configured maximum is reported as 0 and leaves the members
    /// untouched.
    pub fn reconcile(&self, pairs: &mut [ReadPair], stats: &mut CorrectionStats) -> u64 {
        let Some(representative) = pairs.first() else {
            return 0;
        };
        let geometry = PairGeometry::of(representative);
        let fragment_size = geometry.fragment_size();
        if fragment_size == 0
            || (self.max_fragment_size > 0 && fragment_size > u64::from(self.max_fragment_size))
        {
            return 0;
        }

        match geometry {
            PairGeometry::Inward { reverse_start, forward_end, .. } => {
                if reverse_start <= forward_end {
                    for pair in pairs.iter_mut() {
                        arbitrate_overlap(pair, stats);
                    }
                }
            }
            PairGeometry::ReadThrough { forward_start, reverse_end } => {
                for pair in pairs.iter_mut() {
                    trim_read_through(pair, forward_start, reverse_end);
                    stats.pairs_trimmed += 1;
                    arbitrate_overlap(pair, stats);
                }
            }
            PairGeometry::Discordant | PairGeometry::Outward => {}
        }
        fragment_size
    }
}

/// Reference position and read offset of every aligned (M/=/X) base.
fn aligned_offsets(record: &AlignmentRecord) -> Vec<(u32, usize)> {
    let mut offsets = Vec::with_capacity(record.sequence().len());
    let mut reference = record.position();
    let mut offset = 0usize;
    for op in record.cigar_ops() {
        let kind = op.kind();
        if is_aligned(kind) {
            offsets.extend((0..op.len()).map(|i| (reference + i as u32, offset + i)));
        }
        if kind.consumes_reference() {
            reference += op.len() as u32;
        }
        if kind.consumes_read() {
            offset += op.len();
        }
    }
    offsets
}

/// Arbitrates each disagreeing base the two mates align to the same reference position.
fn arbitrate_overlap(pair: &mut ReadPair, stats: &mut CorrectionStats) {
    let (left, right) = pair.mates_mut();
    if left.qualities().is_empty() || right.qualities().is_empty() {
        return;
    }

    let shared: Vec<(usize, usize)> = aligned_offsets(left)
        .into_iter()
        .merge_join_by(aligned_offsets(right), |a, b| a.0.cmp(&b.0))
        .filter_map(|joined| match joined {
            EitherOrBoth::Both((_, l), (_, r)) => Some((l, r)),
            _ => None,
        })
        .collect();

    if shared.is_empty() {
        return;
    }

    let (mut left_bases, mut left_quals) = (left.sequence().to_vec(), left.qualities().to_vec());
    let (mut right_bases, mut right_quals) = (right.sequence().to_vec(), right.qualities().to_vec());
    let mut changed = false;
    for (l, r) in shared {
        stats.bases_examined += 1;
        let (left_base, left_qual) = (left_bases[l], left_quals[l]);
        let (right_base, right_qual) = (right_bases[r], right_quals[r]);
        if left_base.eq_ignore_ascii_case(&right_base) {
            continue;
        }

        changed = true;
        if left_qual > right_qual.saturating_add(ARBITRATION_MARGIN) {
            (right_bases[r], right_quals[r]) = (left_base, left_qual);
            stats.bases_corrected += 1;
        } else if right_qual > left_qual.saturating_add(ARBITRATION_MARGIN) {
            (left_bases[l], left_quals[l]) = (right_base, right_qual);
            stats.bases_corrected += 1;
        } else {
            (left_bases[l], left_quals[l]) = (NO_CALL_BASE, MIN_PHRED);
            (right_bases[r], right_quals[r]) = (NO_CALL_BASE, MIN_PHRED);
            stats.bases_masked += 1;
        }
    }

    if changed {
        left.set_sequence(left_bases);
        left.set_qualities(left_quals);
        right.set_sequence(right_bases);
        right.set_qualities(right_quals);
    }
}

/// Trims both mates of a read-through pair to the fragment `[start, end]` and updates their
/// mate fields to match.
fn trim_read_through(pair: &mut ReadPair, start: u32, end: u32) {
    let (left, right) = pair.mates_mut();
    trim_to_reference(left, start, end);
    trim_to_reference(right, start, end);

    let span_start = left.position().min(right.position());
    let span_end = left.alignment_end().max(right.alignment_end());
    let template_length = i32::try_from(span_end - span_start + 1).unwrap_or(i32::MAX);
    let left_sign = if left.position() <= right.position() { 1 } else { -1 };
    left.set_mate_position(right.position());
    right.set_mate_position(left.position());
    left.set_template_length(left_sign * template_length);
    right.set_template_length(-left_sign * template_length);
}

/// Removes the bases of `record` that align outside the reference range `[start, end]`.
///
/// Reference-consuming operations advance the reference position and read-consuming
/// operations advance the read cursor; only bases inside the range are kept, and the
/// alignment start moves to the first kept aligned base. Clipping on a trimmed end is dropped
/// with the bases it covered. Records that end up with no aligned base are left unchanged.
pub fn trim_to_reference(record: &mut AlignmentRecord, start: u32, end: u32) {
    if !record.is_mapped() {
        return;
    }
    let trim_start = record.position() < start;
    let trim_end = record.alignment_end() > end;
    if !trim_start && !trim_end {
        return;
    }

    let mut ops: Vec<Op> = Vec::new();
    let mut kept: Vec<Range<usize>> = Vec::new();
    let mut new_start: Option<u32> = None;
    let mut reference = record.position();
    let mut offset = 0usize;
    let mut seen_reference = false;
    for op in record.cigar_ops() {
        let (kind, len) = (op.kind(), op.len());
        match kind {
            Kind::SoftClip | Kind::HardClip => {
                let keep = if seen_reference { !trim_end } else { !trim_start };
                if keep {
                    ops.push(*op);
                    if kind == Kind::SoftClip {
                        kept.push(offset..offset + len);
                    }
                }
            }
            Kind::Insertion => {
                let after_start = !trim_start || reference > start;
                let before_end = !trim_end || reference <= end;
                if after_start && before_end {
                    ops.push(*op);
                    kept.push(offset..offset + len);
                }
            }
            _ if kind.consumes_reference() => {
                seen_reference = true;
                let op_end = reference + len as u32 - 1;
                let lo = reference.max(start);
                let hi = op_end.min(end);
                if lo <= hi {
                    let n = (hi - lo + 1) as usize;
                    ops.push(Op::new(kind, n));
                    if is_aligned(kind) {
                        new_start.get_or_insert(lo);
                        let from = offset + (lo - reference) as usize;
                        kept.push(from..from + n);
                    }
                }
            }
            _ => {}
        }
        if kind.consumes_reference() {
            reference += len as u32;
        }
        if kind.consumes_read() {
            offset += len;
        }
    }

    let Some(new_start) = new_start else {
        return;
    };
    // Deletions and skips may not flank the aligned bases.
    let first_aligned = ops.iter().position(|op| is_aligned(op.kind())).unwrap_or(0);
    let last_aligned = ops.iter().rposition(|op| is_aligned(op.kind())).unwrap_or(0);
    let ops = ops.into_iter().enumerate().filter_map(|(i, op)| {
        let flanking = (i < first_aligned || i > last_aligned)
            && matches!(op.kind(), Kind::Deletion | Kind::Skip);
        (!flanking).then_some(op)
    });

    let gather = |values: &[u8]| -> Vec<u8> {
        if values.is_empty() {
            return Vec::new();
        }
        kept.iter().flat_map(|range| values[range.clone()].iter().copied()).collect()
    };
    let sequence = gather(record.sequence());
    let qualities = gather(record.qualities());

    record.set_cigar(merge_ops(ops));
    record.set_position(new_start);
    record.set_sequence(sequence);
    record.set_qualities(qualities);
}

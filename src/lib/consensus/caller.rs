//! Majority-vote consensus calling for a filtered duplicate family.
//!
//! Every member of a family has passed the alignment consistency filter, so all mates on one
//! side share a CIGAR and therefore a read length; read offset `i` refers to the same
//! reference position in every member.

use crate::consensus::consistency::agreement_threshold;
use crate::pairing::ReadPair;
use crate::phred::{MIN_PHRED, NO_CALL_BASE, PhredScore};
use crate::record::AlignmentRecord;

/// Tag recording how many read pairs contributed to a consensus pair.
pub const CONSENSUS_DEPTH_TAG: [u8; 2] = *b"cD";

/// The single read pair emitted for a family.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusReadPair {
    pair: ReadPair,
    family_size: usize,
}

impl ConsensusReadPair {
    /// The emitted pair.
    #[must_use]
    pub fn pair(&self) -> &ReadPair {
        &self.pair
    }

    /// Number of read pairs that contributed.
    #[must_use]
    pub fn family_size(&self) -> usize {
        self.family_size
    }
}

/// Per-symbol tally at one read position.
#[derive(Debug, Default)]
struct BaseTally {
    // (base, votes, best quality), in order of first observation.
    entries: Vec<(u8, usize, PhredScore)>,
}

impl BaseTally {
    fn add(&mut self, base: u8, quality: PhredScore) {
        let base = base.to_ascii_uppercase();
        match self.entries.iter_mut().find(|(b, _, _)| *b == base) {
            Some((_, votes, best)) => {
                *votes += 1;
                *best = (*best).max(quality);
            }
            None => self.entries.push((base, 1, quality)),
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    /// The base with most votes if it reaches `threshold`, else a no-call.
    fn call(&self, threshold: usize) -> (u8, PhredScore) {
        let mut winner: Option<&(u8, usize, PhredScore)> = None;
        for entry in &self.entries {
            if winner.is_none_or(|w| entry.1 > w.1) {
                winner = Some(entry);
            }
        }
        match winner {
            Some(&(base, votes, quality)) if votes >= threshold && base != NO_CALL_BASE => {
                (base, quality)
            }
            _ => (NO_CALL_BASE, MIN_PHRED),
        }
    }
}

/// Calls one consensus read from the same mate of every family member.
///
/// The first read supplies everything except bases, qualities and mapping quality, which
/// become the per-position majority call and the family's highest mapping quality.
fn call_read(reads: &[&AlignmentRecord], template: &mut AlignmentRecord) {
    let threshold = agreement_threshold(reads.len());
    let length = template.sequence().len();
    let has_quals = !template.qualities().is_empty();

    let mut bases = Vec::with_capacity(length);
    let mut quals = Vec::with_capacity(if has_quals { length } else { 0 });
    let mut tally = BaseTally::default();
    for offset in 0..length {
        tally.clear();
        for read in reads {
            if let Some(&base) = read.sequence().get(offset) {
                let quality = read.qualities().get(offset).copied().unwrap_or(0);
                tally.add(base, quality);
            }
        }
        let (base, quality) = tally.call(threshold);
        bases.push(base);
        if has_quals {
            quals.push(quality);
        }
    }

    let mapq = reads.iter().map(|r| r.mapping_quality()).max().unwrap_or(0);
    template.set_sequence(bases);
    template.set_qualities(quals);
    template.set_mapping_quality(mapq);
}

/// Calls the consensus pair of a family.
///
/// A family of one is returned unchanged. Returns `None` for an empty family.
#[must_use]
pub fn call_consensus(mut pairs: Vec<ReadPair>) -> Option<ConsensusReadPair> {
    let family_size = pairs.len();
    if family_size <= 1 {
        return pairs.pop().map(|pair| ConsensusReadPair { pair, family_size });
    }

    let mut consensus = pairs[0].clone();
    {
        let lefts: Vec<&AlignmentRecord> = pairs.iter().map(ReadPair::left).collect();
        call_read(&lefts, consensus.left_mut());
        let rights: Vec<&AlignmentRecord> = pairs.iter().map(ReadPair::right).collect();
        call_read(&rights, consensus.right_mut());
    }
    let depth = i32::try_from(family_size).unwrap_or(i32::MAX);
    consensus.left_mut().set_int_tag(&CONSENSUS_DEPTH_TAG, depth);
    consensus.right_mut().set_int_tag(&CONSENSUS_DEPTH_TAG, depth);
    Some(ConsensusReadPair { pair: consensus, family_size })
}

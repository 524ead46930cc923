//! Alignment consistency filtering of duplicate families.
//!
//! True PCR duplicates align identically. Members whose CIGARs disagree with the majority are
//! most likely independent misalignments and are discarded before consensus calling.

use ahash::AHashMap;

use crate::pairing::ReadPair;

/// Smallest count that is at least 60% of `n`, rounded up.
///
/// # Examples
/// ```
/// use cfdedup_lib::consensus::consistency::agreement_threshold;
///
/// assert_eq!(agreement_threshold(5), 3);
/// assert_eq!(agreement_threshold(3), 2);
/// assert_eq!(agreement_threshold(1), 1);
/// ```
#[must_use]
pub fn agreement_threshold(n: usize) -> usize {
    (3 * n).div_ceil(5)
}

/// Keeps the largest group of pairs sharing both mates' CIGARs.
///
/// Returns `None` when that group holds fewer than [`agreement_threshold`] of the original
/// members. Among equally large groups the one whose first member came first wins. Member
/// order within the surviving group is preserved.
#[must_use]
pub fn filter_consistent_alignments(pairs: Vec<ReadPair>) -> Option<Vec<ReadPair>> {
    let original_size = pairs.len();
    if original_size == 0 {
        return None;
    }

    let mut index: AHashMap<(String, String), usize> = AHashMap::new();
    let mut buckets: Vec<Vec<ReadPair>> = Vec::new();
    for pair in pairs {
        let key = (pair.left().cigar_string(), pair.right().cigar_string());
        let slot = *index.entry(key).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[slot].push(pair);
    }

    // `max_by_key` returns the last maximum; reversing makes the first bucket win ties.
    let largest = buckets.into_iter().rev().max_by_key(Vec::len)?;
    (largest.len() >= agreement_threshold(original_size)).then_some(largest)
}

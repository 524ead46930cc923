//! UMI clustering strategies.
//!
//! An assigner receives the UMI of every pair in a position family and returns a sub-family
//! index per pair. Indices are dense and numbered in order of first appearance, so sub-family
//! output order follows input order.

use std::collections::VecDeque;

use ahash::AHashMap;

/// Trait for UMI clustering strategies
///
/// All implementations must be thread-safe (`Send + Sync`) so a single assigner built at
/// configuration time can be shared by every worker.
pub trait UmiAssigner: Send + Sync {
    /// Assigns a sub-family index to each UMI.
    ///
    /// `result[i]` is the sub-family of `umis[i]`; indices run from zero in order of first
    /// appearance.
    fn assign(&self, umis: &[&str]) -> Vec<usize>;
}

/// Groups pairs whose UMI strings are identical.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactUmiAssigner;

impl UmiAssigner for ExactUmiAssigner {
    fn assign(&self, umis: &[&str]) -> Vec<usize> {
        let mut ids: AHashMap<&str, usize> = AHashMap::with_capacity(umis.len());
        umis.iter()
            .map(|umi| {
                let next = ids.len();
                *ids.entry(umi).or_insert(next)
            })
            .collect()
    }
}

/// Splits a two-part UMI `<left>-<right>` into its halves.
///
/// Returns `None` when there is no `-` separator.
///
/// # Examples
/// ```
/// use cfdedup_lib::umi::assigner::split_umi;
///
/// assert_eq!(split_umi("ACG-TTA"), Some(("ACG", "TTA")));
/// assert_eq!(split_umi("ACGTTA"), None);
/// ```
#[must_use]
pub fn split_umi(umi: &str) -> Option<(&str, &str)> {
    umi.split_once('-')
}

/// Groups pairs transitively when either half of their two-part UMIs match.
///
/// Pair `a` joins pair `b` if their left halves are equal or their right halves are equal;
/// clusters are the connected components of that relation. This tolerates an error in one
/// independently-read half as long as the other half is intact.
///
/// UMIs without a `-` separator are treated as a single left half with an empty right half;
/// callers are expected to validate the format beforehand.
#[derive(Debug, Default, Clone, Copy)]
pub struct FuzzyUmiAssigner;

impl UmiAssigner for FuzzyUmiAssigner {
    fn assign(&self, umis: &[&str]) -> Vec<usize> {
        let halves: Vec<(&str, &str)> =
            umis.iter().map(|umi| split_umi(umi).unwrap_or((umi, ""))).collect();

        let mut by_left: AHashMap<&str, Vec<usize>> = AHashMap::new();
        let mut by_right: AHashMap<&str, Vec<usize>> = AHashMap::new();
        for (i, (left, right)) in halves.iter().enumerate() {
            by_left.entry(left).or_default().push(i);
            by_right.entry(right).or_default().push(i);
        }

        let mut assignment: Vec<Option<usize>> = vec![None; umis.len()];
        let mut next_id = 0;
        for seed in 0..umis.len() {
            if assignment[seed].is_some() {
                continue;
            }
            // Grow the cluster until no unassigned pair shares a left or right half with it.
            let mut queue = VecDeque::from([seed]);
            assignment[seed] = Some(next_id);
            while let Some(i) = queue.pop_front() {
                let (left, right) = halves[i];
                for &j in by_left[left].iter().chain(by_right[right].iter()) {
                    if assignment[j].is_none() {
                        assignment[j] = Some(next_id);
                        queue.push_back(j);
                    }
                }
            }
            next_id += 1;
        }

        assignment.into_iter().map(|id| id.unwrap_or_default()).collect()
    }
}

//! Family size distribution table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Metric;

/// One row of the family size distribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilySizeMetrics {
    /// Family size (number of read pairs before filtering)
    pub family_size: usize,

    /// Number of families with this size
    pub count: u64,

    /// Fraction of all families with this size
    pub fraction: f64,

    /// Cumulative fraction (families with size >= this value)
    pub fraction_gt_or_eq_family_size: f64,
}

impl Metric for FamilySizeMetrics {
    fn metric_name() -> &'static str {
        "family size"
    }
}

impl FamilySizeMetrics {
    /// Builds one row per observed family size, in ascending size order.
    #[must_use]
    pub fn from_histogram(family_sizes: &BTreeMap<usize, u64>) -> Vec<Self> {
        #[allow(clippy::cast_precision_loss)]
        let total: f64 = family_sizes.values().map(|&count| count as f64).sum();
        if total == 0.0 {
            return Vec::new();
        }

        // Walk largest first so the cumulative fraction is a running sum.
        let mut rows = Vec::with_capacity(family_sizes.len());
        let mut cumulative = 0.0;
        #[allow(clippy::cast_precision_loss)]
        for (&family_size, &count) in family_sizes.iter().rev() {
            let fraction = count as f64 / total;
            cumulative += fraction;
            rows.push(Self { family_size, count, fraction, fraction_gt_or_eq_family_size: cumulative });
        }
        rows.reverse();
        rows
    }
}

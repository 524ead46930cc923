//! Run statistics and their serialization.
//!
//! - [`stats`] - the mergeable [`Stats`] aggregate kept by every worker
//! - [`family_size`] - the per-size family table written as TSV
//! - [`writer`] - TSV and JSON document I/O
//!
//! # Traits
//!
//! - [`Metric`] - Core trait for serializable metric rows

use serde::{Deserialize, Serialize};

pub mod family_size;
pub mod stats;
pub mod writer;

pub use family_size::FamilySizeMetrics;
pub use stats::Stats;
pub use writer::{
    merge_stats_document, read_stats_document, replace_stats_document, write_metrics,
    write_stats_document,
};

/// A row type that can be written to and read from a delimited metrics file.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone + Default {
    /// Human-readable name for this metric type.
    ///
    /// Used in error messages and logging when writing metrics files.
    fn metric_name() -> &'static str;
}

#![deny(unsafe_code)]
// Clippy lint configuration for CI
// - cast_*: read lengths, positions and qualities move between integer widths constantly
// - missing_panics_doc: panics are limited to tests
// - needless_pass_by_value: families and pairs are moved through the pipeline by design of
//   ownership transfer between stages
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions
)]

//! # cfdedup - duplicate-family grouping and consensus for paired-end panels
//!
//! The library turns a coordinate-sorted, paired-end SAM stream into one consensus read pair
//! per PCR-duplicate family.
//!
//! ## Overview
//!
//! ### Streaming
//!
//! - **[`sam_io`]** - line-oriented SAM input and output
//! - **[`record`]** - the owned alignment record and CIGAR type
//! - **[`pairing`]** - mate pairing, sort-order checks and family keys
//! - **[`grouper`]** - the two-window grouper that seals families once they cannot grow
//! - **[`pipeline`]** - the driver tying the stages together, serially or on a worker pool
//!
//! ### Per-family processing
//!
//! - **[`umi`]** - optional sub-partitioning of families by UMI
//! - **[`consensus`]** - CIGAR agreement, overlap reconciliation and consensus calling
//! - **[`targets`]** - BED target panels and segment classification
//!
//! ### Utilities
//!
//! - **[`metrics`]** - run statistics, the cumulative JSON document and TSV metrics
//! - **[`errors`]**, **[`validation`]**, **[`logging`]**, **[`progress`]**, **[`phred`]**
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::io::BufReader;
//! use std::fs::File;
//!
//! use cfdedup_lib::pipeline::{DedupConfig, run_dedup};
//!
//! # fn main() -> anyhow::Result<()> {
//! let input = BufReader::new(File::open("sorted.sam")?);
//! let output = File::create("dedup.sam")?;
//! let stats = run_dedup(input, output, &DedupConfig::default(), None)?;
//! println!("{} families emitted", stats.families_emitted);
//! # Ok(())
//! # }
//! ```

pub mod consensus;
pub mod errors;
pub mod grouper;
pub mod logging;
pub mod metrics;
pub mod pairing;
pub mod phred;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod sam_io;
pub mod targets;
pub mod umi;
pub mod validation;

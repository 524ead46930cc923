//! Duplicate-family consensus command.
//!
//! Reads a coordinate-sorted paired-end SAM file, groups read pairs into PCR-duplicate
//! families and writes one consensus pair per family.
//!
//! # Algorithm
//!
//! 1. Pair mates by read name and key each pair by the unclipped 5' ends of both mates
//! 2. Collect pairs with the same key into families until no further member can arrive
//! 3. Optionally split each family by UMI
//! 4. Keep the pairs sharing the dominant CIGAR combination if it holds at least 60%
//! 5. Reconcile the overlap between mates and trim read-through pairs
//! 6. Call a per-base majority consensus and classify the fragment against the target panel

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::{debug, info};

use cfdedup_lib::metrics::{FamilySizeMetrics, write_metrics, write_stats_document};
use cfdedup_lib::pipeline::{DedupConfig, run_dedup};
use cfdedup_lib::sam_io::{open_input, open_output};

use crate::commands::command::Command;
use crate::commands::common::{
    FamilyFilterOptions, SamIoOptions, StatsOptions, TargetOptions, ThreadingOptions, UmiOptions,
};

/// Duplicate-family consensus command.
#[derive(Debug, Parser)]
#[command(
    name = "dedup",
    about = "\x1b[38;5;151m[DEDUP]\x1b[0m         \x1b[36mCollapse PCR-duplicate families into consensus read pairs\x1b[0m",
    long_about = r#"
Collapses PCR-duplicate families in a coordinate-sorted, paired-end SAM file into one
consensus read pair per family.

Read pairs whose mates share unclipped 5' positions and strands form a family. When a UMI
mode is selected, families are further split by the UMI tag:

- none:  position alone defines the family
- exact: each distinct UMI is its own family
- fuzzy: UMIs of the form <left>-<right> are joined when either half matches

Within a family, only pairs sharing the most common CIGAR combination are kept, and only if
they make up at least 60% of the family. Overlapping mates are reconciled base by base,
read-through pairs are trimmed to the fragment, and a majority-vote consensus is emitted
with a cD tag holding the family size.

# Input Requirements

- Coordinate-sorted SAM text (samtools sort)
- Paired-end reads with READ1/READ2 flags set
- A UMI tag on every read when a UMI mode is selected (default: RX)

# Statistics

With --stats, family sizes, fragment sizes and per-target counts are merged into the given
JSON document, so several runs can accumulate into one file.
"#
)]
pub struct Dedup {
    /// Input and output SAM files
    #[command(flatten)]
    pub io: SamIoOptions,

    /// UMI options
    #[command(flatten)]
    pub umi: UmiOptions,

    /// Family filters
    #[command(flatten)]
    pub filters: FamilyFilterOptions,

    /// Target panel options
    #[command(flatten)]
    pub targets: TargetOptions,

    /// Threading options
    #[command(flatten)]
    pub threading: ThreadingOptions,

    /// Statistics output
    #[command(flatten)]
    pub stats: StatsOptions,

    /// Path to write the family size histogram
    #[arg(short = 'H', long = "family-size-histogram")]
    pub family_size_histogram: Option<PathBuf>,
}

impl Dedup {
    /// Builds and validates the library configuration from the command-line options.
    fn config(&self) -> Result<DedupConfig> {
        let config = DedupConfig {
            umi_mode: self.umi.umi,
            umi_tag: self.umi.tag()?,
            min_family_size: self.filters.min_family_size,
            max_fragment_size: self.filters.max_fragment_size,
            discard_off_target: self.targets.discard_off_target,
            threads: self.threading.threads,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Command for Dedup {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.io.validate()?;
        self.targets.validate()?;
        let config = self.config()?;

        debug!("Command line: {command_line}");
        info!("Input: {}", self.io.input.display());
        info!("Output: {}", self.io.output.display());
        info!("UMI mode: {} (tag {})", config.umi_mode, self.umi.umi_tag);
        info!("{}", self.threading.log_message());

        let targets = self.targets.load()?;
        let reader = open_input(&self.io.input)?;
        let writer = open_output(&self.io.output)?;
        let stats = run_dedup(reader, writer, &config, targets)?;

        if let Some(path) = &self.stats.stats {
            write_stats_document(path, &stats)?;
            info!("Wrote statistics to {}", path.display());
        }
        if let Some(path) = &self.family_size_histogram {
            write_metrics(path, &FamilySizeMetrics::from_histogram(&stats.family_sizes))?;
            info!("Wrote family size histogram to {}", path.display());
        }
        Ok(())
    }
}

//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Args;
use log::info;

use cfdedup_lib::targets::TargetSet;
use cfdedup_lib::umi::UmiMode;
use cfdedup_lib::validation::{validate_file_exists, validate_tag};

/// Input/output options for commands that read SAM and write SAM.
#[derive(Debug, Clone, Args)]
pub struct SamIoOptions {
    /// Input coordinate-sorted SAM file (`-` for standard input)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output SAM file (`-` for standard output)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

impl SamIoOptions {
    /// Validates that the input file exists (skipped for stdin paths).
    ///
    /// # Errors
    ///
    /// Returns an error if the input file does not exist.
    pub fn validate(&self) -> Result<()> {
        validate_file_exists(&self.input, "Input SAM")?;
        Ok(())
    }
}

/// Options selecting how families are split by UMI.
#[derive(Debug, Clone, Args)]
pub struct UmiOptions {
    /// How to split duplicate families by UMI
    #[arg(long = "umi", value_enum, default_value_t = UmiMode::None)]
    pub umi: UmiMode,

    /// The tag containing the UMI
    #[arg(long = "umi-tag", default_value = "RX")]
    pub umi_tag: String,
}

impl UmiOptions {
    /// The UMI tag as bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is not two alphanumeric characters.
    pub fn tag(&self) -> Result<[u8; 2]> {
        Ok(validate_tag(&self.umi_tag, "umi-tag")?)
    }
}

/// Per-family filters.
#[derive(Debug, Clone, Args)]
pub struct FamilyFilterOptions {
    /// Minimum number of read pairs agreeing on alignment for a family to be emitted
    #[arg(long = "min-family-size", default_value = "1")]
    pub min_family_size: usize,

    /// Largest fragment size treated as a confident call (0 for no limit)
    #[arg(long = "max-fragment-size", default_value = "0")]
    pub max_fragment_size: u32,
}

/// Target panel options.
#[derive(Debug, Clone, Default, Args)]
pub struct TargetOptions {
    /// BED file of target intervals
    #[arg(short = 't', long = "targets")]
    pub targets: Option<PathBuf>,

    /// Drop fragments that do not overlap any target
    #[arg(long = "discard-off-target", default_value = "false")]
    pub discard_off_target: bool,
}

impl TargetOptions {
    /// Validates the combination of target options.
    ///
    /// # Errors
    ///
    /// Returns an error if `--discard-off-target` is given without `--targets`, or the BED file
    /// does not exist.
    pub fn validate(&self) -> Result<()> {
        match &self.targets {
            Some(path) => validate_file_exists(path, "Targets BED")?,
            None if self.discard_off_target => {
                bail!("--discard-off-target requires --targets");
            }
            None => {}
        }
        Ok(())
    }

    /// Loads the target set, if one was given.
    ///
    /// # Errors
    ///
    /// Returns an error if the BED file cannot be read or parsed.
    pub fn load(&self) -> Result<Option<Arc<TargetSet>>> {
        let Some(path) = &self.targets else {
            return Ok(None);
        };
        let targets = TargetSet::from_bed(path)?;
        info!("Loaded {} target intervals from {}", targets.len(), path.display());
        Ok(Some(Arc::new(targets)))
    }
}

/// Threading options.
#[derive(Debug, Clone, Args)]
pub struct ThreadingOptions {
    /// Number of worker threads for family processing
    #[arg(long = "threads", default_value = "1")]
    pub threads: usize,
}

impl ThreadingOptions {
    /// Returns a log message describing the threading configuration.
    #[must_use]
    pub fn log_message(&self) -> String {
        if self.threads > 1 {
            format!("Using {} worker threads", self.threads)
        } else {
            "Using single-threaded mode".to_string()
        }
    }
}

/// Options for writing statistics to a file.
#[derive(Debug, Clone, Default, Args)]
pub struct StatsOptions {
    /// Statistics JSON document, merged into if it already exists
    #[arg(short = 's', long = "stats")]
    pub stats: Option<PathBuf>,
}

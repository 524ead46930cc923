//! Merges statistics documents from separate runs.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;
use serde_json::{Map, Value};

use cfdedup_lib::metrics::{merge_stats_document, read_stats_document, replace_stats_document};
use cfdedup_lib::validation::validate_file_exists;

use crate::commands::command::Command;

/// Merges statistics documents.
#[derive(Debug, Parser)]
#[command(
    name = "merge-stats",
    about = "\x1b[38;5;180m[UTILITIES]\x1b[0m     \x1b[36mMerge statistics documents from several runs\x1b[0m",
    long_about = r#"
Merges statistics JSON documents written by `cfdedup dedup --stats`.

Counters and histogram bins are added element-wise; keys present in only some inputs are
carried through unchanged. The output is overwritten.
"#
)]
pub struct MergeStats {
    /// Statistics documents to merge
    #[arg(short = 'i', long = "input", required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Merged statistics document
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

impl Command for MergeStats {
    fn execute(&self, _command_line: &str) -> Result<()> {
        for input in &self.inputs {
            validate_file_exists(input, "Statistics JSON")?;
        }

        let mut merged = Value::Object(Map::new());
        for input in &self.inputs {
            merge_stats_document(&mut merged, &read_stats_document(input)?);
        }
        replace_stats_document(&self.output, &merged)?;
        info!("Merged {} statistics documents into {}", self.inputs.len(), self.output.display());
        Ok(())
    }
}

//! End-to-end tests for the cfdedup binary.
//!
//! These tests run the compiled binary on generated SAM files and check the output records,
//! the statistics document and the exit status.

mod helpers;
mod test_dedup_command;
mod test_error_paths;
mod test_merge_stats_command;

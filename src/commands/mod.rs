//! CLI command implementations for cfdedup.
//!
//! - [`dedup`] - Collapse duplicate families into consensus read pairs
//! - [`merge_stats`] - Merge statistics documents from separate runs

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

pub mod command;
pub mod common;
pub mod dedup;
pub mod merge_stats;

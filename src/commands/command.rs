//! Command trait definition for CLI commands.
//!
//! Every `cfdedup` subcommand implements [`Command`]; `main` dispatches to it through
//! `enum_dispatch`.

use anyhow::Result;
use enum_dispatch::enum_dispatch;

/// Trait implemented by all cfdedup CLI commands.
///
/// `command_line` is the full invocation, as typed, for logging.
#[enum_dispatch]
pub trait Command {
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self, command_line: &str) -> Result<()>;
}

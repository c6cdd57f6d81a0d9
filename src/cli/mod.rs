//! CLI support for tally-lang
//!
//! The `check` command is exposed as a library function so other tools can
//! run rules the same way the binary does.

mod check;

pub use check::{CheckOptions, CheckResult, execute_check};

use std::io;

use crate::error::FormattedError;

/// Errors that can occur during CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Compilation or execution of the rule failed
    #[error("{0}")]
    Rule(#[from] FormattedError),
    /// The environment isn't valid JSON
    #[error("invalid JSON environment: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// An invalid setting, such as a reserved result key
    #[error("invalid option: {0}")]
    Setting(crate::error::Error),
}

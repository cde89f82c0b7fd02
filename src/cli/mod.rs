//! CLI command implementations for Trey.

pub(crate) mod run;
pub(crate) mod simulate;

use clap::ValueEnum;
use std::error::Error;
use std::fmt;

/// Output format for session and simulation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<trey::ConfigError> for CliError {
    fn from(e: trey::ConfigError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<trey::SessionError> for CliError {
    fn from(e: trey::SessionError) -> Self {
        Self::new(e.to_string())
    }
}

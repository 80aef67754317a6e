//! Errors surfaced by the command-line front end.

use crate::script::Rule;
use fsmstep::AutomatonError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CliError {
    /// An error reported by the automaton core.
    #[error(transparent)]
    Automaton(#[from] AutomatonError),
    /// The script does not follow the script grammar.
    #[error("Script parsing error: {0}")]
    ScriptError(#[from] Box<pest::error::Error<Rule>>),
    /// A file or directory could not be read.
    #[error("File error: {0}")]
    FileError(String),
    /// Output could not be written.
    #[error("Output error: {0}")]
    OutputError(String),
    /// A script refers to a name no `LOAD` bound.
    #[error("Unknown automaton name: {0}")]
    UnknownName(String),
    #[error("Unknown sample: {0}")]
    UnknownSample(String),
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::OutputError(e.to_string())
    }
}

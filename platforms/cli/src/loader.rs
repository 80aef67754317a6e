//! This module provides the `AutomatonLoader` struct, responsible for loading automaton records
//! from files, directories and strings. File access lives here and never in the core.

use crate::error::CliError;
use fsmstep::{decode, decode_input, Automaton, AutomatonError};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A decoded automaton together with the input its record carries.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub automaton: Arc<Automaton>,
    pub input: String,
}

/// `AutomatonLoader` is a utility struct for loading automaton records.
/// It provides methods to load records from individual files, from string content,
/// and to discover and load all `.json` files within a directory.
pub struct AutomatonLoader;

impl AutomatonLoader {
    /// Loads a single automaton record from the specified file path.
    ///
    /// # Arguments
    ///
    /// * `path` - A reference to the `Path` of the `.json` file to load.
    ///
    /// # Returns
    ///
    /// * `Ok(Loaded)` if the file is read and decoded.
    /// * `Err(CliError::FileError)` if the file cannot be read.
    /// * `Err(CliError::Automaton)` if the content is not a valid record.
    pub fn load(path: &Path) -> Result<Loaded, CliError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::FileError(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), "loading automaton");
        Self::load_from_string(&content)
    }

    /// Loads a single automaton record from the provided JSON text.
    pub fn load_from_string(content: &str) -> Result<Loaded, CliError> {
        let record: Value = serde_json::from_str(content)
            .map_err(|e| AutomatonError::MalformedRecord(e.to_string()))?;

        Ok(Loaded {
            automaton: Arc::new(decode(&record)?),
            input: decode_input(&record)?,
        })
    }

    /// Loads every `.json` record in a directory, sorted by path.
    ///
    /// Directories and other files are skipped. Each element of the result is either the path and
    /// its decoded record, or the error that prevented loading it.
    pub fn load_dir(directory: &Path) -> Vec<Result<(PathBuf, Loaded), CliError>> {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(CliError::FileError(format!(
                    "Failed to read directory {}: {}",
                    directory.display(),
                    e
                )))]
            }
        };

        let mut paths = Vec::new();
        let mut results = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(e) => results.push(Err(CliError::FileError(format!(
                    "Failed to read directory entry: {}",
                    e
                )))),
            }
        }
        paths.sort();

        for path in paths {
            if path.is_dir() || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            results.push(match Self::load(&path) {
                Ok(loaded) => Ok((path, loaded)),
                Err(CliError::Automaton(e)) => Err(CliError::FileError(format!(
                    "Failed to load automaton from {}: {}",
                    path.display(),
                    e
                ))),
                Err(e) => Err(e),
            });
        }

        results
    }
}

//! This module provides a catalog of sample automata embedded in the crate, one or more per
//! kind, decoded once on first use.

use crate::automaton::Automaton;
use crate::encoder::{decode, decode_input};
use crate::types::{AutomatonError, Kind};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

// Embedded sample records
const SAMPLE_TEXTS: [&str; 4] = [
    include_str!("../samples/odd-ones.json"),
    include_str!("../samples/no-double-zero.json"),
    include_str!("../samples/ends-with-ab.json"),
    include_str!("../samples/binary-increment.json"),
];

lazy_static::lazy_static! {
    /// The decoded samples. Records that fail to decode are skipped with a warning.
    pub static ref SAMPLES: Vec<Sample> = SAMPLE_TEXTS
        .iter()
        .filter_map(|text| match Sample::parse(text) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!(error = %e, "skipping sample that failed to decode");
                None
            }
        })
        .collect();
}

/// A named automaton together with a default input.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    pub description: String,
    pub automaton: Arc<Automaton>,
    pub input: String,
}

impl Sample {
    /// Parses a sample from a wire record carrying extra `name` and `description` fields.
    pub fn parse(text: &str) -> Result<Self, AutomatonError> {
        let record: Value = serde_json::from_str(text)
            .map_err(|e| AutomatonError::MalformedRecord(e.to_string()))?;
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| AutomatonError::MissingField("name".to_string()))?;
        let description = record
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            automaton: Arc::new(decode(&record)?),
            input: decode_input(&record)?,
        })
    }

    pub fn kind(&self) -> Kind {
        self.automaton.kind()
    }
}

pub struct SampleCatalog;

impl SampleCatalog {
    /// Returns the number of available samples.
    pub fn count() -> usize {
        SAMPLES.len()
    }

    /// Returns every sample name, in catalog order.
    pub fn names() -> Vec<&'static str> {
        SAMPLES.iter().map(|sample| sample.name.as_str()).collect()
    }

    /// Looks a sample up by name. Names are matched case-insensitively.
    pub fn get(name: &str) -> Option<&'static Sample> {
        SAMPLES
            .iter()
            .find(|sample| sample.name.eq_ignore_ascii_case(name))
    }

    /// Returns the samples of one kind.
    pub fn of_kind(kind: Kind) -> Vec<&'static Sample> {
        SAMPLES.iter().filter(|sample| sample.kind() == kind).collect()
    }

    /// Returns the embedded record text of a sample.
    pub fn text(name: &str) -> Option<&'static str> {
        let index = SAMPLES
            .iter()
            .position(|sample| sample.name.eq_ignore_ascii_case(name))?;
        SAMPLE_TEXTS.get(index).copied()
    }
}

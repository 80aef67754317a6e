//! This module provides the script front end, utilizing the `pest` crate. A script binds
//! automaton records to names and runs or projects them:
//!
//! ```text
//! LOAD "odd.json" AS odd
//! RUN odd "1011"
//! GRAPH odd
//! ```

use crate::error::CliError;
use crate::loader::{AutomatonLoader, Loaded};
use crate::runner::execute;
use fsmstep::to_graph;
use pest::{iterators::Pair, Parser as PestParser};
use pest_derive::Parser as PestParser;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Derives a `PestParser` for the script grammar defined in `script.pest`.
#[derive(PestParser)]
#[grammar = "script.pest"]
pub struct ScriptParser;

/// One script command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Loads a record and binds it to a name, replacing any previous binding.
    Load { path: PathBuf, name: String },
    /// Runs a bound automaton on the given input, or on the input of its record.
    Run { name: String, input: Option<String> },
    /// Prints the graph projection of a bound automaton as JSON.
    Graph { name: String },
}

/// Parses a script into its commands.
///
/// # Returns
///
/// * `Ok(Vec<Command>)` in script order.
/// * `Err(CliError::ScriptError)` if the script does not follow the grammar.
pub fn parse(input: &str) -> Result<Vec<Command>, CliError> {
    let pairs = ScriptParser::parse(Rule::script, input).map_err(Box::new)?;

    let mut commands = Vec::new();
    for script in pairs {
        for pair in script.into_inner() {
            match pair.as_rule() {
                Rule::load => {
                    let (path, name) = parse_load(pair);
                    commands.push(Command::Load { path, name });
                }
                Rule::run => {
                    let mut inner = pair.into_inner();
                    let name = inner.next().map(parse_name).unwrap_or_default();
                    let input = inner.next().map(parse_string);
                    commands.push(Command::Run { name, input });
                }
                Rule::graph => {
                    let name = pair.into_inner().next().map(parse_name).unwrap_or_default();
                    commands.push(Command::Graph { name });
                }
                _ => {}
            }
        }
    }

    Ok(commands)
}

fn parse_load(pair: Pair<Rule>) -> (PathBuf, String) {
    let mut inner = pair.into_inner();
    let path = inner.next().map(parse_string).unwrap_or_default();
    let name = inner.next().map(parse_name).unwrap_or_default();
    (PathBuf::from(path), name)
}

fn parse_name(pair: Pair<Rule>) -> String {
    pair.as_str().to_string()
}

/// Returns the text between the quotes of a string literal.
fn parse_string(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|text| text.as_str().to_string())
        .unwrap_or_default()
}

/// Executes script commands against a set of named automata.
pub struct Interpreter {
    base: PathBuf,
    limit: usize,
    bindings: BTreeMap<String, Loaded>,
}

impl Interpreter {
    /// Creates an interpreter resolving relative paths against `base`.
    pub fn new(base: &Path, limit: usize) -> Self {
        Self {
            base: base.to_path_buf(),
            limit,
            bindings: BTreeMap::new(),
        }
    }

    /// Parses and executes a whole script, stopping at the first failing command.
    pub fn run_script(&mut self, script: &str, out: &mut dyn Write) -> Result<(), CliError> {
        for command in parse(script)? {
            self.execute(&command, out)?;
        }
        Ok(())
    }

    pub fn execute(&mut self, command: &Command, out: &mut dyn Write) -> Result<(), CliError> {
        debug!(?command, "executing");
        match command {
            Command::Load { path, name } => {
                let loaded = AutomatonLoader::load(&self.base.join(path))?;
                if self.bindings.insert(name.clone(), loaded).is_some() {
                    warn!(%name, "overwrote existing automaton");
                }
            }
            Command::Run { name, input } => {
                let loaded = self.lookup(name)?;
                let input = input.as_deref().unwrap_or(&loaded.input);
                let outcome = execute(loaded.automaton.clone(), input, self.limit, None)?;
                writeln!(out, "{name} {input:?}: {outcome}")?;
            }
            Command::Graph { name } => {
                let graph = to_graph(&self.lookup(name)?.automaton);
                let json = serde_json::to_string_pretty(&graph)
                    .map_err(|e| CliError::OutputError(e.to_string()))?;
                writeln!(out, "{json}")?;
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&Loaded, CliError> {
        self.bindings
            .get(name)
            .ok_or_else(|| CliError::UnknownName(name.to_string()))
    }
}

//! This module defines the core data types shared by the automaton model, the serialization
//! and graph adapters and the execution engine, including the error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::analyzer::Violation;

/// The blank symbol used by tape machines when a record does not override it.
pub const DEFAULT_BLANK_SYMBOL: char = '_';
/// How an epsilon move is written in graph edge labels.
pub const EPSILON_LABEL: &str = "ε";
/// The character of [`EPSILON_LABEL`]. No alphabet may contain it.
pub const EPSILON_SYMBOL: char = 'ε';
/// How an epsilon move is written as a transition key in wire records.
pub const EPSILON_WIRE: &str = "";
/// Default step budget used by drivers that have to tolerate non-halting machines.
pub const MAX_EXECUTION_STEPS: usize = 10000;

/// A state identifier. States carry no behavior; they are pure keys.
pub type State = String;

/// An input or tape symbol. Input strings are read one character at a time.
pub type Symbol = char;

/// The computation model an automaton belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Deterministic finite automaton.
    Dfa,
    /// Nondeterministic finite automaton with epsilon moves.
    Nfa,
    /// Deterministic single-tape Turing machine.
    Tm,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Dfa => "dfa",
            Kind::Nfa => "nfa",
            Kind::Tm => "tm",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = AutomatonError;

    /// Kind names are matched case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dfa" => Ok(Kind::Dfa),
            "nfa" => Ok(Kind::Nfa),
            "tm" => Ok(Kind::Tm),
            _ => Err(AutomatonError::UnknownKind(s.to_string())),
        }
    }
}

/// The key of a nondeterministic transition: either an input symbol or an epsilon move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    /// Consumes one input symbol.
    Symbol(Symbol),
    /// Moves without consuming input.
    Epsilon,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Symbol(symbol) => write!(f, "{symbol}"),
            Label::Epsilon => f.write_str(EPSILON_LABEL),
        }
    }
}

impl From<Symbol> for Label {
    fn from(symbol: Symbol) -> Self {
        Label::Symbol(symbol)
    }
}

/// Represents the possible directions a tape head can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Move the head one position to the left.
    #[serde(rename = "L", alias = "left", alias = "Left")]
    Left,
    /// Move the head one position to the right.
    #[serde(rename = "R", alias = "right", alias = "Right")]
    Right,
    /// Keep the head in the same position.
    #[serde(rename = "S", alias = "N", alias = "stay", alias = "Stay")]
    Stay,
}

impl Direction {
    /// Single-letter form used in wire records and graph labels.
    pub fn as_char(&self) -> char {
        match self {
            Direction::Left => 'L',
            Direction::Right => 'R',
            Direction::Stay => 'S',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'L' => Some(Direction::Left),
            'R' => Some(Direction::Right),
            'S' | 'N' => Some(Direction::Stay),
            _ => None,
        }
    }
}

/// What a tape machine does for one (state, read symbol) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TapeAction {
    /// The state the machine transitions to.
    pub next_state: State,
    /// The symbol written under the head before it moves.
    pub write: Symbol,
    /// Where the head moves after writing.
    pub direction: Direction,
}

impl TapeAction {
    pub fn new(next_state: impl Into<State>, write: Symbol, direction: Direction) -> Self {
        Self {
            next_state: next_state.into(),
            write,
            direction,
        }
    }
}

/// Represents the errors surfaced by the model, the adapters and the execution engine.
///
/// Construction and decoding errors are fatal for the value being built. Peek and step errors
/// are ordinary simulation outcomes; the cursor is left untouched when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AutomatonError {
    /// A required record field is absent.
    #[error("Missing field: {0}")]
    MissingField(String),
    /// The record names a kind other than dfa, nfa or tm.
    #[error("Unknown automaton kind: {0}")]
    UnknownKind(String),
    /// The record or a graph label has the wrong shape or type.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),
    /// A model invariant is violated.
    #[error("Structural error: {0}")]
    Structural(Violation),
    /// More than one vertex of a graph projection carries the initial flag.
    #[error("Ambiguous graph: multiple initial vertices {0:?}")]
    AmbiguousGraph(Vec<State>),
    /// A projection command names a state the graph does not contain.
    #[error("Unknown state: {0}")]
    UnknownState(State),
    /// There is no move for the current state and symbol.
    #[error("No transition defined for state {state} and symbol {label}")]
    NoTransition { state: State, label: Label },
    /// The input is already exhausted.
    #[error("Input is exhausted")]
    EmptyInput,
    /// The chosen nondeterministic target is not among the possible moves.
    #[error("State {0} is not reachable in one move")]
    UnreachableTarget(State),
    /// A nondeterministic step has several candidates and needs a chosen target.
    #[error("Nondeterministic step needs a target, candidates are {0:?}")]
    ChoiceRequired(Vec<State>),
    /// A driver gave up after the given number of steps.
    #[error("Step limit of {0} reached before halting")]
    StepLimit(usize),
}

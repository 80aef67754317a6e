//! This crate provides the core of an automaton stepper for deterministic finite automata,
//! nondeterministic finite automata with epsilon moves, and deterministic Turing machines.
//! It includes the validated automaton model, the JSON wire codec, the annotated graph
//! projection used by renderers, and a peek-before-commit execution engine.

pub mod analyzer;
pub mod automaton;
pub mod encoder;
pub mod graph;
pub mod machine;
pub mod samples;
pub mod tape;
pub mod types;

/// Re-exports the `analyze` function and the `Violation` enum from the analyzer module.
pub use analyzer::{analyze, Violation};
/// Re-exports the `Automaton` model and its transition tables from the automaton module.
pub use automaton::{Automaton, DeterministicTable, NondeterministicTable, TapeTable, Transitions};
/// Re-exports the wire codec functions from the encoder module.
pub use encoder::{decode, decode_input, encode, encode_with_input, from_json, to_json};
/// Re-exports the graph projection types and conversions from the graph module.
pub use graph::{from_graph, to_graph, AnnotatedGraph, Edge, EdgeShape, Flag, Projection, Vertex};
/// Re-exports the execution engine from the machine module.
pub use machine::{Configuration, Machine, Peek, Position, Status};
/// Re-exports `Sample`, `SampleCatalog`, and `SAMPLES` from the samples module.
pub use samples::{Sample, SampleCatalog, SAMPLES};
/// Re-exports the `Tape` struct from the tape module.
pub use tape::Tape;
/// Re-exports the shared types and constants from the types module.
pub use types::{
    AutomatonError, Direction, Kind, Label, State, Symbol, TapeAction, DEFAULT_BLANK_SYMBOL,
    EPSILON_LABEL, EPSILON_SYMBOL, MAX_EXECUTION_STEPS,
};

//! This module provides the graph projection adapter: the annotated directed graph a renderer
//! draws, the conversions between it and `Automaton`, and the `Projection` command interface the
//! execution engine uses to move the "current" flag.
//!
//! Vertices are states carrying flags. Edges carry a text label:
//!
//! | kind | one edge per                         | label            |
//! |------|--------------------------------------|------------------|
//! | dfa  | (state, symbol)                      | `0`              |
//! | nfa  | (source, destination), labels merged | `a, b, ε`        |
//! | tm   | (state, read symbol)                 | `0 → 1, R`       |

use crate::analyzer::Violation;
use crate::automaton::{
    Automaton, DeterministicTable, NondeterministicTable, TapeTable, Transitions,
};
use crate::types::{
    AutomatonError, Direction, Kind, Label, State, Symbol, TapeAction, EPSILON_LABEL,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// Separator between the symbols of a merged edge label.
pub const LABEL_SEPARATOR: &str = ", ";
/// Separator between the read and the write part of a tape machine edge label.
pub const TAPE_ARROW: &str = " → ";

/// A per-vertex tag driving the renderer. Flags are not part of the formal automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    Initial,
    Final,
    Current,
}

/// How the renderer should draw an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeShape {
    /// A line between two distinct vertices.
    Line,
    /// A self-loop.
    Loop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub state: State,
    #[serde(default)]
    pub flags: BTreeSet<Flag>,
}

impl Vertex {
    pub fn has(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: State,
    pub target: State,
    pub label: String,
    pub shape: EdgeShape,
}

impl Edge {
    /// Creates an edge, picking its shape from its endpoints.
    pub fn new(
        source: impl Into<State>,
        target: impl Into<State>,
        label: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        let shape = if source == target {
            EdgeShape::Loop
        } else {
            EdgeShape::Line
        };

        Self {
            source,
            target,
            label: label.into(),
            shape,
        }
    }
}

/// The tape alphabet and blank of a tape machine, carried so the graph can be turned back into
/// a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeSignature {
    pub tape_symbols: BTreeSet<Symbol>,
    pub blank: Symbol,
}

/// The renderer-facing view of an automaton.
///
/// The graph is owned by whoever renders it. Structural edits (adding vertices, relabelling
/// edges, moving flags) are made directly on the public fields and turned into a new model with
/// [`from_graph`]. The execution engine only ever touches it through [`Projection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedGraph {
    pub kind: Kind,
    pub input_symbols: BTreeSet<Symbol>,
    #[serde(default)]
    pub allow_partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tape: Option<TapeSignature>,
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
}

impl AnnotatedGraph {
    pub fn vertex(&self, state: &str) -> Option<&Vertex> {
        self.vertices.iter().find(|vertex| vertex.state == state)
    }

    fn vertex_mut(&mut self, state: &str) -> Result<&mut Vertex, AutomatonError> {
        self.vertices
            .iter_mut()
            .find(|vertex| vertex.state == state)
            .ok_or_else(|| AutomatonError::UnknownState(state.to_string()))
    }

    /// Flags `state` as the current one. Other vertices are left alone.
    pub fn set_current(&mut self, state: &str) -> Result<(), AutomatonError> {
        self.vertex_mut(state)?.flags.insert(Flag::Current);
        Ok(())
    }

    /// Removes the current flag from `state`. Clearing a vertex that is not current is a no-op.
    pub fn clear_current(&mut self, state: &str) -> Result<(), AutomatonError> {
        self.vertex_mut(state)?.flags.remove(&Flag::Current);
        Ok(())
    }

    /// Returns the states carrying the current flag.
    pub fn current(&self) -> Vec<&str> {
        self.vertices
            .iter()
            .filter(|vertex| vertex.has(Flag::Current))
            .map(|vertex| vertex.state.as_str())
            .collect()
    }

    /// Returns the edges leaving `state`.
    pub fn edges_from<'a>(&'a self, state: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.source == state)
    }
}

/// The commands an execution engine issues against a live projection.
///
/// Both commands toggle the current flag on exactly one vertex and never add or remove vertices
/// or edges.
pub trait Projection {
    fn set_current(&mut self, state: &str) -> Result<(), AutomatonError>;
    fn clear_current(&mut self, state: &str) -> Result<(), AutomatonError>;
}

impl Projection for AnnotatedGraph {
    fn set_current(&mut self, state: &str) -> Result<(), AutomatonError> {
        AnnotatedGraph::set_current(self, state)
    }

    fn clear_current(&mut self, state: &str) -> Result<(), AutomatonError> {
        AnnotatedGraph::clear_current(self, state)
    }
}

/// Lets a renderer keep its graph while an engine drives the current flag.
impl<P: Projection + ?Sized> Projection for Rc<RefCell<P>> {
    fn set_current(&mut self, state: &str) -> Result<(), AutomatonError> {
        self.borrow_mut().set_current(state)
    }

    fn clear_current(&mut self, state: &str) -> Result<(), AutomatonError> {
        self.borrow_mut().clear_current(state)
    }
}

/// Projects an `Automaton` into an annotated graph.
///
/// Deterministic and tape machine moves become one edge each. Nondeterministic moves between the
/// same (source, destination) pair are merged into one edge whose label lists the sorted symbols.
pub fn to_graph(automaton: &Automaton) -> AnnotatedGraph {
    let vertices = automaton
        .states()
        .iter()
        .map(|state| {
            let mut flags = BTreeSet::new();
            if state == automaton.initial_state() {
                flags.insert(Flag::Initial);
            }
            if automaton.is_final(state) {
                flags.insert(Flag::Final);
            }
            Vertex {
                state: state.clone(),
                flags,
            }
        })
        .collect();

    let mut tape = None;
    let edges = match automaton.transitions() {
        Transitions::Deterministic { table, .. } => table
            .iter()
            .flat_map(|(state, row)| {
                row.iter()
                    .map(move |(symbol, target)| Edge::new(state, target, symbol.to_string()))
            })
            .collect(),
        Transitions::Nondeterministic(table) => merged_edges(table),
        Transitions::TapeMachine {
            table,
            tape_symbols,
            blank,
        } => {
            tape = Some(TapeSignature {
                tape_symbols: tape_symbols.clone(),
                blank: *blank,
            });
            table
                .iter()
                .flat_map(|(state, row)| {
                    row.iter().map(move |(read, action)| {
                        Edge::new(state, &action.next_state, tape_label(*read, action))
                    })
                })
                .collect()
        }
    };

    AnnotatedGraph {
        kind: automaton.kind(),
        input_symbols: automaton.input_symbols().clone(),
        allow_partial: matches!(
            automaton.transitions(),
            Transitions::Deterministic {
                allow_partial: true,
                ..
            }
        ),
        tape,
        vertices,
        edges,
    }
}

/// Groups nondeterministic moves by (source, destination) and joins their sorted labels.
fn merged_edges(table: &NondeterministicTable) -> Vec<Edge> {
    let mut grouped: BTreeMap<(&State, &State), Vec<String>> = BTreeMap::new();
    for (source, row) in table {
        for (label, targets) in row {
            for target in targets {
                grouped
                    .entry((source, target))
                    .or_default()
                    .push(label.to_string());
            }
        }
    }

    grouped
        .into_iter()
        .map(|((source, target), mut labels)| {
            labels.sort();
            Edge::new(source, target, labels.join(LABEL_SEPARATOR))
        })
        .collect()
}

/// Formats a tape machine move as `read → write, D`. The write symbol is always shown.
fn tape_label(read: Symbol, action: &TapeAction) -> String {
    format!(
        "{read}{TAPE_ARROW}{}{LABEL_SEPARATOR}{}",
        action.write,
        action.direction.as_char()
    )
}

/// Rebuilds an `Automaton` from an annotated graph.
///
/// States come from the vertices, the initial and final sets from their flags and the transition
/// relation from the edge labels. The result is validated like any other model.
///
/// # Returns
///
/// * `Err(AutomatonError::AmbiguousGraph)` if more than one vertex is flagged initial.
/// * `Err(AutomatonError::Structural)` if none is, if deterministic edges conflict, or if the
///   rebuilt automaton violates a model invariant.
/// * `Err(AutomatonError::MalformedRecord)` if an edge label cannot be parsed.
pub fn from_graph(graph: &AnnotatedGraph) -> Result<Automaton, AutomatonError> {
    let mut initial: Vec<State> = graph
        .vertices
        .iter()
        .filter(|vertex| vertex.has(Flag::Initial))
        .map(|vertex| vertex.state.clone())
        .collect();
    initial.sort();
    initial.dedup();

    let initial_state = match initial.len() {
        0 => return Err(Violation::MissingInitialState.into()),
        1 => initial.remove(0),
        _ => return Err(AutomatonError::AmbiguousGraph(initial)),
    };

    let states = graph
        .vertices
        .iter()
        .map(|vertex| vertex.state.clone())
        .collect();
    let final_states = graph
        .vertices
        .iter()
        .filter(|vertex| vertex.has(Flag::Final))
        .map(|vertex| vertex.state.clone())
        .collect();

    let transitions = match graph.kind {
        Kind::Dfa => Transitions::Deterministic {
            table: deterministic_table(&graph.edges)?,
            allow_partial: graph.allow_partial,
        },
        Kind::Nfa => Transitions::Nondeterministic(nondeterministic_table(&graph.edges)?),
        Kind::Tm => {
            let signature = graph.tape.as_ref().ok_or_else(|| {
                AutomatonError::MalformedRecord("tape machine graph has no tape signature".into())
            })?;
            Transitions::TapeMachine {
                table: tape_table(&graph.edges)?,
                tape_symbols: signature.tape_symbols.clone(),
                blank: signature.blank,
            }
        }
    };

    Automaton::new(
        states,
        graph.input_symbols.clone(),
        transitions,
        initial_state,
        final_states,
    )
}

fn deterministic_table(edges: &[Edge]) -> Result<DeterministicTable, AutomatonError> {
    let mut table = DeterministicTable::new();
    for edge in edges {
        for label in parse_labels(&edge.label)? {
            let Label::Symbol(symbol) = label else {
                return Err(AutomatonError::MalformedRecord(format!(
                    "epsilon edge from '{}' in a deterministic graph",
                    edge.source
                )));
            };

            let row = table.entry(edge.source.clone()).or_default();
            match row.get(&symbol) {
                Some(existing) if *existing != edge.target => {
                    return Err(Violation::ConflictingTransition {
                        state: edge.source.clone(),
                        label,
                    }
                    .into());
                }
                _ => {
                    row.insert(symbol, edge.target.clone());
                }
            }
        }
    }
    Ok(table)
}

fn nondeterministic_table(edges: &[Edge]) -> Result<NondeterministicTable, AutomatonError> {
    let mut table = NondeterministicTable::new();
    for edge in edges {
        for label in parse_labels(&edge.label)? {
            table
                .entry(edge.source.clone())
                .or_default()
                .entry(label)
                .or_default()
                .insert(edge.target.clone());
        }
    }
    Ok(table)
}

fn tape_table(edges: &[Edge]) -> Result<TapeTable, AutomatonError> {
    let mut table = TapeTable::new();
    for edge in edges {
        let (read, write, direction) = parse_tape_label(&edge.label)?;
        let action = TapeAction::new(edge.target.clone(), write, direction);

        let row = table.entry(edge.source.clone()).or_default();
        match row.get(&read) {
            Some(existing) if *existing != action => {
                return Err(Violation::ConflictingTransition {
                    state: edge.source.clone(),
                    label: Label::Symbol(read),
                }
                .into());
            }
            _ => {
                row.insert(read, action);
            }
        }
    }
    Ok(table)
}

/// Parses a (possibly merged) finite automaton edge label.
fn parse_labels(label: &str) -> Result<Vec<Label>, AutomatonError> {
    label
        .split(LABEL_SEPARATOR)
        .map(|part| {
            if part == EPSILON_LABEL {
                return Ok(Label::Epsilon);
            }
            let mut chars = part.chars();
            match (chars.next(), chars.next()) {
                (Some(symbol), None) => Ok(Label::Symbol(symbol)),
                _ => Err(AutomatonError::MalformedRecord(format!(
                    "edge label '{label}' is not a list of single symbols"
                ))),
            }
        })
        .collect()
}

/// Parses a tape machine edge label of the form `read → write, D`.
fn parse_tape_label(label: &str) -> Result<(Symbol, Symbol, Direction), AutomatonError> {
    let malformed = || {
        AutomatonError::MalformedRecord(format!(
            "edge label '{label}' is not of the form 'read{TAPE_ARROW}write{LABEL_SEPARATOR}direction'"
        ))
    };

    let mut chars = label.chars();
    let read = chars.next().ok_or_else(malformed)?;
    let rest = chars.as_str().strip_prefix(TAPE_ARROW).ok_or_else(malformed)?;

    let mut chars = rest.chars();
    let write = chars.next().ok_or_else(malformed)?;
    let rest = chars
        .as_str()
        .strip_prefix(LABEL_SEPARATOR)
        .ok_or_else(malformed)?;

    let mut chars = rest.chars();
    let direction = match (chars.next(), chars.next()) {
        (Some(c), None) => Direction::from_char(c).ok_or_else(malformed)?,
        _ => return Err(malformed()),
    };

    Ok((read, write, direction))
}

//! This module defines `Automaton`, the canonical in-memory model shared by the adapters and the
//! execution engine. A model is validated when it is built and never mutated afterwards; changes
//! go through [`Automaton::with_transitions`], which produces a new validated model.

use crate::analyzer::{analyze, find_unreachable_states};
use crate::types::{AutomatonError, Kind, Label, State, Symbol, TapeAction};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Deterministic transition table: (state, symbol) to exactly one state.
pub type DeterministicTable = BTreeMap<State, BTreeMap<Symbol, State>>;
/// Nondeterministic transition table: (state, label) to a set of states.
pub type NondeterministicTable = BTreeMap<State, BTreeMap<Label, BTreeSet<State>>>;
/// Tape machine transition table: (state, read symbol) to an action.
pub type TapeTable = BTreeMap<State, BTreeMap<Symbol, TapeAction>>;

/// The transition relation, one variant per kind of automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transitions {
    Deterministic {
        table: DeterministicTable,
        /// When unset, every (state, symbol) pair must have a move.
        allow_partial: bool,
    },
    Nondeterministic(NondeterministicTable),
    TapeMachine {
        table: TapeTable,
        /// Symbols the machine may read or write. The blank is implicitly included.
        tape_symbols: BTreeSet<Symbol>,
        blank: Symbol,
    },
}

impl Transitions {
    pub fn kind(&self) -> Kind {
        match self {
            Transitions::Deterministic { .. } => Kind::Dfa,
            Transitions::Nondeterministic(_) => Kind::Nfa,
            Transitions::TapeMachine { .. } => Kind::Tm,
        }
    }

    /// Drops empty target sets and empty rows, so that "no move" has a single representation.
    fn normalized(self) -> Self {
        match self {
            Transitions::Deterministic {
                mut table,
                allow_partial,
            } => {
                table.retain(|_, row| !row.is_empty());
                Transitions::Deterministic {
                    table,
                    allow_partial,
                }
            }
            Transitions::Nondeterministic(mut table) => {
                for row in table.values_mut() {
                    row.retain(|_, targets| !targets.is_empty());
                }
                table.retain(|_, row| !row.is_empty());
                Transitions::Nondeterministic(table)
            }
            Transitions::TapeMachine {
                mut table,
                tape_symbols,
                blank,
            } => {
                table.retain(|_, row| !row.is_empty());
                Transitions::TapeMachine {
                    table,
                    tape_symbols,
                    blank,
                }
            }
        }
    }
}

/// A validated automaton of any supported kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automaton {
    pub(crate) states: BTreeSet<State>,
    pub(crate) input_symbols: BTreeSet<Symbol>,
    pub(crate) transitions: Transitions,
    pub(crate) initial_state: State,
    pub(crate) final_states: BTreeSet<State>,
}

impl Automaton {
    /// Builds a new automaton and validates it.
    ///
    /// # Returns
    ///
    /// * `Ok(Automaton)` if every model invariant holds.
    /// * `Err(AutomatonError::Structural)` naming the first violated invariant otherwise.
    pub fn new(
        states: BTreeSet<State>,
        input_symbols: BTreeSet<Symbol>,
        transitions: Transitions,
        initial_state: impl Into<State>,
        final_states: BTreeSet<State>,
    ) -> Result<Self, AutomatonError> {
        let automaton = Self {
            states,
            input_symbols,
            transitions: transitions.normalized(),
            initial_state: initial_state.into(),
            final_states,
        };

        automaton.validate()?;
        Ok(automaton)
    }

    /// Checks every model invariant and reports the first one that does not hold.
    pub fn validate(&self) -> Result<(), AutomatonError> {
        analyze(self)
    }

    /// Builds a new automaton that shares everything with this one except its transitions.
    /// The kind may change along with the relation.
    pub fn with_transitions(&self, transitions: Transitions) -> Result<Self, AutomatonError> {
        let rebuilt = Self::new(
            self.states.clone(),
            self.input_symbols.clone(),
            transitions,
            self.initial_state.clone(),
            self.final_states.clone(),
        )?;
        debug!(kind = %rebuilt.kind(), "rebuilt automaton");
        Ok(rebuilt)
    }

    pub fn kind(&self) -> Kind {
        self.transitions.kind()
    }

    pub fn states(&self) -> &BTreeSet<State> {
        &self.states
    }

    pub fn input_symbols(&self) -> &BTreeSet<Symbol> {
        &self.input_symbols
    }

    pub fn transitions(&self) -> &Transitions {
        &self.transitions
    }

    pub fn initial_state(&self) -> &str {
        &self.initial_state
    }

    pub fn final_states(&self) -> &BTreeSet<State> {
        &self.final_states
    }

    pub fn is_final(&self, state: &str) -> bool {
        self.final_states.contains(state)
    }

    /// Returns whether a deterministic table may leave moves undefined. Other kinds are always
    /// partial.
    pub fn allow_partial(&self) -> bool {
        match &self.transitions {
            Transitions::Deterministic { allow_partial, .. } => *allow_partial,
            _ => true,
        }
    }

    /// Returns the blank symbol of a tape machine.
    pub fn blank(&self) -> Option<Symbol> {
        match &self.transitions {
            Transitions::TapeMachine { blank, .. } => Some(*blank),
            _ => None,
        }
    }

    /// Returns the tape alphabet of a tape machine, as declared (without the implicit blank).
    pub fn tape_symbols(&self) -> Option<&BTreeSet<Symbol>> {
        match &self.transitions {
            Transitions::TapeMachine { tape_symbols, .. } => Some(tape_symbols),
            _ => None,
        }
    }

    /// Returns the deterministic move for (state, symbol), if this is a DFA and the move exists.
    pub fn transition(&self, state: &str, symbol: Symbol) -> Option<&State> {
        match &self.transitions {
            Transitions::Deterministic { table, .. } => table.get(state)?.get(&symbol),
            _ => None,
        }
    }

    /// Returns the states reachable from `state` in one move labelled `label`.
    ///
    /// Deterministic automata answer with at most one state; tape machines never answer.
    pub fn targets(&self, state: &str, label: Label) -> BTreeSet<State> {
        match (&self.transitions, label) {
            (Transitions::Nondeterministic(table), label) => table
                .get(state)
                .and_then(|row| row.get(&label))
                .cloned()
                .unwrap_or_default(),
            (Transitions::Deterministic { .. }, Label::Symbol(symbol)) => self
                .transition(state, symbol)
                .into_iter()
                .cloned()
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    /// Returns the tape machine action for (state, read symbol), if defined.
    pub fn action(&self, state: &str, symbol: Symbol) -> Option<&TapeAction> {
        match &self.transitions {
            Transitions::TapeMachine { table, .. } => table.get(state)?.get(&symbol),
            _ => None,
        }
    }

    /// Returns every state a single move of any label leads to from `state`.
    pub fn successors(&self, state: &str) -> BTreeSet<&State> {
        match &self.transitions {
            Transitions::Deterministic { table, .. } => table
                .get(state)
                .map(|row| row.values().collect())
                .unwrap_or_default(),
            Transitions::Nondeterministic(table) => table
                .get(state)
                .map(|row| row.values().flatten().collect())
                .unwrap_or_default(),
            Transitions::TapeMachine { table, .. } => table
                .get(state)
                .map(|row| row.values().map(|action| &action.next_state).collect())
                .unwrap_or_default(),
        }
    }

    /// Extends a set of states with everything reachable through epsilon moves.
    pub fn epsilon_closure(&self, states: &BTreeSet<State>) -> BTreeSet<State> {
        let mut closure = states.clone();
        let mut queue: Vec<State> = states.iter().cloned().collect();

        while let Some(state) = queue.pop() {
            for target in self.targets(&state, Label::Epsilon) {
                if closure.insert(target.clone()) {
                    queue.push(target);
                }
            }
        }

        closure
    }

    /// Decides membership of `input` for finite automata.
    ///
    /// Nondeterministic automata are simulated on sets of states. Tape machines have no bounded
    /// membership test and answer `None`; drive them with a `Machine` and a step limit instead.
    pub fn accepts(&self, input: &str) -> Option<bool> {
        match &self.transitions {
            Transitions::Deterministic { .. } => {
                let mut state = &self.initial_state;
                for symbol in input.chars() {
                    match self.transition(state, symbol) {
                        Some(next) => state = next,
                        None => return Some(false),
                    }
                }
                Some(self.is_final(state))
            }
            Transitions::Nondeterministic(_) => {
                let start = BTreeSet::from([self.initial_state.clone()]);
                let mut current = self.epsilon_closure(&start);
                for symbol in input.chars() {
                    let next: BTreeSet<State> = current
                        .iter()
                        .flat_map(|state| self.targets(state, Label::Symbol(symbol)))
                        .collect();
                    current = self.epsilon_closure(&next);
                    if current.is_empty() {
                        return Some(false);
                    }
                }
                Some(current.iter().any(|state| self.is_final(state)))
            }
            Transitions::TapeMachine { .. } => None,
        }
    }

    /// Embeds a deterministic automaton into an equivalent nondeterministic one. Automata of other
    /// kinds are returned unchanged.
    pub fn to_nondeterministic(&self) -> Automaton {
        let Transitions::Deterministic { table, .. } = &self.transitions else {
            return self.clone();
        };

        let table: NondeterministicTable = table
            .iter()
            .map(|(state, row)| {
                let row = row
                    .iter()
                    .map(|(symbol, target)| {
                        (Label::Symbol(*symbol), BTreeSet::from([target.clone()]))
                    })
                    .collect();
                (state.clone(), row)
            })
            .collect();

        Automaton {
            transitions: Transitions::Nondeterministic(table),
            ..self.clone()
        }
    }

    /// Returns the states that cannot be reached from the initial state, sorted.
    pub fn unreachable_states(&self) -> Vec<State> {
        find_unreachable_states(self)
    }
}

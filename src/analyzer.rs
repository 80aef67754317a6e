//! This module provides the structural checks run on every `Automaton` before it is handed out,
//! together with a reachability diagnostic that is reported but never enforced.

use crate::automaton::{Automaton, Transitions};
use crate::types::{AutomatonError, Label, State, Symbol, EPSILON_SYMBOL};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// Names the model invariant an automaton violates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// The automaton declares no states at all.
    #[error("no states declared")]
    NoStates,
    /// A finite automaton declares no input symbols.
    #[error("input alphabet is empty")]
    EmptyAlphabet,
    /// The initial state is not a declared state.
    #[error("initial state '{0}' is not declared")]
    UndeclaredInitialState(State),
    /// A graph projection has no vertex flagged as initial.
    #[error("no initial state is flagged")]
    MissingInitialState,
    /// A final state is not a declared state.
    #[error("final state '{0}' is not declared")]
    UndeclaredFinalState(State),
    /// Transitions are defined for a state that is not declared.
    #[error("transitions defined for undeclared state '{0}'")]
    UndeclaredSource(State),
    /// A transition leads to a state that is not declared.
    #[error("transition from '{state}' leads to undeclared state '{target}'")]
    DanglingTarget { state: State, target: State },
    /// A transition reads or writes a symbol outside its alphabet.
    #[error("transition from '{state}' uses symbol '{label}' outside the alphabet")]
    UnknownSymbol { state: State, label: Label },
    /// A total deterministic automaton lacks a move.
    #[error("no transition from '{state}' on '{symbol}'")]
    MissingTransition { state: State, symbol: Symbol },
    /// Two deterministic moves share a (state, symbol) pair.
    #[error("conflicting transitions from '{state}' on '{label}'")]
    ConflictingTransition { state: State, label: Label },
    /// The blank symbol is also declared as an input symbol.
    #[error("blank symbol '{0}' is declared as an input symbol")]
    BlankIsInputSymbol(Symbol),
    /// An input symbol is missing from the tape alphabet.
    #[error("input symbol '{0}' is not in the tape alphabet")]
    InputSymbolNotOnTape(Symbol),
    /// An alphabet contains the symbol that labels epsilon moves.
    #[error("symbol '{0}' is reserved for epsilon moves")]
    ReservedSymbol(Symbol),
}

impl From<Violation> for AutomatonError {
    fn from(violation: Violation) -> Self {
        AutomatonError::Structural(violation)
    }
}

/// Analyzes an `Automaton` for violated model invariants.
///
/// The checks run in a fixed order and the first failing one is reported, so the same broken
/// automaton always produces the same error.
///
/// # Returns
///
/// * `Ok(())` if no invariant is violated.
/// * `Err(AutomatonError::Structural)` naming the first violation otherwise.
pub fn analyze(automaton: &Automaton) -> Result<(), AutomatonError> {
    let checks: [fn(&Automaton) -> Result<(), Violation>; 8] = [
        check_states,
        check_initial_state,
        check_final_states,
        check_alphabet,
        check_sources,
        check_targets,
        check_symbols,
        check_coverage,
    ];

    checks
        .iter()
        .try_for_each(|check| check(automaton))
        .map_err(AutomatonError::from)
}

fn check_states(automaton: &Automaton) -> Result<(), Violation> {
    if automaton.states.is_empty() {
        return Err(Violation::NoStates);
    }

    Ok(())
}

fn check_initial_state(automaton: &Automaton) -> Result<(), Violation> {
    if !automaton.states.contains(&automaton.initial_state) {
        return Err(Violation::UndeclaredInitialState(
            automaton.initial_state.clone(),
        ));
    }

    Ok(())
}

fn check_final_states(automaton: &Automaton) -> Result<(), Violation> {
    automaton
        .final_states
        .difference(&automaton.states)
        .next()
        .map_or(Ok(()), |state| {
            Err(Violation::UndeclaredFinalState(state.clone()))
        })
}

/// Checks the input alphabet, and for tape machines its relation to the tape alphabet.
fn check_alphabet(automaton: &Automaton) -> Result<(), Violation> {
    if automaton.input_symbols.contains(&EPSILON_SYMBOL) {
        return Err(Violation::ReservedSymbol(EPSILON_SYMBOL));
    }

    match &automaton.transitions {
        Transitions::TapeMachine {
            tape_symbols,
            blank,
            ..
        } => {
            if *blank == EPSILON_SYMBOL || tape_symbols.contains(&EPSILON_SYMBOL) {
                return Err(Violation::ReservedSymbol(EPSILON_SYMBOL));
            }

            if automaton.input_symbols.contains(blank) {
                return Err(Violation::BlankIsInputSymbol(*blank));
            }

            if let Some(symbol) = automaton.input_symbols.difference(tape_symbols).next() {
                return Err(Violation::InputSymbolNotOnTape(*symbol));
            }
        }
        _ => {
            if automaton.input_symbols.is_empty() {
                return Err(Violation::EmptyAlphabet);
            }
        }
    }

    Ok(())
}

/// Checks that transitions are only defined for declared states.
fn check_sources(automaton: &Automaton) -> Result<(), Violation> {
    let sources: Vec<&State> = match &automaton.transitions {
        Transitions::Deterministic { table, .. } => table.keys().collect(),
        Transitions::Nondeterministic(table) => table.keys().collect(),
        Transitions::TapeMachine { table, .. } => table.keys().collect(),
    };

    sources
        .into_iter()
        .find(|state| !automaton.states.contains(*state))
        .map_or(Ok(()), |state| Err(Violation::UndeclaredSource(state.clone())))
}

/// Checks that every transition leads to a declared state.
fn check_targets(automaton: &Automaton) -> Result<(), Violation> {
    for source in &automaton.states {
        if let Some(target) = automaton
            .successors(source)
            .into_iter()
            .find(|target| !automaton.states.contains(*target))
        {
            return Err(Violation::DanglingTarget {
                state: source.clone(),
                target: target.clone(),
            });
        }
    }

    Ok(())
}

/// Checks that transitions only use symbols of the declared alphabet.
///
/// Finite automata read from the input alphabet, epsilon moves excepted. Tape machines read and
/// write from the tape alphabet, which implicitly contains the blank.
fn check_symbols(automaton: &Automaton) -> Result<(), Violation> {
    let unknown = |state: &State, label: Label| Violation::UnknownSymbol {
        state: state.clone(),
        label,
    };

    match &automaton.transitions {
        Transitions::Deterministic { table, .. } => {
            for (state, row) in table {
                if let Some(symbol) = row
                    .keys()
                    .find(|symbol| !automaton.input_symbols.contains(*symbol))
                {
                    return Err(unknown(state, Label::Symbol(*symbol)));
                }
            }
        }
        Transitions::Nondeterministic(table) => {
            for (state, row) in table {
                let outside = row.keys().find(|label| match label {
                    Label::Symbol(symbol) => !automaton.input_symbols.contains(symbol),
                    Label::Epsilon => false,
                });
                if let Some(label) = outside {
                    return Err(unknown(state, *label));
                }
            }
        }
        Transitions::TapeMachine {
            table,
            tape_symbols,
            blank,
        } => {
            let on_tape = |symbol: &Symbol| symbol == blank || tape_symbols.contains(symbol);
            for (state, row) in table {
                for (read, action) in row {
                    if !on_tape(read) {
                        return Err(unknown(state, Label::Symbol(*read)));
                    }
                    if !on_tape(&action.write) {
                        return Err(unknown(state, Label::Symbol(action.write)));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Checks that a total deterministic automaton defines a move for every (state, symbol) pair.
fn check_coverage(automaton: &Automaton) -> Result<(), Violation> {
    let Transitions::Deterministic {
        allow_partial: false,
        ..
    } = &automaton.transitions
    else {
        return Ok(());
    };

    for state in &automaton.states {
        for symbol in &automaton.input_symbols {
            if automaton.transition(state, *symbol).is_none() {
                return Err(Violation::MissingTransition {
                    state: state.clone(),
                    symbol: *symbol,
                });
            }
        }
    }

    Ok(())
}

/// Finds the states that no sequence of moves from the initial state reaches.
///
/// Performs a depth-first traversal over all moves regardless of label. The result is sorted.
pub fn find_unreachable_states(automaton: &Automaton) -> Vec<State> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue = vec![automaton.initial_state.as_str()];

    while let Some(state) = queue.pop() {
        if !visited.insert(state) {
            continue;
        }

        for next in automaton.successors(state) {
            if !visited.contains(next.as_str()) {
                queue.push(next.as_str());
            }
        }
    }

    let unreachable: BTreeSet<&State> = automaton
        .states
        .iter()
        .filter(|state| !visited.contains(state.as_str()))
        .collect();

    unreachable.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::tests::{set, states};
    use crate::automaton::{DeterministicTable, NondeterministicTable, TapeTable};
    use crate::types::{Direction, TapeAction};
    use std::collections::BTreeMap;

    fn dfa(
        declared: &[&str],
        table: DeterministicTable,
        initial: &str,
        finals: &[&str],
    ) -> Result<Automaton, AutomatonError> {
        Automaton::new(
            states(declared),
            set(&['a']),
            Transitions::Deterministic {
                table,
                allow_partial: true,
            },
            initial,
            states(finals),
        )
    }

    fn row(pairs: &[(char, &str)]) -> BTreeMap<Symbol, State> {
        pairs
            .iter()
            .map(|(symbol, state)| (*symbol, state.to_string()))
            .collect()
    }

    #[test]
    fn test_valid_automaton() {
        let mut table = DeterministicTable::new();
        table.insert("q0".to_string(), row(&[('a', "q1")]));

        assert!(dfa(&["q0", "q1"], table, "q0", &["q1"]).is_ok());
    }

    #[test]
    fn test_no_states() {
        let result = dfa(&[], DeterministicTable::new(), "q0", &[]);
        assert_eq!(result, Err(Violation::NoStates.into()));
    }

    #[test]
    fn test_undeclared_initial_state() {
        let result = dfa(&["q0"], DeterministicTable::new(), "start", &[]);
        assert_eq!(
            result,
            Err(Violation::UndeclaredInitialState("start".to_string()).into())
        );
    }

    #[test]
    fn test_undeclared_final_state() {
        let result = dfa(&["q0"], DeterministicTable::new(), "q0", &["q9"]);
        assert_eq!(
            result,
            Err(Violation::UndeclaredFinalState("q9".to_string()).into())
        );
    }

    #[test]
    fn test_undeclared_source() {
        let mut table = DeterministicTable::new();
        table.insert("ghost".to_string(), row(&[('a', "q0")]));

        let result = dfa(&["q0"], table, "q0", &[]);
        assert_eq!(
            result,
            Err(Violation::UndeclaredSource("ghost".to_string()).into())
        );
    }

    #[test]
    fn test_dangling_target() {
        let mut table = DeterministicTable::new();
        table.insert("q0".to_string(), row(&[('a', "nowhere")]));

        let result = dfa(&["q0"], table, "q0", &[]);
        assert_eq!(
            result,
            Err(Violation::DanglingTarget {
                state: "q0".to_string(),
                target: "nowhere".to_string(),
            }
            .into())
        );
    }

    #[test]
    fn test_symbol_outside_alphabet() {
        let mut table = DeterministicTable::new();
        table.insert("q0".to_string(), row(&[('z', "q0")]));

        let result = dfa(&["q0"], table, "q0", &[]);
        assert_eq!(
            result,
            Err(Violation::UnknownSymbol {
                state: "q0".to_string(),
                label: Label::Symbol('z'),
            }
            .into())
        );
    }

    #[test]
    fn test_epsilon_is_not_an_unknown_symbol() {
        let mut table = NondeterministicTable::new();
        table.insert(
            "q0".to_string(),
            BTreeMap::from([(Label::Epsilon, states(&["q0"]))]),
        );

        let result = Automaton::new(
            states(&["q0"]),
            set(&['a']),
            Transitions::Nondeterministic(table),
            "q0",
            BTreeSet::new(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_coverage() {
        let mut table = DeterministicTable::new();
        table.insert("q0".to_string(), row(&[('a', "q0")]));

        let result = Automaton::new(
            states(&["q0"]),
            set(&['a', 'b']),
            Transitions::Deterministic {
                table,
                allow_partial: false,
            },
            "q0",
            BTreeSet::new(),
        );
        assert_eq!(
            result,
            Err(Violation::MissingTransition {
                state: "q0".to_string(),
                symbol: 'b',
            }
            .into())
        );
    }

    #[test]
    fn test_empty_alphabet() {
        let result = Automaton::new(
            states(&["q0"]),
            BTreeSet::new(),
            Transitions::Nondeterministic(NondeterministicTable::new()),
            "q0",
            BTreeSet::new(),
        );
        assert_eq!(result, Err(Violation::EmptyAlphabet.into()));
    }

    fn tm(
        input: &[char],
        tape: &[char],
        blank: char,
        table: TapeTable,
    ) -> Result<Automaton, AutomatonError> {
        Automaton::new(
            states(&["q0"]),
            set(input),
            Transitions::TapeMachine {
                table,
                tape_symbols: set(tape),
                blank,
            },
            "q0",
            BTreeSet::new(),
        )
    }

    #[test]
    fn test_epsilon_symbol_is_reserved() {
        let result = Automaton::new(
            states(&["q0"]),
            set(&['a', 'ε']),
            Transitions::Deterministic {
                table: DeterministicTable::new(),
                allow_partial: true,
            },
            "q0",
            BTreeSet::new(),
        );
        assert_eq!(result, Err(Violation::ReservedSymbol('ε').into()));

        assert_eq!(
            tm(&['0'], &['0', 'ε'], '_', TapeTable::new()),
            Err(Violation::ReservedSymbol('ε').into())
        );
        assert_eq!(
            tm(&['0'], &['0'], 'ε', TapeTable::new()),
            Err(Violation::ReservedSymbol('ε').into())
        );
    }

    #[test]
    fn test_tape_alphabet_checks() {
        assert_eq!(
            tm(&['0', '_'], &['0', '_'], '_', TapeTable::new()),
            Err(Violation::BlankIsInputSymbol('_').into())
        );
        assert_eq!(
            tm(&['0', '1'], &['0'], '_', TapeTable::new()),
            Err(Violation::InputSymbolNotOnTape('1').into())
        );
    }

    #[test]
    fn test_tape_machine_may_read_and_write_blank() {
        let mut table = TapeTable::new();
        table.insert(
            "q0".to_string(),
            BTreeMap::from([('_', TapeAction::new("q0", '_', Direction::Stay))]),
        );
        assert!(tm(&['0'], &['0'], '_', table).is_ok());

        let mut table = TapeTable::new();
        table.insert(
            "q0".to_string(),
            BTreeMap::from([('0', TapeAction::new("q0", 'x', Direction::Left))]),
        );
        assert_eq!(
            tm(&['0'], &['0'], '_', table),
            Err(Violation::UnknownSymbol {
                state: "q0".to_string(),
                label: Label::Symbol('x'),
            }
            .into())
        );
    }

    #[test]
    fn test_violation_display() {
        let error: AutomatonError = Violation::UndeclaredInitialState("q7".to_string()).into();
        let message = error.to_string();

        assert!(message.contains("Structural error"));
        assert!(message.contains("q7"));
    }
}

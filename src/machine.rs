//! This module defines `Machine`, the execution engine. A machine owns a live cursor over a
//! shared, immutable `Automaton` and advances it one move at a time with peek-before-commit
//! semantics. When a graph projection is attached, every successful step moves its "current"
//! flag along with the cursor.

use crate::automaton::{Automaton, Transitions};
use crate::graph::Projection;
use crate::tape::Tape;
use crate::types::{AutomatonError, Kind, Label, State, Symbol, DEFAULT_BLANK_SYMBOL};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Where an execution stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// No step has been taken yet.
    Ready,
    /// At least one step has been taken and the machine can still move.
    Stepping,
    /// Halted in a final state.
    Accepted,
    /// Halted in a non-final state.
    Rejected,
}

impl Status {
    pub fn is_halted(&self) -> bool {
        matches!(self, Status::Accepted | Status::Rejected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Ready => "ready",
            Status::Stepping => "stepping",
            Status::Accepted => "accepted",
            Status::Rejected => "rejected",
        };
        f.write_str(text)
    }
}

/// A complete tape machine configuration: control state plus tape and head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub state: State,
    pub tape: Tape,
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.state, self.tape)
    }
}

/// The answer of [`Machine::peek`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Peek {
    /// The single next state of a deterministic automaton.
    Target(State),
    /// The possible next states of a nondeterministic automaton, in no particular order.
    Targets(HashSet<State>),
    /// The next configuration of a tape machine.
    Configuration(Configuration),
}

/// The position a successful step leads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    State(State),
    Configuration(Configuration),
}

impl Position {
    pub fn state(&self) -> &str {
        match self {
            Position::State(state) => state,
            Position::Configuration(configuration) => &configuration.state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Finite {
        state: State,
        input: Vec<Symbol>,
        consumed: usize,
    },
    Tape(Configuration),
}

impl Cursor {
    fn state(&self) -> &State {
        match self {
            Cursor::Finite { state, .. } => state,
            Cursor::Tape(configuration) => &configuration.state,
        }
    }

    fn position(&self) -> Position {
        match self {
            Cursor::Finite { state, .. } => Position::State(state.clone()),
            Cursor::Tape(configuration) => Position::Configuration(configuration.clone()),
        }
    }
}

/// An execution of an automaton on one input.
///
/// Any number of machines may share the same automaton; each owns its own cursor and, if
/// attached, its own projection.
pub struct Machine {
    automaton: Arc<Automaton>,
    input: String,
    cursor: Cursor,
    step_count: usize,
    projection: Option<Box<dyn Projection>>,
    flagged: Option<State>,
}

impl Machine {
    /// Creates a new machine at the initial state of `automaton`.
    ///
    /// # Arguments
    ///
    /// * `automaton` - The automaton to simulate.
    /// * `input` - The input string of a finite automaton, or the initial tape contents of a
    ///   tape machine.
    pub fn new(automaton: Arc<Automaton>, input: &str) -> Self {
        let cursor = Self::initial_cursor(&automaton, input);
        Self {
            automaton,
            input: input.to_string(),
            cursor,
            step_count: 0,
            projection: None,
            flagged: None,
        }
    }

    fn initial_cursor(automaton: &Automaton, input: &str) -> Cursor {
        let state = automaton.initial_state().to_string();
        match automaton.transitions() {
            Transitions::TapeMachine { blank, .. } => Cursor::Tape(Configuration {
                state,
                tape: Tape::new(input, *blank),
            }),
            _ => Cursor::Finite {
                state,
                input: input.chars().collect(),
                consumed: 0,
            },
        }
    }

    /// Computes the next position without moving the cursor.
    ///
    /// With `None`, deterministic automata look at the next input symbol, nondeterministic ones
    /// at the next input symbol together with the epsilon moves, and tape machines at the symbol
    /// under the head. An explicit label asks "what if" that label were read instead.
    ///
    /// # Returns
    ///
    /// * `Err(AutomatonError::EmptyInput)` if a finite automaton has nothing left to look at.
    /// * `Err(AutomatonError::NoTransition)` if no move is defined.
    pub fn peek(&self, label: Option<Label>) -> Result<Peek, AutomatonError> {
        match self.automaton.transitions() {
            Transitions::Deterministic { .. } => {
                let symbol = match label {
                    Some(Label::Symbol(symbol)) => symbol,
                    Some(Label::Epsilon) => return Err(self.no_transition(Label::Epsilon)),
                    None => self.next_symbol().ok_or(AutomatonError::EmptyInput)?,
                };
                self.automaton
                    .transition(self.state(), symbol)
                    .map(|target| Peek::Target(target.clone()))
                    .ok_or_else(|| self.no_transition(Label::Symbol(symbol)))
            }
            Transitions::Nondeterministic(_) => {
                let targets = match label {
                    Some(label) => self.nfa_targets(label)?,
                    None => self.nfa_candidates()?,
                };
                Ok(Peek::Targets(targets.into_iter().collect()))
            }
            Transitions::TapeMachine { .. } => {
                let Cursor::Tape(configuration) = &self.cursor else {
                    return Err(self.no_transition(label.unwrap_or(Label::Epsilon)));
                };
                let read = match label {
                    Some(Label::Symbol(symbol)) => symbol,
                    Some(Label::Epsilon) => return Err(self.no_transition(Label::Epsilon)),
                    None => configuration.tape.read(),
                };
                self.apply_action(configuration, read)
                    .map(Peek::Configuration)
            }
        }
    }

    /// Executes a single move.
    ///
    /// Deterministic automata consume the next input symbol. Nondeterministic automata only
    /// step on their own when exactly one move is possible; otherwise the caller must pick one
    /// with [`Machine::step_to`]. Tape machines write, move the head and change state.
    ///
    /// The cursor is left untouched when an error is returned.
    ///
    /// # Returns
    ///
    /// * `Ok(Position)` with the new position.
    /// * `Err(AutomatonError::EmptyInput)` if a finite automaton has exhausted its input.
    /// * `Err(AutomatonError::NoTransition)` if no move is defined.
    /// * `Err(AutomatonError::ChoiceRequired)` if a nondeterministic step has several candidates.
    pub fn step(&mut self) -> Result<Position, AutomatonError> {
        match self.peek(None)? {
            Peek::Target(target) => self.step_to(&target),
            Peek::Targets(targets) => {
                if targets.len() == 1 {
                    let target = targets.into_iter().next().unwrap_or_default();
                    self.step_to(&target)
                } else {
                    let mut candidates: Vec<State> = targets.into_iter().collect();
                    candidates.sort();
                    Err(AutomatonError::ChoiceRequired(candidates))
                }
            }
            Peek::Configuration(configuration) => self.advance(Cursor::Tape(configuration)),
        }
    }

    /// Executes the move leading to `target`.
    ///
    /// Deterministic automata and tape machines only accept the one target their next move
    /// leads to. For nondeterministic automata a move on the next input symbol is taken when it
    /// reaches `target`, an epsilon move otherwise; use [`Machine::step_via`] to take an epsilon
    /// move to a target the next symbol also reaches.
    ///
    /// # Returns
    ///
    /// * `Err(AutomatonError::UnreachableTarget)` if no single move leads to `target`.
    /// * Any error [`Machine::peek`] reports for the current position.
    pub fn step_to(&mut self, target: &str) -> Result<Position, AutomatonError> {
        let label = match self.peek(None)? {
            Peek::Targets(targets) => {
                if !targets.contains(target) {
                    return Err(AutomatonError::UnreachableTarget(target.to_string()));
                }
                match self.next_symbol() {
                    Some(symbol)
                        if self
                            .automaton
                            .targets(self.state(), Label::Symbol(symbol))
                            .contains(target) =>
                    {
                        Label::Symbol(symbol)
                    }
                    _ => Label::Epsilon,
                }
            }
            Peek::Target(_) | Peek::Configuration(_) => self
                .next_symbol()
                .map(Label::Symbol)
                .ok_or(AutomatonError::EmptyInput)?,
        };

        self.step_via(label, target)
    }

    /// Executes the move on `label` that leads to `target`.
    ///
    /// A symbol label must be the next input symbol (for tape machines, the symbol under the
    /// head) and is consumed. Epsilon moves never consume input.
    ///
    /// The cursor is left untouched when an error is returned.
    ///
    /// # Returns
    ///
    /// * `Ok(Position)` with the new position.
    /// * `Err(AutomatonError::EmptyInput)` if a symbol move is asked for after the input ran out.
    /// * `Err(AutomatonError::NoTransition)` if no move on `label` is defined.
    /// * `Err(AutomatonError::UnreachableTarget)` if `label` is not the next symbol, or none of
    ///   its moves leads to `target`.
    pub fn step_via(&mut self, label: Label, target: &str) -> Result<Position, AutomatonError> {
        if let Label::Symbol(symbol) = label {
            let next = self.next_symbol().ok_or(AutomatonError::EmptyInput)?;
            if next != symbol {
                return Err(AutomatonError::UnreachableTarget(target.to_string()));
            }
        }

        let consumes = matches!(label, Label::Symbol(_));
        let next = match (&self.cursor, self.peek(Some(label))?) {
            (
                Cursor::Finite {
                    input, consumed, ..
                },
                Peek::Target(next),
            ) => {
                if next != target {
                    return Err(AutomatonError::UnreachableTarget(target.to_string()));
                }
                Cursor::Finite {
                    state: next,
                    input: input.clone(),
                    consumed: consumed + 1,
                }
            }
            (
                Cursor::Finite {
                    input, consumed, ..
                },
                Peek::Targets(targets),
            ) => {
                if !targets.contains(target) {
                    return Err(AutomatonError::UnreachableTarget(target.to_string()));
                }
                Cursor::Finite {
                    state: target.to_string(),
                    input: input.clone(),
                    consumed: if consumes { consumed + 1 } else { *consumed },
                }
            }
            (_, Peek::Configuration(configuration)) => {
                if configuration.state != target {
                    return Err(AutomatonError::UnreachableTarget(target.to_string()));
                }
                Cursor::Tape(configuration)
            }
            (Cursor::Tape(_), _) => {
                return Err(AutomatonError::UnreachableTarget(target.to_string()));
            }
        };

        self.advance(next)
    }

    /// Steps until the machine halts.
    ///
    /// A finite automaton that gets stuck on an undefined move is reported as rejected. The core
    /// never bounds execution on its own, so the caller provides `max_steps`.
    ///
    /// # Returns
    ///
    /// * `Ok(Status::Accepted | Status::Rejected)` once the machine halts.
    /// * `Err(AutomatonError::StepLimit)` if it is still running after `max_steps` steps.
    /// * `Err(AutomatonError::ChoiceRequired)` if a nondeterministic step needs a choice.
    pub fn run(&mut self, max_steps: usize) -> Result<Status, AutomatonError> {
        for _ in 0..max_steps {
            let status = self.status();
            if status.is_halted() {
                return Ok(status);
            }

            match self.step() {
                Ok(_) => {}
                Err(AutomatonError::NoTransition { state, label })
                    if self.automaton.kind() != Kind::Tm =>
                {
                    debug!(%state, %label, "stuck on an undefined move, rejecting");
                    return Ok(Status::Rejected);
                }
                Err(e) => return Err(e),
            }
        }

        let status = self.status();
        if status.is_halted() {
            Ok(status)
        } else {
            Err(AutomatonError::StepLimit(max_steps))
        }
    }

    /// Commits a new cursor, moving the projection's current flag first.
    fn advance(&mut self, next: Cursor) -> Result<Position, AutomatonError> {
        self.flag(Some(next.state().clone()))?;

        self.cursor = next;
        self.step_count += 1;
        trace!(step = self.step_count, state = %self.state(), "step");

        let status = self.status();
        if status.is_halted() {
            debug!(state = %self.state(), steps = self.step_count, %status, "halted");
        }

        Ok(self.cursor.position())
    }

    /// Moves the current flag of the attached projection to `state`, or clears it.
    ///
    /// The new flag is set before the old one is cleared, so a failed command leaves the
    /// projection as it was.
    fn flag(&mut self, state: Option<State>) -> Result<(), AutomatonError> {
        let Some(projection) = self.projection.as_mut() else {
            self.flagged = None;
            return Ok(());
        };

        if let Some(new) = &state {
            projection.set_current(new)?;
        }
        if let Some(old) = self.flagged.as_ref().filter(|old| Some(*old) != state.as_ref()) {
            if let Err(e) = projection.clear_current(old) {
                if let Some(new) = &state {
                    let _ = projection.clear_current(new);
                }
                return Err(e);
            }
        }

        self.flagged = state;
        Ok(())
    }

    /// Attaches a projection whose current flag will follow the cursor.
    ///
    /// If the machine has already moved, the flag is set right away. A previously attached
    /// projection is returned.
    pub fn attach(
        &mut self,
        projection: Box<dyn Projection>,
    ) -> Result<Option<Box<dyn Projection>>, AutomatonError> {
        let previous = self.detach()?;
        self.projection = Some(projection);
        if self.step_count > 0 {
            self.flag(Some(self.state().to_string()))?;
        }
        Ok(previous)
    }

    /// Clears the current flag and hands the projection back.
    pub fn detach(&mut self) -> Result<Option<Box<dyn Projection>>, AutomatonError> {
        self.flag(None)?;
        Ok(self.projection.take())
    }

    /// Puts the machine back at the initial state with its original input.
    pub fn reset(&mut self) -> Result<(), AutomatonError> {
        self.flag(None)?;
        self.cursor = Self::initial_cursor(&self.automaton, &self.input);
        self.step_count = 0;
        Ok(())
    }

    /// Returns where the execution stands.
    ///
    /// A deterministic automaton halts once its input is exhausted, a nondeterministic one once
    /// its input is exhausted and no epsilon move remains, and a tape machine once no move is
    /// defined for its state and the symbol under the head.
    pub fn status(&self) -> Status {
        if self.is_halted() {
            if self.automaton.is_final(self.state()) {
                Status::Accepted
            } else {
                Status::Rejected
            }
        } else if self.step_count == 0 {
            Status::Ready
        } else {
            Status::Stepping
        }
    }

    pub fn is_halted(&self) -> bool {
        match (&self.cursor, self.automaton.kind()) {
            (Cursor::Finite { .. }, Kind::Nfa) => {
                self.next_symbol().is_none()
                    && self
                        .automaton
                        .targets(self.state(), Label::Epsilon)
                        .is_empty()
            }
            (Cursor::Finite { .. }, _) => self.next_symbol().is_none(),
            (Cursor::Tape(configuration), _) => self
                .automaton
                .action(&configuration.state, configuration.tape.read())
                .is_none(),
        }
    }

    pub fn automaton(&self) -> &Arc<Automaton> {
        &self.automaton
    }

    pub fn state(&self) -> &str {
        self.cursor.state()
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Returns the input consumed so far. Always empty for tape machines.
    pub fn consumed(&self) -> String {
        match &self.cursor {
            Cursor::Finite {
                input, consumed, ..
            } => input[..*consumed].iter().collect(),
            Cursor::Tape(_) => String::new(),
        }
    }

    /// Returns the input not consumed yet. Always empty for tape machines.
    pub fn remaining(&self) -> String {
        match &self.cursor {
            Cursor::Finite {
                input, consumed, ..
            } => input[*consumed..].iter().collect(),
            Cursor::Tape(_) => String::new(),
        }
    }

    pub fn tape(&self) -> Option<&Tape> {
        match &self.cursor {
            Cursor::Tape(configuration) => Some(&configuration.tape),
            Cursor::Finite { .. } => None,
        }
    }

    pub fn blank(&self) -> Symbol {
        self.automaton.blank().unwrap_or(DEFAULT_BLANK_SYMBOL)
    }

    fn next_symbol(&self) -> Option<Symbol> {
        match &self.cursor {
            Cursor::Finite {
                input, consumed, ..
            } => input.get(*consumed).copied(),
            Cursor::Tape(configuration) => Some(configuration.tape.read()),
        }
    }

    fn nfa_targets(&self, label: Label) -> Result<HashSet<State>, AutomatonError> {
        let targets = self.automaton.targets(self.state(), label);
        if targets.is_empty() {
            return Err(self.no_transition(label));
        }
        Ok(targets.into_iter().collect())
    }

    /// The union of the moves on the next input symbol and the epsilon moves.
    fn nfa_candidates(&self) -> Result<HashSet<State>, AutomatonError> {
        let epsilon = self.automaton.targets(self.state(), Label::Epsilon);
        let Some(symbol) = self.next_symbol() else {
            if epsilon.is_empty() {
                return Err(AutomatonError::EmptyInput);
            }
            return Ok(epsilon.into_iter().collect());
        };

        let mut targets = self.automaton.targets(self.state(), Label::Symbol(symbol));
        targets.extend(epsilon);
        if targets.is_empty() {
            return Err(self.no_transition(Label::Symbol(symbol)));
        }
        Ok(targets.into_iter().collect())
    }

    /// Applies the tape machine move for `read` to a copy of `configuration`.
    fn apply_action(
        &self,
        configuration: &Configuration,
        read: Symbol,
    ) -> Result<Configuration, AutomatonError> {
        let action = self
            .automaton
            .action(&configuration.state, read)
            .ok_or_else(|| self.no_transition(Label::Symbol(read)))?;

        let mut tape = configuration.tape.clone();
        tape.write(action.write);
        tape.shift(action.direction);

        Ok(Configuration {
            state: action.next_state.clone(),
            tape,
        })
    }

    fn no_transition(&self, label: Label) -> AutomatonError {
        AutomatonError::NoTransition {
            state: self.state().to_string(),
            label,
        }
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("kind", &self.automaton.kind())
            .field("cursor", &self.cursor)
            .field("step_count", &self.step_count)
            .field("attached", &self.projection.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::tests::{epsilon_nfa, odd_ones_dfa, set, states, zero_scanner_tm};
    use crate::automaton::{DeterministicTable, NondeterministicTable};
    use crate::graph::{to_graph, AnnotatedGraph};
    use std::cell::RefCell;
    use std::collections::{BTreeMap, BTreeSet};
    use std::rc::Rc;

    fn machine(automaton: Automaton, input: &str) -> Machine {
        Machine::new(Arc::new(automaton), input)
    }

    fn targets(names: &[&str]) -> Peek {
        Peek::Targets(names.iter().map(|name| name.to_string()).collect())
    }

    #[test_log::test]
    fn test_dfa_accepts() {
        let mut machine = machine(odd_ones_dfa(), "01");
        assert_eq!(machine.status(), Status::Ready);

        assert_eq!(machine.step(), Ok(Position::State("q0".to_string())));
        assert_eq!(machine.status(), Status::Stepping);
        assert_eq!(machine.consumed(), "0");
        assert_eq!(machine.remaining(), "1");

        assert_eq!(machine.step(), Ok(Position::State("q1".to_string())));
        assert_eq!(machine.status(), Status::Accepted);
        assert_eq!(machine.step_count(), 2);
    }

    #[test]
    fn test_dfa_rejects() {
        let mut machine = machine(odd_ones_dfa(), "00");

        assert_eq!(machine.run(10), Ok(Status::Rejected));
        assert_eq!(machine.state(), "q0");
    }

    #[test]
    fn test_dfa_empty_input() {
        let mut machine = machine(odd_ones_dfa(), "1");
        machine.step().unwrap();

        assert_eq!(machine.peek(None), Err(AutomatonError::EmptyInput));
        assert_eq!(machine.step(), Err(AutomatonError::EmptyInput));
        assert_eq!(machine.state(), "q1");
    }

    #[test]
    fn test_dfa_peek_override() {
        let machine = machine(odd_ones_dfa(), "0");

        assert_eq!(
            machine.peek(Some(Label::Symbol('1'))),
            Ok(Peek::Target("q1".to_string()))
        );
        assert_eq!(machine.peek(None), Ok(Peek::Target("q0".to_string())));
        assert_eq!(machine.step_count(), 0);
    }

    #[test]
    fn test_total_dfa_never_lacks_a_move() {
        let dfa = Arc::new(odd_ones_dfa());
        for input in ["", "0", "1", "0110", "1010101", "111000"] {
            let mut machine = Machine::new(Arc::clone(&dfa), input);
            for _ in 0..input.len() {
                assert!(machine.step().is_ok(), "input {input:?}");
            }
            assert_eq!(machine.step(), Err(AutomatonError::EmptyInput));
            assert_eq!(
                machine.status() == Status::Accepted,
                dfa.accepts(input) == Some(true)
            );
        }
    }

    #[test]
    fn test_partial_dfa_no_transition() {
        let mut table = DeterministicTable::new();
        table.insert("a".to_string(), BTreeMap::from([('x', "b".to_string())]));
        let dfa = Automaton::new(
            states(&["a", "b"]),
            set(&['x']),
            crate::automaton::Transitions::Deterministic {
                table,
                allow_partial: true,
            },
            "a",
            states(&["b"]),
        )
        .unwrap();

        let mut machine = machine(dfa, "xx");
        machine.step().unwrap();
        assert_eq!(
            machine.step(),
            Err(AutomatonError::NoTransition {
                state: "b".to_string(),
                label: Label::Symbol('x'),
            })
        );
        assert_eq!(machine.remaining(), "x");
        assert_eq!(machine.run(10), Ok(Status::Rejected));
    }

    #[test]
    fn test_nfa_epsilon_peek_and_choice() {
        let mut machine = machine(epsilon_nfa(), "b");

        assert_eq!(machine.peek(Some(Label::Epsilon)), Ok(targets(&["q1"])));
        assert_eq!(
            machine.step_to("q2"),
            Err(AutomatonError::UnreachableTarget("q2".to_string()))
        );
        assert_eq!(machine.state(), "q0");

        // Epsilon moves keep the input.
        assert_eq!(machine.step_to("q1"), Ok(Position::State("q1".to_string())));
        assert_eq!(machine.remaining(), "b");

        assert_eq!(machine.step_to("q2"), Ok(Position::State("q2".to_string())));
        assert_eq!(machine.status(), Status::Accepted);
    }

    #[test]
    fn test_nfa_step_requires_choice() {
        let mut machine = machine(epsilon_nfa(), "a");

        assert_eq!(machine.peek(None), Ok(targets(&["q0", "q1"])));
        assert_eq!(
            machine.step(),
            Err(AutomatonError::ChoiceRequired(vec![
                "q0".to_string(),
                "q1".to_string()
            ]))
        );

        // Both the symbol move and the epsilon move reach q1; the symbol move wins.
        machine.step_to("q1").unwrap();
        assert_eq!(machine.consumed(), "a");
        assert_eq!(machine.status(), Status::Rejected);
    }

    #[test_log::test]
    fn test_nfa_epsilon_move_before_symbol() {
        let mut table = NondeterministicTable::new();
        table.insert(
            "q0".to_string(),
            BTreeMap::from([
                (Label::Symbol('a'), states(&["q1"])),
                (Label::Epsilon, states(&["q1"])),
            ]),
        );
        table.insert(
            "q1".to_string(),
            BTreeMap::from([(Label::Symbol('a'), states(&["q2"]))]),
        );
        let nfa = Automaton::new(
            states(&["q0", "q1", "q2"]),
            set(&['a']),
            crate::automaton::Transitions::Nondeterministic(table),
            "q0",
            states(&["q2"]),
        )
        .unwrap();
        assert_eq!(nfa.accepts("a"), Some(true));

        let mut machine = machine(nfa, "a");
        assert_eq!(
            machine.step_via(Label::Symbol('b'), "q1"),
            Err(AutomatonError::UnreachableTarget("q1".to_string()))
        );
        assert_eq!(
            machine.step_via(Label::Epsilon, "q2"),
            Err(AutomatonError::UnreachableTarget("q2".to_string()))
        );
        assert_eq!(machine.step_count(), 0);

        assert_eq!(
            machine.step_via(Label::Epsilon, "q1"),
            Ok(Position::State("q1".to_string()))
        );
        assert_eq!(machine.remaining(), "a");

        assert_eq!(
            machine.step_via(Label::Symbol('a'), "q2"),
            Ok(Position::State("q2".to_string()))
        );
        assert_eq!(machine.status(), Status::Accepted);
        assert_eq!(
            machine.step_via(Label::Symbol('a'), "q2"),
            Err(AutomatonError::EmptyInput)
        );
    }

    #[test]
    fn test_dfa_step_via() {
        let mut machine = machine(odd_ones_dfa(), "1");

        assert!(matches!(
            machine.step_via(Label::Epsilon, "q0"),
            Err(AutomatonError::NoTransition { .. })
        ));
        assert_eq!(
            machine.step_via(Label::Symbol('1'), "q0"),
            Err(AutomatonError::UnreachableTarget("q0".to_string()))
        );
        assert_eq!(
            machine.step_via(Label::Symbol('1'), "q1"),
            Ok(Position::State("q1".to_string()))
        );
        assert_eq!(machine.status(), Status::Accepted);
    }

    #[test]
    fn test_nfa_single_candidate_steps() {
        let mut machine = machine(epsilon_nfa(), "");

        assert_eq!(machine.status(), Status::Ready);
        assert_eq!(machine.step(), Ok(Position::State("q1".to_string())));
        assert_eq!(machine.status(), Status::Rejected);
        assert_eq!(machine.step(), Err(AutomatonError::EmptyInput));
    }

    #[test]
    fn test_nfa_without_moves() {
        let mut table = NondeterministicTable::new();
        table.insert(
            "q0".to_string(),
            BTreeMap::from([(Label::Symbol('a'), states(&["q0"]))]),
        );
        let nfa = Automaton::new(
            states(&["q0"]),
            set(&['a', 'b']),
            crate::automaton::Transitions::Nondeterministic(table),
            "q0",
            states(&["q0"]),
        )
        .unwrap();

        let mut machine = machine(nfa, "ab");
        assert_eq!(machine.run(10), Ok(Status::Rejected));
        assert_eq!(machine.remaining(), "b");
    }

    #[test_log::test]
    fn test_tape_machine_extends_and_halts() {
        let mut machine = machine(zero_scanner_tm(), "000");

        for expected in 1..=3 {
            let position = machine.step().unwrap();
            let Position::Configuration(configuration) = position else {
                panic!("expected a configuration");
            };
            assert_eq!(configuration.tape.head(), expected);
        }

        let tape = machine.tape().unwrap();
        assert_eq!(tape.read(), '_');
        assert_eq!(tape.cells(), vec!['0', '0', '0', '_']);
        assert_eq!(machine.status(), Status::Accepted);
        assert_eq!(
            machine.step(),
            Err(AutomatonError::NoTransition {
                state: "q0".to_string(),
                label: Label::Symbol('_'),
            })
        );
    }

    #[test]
    fn test_tape_machine_peek_does_not_move() {
        let mut machine = machine(zero_scanner_tm(), "0");

        let Ok(Peek::Configuration(next)) = machine.peek(None) else {
            panic!("expected a configuration");
        };
        assert_eq!(next.tape.head(), 1);
        assert_eq!(machine.tape().unwrap().head(), 0);
        assert_eq!(machine.step_to("q9"), Err(AutomatonError::UnreachableTarget("q9".to_string())));
    }

    #[test]
    fn test_tape_machine_step_limit() {
        let mut table = crate::automaton::TapeTable::new();
        table.insert(
            "loop".to_string(),
            BTreeMap::from([(
                '_',
                crate::types::TapeAction::new("loop", '_', crate::types::Direction::Right),
            )]),
        );
        let tm = Automaton::new(
            states(&["loop"]),
            set(&['1']),
            crate::automaton::Transitions::TapeMachine {
                table,
                tape_symbols: set(&['1']),
                blank: '_',
            },
            "loop",
            BTreeSet::new(),
        )
        .unwrap();

        let mut machine = machine(tm, "");
        assert_eq!(machine.run(50), Err(AutomatonError::StepLimit(50)));
        assert_eq!(machine.step_count(), 50);
    }

    #[test]
    fn test_reset() {
        let mut machine = machine(odd_ones_dfa(), "11");
        machine.run(10).unwrap();

        machine.reset().unwrap();
        assert_eq!(machine.state(), "q0");
        assert_eq!(machine.remaining(), "11");
        assert_eq!(machine.status(), Status::Ready);
    }

    #[test_log::test]
    fn test_projection_tracks_cursor() {
        let dfa = odd_ones_dfa();
        let graph = Rc::new(RefCell::new(to_graph(&dfa)));
        let mut machine = machine(dfa, "110");
        machine.attach(Box::new(Rc::clone(&graph))).unwrap();

        assert!(graph.borrow().current().is_empty());
        for _ in 0..3 {
            let position = machine.step().unwrap();
            assert_eq!(graph.borrow().current(), vec![position.state()]);
        }

        // Failed steps leave the flag where it was.
        assert!(machine.step().is_err());
        assert_eq!(graph.borrow().current(), vec!["q0"]);

        assert!(machine.detach().unwrap().is_some());
        assert!(graph.borrow().current().is_empty());
    }

    #[test]
    fn test_projection_self_loop_keeps_flag() {
        let tm = zero_scanner_tm();
        let graph = Rc::new(RefCell::new(to_graph(&tm)));
        let mut machine = machine(tm, "00");
        machine.attach(Box::new(Rc::clone(&graph))).unwrap();

        machine.run(10).unwrap();
        assert_eq!(graph.borrow().current(), vec!["q0"]);
    }

    #[test]
    fn test_attach_after_stepping() {
        let dfa = odd_ones_dfa();
        let mut machine = machine(dfa.clone(), "1");
        machine.step().unwrap();

        machine.attach(Box::new(to_graph(&dfa))).unwrap();
        let projection = machine.detach().unwrap();
        assert!(projection.is_some());
    }

    #[test]
    fn test_projection_unknown_state() {
        let dfa = odd_ones_dfa();
        let empty = AnnotatedGraph {
            vertices: Vec::new(),
            ..to_graph(&dfa)
        };
        let mut machine = machine(dfa, "1");
        machine.attach(Box::new(empty)).unwrap();

        assert_eq!(
            machine.step(),
            Err(AutomatonError::UnknownState("q1".to_string()))
        );
        assert_eq!(machine.state(), "q0");
    }

    #[test]
    fn test_projection_missing_target_keeps_flag() {
        let dfa = odd_ones_dfa();
        let mut graph = to_graph(&dfa);
        graph.vertices.retain(|vertex| vertex.state != "q1");
        let graph = Rc::new(RefCell::new(graph));
        let mut machine = machine(dfa, "01");
        machine.attach(Box::new(Rc::clone(&graph))).unwrap();

        machine.step().unwrap();
        assert_eq!(graph.borrow().current(), vec!["q0"]);

        assert_eq!(
            machine.step(),
            Err(AutomatonError::UnknownState("q1".to_string()))
        );
        assert_eq!(machine.state(), "q0");
        assert_eq!(machine.remaining(), "1");
        assert_eq!(graph.borrow().current(), vec!["q0"]);
    }

    #[test]
    fn test_machines_share_an_automaton() {
        let dfa = Arc::new(odd_ones_dfa());
        let mut first = Machine::new(Arc::clone(&dfa), "1");
        let second = Machine::new(Arc::clone(&dfa), "1");

        first.step().unwrap();
        assert_eq!(first.state(), "q1");
        assert_eq!(second.state(), "q0");
        assert_eq!(Arc::strong_count(&dfa), 3);
    }
}

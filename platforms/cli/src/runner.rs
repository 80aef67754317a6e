//! Drives an automaton over one input and reports the verdict.

use crate::error::CliError;
use fsmstep::{Automaton, AutomatonError, Kind, Machine, Status};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::info;

/// The result of running an automaton on one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: Status,
    /// Steps taken by the engine. Nondeterministic automata are decided by subset simulation and
    /// report none.
    pub steps: Option<usize>,
    /// Final tape contents of a tape machine.
    pub tape: Option<String>,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        if let Some(steps) = self.steps {
            write!(f, " after {steps} steps")?;
        }
        if let Some(tape) = &self.tape {
            write!(f, ", tape: {tape}")?;
        }
        Ok(())
    }
}

/// Runs `automaton` on `input`.
///
/// Deterministic automata and tape machines are stepped by a `Machine` for at most `limit`
/// steps. When `trace` is given, every configuration is written to it. Nondeterministic
/// automata are decided in one go.
pub fn execute(
    automaton: Arc<Automaton>,
    input: &str,
    limit: usize,
    trace: Option<&mut dyn Write>,
) -> Result<Outcome, CliError> {
    if automaton.kind() == Kind::Nfa {
        let accepted = automaton.accepts(input).unwrap_or(false);
        return Ok(Outcome {
            status: if accepted {
                Status::Accepted
            } else {
                Status::Rejected
            },
            steps: None,
            tape: None,
        });
    }

    let mut machine = Machine::new(automaton, input);
    let status = match trace {
        None => machine.run(limit)?,
        Some(out) => run_traced(&mut machine, limit, out)?,
    };
    info!(%status, steps = machine.step_count(), "run finished");

    Ok(Outcome {
        status,
        steps: Some(machine.step_count()),
        tape: machine.tape().map(|tape| tape.contents()),
    })
}

fn run_traced(
    machine: &mut Machine,
    limit: usize,
    out: &mut dyn Write,
) -> Result<Status, CliError> {
    print_state(machine, out)?;

    let mut status = machine.status();
    while !status.is_halted() {
        if machine.step_count() >= limit {
            return Err(AutomatonError::StepLimit(limit).into());
        }

        match machine.step() {
            Ok(_) => {
                print_state(machine, out)?;
                status = machine.status();
            }
            Err(e @ AutomatonError::NoTransition { .. }) => {
                writeln!(out, "{e}")?;
                status = Status::Rejected;
            }
            Err(e) => return Err(e.into()),
        }
    }

    writeln!(out, "\nMachine halted.")?;
    Ok(status)
}

fn print_state(machine: &Machine, out: &mut dyn Write) -> Result<(), CliError> {
    match machine.tape() {
        Some(tape) => writeln!(
            out,
            "Step: {}, State: {}, Tape: {}, Head: {}",
            machine.step_count(),
            machine.state(),
            tape,
            tape.head()
        )?,
        None => writeln!(
            out,
            "Step: {}, State: {}, Consumed: {:?}, Remaining: {:?}",
            machine.step_count(),
            machine.state(),
            machine.consumed(),
            machine.remaining()
        )?,
    }
    Ok(())
}

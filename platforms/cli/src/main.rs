mod error;
mod loader;
mod runner;
mod script;

use clap::Parser;
use error::CliError;
use fsmstep::{to_graph, SampleCatalog, MAX_EXECUTION_STEPS};
use loader::{AutomatonLoader, Loaded};
use script::Interpreter;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{trace, warn};
use tracing_subscriber::{filter::LevelFilter, prelude::*};

#[derive(Parser)]
#[clap(author, version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// The automaton record (or a directory of records) to execute
    #[clap(short, long, conflicts_with = "sample")]
    automaton: Option<PathBuf>,

    /// The name of an embedded sample to execute
    #[clap(short, long)]
    sample: Option<String>,

    /// The input string, overriding the one carried by the record
    #[clap(short, long)]
    input: Option<String>,

    /// The maximum number of steps before giving up
    #[clap(short, long, default_value_t = MAX_EXECUTION_STEPS)]
    limit: usize,

    /// Print each step of the execution
    #[clap(short = 'd', long)]
    debug: bool,

    /// Print the graph projection as JSON instead of running
    #[clap(short, long)]
    graph: bool,

    /// Run a script of LOAD, RUN and GRAPH commands
    #[clap(long, conflicts_with_all = ["automaton", "sample"])]
    script: Option<PathBuf>,

    /// List the embedded samples
    #[clap(long)]
    list: bool,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(level),
        )
        .init();

    trace!("setup {level} logging");
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match run(&cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, out: &mut dyn Write) -> Result<(), CliError> {
    if cli.list {
        for sample in SampleCatalog::names().into_iter().filter_map(SampleCatalog::get) {
            writeln!(
                out,
                "{:<20} {:<4} {}",
                sample.name,
                sample.kind(),
                sample.description
            )?;
        }
    }

    if let Some(path) = &cli.script {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::FileError(format!("Failed to read file {}: {}", path.display(), e))
        })?;
        let base = path.parent().unwrap_or(Path::new("."));
        return Interpreter::new(base, cli.limit).run_script(&content, out);
    }

    if let Some(name) = &cli.sample {
        let sample =
            SampleCatalog::get(name).ok_or_else(|| CliError::UnknownSample(name.clone()))?;
        let loaded = Loaded {
            automaton: sample.automaton.clone(),
            input: sample.input.clone(),
        };
        return report(cli, &loaded, out);
    }

    if let Some(path) = &cli.automaton {
        if path.is_dir() {
            for result in AutomatonLoader::load_dir(path) {
                match result {
                    Ok((path, loaded)) => {
                        write!(out, "{}: ", path.display())?;
                        report(cli, &loaded, out)?;
                    }
                    Err(e) => warn!(error = %e, "skipping record"),
                }
            }
            return Ok(());
        }

        let loaded = AutomatonLoader::load(path)?;
        return report(cli, &loaded, out);
    }

    Ok(())
}

/// Prints the graph projection, or runs the automaton and prints its verdict.
fn report(cli: &Cli, loaded: &Loaded, out: &mut dyn Write) -> Result<(), CliError> {
    let automaton = &loaded.automaton;

    let unreachable = automaton.unreachable_states();
    if !unreachable.is_empty() {
        warn!(states = ?unreachable, "automaton has unreachable states");
    }

    if cli.graph {
        let json = serde_json::to_string_pretty(&to_graph(automaton))
            .map_err(|e| CliError::OutputError(e.to_string()))?;
        writeln!(out, "{json}")?;
        return Ok(());
    }

    let input = cli.input.as_deref().unwrap_or(&loaded.input);
    let trace: Option<&mut dyn Write> = if cli.debug { Some(&mut *out) } else { None };
    let outcome = runner::execute(automaton.clone(), input, cli.limit, trace)?;
    writeln!(out, "{input:?}: {outcome}")?;

    Ok(())
}

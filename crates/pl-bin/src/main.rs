//! Pipelens entrypoint: load a program and a processor description, run the
//! requested analysis, print the report on stdout. Logs go to stderr behind
//! `RUST_LOG` so report output stays pipeable.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use core_processor::Processor;
use core_program::Program;
use core_sched::{Execution, Scheduler};
use std::path::{Path, PathBuf};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "pipelens", version, about = "Loop performance analyzer for out-of-order pipelines")]
struct Args {
    /// Program description (JSON).
    #[arg(long)]
    program: PathBuf,
    /// Processor description (JSON).
    #[arg(long)]
    processor: PathBuf,
    /// Loop iterations to simulate.
    #[arg(short, long, default_value_t = 100)]
    iterations: usize,
    /// Reorder-window (ROB) capacity.
    #[arg(short, long, default_value_t = 100)]
    window: usize,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Instruction listing with resolved latencies and ports.
    Code,
    /// Data-dependence listing and symbol tables.
    Deps,
    /// Processor description dump.
    Processor,
    /// Static performance analysis (latency/throughput bounds).
    Static {
        #[arg(long)]
        json: bool,
    },
    /// Cycle-accurate simulation and dynamic performance report.
    Run {
        #[arg(long)]
        json: bool,
    },
    /// Cycle-by-cycle execution timeline (short runs stay readable).
    Timeline {
        /// Iterations to render; overrides --iterations for this view.
        #[arg(short = 'n', long, default_value_t = 3)]
        render: usize,
    },
    /// Graphviz export of the dependence graph.
    Dot {
        /// Include non-recurrent instructions and edges.
        #[arg(long)]
        internal: bool,
        /// Iteration clusters to draw (at least the longest recurrence).
        #[arg(short = 'n', long, default_value_t = 1)]
        render: usize,
    },
}

/// Owns the loaded program and processor; every command handler works
/// through it.
struct Session {
    program: Program,
    processor: Processor,
}

impl Session {
    fn open(program_path: &Path, processor_path: &Path) -> Result<Self> {
        let program_text = std::fs::read_to_string(program_path)
            .with_context(|| format!("reading program {}", program_path.display()))?;
        let program = Program::from_json(&program_text)
            .with_context(|| format!("loading program {}", program_path.display()))?;

        let processor_text = std::fs::read_to_string(processor_path)
            .with_context(|| format!("reading processor {}", processor_path.display()))?;
        let processor = Processor::from_json(&processor_text)
            .with_context(|| format!("loading processor {}", processor_path.display()))?;

        tracing::info!(
            program = %program.name,
            processor = %processor.name,
            "session ready"
        );
        Ok(Session { program, processor })
    }

    fn simulate(&mut self, iterations: usize, window: usize) -> Result<Execution> {
        let Session { program, processor } = self;
        let scheduler = Scheduler::load(program, processor, iterations, window)
            .context("configuring the scheduler")?;
        scheduler.run().context("running the simulation")
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut session = Session::open(&args.program, &args.processor)?;

    match args.command {
        Command::Code => {
            print!(
                "{}",
                core_report::program_listing(&session.program, &session.processor)
            );
        }
        Command::Deps => {
            print!("{}", core_report::dependence_listing(&session.program));
        }
        Command::Processor => {
            println!("{}", session.processor.to_json());
        }
        Command::Static { json } => {
            let analysis = core_analysis::analyze(&session.program, &session.processor);
            if json {
                println!(
                    "{}",
                    core_report::static_report_json(&analysis, &session.processor)
                );
            } else {
                print!("{}", core_report::static_report(&analysis, &session.processor));
            }
        }
        Command::Run { json } => {
            let execution = session.simulate(args.iterations, args.window)?;
            if json {
                println!(
                    "{}",
                    core_report::dynamic_report_json(
                        &session.program,
                        &session.processor,
                        &execution
                    )
                );
            } else {
                print!(
                    "{}",
                    core_report::dynamic_report(&session.program, &session.processor, &execution)
                );
            }
        }
        Command::Timeline { render } => {
            let execution = session.simulate(render, args.window)?;
            print!(
                "{}",
                core_report::timeline(&session.program, &session.processor, &execution)
            );
        }
        Command::Dot { internal, render } => {
            let analysis = core_analysis::analyze(&session.program, &session.processor);
            print!(
                "{}",
                core_report::graphviz(&session.program, &analysis, render, internal)
            );
        }
    }
    Ok(())
}

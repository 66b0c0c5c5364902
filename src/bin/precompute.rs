use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};

use decathlon::env_config::{init_base_path, init_rayon_threads, init_tracing};
use decathlon::error::Result;
use decathlon::long_jump::JumpSolver;
use decathlon::sprint::SprintSolver;
use decathlon::state_computation::{solve_jump_all, solve_sprint_layers};
use decathlon::storage::{save_jump_policy, save_sprint_policy};
use decathlon::types::SolverConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Event {
    Sprint,
    LongJump,
    All,
}

/// Solve dice decathlon events and write their policy files.
#[derive(Debug, Parser)]
#[command(name = "decathlon-precompute", version)]
struct Args {
    /// Event to solve.
    #[arg(long, value_enum, default_value_t = Event::All)]
    event: Event,

    /// Directory for the policy files.
    #[arg(long, env = "DECATHLON_OUTPUT_DIR", default_value = "data")]
    output_dir: PathBuf,

    /// Rayon threads (falls back to RAYON_NUM_THREADS, then 8).
    #[arg(long)]
    threads: Option<usize>,

    /// EV differences below this are ties.
    #[arg(long, default_value_t = SolverConfig::default().tie_epsilon)]
    tie_epsilon: f64,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

fn run(args: &Args) -> Result<()> {
    init_base_path()?;
    init_rayon_threads(args.threads);
    let config = SolverConfig {
        tie_epsilon: args.tie_epsilon,
    };

    if matches!(args.event, Event::Sprint | Event::All) {
        let mut solver = SprintSolver::new(config);
        solve_sprint_layers(&mut solver);
        let start = solver.start_moments();
        info!(ev = start.ev, sd = start.sd(), "sprint optimal value");
        save_sprint_policy(&mut solver, args.output_dir.join("sprint_policy.bin"))?;
    }

    if matches!(args.event, Event::LongJump | Event::All) {
        let mut solver = JumpSolver::new(config);
        solve_jump_all(&mut solver);
        let attempt = solver.attempt_moments();
        info!(ev = attempt.ev, sd = attempt.sd(), "long jump attempt value");
        save_jump_policy(&mut solver, args.output_dir.join("long_jump_policy.bin"))?;
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_tracing(args.json_logs, Level::INFO);

    let t0 = Instant::now();
    if let Err(e) = run(&args) {
        error!(error = %e, "precompute failed");
        std::process::exit(1);
    }
    info!(secs = t0.elapsed().as_secs_f64(), "precompute finished");
}

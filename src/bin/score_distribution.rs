use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{error, info, Level};

use decathlon::density::{attempt_distribution, sprint_distribution, ScoreDistribution};
use decathlon::env_config::{init_base_path, init_tracing};
use decathlon::error::Result;
use decathlon::long_jump::JumpSolver;
use decathlon::sprint::SprintSolver;
use decathlon::types::SolverConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Event {
    Sprint,
    LongJump,
}

/// Exact final-score distribution of an event under the optimal policy.
#[derive(Debug, Parser)]
#[command(name = "decathlon-distribution", version)]
struct Args {
    #[arg(long, value_enum, default_value_t = Event::Sprint)]
    event: Event,

    /// Long jump attempts; the best one counts.
    #[arg(long, default_value_t = 3)]
    attempts: u32,

    /// Write the report as JSON to this path instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    json_logs: bool,
}

#[derive(Serialize)]
struct Report {
    event: &'static str,
    attempts: u32,
    distribution: ScoreDistribution,
    percentiles: Vec<(f64, i32)>,
}

const PERCENTILES: [f64; 9] = [0.01, 0.05, 0.10, 0.25, 0.50, 0.75, 0.90, 0.95, 0.99];

fn run(args: &Args) -> Result<()> {
    init_base_path()?;
    let config = SolverConfig::default();

    let (event, attempts, distribution) = match args.event {
        Event::Sprint => {
            let mut solver = SprintSolver::new(config);
            ("sprint", 1, sprint_distribution(&mut solver))
        }
        Event::LongJump => {
            let mut solver = JumpSolver::new(config);
            let single = attempt_distribution(&mut solver);
            ("long_jump", args.attempts, single.best_of(args.attempts))
        }
    };
    info!(event, attempts, mean = distribution.mean, std_dev = distribution.std_dev, "distribution computed");

    let percentiles = PERCENTILES
        .iter()
        .filter_map(|&p| distribution.quantile(p).map(|x| (p, x)))
        .collect();
    let report = Report {
        event,
        attempts,
        distribution,
        percentiles,
    };
    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_tracing(args.json_logs, Level::INFO);
    if let Err(e) = run(&args) {
        error!(error = %e, "score distribution failed");
        std::process::exit(1);
    }
}

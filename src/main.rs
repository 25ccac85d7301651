//! sop-colony - Command Line Interface
//!
//! Loads a Sequential Ordering Problem instance, runs the selected colony
//! variant for a number of rounds, and reports the result either as a text
//! summary or as one CSV row.

use std::fs::File;
use std::io::{BufReader, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::error;

use sop_colony::cli::{split_variant, Cli};
use sop_colony::error::CliError;
use sop_colony::orchestrator;
use sop_colony::params::{hash_seed, AntParams};
use sop_colony::problem::Problem;
use sop_colony::registry;
use sop_colony::report;

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if cli.list {
        let registry = registry::builtin();
        for name in registry.names() {
            println!("{name}");
        }
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let problem_path = cli
        .problem
        .clone()
        .ok_or_else(|| CliError::UnknownVariant("no problem file given, pass a path or --list".to_string()))?;

    let problem = load_problem(&problem_path)?;

    let registry = registry::builtin();
    let (variant_name, variant_args) = split_variant(&cli.colony);
    let mut engine = registry
        .make(variant_name)
        .ok_or_else(|| CliError::UnknownVariant(variant_name.to_string()))?;

    let params = AntParams {
        alpha: cli.alpha,
        beta: cli.beta,
        q: cli.q,
        rho: cli.rho,
        initial_pheromone: cli.initial_pheromone,
        min_pheromone: cli.min_pheromone,
        max_pheromone: cli.max_pheromone,
        zero_weight: cli.zero_weight,
        random_seed: hash_seed(&cli.seed),
        variant_args: variant_args.to_string(),
    };

    let progress = if std::io::stderr().is_terminal() {
        let bar = ProgressBar::new(cli.rounds as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} rounds")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(bar)
    } else {
        None
    };

    let run_result = orchestrator::run(engine.as_mut(), &problem, &params, cli.rounds)?;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    match &cli.output {
        Some(path) => {
            report::write_csv(path, cli.append, variant_name, &problem, cli.rounds, &run_result)?;
        }
        None => {
            print!("{}", report::human_report(variant_name, &problem, cli.rounds, &run_result));
        }
    }

    Ok(())
}

fn load_problem(path: &PathBuf) -> Result<Problem, CliError> {
    let file = File::open(path).map_err(|source| CliError::ProblemFile {
        path: path.display().to_string(),
        source,
    })?;
    let problem = Problem::parse(BufReader::new(file))?;
    Ok(problem)
}

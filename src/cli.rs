//! Command-line surface, built with `clap`'s derive API in the same style
//! the reference crate's `main.rs` uses for its subcommands — here flattened
//! to the single flat flag set the colony CLI actually needs.

use std::path::PathBuf;

use clap::Parser;

/// Solve a Sequential Ordering Problem instance with an ant-colony variant.
#[derive(Debug, Parser)]
#[command(name = "sop-colony", version, about)]
pub struct Cli {
    /// Path to the SOP instance file.
    pub problem: Option<PathBuf>,

    /// List every registered colony variant and exit.
    #[arg(short, long)]
    pub list: bool,

    /// Colony variant to run, optionally followed by `:args` forwarded
    /// opaquely to the variant.
    #[arg(short, long, default_value = "sequential")]
    pub colony: String,

    /// Number of advance/evaluate/update rounds to run.
    #[arg(short, long, default_value_t = 500)]
    pub rounds: usize,

    /// Seed phrase, hashed into the PRNG seed.
    #[arg(long, default_value = "thomas")]
    pub seed: String,

    /// Write a CSV row to this path instead of printing a text report.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Append to `--output` instead of overwriting it.
    #[arg(short, long)]
    pub append: bool,

    #[arg(long, default_value_t = 1.0)]
    pub alpha: f64,
    #[arg(long, default_value_t = 2.0)]
    pub beta: f64,
    #[arg(long, default_value_t = 1.0)]
    pub q: f64,
    #[arg(long, default_value_t = 0.1)]
    pub rho: f64,
    #[arg(long, default_value_t = 1.0)]
    pub initial_pheromone: f64,
    #[arg(long, default_value_t = 0.01)]
    pub min_pheromone: f64,
    #[arg(long, default_value_t = 10.0)]
    pub max_pheromone: f64,
    #[arg(long, default_value_t = 1.0)]
    pub zero_weight: f64,
}

/// Split a `name` or `name:args` variant identifier into its parts.
pub fn split_variant(spec: &str) -> (&str, &str) {
    match spec.split_once(':') {
        Some((name, args)) => (name, args),
        None => (spec, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_variant_separates_name_and_args() {
        assert_eq!(split_variant("gpu:workgroup=64"), ("gpu", "workgroup=64"));
    }

    #[test]
    fn split_variant_without_args_leaves_args_empty() {
        assert_eq!(split_variant("sequential"), ("sequential", ""));
    }
}

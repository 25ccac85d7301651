//! Typed error taxonomy shared across the CLI, problem loader and colony engines.
//!
//! Nothing in this crate panics on a malformed input or an unavailable GPU
//! adapter; every fallible path returns one of the variants below so the CLI
//! can report a clean message and exit non-zero instead of unwinding.

use thiserror::Error;

/// Errors raised while parsing command-line arguments or resolving a variant.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("unknown colony variant '{0}', use --list to see available variants")]
    UnknownVariant(String),

    #[error("failed to read problem file '{path}': {source}")]
    ProblemFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Problem(#[from] ProblemError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to write report to '{path}': {source}")]
    ReportWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write CSV row: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors raised while parsing an SOP instance file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProblemError {
    #[error("line {line}: expected {expected}, found '{found}'")]
    Malformed {
        line: usize,
        expected: &'static str,
        found: String,
    },

    #[error("EDGE_WEIGHT_SECTION declared size {declared} but row {row} has {actual} entries")]
    RowLengthMismatch {
        declared: usize,
        row: usize,
        actual: usize,
    },

    #[error("EDGE_WEIGHT_SECTION declared size {declared} but only {actual} rows were present")]
    RowCountMismatch { declared: usize, actual: usize },

    #[error("file contained no EDGE_WEIGHT_SECTION")]
    MissingEdgeWeightSection,

    #[error("token '{0}' is not a valid integer")]
    NotAnInteger(String),

    #[error("dependency relation is not acyclic")]
    CyclicDependency,
}

/// Errors raised while validating an [`crate::params::AntParams`] value.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("rho must lie in [0, 1], got {0}")]
    RhoOutOfRange(f64),

    #[error("min_pheromone ({min}) must be <= max_pheromone ({max})")]
    PheromoneBoundsInverted { min: f64, max: f64 },

    #[error("zero_weight must be strictly positive, got {0}")]
    NonPositiveZeroWeight(f64),

    #[error("q must be strictly positive, got {0}")]
    NonPositiveQ(f64),
}

/// Errors raised by a [`crate::engine::ColonyEngine`] during prepare/optimize.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("optimize() called before prepare()")]
    NotPrepared,

    #[error("no compute backend available for variant '{0}'")]
    BackendUnavailable(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("GPU backend error: {0}")]
    Gpu(String),
}

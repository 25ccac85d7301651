//! The colony stepping engine contract and its back-ends.
//!
//! Every variant implements [`ColonyEngine`]: `prepare` once, then
//! `optimize(rounds)` any number of times. Internals differ per back-end
//! (sequential, data-parallel CPU, GPU) but all three run the same
//! advance/evaluate/update cycle described in the design notes.

pub mod gpu;
pub mod parallel;
pub mod sequential;

use crate::error::EngineError;
use crate::params::AntParams;
use crate::problem::Problem;
use crate::profiler::Profiler;

/// Shared algorithmic contract every colony variant implements.
pub trait ColonyEngine {
    /// Allocate pheromone/visibility state and any back-end-specific
    /// buffers. Must be called exactly once before `optimize`.
    fn prepare(&mut self, problem: &Problem, params: &AntParams) -> Result<(), EngineError>;

    /// Run `rounds` full advance/evaluate/update cycles, recording
    /// `adva`/`eval`/`upda`/`opts` timings into `profiler` as it goes.
    /// Accumulates state across repeated calls; fails with
    /// [`EngineError::NotPrepared`] if called before `prepare`.
    fn optimize(&mut self, rounds: usize, profiler: &mut Profiler) -> Result<(), EngineError>;

    /// Best route length observed so far, `i32::MAX` if no feasible tour
    /// has ever been found. Monotonically non-increasing across rounds.
    fn best_route_length(&self) -> i32;

    /// Best route found so far, empty if none.
    fn best_route(&self) -> &[usize];
}

/// Per-round bookkeeping returned by the advance phase, consumed by
/// evaluate/update. Shared between the sequential and parallel back-ends
/// since both construct tours the same logical way.
#[derive(Debug, Clone)]
pub struct AntResult {
    pub route: Vec<usize>,
    pub route_length: i32,
}

impl AntResult {
    pub fn stuck() -> Self {
        AntResult {
            route: Vec::new(),
            route_length: i32::MAX,
        }
    }
}

/// Find the best (lowest route_length) ant, if any ant completed a feasible
/// tour this round. Shared evaluate-phase helper.
pub fn evaluate_best(results: &[AntResult]) -> Option<&AntResult> {
    results
        .iter()
        .filter(|r| r.route_length < i32::MAX)
        .min_by_key(|r| r.route_length)
}

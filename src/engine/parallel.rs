//! Data-parallel CPU colony engine.
//!
//! Same advance/evaluate/update cycle as [`crate::engine::sequential`], but
//! the per-ant tour construction is fanned out over a `rayon` thread pool —
//! the Rust-native equivalent of the reference's per-ant work-group GPU
//! layout, since every ant's construction is independent of every other
//! ant's. Each ant gets its own scratch eligibility state and its own
//! MINSTD0 stream so no cross-ant interference is possible.

use log::debug;
use rayon::prelude::*;

use crate::eligibility::CounterEligibility;
use crate::engine::{evaluate_best, AntResult, ColonyEngine};
use crate::error::EngineError;
use crate::matrix::SquareMatrix;
use crate::params::AntParams;
use crate::problem::Problem;
use crate::profiler::Profiler;
use crate::rng::Minstd0;

pub struct ParallelEngine {
    problem: Option<Problem>,
    params: Option<AntParams>,
    pheromone: SquareMatrix,
    visibility: SquareMatrix,
    prototype: Option<CounterEligibility>,
    host_rng: Minstd0,
    ant_rngs: Vec<Minstd0>,
    best_route: Vec<usize>,
    best_route_length: i32,
    prepared: bool,
}

impl Default for ParallelEngine {
    fn default() -> Self {
        ParallelEngine {
            problem: None,
            params: None,
            pheromone: SquareMatrix::filled(0, 0.0),
            visibility: SquareMatrix::filled(0, 0.0),
            prototype: None,
            host_rng: Minstd0::new(1),
            ant_rngs: Vec::new(),
            best_route: Vec::new(),
            best_route_length: i32::MAX,
            prepared: false,
        }
    }
}

impl ParallelEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn advance_ant(
        problem: &Problem,
        params: &AntParams,
        pheromone: &SquareMatrix,
        visibility: &SquareMatrix,
        prototype: &CounterEligibility,
        rng: &mut Minstd0,
    ) -> AntResult {
        let n = problem.size();
        let mut allowed = prototype.clone();
        let mut route = Vec::with_capacity(n);
        route.push(0);
        let mut current = 0usize;

        for _ in 0..n - 1 {
            let mut next_values = vec![0.0f64; n];
            let mut sum = 0.0f64;
            for v in 0..n {
                if allowed.is_eligible(v) {
                    let edge = pheromone.at(current, v).powf(params.alpha) * visibility.at(current, v);
                    next_values[v] = edge;
                    sum += edge;
                }
            }

            if sum <= 0.0 {
                return AntResult::stuck();
            }

            let mut draw = rng.next_f64() * sum;
            let mut chosen = None;
            for v in 0..n {
                if next_values[v] > 0.0 {
                    draw -= next_values[v];
                    if draw < 0.0 {
                        chosen = Some(v);
                        break;
                    }
                }
            }
            let chosen = match chosen {
                Some(v) => v,
                None => return AntResult::stuck(),
            };

            route.push(chosen);
            allowed.mark_visited(chosen);
            allowed.discharge(problem, chosen);
            current = chosen;
        }

        if current != n - 1 {
            return AntResult::stuck();
        }

        let route_length = problem.route_length(&route);
        AntResult {
            route,
            route_length,
        }
    }
}

impl ColonyEngine for ParallelEngine {
    fn prepare(&mut self, problem: &Problem, params: &AntParams) -> Result<(), EngineError> {
        params.validate()?;
        let n = problem.size();

        self.pheromone = SquareMatrix::filled(n, params.initial_pheromone);
        self.visibility = SquareMatrix::from_vec(n, problem.visibility(params.zero_weight, params.beta));
        self.prototype = Some(CounterEligibility::prototype(problem));

        self.host_rng = Minstd0::new(params.random_seed);
        self.ant_rngs = (0..n).map(|_| Minstd0::new(self.host_rng.fork())).collect();

        self.best_route = Vec::new();
        self.best_route_length = i32::MAX;
        self.problem = Some(problem.clone());
        self.params = Some(params.clone());
        self.prepared = true;
        Ok(())
    }

    fn optimize(&mut self, rounds: usize, profiler: &mut Profiler) -> Result<(), EngineError> {
        if !self.prepared {
            return Err(EngineError::NotPrepared);
        }
        let problem = self.problem.clone().expect("prepared implies problem set");
        let params = self.params.clone().expect("prepared implies params set");
        let prototype = self.prototype.clone().expect("prepared implies prototype set");

        for _round in 0..rounds {
            profiler.start("opts");

            profiler.start("adva");
            let results: Vec<AntResult> = self
                .ant_rngs
                .par_iter_mut()
                .map(|rng| {
                    Self::advance_ant(&problem, &params, &self.pheromone, &self.visibility, &prototype, rng)
                })
                .collect();
            profiler.stop("adva");

            let stuck = results.iter().filter(|r| r.route_length == i32::MAX).count();
            if stuck > 0 {
                debug!("{stuck} ant(s) stuck this round");
            }

            profiler.start("eval");
            let best = evaluate_best(&results).cloned();
            profiler.stop("eval");

            profiler.start("upda");
            for v in self.pheromone.as_mut_slice().iter_mut() {
                *v *= 1.0 - params.rho;
            }
            if let Some(best) = &best {
                if best.route_length < self.best_route_length {
                    self.best_route_length = best.route_length;
                    self.best_route = best.route.clone();
                }
                let spread = params.q / best.route_length as f64;
                self.pheromone.reinforce_route(&best.route, spread);
            }
            for v in self.pheromone.as_mut_slice().iter_mut() {
                *v = v.clamp(params.min_pheromone, params.max_pheromone);
            }
            profiler.stop("upda");

            profiler.stop("opts");
        }

        Ok(())
    }

    fn best_route_length(&self) -> i32 {
        self.best_route_length
    }

    fn best_route(&self) -> &[usize] {
        &self.best_route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn trivial_chain() -> Problem {
        let text = "EDGE_WEIGHT_SECTION\n3\n0 1 1000000\n1000000 0 1\n1000000 1000000 0\n";
        Problem::parse(Cursor::new(text)).unwrap()
    }

    #[test]
    fn matches_sequential_on_a_trivial_instance() {
        let problem = trivial_chain();
        let params = AntParams::default();
        let mut engine = ParallelEngine::new();
        let mut profiler = Profiler::new();
        engine.prepare(&problem, &params).unwrap();
        engine.optimize(3, &mut profiler).unwrap();
        assert_eq!(engine.best_route_length(), 2);
        assert_eq!(engine.best_route(), &[0, 1, 2]);
    }

    #[test]
    fn optimize_without_prepare_fails() {
        let mut engine = ParallelEngine::new();
        let mut profiler = Profiler::new();
        assert!(matches!(
            engine.optimize(1, &mut profiler),
            Err(EngineError::NotPrepared)
        ));
    }

    #[test]
    fn pheromone_stays_within_bounds_after_many_rounds() {
        let problem = trivial_chain();
        let mut params = AntParams::default();
        params.rho = 0.3;
        let mut engine = ParallelEngine::new();
        let mut profiler = Profiler::new();
        engine.prepare(&problem, &params).unwrap();
        engine.optimize(20, &mut profiler).unwrap();
        for v in engine.pheromone.as_slice() {
            assert!(*v >= params.min_pheromone && *v <= params.max_pheromone);
        }
    }
}

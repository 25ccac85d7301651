//! Sequential CPU colony engine.
//!
//! Direct port of the reference `sequential` variant's `prepare`/`optimize`/
//! `advance_ant` trio: one ant at a time, one candidate scan at a time, using
//! the MINSTD0 generator for weighted selection. This is the baseline every
//! other back-end is checked against.

use log::debug;

use crate::eligibility::CounterEligibility;
use crate::engine::{evaluate_best, AntResult, ColonyEngine};
use crate::error::EngineError;
use crate::matrix::SquareMatrix;
use crate::params::AntParams;
use crate::problem::Problem;
use crate::profiler::Profiler;
use crate::rng::Minstd0;

pub struct SequentialEngine {
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

impl Default for SequentialEngine {
    fn default() -> Self {
        SequentialEngine {
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

impl SequentialEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one ant's tour from node 0, returning its route and length, or
    /// a stuck result if some step had no eligible candidate.
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

impl ColonyEngine for SequentialEngine {
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
        let n = problem.size();

        for _round in 0..rounds {
            profiler.start("opts");

            profiler.start("adva");
            let mut results = Vec::with_capacity(n);
            for ant in 0..n {
                let result = Self::advance_ant(
                    &problem,
                    &params,
                    &self.pheromone,
                    &self.visibility,
                    &prototype,
                    &mut self.ant_rngs[ant],
                );
                results.push(result);
            }
            profiler.stop("adva");

            let stuck = results.iter().filter(|r| r.route_length == i32::MAX).count();
            if stuck > 0 {
                debug!("{stuck} ant(s) stuck this round");
            }

            profiler.start("eval");
            let best = evaluate_best(&results).cloned();
            profiler.stop("eval");

            profiler.start("upda");
            // Evaporate unconditionally, then reinforce along the best ant's
            // route if one completed a feasible tour, then clamp once.
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
        // S1: 0 -> 1 -> 2 is the only feasible tour.
        let text = "EDGE_WEIGHT_SECTION\n3\n0 1 1000000\n1000000 0 1\n1000000 1000000 0\n";
        Problem::parse(Cursor::new(text)).unwrap()
    }

    fn precedence_forced() -> Problem {
        // S2: node 2 must be visited after node 1.
        let text = "EDGE_WEIGHT_SECTION\n4\n\
                    0 1 1 1000000\n\
                    1000000 0 1 1\n\
                    1000000 -1 0 1\n\
                    1000000 1000000 1000000 0\n";
        Problem::parse(Cursor::new(text)).unwrap()
    }

    #[test]
    fn s1_trivial_chain_converges_immediately() {
        let problem = trivial_chain();
        let params = AntParams::default();
        let mut engine = SequentialEngine::new();
        let mut profiler = Profiler::new();
        engine.prepare(&problem, &params).unwrap();
        engine.optimize(1, &mut profiler).unwrap();
        assert_eq!(engine.best_route_length(), 2);
        assert_eq!(engine.best_route(), &[0, 1, 2]);
    }

    #[test]
    fn s2_precedence_is_respected_by_every_feasible_tour() {
        let problem = precedence_forced();
        let params = AntParams::default();
        let mut engine = SequentialEngine::new();
        let mut profiler = Profiler::new();
        engine.prepare(&problem, &params).unwrap();
        engine.optimize(5, &mut profiler).unwrap();
        let route = engine.best_route();
        if !route.is_empty() {
            let pos1 = route.iter().position(|&x| x == 1).unwrap();
            let pos2 = route.iter().position(|&x| x == 2).unwrap();
            assert!(pos1 < pos2);
        }
    }

    #[test]
    fn optimize_without_prepare_fails() {
        let mut engine = SequentialEngine::new();
        let mut profiler = Profiler::new();
        assert!(matches!(
            engine.optimize(1, &mut profiler),
            Err(EngineError::NotPrepared)
        ));
    }

    #[test]
    fn best_route_length_is_monotonic_non_increasing() {
        let problem = trivial_chain();
        let params = AntParams::default();
        let mut engine = SequentialEngine::new();
        let mut profiler = Profiler::new();
        engine.prepare(&problem, &params).unwrap();
        let mut previous = i32::MAX;
        for _ in 0..5 {
            engine.optimize(1, &mut profiler).unwrap();
            assert!(engine.best_route_length() <= previous);
            previous = engine.best_route_length();
        }
    }

    #[test]
    fn determinism_under_fixed_seed() {
        let problem = precedence_forced();
        let mut params = AntParams::default();
        params.random_seed = 12345;
        let mut profiler = Profiler::new();

        let mut a = SequentialEngine::new();
        a.prepare(&problem, &params).unwrap();
        a.optimize(10, &mut profiler).unwrap();

        let mut b = SequentialEngine::new();
        b.prepare(&problem, &params).unwrap();
        b.optimize(10, &mut profiler).unwrap();

        assert_eq!(a.best_route_length(), b.best_route_length());
        assert_eq!(a.best_route(), b.best_route());
    }

    #[test]
    fn profiler_records_phase_timings_per_round() {
        let problem = trivial_chain();
        let params = AntParams::default();
        let mut engine = SequentialEngine::new();
        let mut profiler = Profiler::new();
        engine.prepare(&problem, &params).unwrap();
        engine.optimize(3, &mut profiler).unwrap();
        for id in ["opts", "adva", "eval", "upda"] {
            assert!(profiler.analyze(id).is_some(), "missing timings for {id}");
        }
    }
}

//! Drives a colony engine through `prepare` and `optimize`, wrapping both in
//! the profiler's `prep`/`optr` timers so reporting has the full picture.

use crate::engine::ColonyEngine;
use crate::error::EngineError;
use crate::params::AntParams;
use crate::problem::Problem;
use crate::profiler::Profiler;

pub struct RunReport {
    pub best_route_length: i32,
    pub best_route: Vec<usize>,
    pub profiler: Profiler,
}

/// Run one full optimization: prepare once, then `rounds` rounds.
pub fn run(
    engine: &mut dyn ColonyEngine,
    problem: &Problem,
    params: &AntParams,
    rounds: usize,
) -> Result<RunReport, EngineError> {
    let mut profiler = Profiler::new();

    profiler.start("prep");
    engine.prepare(problem, params)?;
    profiler.stop("prep");

    profiler.start("optr");
    engine.optimize(rounds, &mut profiler)?;
    profiler.stop("optr");

    Ok(RunReport {
        best_route_length: engine.best_route_length(),
        best_route: engine.best_route().to_vec(),
        profiler,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sequential::SequentialEngine;
    use std::io::Cursor;

    #[test]
    fn run_records_prep_and_optr_timings() {
        let text = "EDGE_WEIGHT_SECTION\n3\n0 1 1000000\n1000000 0 1\n1000000 1000000 0\n";
        let problem = Problem::parse(Cursor::new(text)).unwrap();
        let params = AntParams::default();
        let mut engine = SequentialEngine::new();

        let report = run(&mut engine, &problem, &params, 4).unwrap();
        assert_eq!(report.best_route_length, 2);
        assert!(report.profiler.analyze("prep").is_some());
        assert!(report.profiler.analyze("optr").is_some());
    }
}

//! Keyed timers with min/max/average analysis.
//!
//! Generalizes the reference `Profiler` struct: same `start`/`stop`/
//! `get_minmaxavg` surface, but owned by whoever runs the optimization (the
//! orchestrator) rather than reached through a `default_profiler` static
//! singleton. A missing or empty id simply yields `None` from `analyze`
//! rather than panicking — the profiler is fire-and-forget from the
//! engine's perspective.

use std::collections::HashMap;
use std::time::Instant;

use statrs::statistics::Statistics;

#[derive(Debug, Default)]
pub struct Profiler {
    active: HashMap<String, Instant>,
    measurements: HashMap<String, Vec<f64>>,
}

/// Summary statistics over every sample recorded under one id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingStats {
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
}

impl Profiler {
    pub fn new() -> Self {
        Profiler::default()
    }

    /// Start (or restart) a named timer.
    pub fn start(&mut self, id: &str) {
        self.active.insert(id.to_string(), Instant::now());
    }

    /// Stop a named timer, recording the elapsed duration in milliseconds.
    /// A `stop` with no matching `start` is silently ignored.
    pub fn stop(&mut self, id: &str) {
        if let Some(started) = self.active.remove(id) {
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            self.measurements
                .entry(id.to_string())
                .or_default()
                .push(elapsed_ms);
        }
    }

    /// Min/max/average over every sample recorded for `id`, or `None` if
    /// nothing was ever recorded.
    pub fn analyze(&self, id: &str) -> Option<TimingStats> {
        let samples = self.measurements.get(id)?;
        if samples.is_empty() {
            return None;
        }
        let min_ms = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg_ms = samples.to_vec().mean();
        Some(TimingStats {
            min_ms,
            max_ms,
            avg_ms,
        })
    }

    /// All ids that have at least one recorded sample, in insertion order is
    /// not guaranteed (backed by a hash map, matching the reference).
    pub fn measurement_keys(&self) -> Vec<&str> {
        self.measurements.keys().map(String::as_str).collect()
    }

    /// Single most recent sample for `id`, used for once-per-run timings
    /// such as `prep` and `optr` where min/max/avg collapse to one value.
    pub fn last(&self, id: &str) -> Option<f64> {
        self.measurements.get(id).and_then(|v| v.last().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn unstarted_stop_is_a_noop() {
        let mut p = Profiler::new();
        p.stop("never_started");
        assert!(p.analyze("never_started").is_none());
    }

    #[test]
    fn analyze_reports_min_max_avg_over_repeated_samples() {
        let mut p = Profiler::new();
        for _ in 0..3 {
            p.start("adva");
            sleep(Duration::from_millis(1));
            p.stop("adva");
        }
        let stats = p.analyze("adva").unwrap();
        assert!(stats.min_ms > 0.0);
        assert!(stats.max_ms >= stats.min_ms);
        assert!(stats.avg_ms >= stats.min_ms && stats.avg_ms <= stats.max_ms);
    }

    #[test]
    fn missing_id_analyzes_to_none() {
        let p = Profiler::new();
        assert!(p.analyze("nope").is_none());
    }
}

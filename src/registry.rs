//! Variant registry: name -> engine constructor.
//!
//! Generalizes the reference `ColonyFactory` static `variants` map into an
//! explicitly constructed, owned `HashMap`. Nothing here is a global:
//! [`builtin`] returns a fresh registry every call, and the CLI/orchestrator
//! hold it for the lifetime of one run.

use std::collections::BTreeMap;

use crate::engine::gpu::GpuEngine;
use crate::engine::parallel::ParallelEngine;
use crate::engine::sequential::SequentialEngine;
use crate::engine::ColonyEngine;

pub type EngineFactory = Box<dyn Fn() -> Box<dyn ColonyEngine> + Send + Sync>;

pub struct ColonyRegistry {
    variants: BTreeMap<&'static str, EngineFactory>,
}

impl ColonyRegistry {
    pub fn new() -> Self {
        ColonyRegistry {
            variants: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, name: &'static str, factory: EngineFactory) {
        self.variants.insert(name, factory);
    }

    pub fn make(&self, name: &str) -> Option<Box<dyn ColonyEngine>> {
        self.variants.get(name).map(|f| f())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.variants.keys().copied()
    }
}

impl Default for ColonyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The registry wired up at program start, listing every variant this crate
/// ships. Equivalent to the reference `main.cpp`'s sequence of
/// `ColonyFactory::add<...>()` calls.
pub fn builtin() -> ColonyRegistry {
    let mut registry = ColonyRegistry::new();
    registry.add("sequential", Box::new(|| Box::new(SequentialEngine::new())));
    registry.add("parallel", Box::new(|| Box::new(ParallelEngine::new())));
    registry.add("gpu", Box::new(|| Box::new(GpuEngine::new())));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_contains_the_three_core_variants() {
        let registry = builtin();
        let names: Vec<&str> = registry.names().collect();
        assert!(names.contains(&"sequential"));
        assert!(names.contains(&"parallel"));
        assert!(names.contains(&"gpu"));
    }

    #[test]
    fn unknown_variant_returns_none() {
        let registry = builtin();
        assert!(registry.make("does-not-exist").is_none());
    }

    #[test]
    fn make_constructs_a_fresh_engine_each_call() {
        let registry = builtin();
        let a = registry.make("sequential");
        let b = registry.make("sequential");
        assert!(a.is_some());
        assert!(b.is_some());
    }
}

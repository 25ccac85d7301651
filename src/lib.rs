//! A Sequential Ordering Problem solver built around a colony stepping
//! engine: ant-colony optimization with a MAX-MIN pheromone scheme, with
//! interchangeable sequential, data-parallel, and GPU back-ends sharing one
//! algorithmic contract.
//!
//! # Example
//!
//! ```no_run
//! use sop_colony::problem::Problem;
//! use sop_colony::params::AntParams;
//! use sop_colony::engine::sequential::SequentialEngine;
//! use sop_colony::orchestrator;
//! use std::io::BufReader;
//! use std::fs::File;
//!
//! let file = File::open("instance.sop").unwrap();
//! let problem = Problem::parse(BufReader::new(file)).unwrap();
//! let params = AntParams::default();
//! let mut engine = SequentialEngine::new();
//! let report = orchestrator::run(&mut engine, &problem, &params, 500).unwrap();
//! println!("best route length: {}", report.best_route_length);
//! ```

pub mod cli;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod orchestrator;
pub mod params;
pub mod problem;
pub mod profiler;
pub mod registry;
pub mod report;
pub mod rng;

pub use params::AntParams;
pub use problem::Problem;

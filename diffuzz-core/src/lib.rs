//! Core pipeline for differential fuzzing
//!
//! This crate generates randomized test cases, runs each one through two or
//! more independent engines and flags the first case where their outputs
//! differ. The generation algorithm and the engines themselves plug in
//! through the [`TestGenerator`] and [`Engine`] traits.

pub mod buffer;
pub mod comparator;
pub mod config;
pub mod engine;
pub mod error;
pub mod latch;
pub mod pipeline;
pub mod queue;
pub mod store;

pub use config::{ComparisonTopology, FuzzConfig};
pub use engine::{Engine, EngineSink, TestGenerator};
pub use error::{Error, Result};
pub use pipeline::{Divergence, Pipeline, RunOutcome, RunSummary};

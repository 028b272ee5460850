//! Headless match runner for scenario playback and CI verification.
//!
//! This crate runs `clash_core` matches without graphics or a physics
//! engine. A minimal overlap detector plays the part of physics, links are
//! recorded in memory and results come out as JSON:
//!
//! - **Scenario playback**: Run a preset or a RON scenario to completion
//! - **Batch runs**: Many seeded matches in parallel with a summary
//! - **Determinism checks**: Replay the same seed and compare state hashes
//!
//! # Example
//!
//! ```bash
//! # Run a preset and print the report
//! cargo run -p clash_headless -- run --scenario duel_1v1
//!
//! # Run a batch of 200 jittered skirmishes
//! cargo run -p clash_headless -- batch --scenario skirmish_3v3 --count 200
//!
//! # Verify determinism
//! cargo run -p clash_headless -- verify --scenario scenarios/custom.ron --runs 5
//! ```

pub mod batch;
pub mod metrics;
pub mod physics;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, BatchConfig, BatchResults};
pub use metrics::{BatchSummary, EndReason, MatchReport, MetricsCollector};
pub use physics::OverlapDetector;
pub use runner::{run_scenario, MatchRunner, RunnerError};
pub use scenario::{Scenario, ScenarioError};

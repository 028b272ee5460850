//! Batch match runner.
//!
//! Runs many copies of a scenario in parallel using rayon. Each match
//! gets its own seed, which nudges the starting positions so the batch
//! explores more than one fight.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use clash_core::math::Fixed;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::metrics::{save_json, BatchSummary, MatchReport};
use crate::runner::MatchRunner;
use crate::scenario::Scenario;

/// Deterministic LCG for spawn jitter.
///
/// Not suitable for anything but reproducible test variation.
#[derive(Debug, Clone)]
pub struct SpawnRng {
    state: u64,
}

impl SpawnRng {
    /// Create new RNG from seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
        }
    }

    /// Get next random value.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.state >> 33
    }

    /// Get a value in `[-max, max]`, in steps of a thousandth of `max`.
    pub fn next_offset(&mut self, max: Fixed) -> Fixed {
        if max <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        let step = (self.next() % 2001) as i32 - 1000;
        max / Fixed::from_num(1000) * Fixed::from_num(step)
    }
}

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Preset name or scenario path, for the record.
    pub scenario: String,
    /// Number of matches to run.
    pub match_count: u32,
    /// Maximum parallel matches (0 = use rayon default).
    pub parallel_matches: usize,
    /// Seed of the first match; match `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// Largest spawn nudge per axis, in world units.
    pub jitter: f64,
    /// Output directory for results.
    pub output_dir: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "skirmish_3v3".to_string(),
            match_count: 100,
            parallel_matches: 0,
            seed_start: 0,
            jitter: 1.0,
            output_dir: PathBuf::from("results"),
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario.
    #[must_use]
    pub fn new(scenario: &str, match_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            match_count,
            ..Default::default()
        }
    }

    /// Set seed start.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set spawn jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set output directory.
    #[must_use]
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }
}

/// Error during batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Match index.
    pub match_index: u32,
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Individual match reports, in seed order.
    pub matches: Vec<MatchReport>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total wall-clock runtime.
    pub duration_seconds: f64,
    /// Errors encountered.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        save_json(self, path)
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

fn jitter_amount(jitter: f64) -> Fixed {
    Fixed::saturating_from_num(jitter.max(0.0))
}

/// Run one seeded match of `scenario`.
pub fn run_seeded(scenario: &Scenario, seed: u64, jitter: f64) -> Result<MatchReport, String> {
    let seeded = scenario.with_jitter(seed, jitter_amount(jitter));
    let runner = MatchRunner::with_seed(&seeded, Some(seed)).map_err(|e| e.to_string())?;
    Ok(runner.run_to_completion())
}

/// Run a batch of matches.
pub fn run_batch(config: BatchConfig, scenario: &Scenario) -> BatchResults {
    let start = Instant::now();
    let completed = AtomicU32::new(0);

    info!(
        "Starting batch run: {} matches of '{}'",
        config.match_count, scenario.name
    );

    let run_all = || -> Vec<Result<MatchReport, BatchError>> {
        (0..config.match_count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                match run_seeded(scenario, seed, config.jitter) {
                    Ok(report) => {
                        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                        if done % 10 == 0 {
                            debug!("Progress: {}/{}", done, config.match_count);
                        }
                        Ok(report)
                    }
                    Err(message) => {
                        warn!("Match {} failed: {}", i, message);
                        Err(BatchError {
                            match_index: i,
                            seed,
                            message,
                        })
                    }
                }
            })
            .collect()
    };

    let results = if config.parallel_matches > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_matches)
            .build()
        {
            Ok(pool) => pool.install(run_all),
            Err(e) => {
                warn!("Failed to build thread pool: {}, using default", e);
                run_all()
            }
        }
    } else {
        run_all()
    };

    let (matches, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let matches: Vec<MatchReport> = matches.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_reports(&matches);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} matches in {:.1}s",
        matches.len(),
        duration_seconds
    );

    BatchResults {
        config,
        matches,
        summary,
        duration_seconds,
        errors,
    }
}

/// Verify determinism by running the same seed several times.
///
/// Compares final state hashes and full reports.
pub fn verify_determinism(scenario: &Scenario, seed: u64, jitter: f64, runs: u32) -> bool {
    let mut first: Option<MatchReport> = None;
    for run in 0..runs {
        let report = match run_seeded(scenario, seed, jitter) {
            Ok(report) => report,
            Err(message) => {
                warn!(run, %message, "Verification run failed");
                return false;
            }
        };
        match &first {
            None => first = Some(report),
            Some(expected) if *expected == report => {}
            Some(expected) => {
                warn!(
                    run,
                    expected = expected.final_state_hash,
                    actual = report.final_state_hash,
                    "Determinism check failed"
                );
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_config_default() {
        let config = BatchConfig::default();
        assert_eq!(config.match_count, 100);
        assert_eq!(config.scenario, "skirmish_3v3");
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new("duel_1v1", 500)
            .with_output(PathBuf::from("/tmp/results"))
            .with_seed(12345)
            .with_jitter(0.5);

        assert_eq!(config.scenario, "duel_1v1");
        assert_eq!(config.match_count, 500);
        assert_eq!(config.seed_start, 12345);
        assert!((config.jitter - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_spawn_rng_offsets_stay_in_range() {
        let mut rng = SpawnRng::new(99);
        let max = Fixed::from_num(3);
        for _ in 0..1000 {
            let offset = rng.next_offset(max);
            assert!(offset.abs() <= max);
        }
        assert_eq!(rng.next_offset(Fixed::ZERO), Fixed::ZERO);
    }

    #[test]
    fn test_huge_jitter_stays_in_range() {
        let mut rng = SpawnRng::new(7);
        for _ in 0..1000 {
            let offset = rng.next_offset(Fixed::MAX);
            assert!(offset.abs() <= Fixed::MAX);
        }

        assert_eq!(jitter_amount(5.0e12), Fixed::MAX);
        assert_eq!(jitter_amount(f64::NAN), Fixed::ZERO);
        assert_eq!(jitter_amount(-3.0), Fixed::ZERO);

        let jittered = Scenario::skirmish_3v3().with_jitter(3, jitter_amount(1.0e9));
        assert!(jittered.to_match_config().is_ok());
    }

    #[test]
    fn test_spawn_rng_is_seeded() {
        let mut a = SpawnRng::new(5);
        let mut b = SpawnRng::new(5);
        for _ in 0..10 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn test_run_batch_small() {
        let config = BatchConfig::new("duel_1v1", 6);
        let results = run_batch(config, &Scenario::duel_1v1());

        assert_eq!(results.matches.len(), 6);
        assert!(results.errors.is_empty());
        assert_eq!(results.summary.total_matches, 6);
        let seeds: Vec<_> = results.matches.iter().map(|m| m.seed).collect();
        assert_eq!(seeds, (0..6).map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn test_run_batch_with_pool() {
        let mut config = BatchConfig::new("duel_1v1", 4);
        config.parallel_matches = 2;
        let results = run_batch(config, &Scenario::duel_1v1());
        assert_eq!(results.matches.len(), 4);
    }

    #[test]
    fn test_batch_is_reproducible() {
        let scenario = Scenario::skirmish_3v3();
        let a = run_batch(BatchConfig::new("skirmish_3v3", 4).with_seed(10), &scenario);
        let b = run_batch(BatchConfig::new("skirmish_3v3", 4).with_seed(10), &scenario);
        assert_eq!(a.matches, b.matches);
    }

    #[test]
    fn test_verify_determinism() {
        assert!(verify_determinism(&Scenario::skirmish_3v3(), 12345, 1.5, 3));
    }

    #[test]
    fn test_batch_results_save_load() {
        let results = run_batch(BatchConfig::new("duel_1v1", 3), &Scenario::duel_1v1());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        results.save(&path).unwrap();
        assert!(path.exists());

        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.matches.len(), 3);
        assert_eq!(loaded.config.scenario, "duel_1v1");
    }
}

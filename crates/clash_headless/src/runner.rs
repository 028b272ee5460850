//! Headless match runner.
//!
//! Drives a [`Simulation`] with the [`OverlapDetector`] as its physics.
//! One [`step`](MatchRunner::step) is one fixed step:
//!
//! 1. detect overlaps and route the resulting contacts
//! 2. tick the simulation (deaths, then targeting)
//! 3. move combatants towards their targets

use clash_core::contact::ContactRouter;
use clash_core::error::ClashError;
use clash_core::simulation::{Simulation, TickEvents};
use thiserror::Error;

use crate::metrics::{MatchReport, MetricsCollector};
use crate::physics::OverlapDetector;
use crate::scenario::{Scenario, ScenarioError};

/// Error type for runner operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The scenario could not be loaded or converted.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// The simulation refused a request.
    #[error("Simulation error: {0}")]
    Core(#[from] ClashError),
}

/// One match, from setup to report.
#[derive(Debug)]
pub struct MatchRunner {
    sim: Simulation,
    router: ContactRouter,
    detector: OverlapDetector,
    metrics: MetricsCollector,
    max_ticks: u64,
}

impl MatchRunner {
    /// Build a runner for `scenario` and start the match.
    pub fn new(scenario: &Scenario) -> Result<Self, RunnerError> {
        Self::with_seed(scenario, None)
    }

    /// Like [`new`](Self::new), recording `seed` in the report.
    pub fn with_seed(scenario: &Scenario, seed: Option<u64>) -> Result<Self, RunnerError> {
        let config = scenario.to_match_config()?;
        let mut sim = Simulation::from_config(&config)?;
        sim.start()?;

        let router = ContactRouter::for_simulation(&sim);
        let metrics = MetricsCollector::new(&scenario.name, seed, &sim);

        tracing::info!(
            scenario = %scenario.name,
            combatants = sim.arena().len(),
            max_ticks = scenario.max_ticks,
            "Match runner ready"
        );

        Ok(Self {
            sim,
            router,
            detector: OverlapDetector::new(),
            metrics,
            max_ticks: scenario.max_ticks,
        })
    }

    /// The simulation being run.
    #[must_use]
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Whether the match has a result or hit the tick limit.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.sim.outcome().is_some() || self.sim.get_tick() >= self.max_ticks
    }

    /// Advance one fixed step.
    pub fn step(&mut self) -> TickEvents {
        for contact in self.detector.detect(&self.sim) {
            self.router.route(&mut self.sim, contact);
        }

        let dt = self.sim.fixed_dt();
        let events = self.sim.tick(dt);
        self.sim.advance_movement(dt);

        self.metrics.record(&self.sim, &events);
        events
    }

    /// Pause the match; steps do nothing until [`resume`](Self::resume).
    pub fn pause(&mut self) -> Result<(), RunnerError> {
        self.sim.pause()?;
        Ok(())
    }

    /// Resume a paused match.
    pub fn resume(&mut self) -> Result<(), RunnerError> {
        self.sim.resume()?;
        Ok(())
    }

    /// Step until the match ends, then report.
    #[must_use]
    pub fn run_to_completion(mut self) -> MatchReport {
        while !self.is_finished() && self.sim.is_running() {
            self.step();
        }
        let report = self.metrics.finish(&self.sim);

        tracing::info!(
            scenario = %report.scenario,
            ticks = report.duration_ticks,
            winner = ?report.winner,
            reason = ?report.end_reason,
            "Match finished"
        );
        report
    }
}

/// Load, run and report a scenario.
pub fn run_scenario(scenario: &Scenario) -> Result<MatchReport, RunnerError> {
    Ok(MatchRunner::new(scenario)?.run_to_completion())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::EndReason;
    use clash_core::combatant::TeamSide;
    use clash_core::link::Rgba;
    use clash_core::math::Fixed;
    use clash_core::simulation::MatchState;

    use crate::scenario::TeamSetup;

    #[test]
    fn test_duel_has_a_winner_or_draw() {
        let report = run_scenario(&Scenario::duel_1v1()).unwrap();
        assert_ne!(report.end_reason, Some(EndReason::Timeout));
        assert!(report.duration_ticks > 0);
        assert!(!report.deaths.is_empty());
    }

    #[test]
    fn test_skirmish_finishes() {
        let report = run_scenario(&Scenario::skirmish_3v3()).unwrap();
        assert_ne!(report.end_reason, Some(EndReason::Timeout));
        let survivors: usize = report.teams.iter().map(|t| t.survivors).sum();
        assert!(survivors <= 3);
    }

    #[test]
    fn test_runs_are_reproducible() {
        let a = run_scenario(&Scenario::skirmish_3v3()).unwrap();
        let b = run_scenario(&Scenario::skirmish_3v3()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stronger_side_wins() {
        let mut scenario = Scenario::duel_1v1();
        scenario.teams[1].stats = scenario.teams[1]
            .stats
            .with_damage_per_second(Fixed::from_num(60));
        let report = run_scenario(&scenario).unwrap();
        assert_eq!(report.winner.as_deref(), Some("blue"));
        assert_eq!(report.teams[1].survivors, 1);
    }

    #[test]
    fn test_far_apart_with_no_speed_times_out() {
        let mut scenario = Scenario {
            max_ticks: 50,
            teams: vec![
                TeamSetup::new("red", Rgba::RED).with_member_at(0, 0),
                TeamSetup::new("blue", Rgba::BLUE).with_member_at(100, 0),
            ],
            ..Scenario::duel_1v1()
        };
        for team in &mut scenario.teams {
            team.stats = team.stats.with_speed(Fixed::ZERO);
        }
        let report = run_scenario(&scenario).unwrap();
        assert_eq!(report.end_reason, Some(EndReason::Timeout));
        assert_eq!(report.duration_ticks, 50);
    }

    #[test]
    fn test_paused_runner_does_not_advance() {
        let mut runner = MatchRunner::new(&Scenario::duel_1v1()).unwrap();
        runner.step();
        runner.pause().unwrap();
        assert_eq!(runner.simulation().state(), MatchState::Paused);

        let tick = runner.simulation().get_tick();
        let hash = runner.simulation().state_hash();
        for _ in 0..10 {
            runner.step();
        }
        assert_eq!(runner.simulation().get_tick(), tick);
        assert_eq!(runner.simulation().state_hash(), hash);

        runner.resume().unwrap();
        runner.step();
        assert_eq!(runner.simulation().get_tick(), tick + 1);
    }

    #[test]
    fn test_invalid_scenario_is_an_error() {
        let mut scenario = Scenario::duel_1v1();
        scenario.teams.push(TeamSetup::new("green", Rgba::GREEN));
        assert!(matches!(
            MatchRunner::new(&scenario),
            Err(RunnerError::Scenario(ScenarioError::Invalid(
                ClashError::TeamCount { found: 3 }
            )))
        ));
    }

    #[test]
    fn test_links_hidden_after_match() {
        let mut runner = MatchRunner::new(&Scenario::duel_1v1()).unwrap();
        while !runner.is_finished() {
            runner.step();
        }
        let sim = runner.simulation();
        let loser = if sim.team(TeamSide::First).is_wiped_out() {
            TeamSide::First
        } else {
            TeamSide::Second
        };
        assert!(sim.team(loser).is_wiped_out());
        // Every link involves a dead combatant by now
        assert_eq!(sim.links().display().visible_count(), 0);
    }
}

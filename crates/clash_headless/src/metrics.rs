//! Match metrics and JSON reports.
//!
//! Collected from [`TickEvents`] while a match runs and written out as
//! JSON. Values that are fixed-point inside the simulation are reported
//! as `f64`.

use std::collections::BTreeMap;
use std::path::Path;

use clash_core::combatant::TeamSide;
use clash_core::link::LinkDisplay;
use clash_core::simulation::{MatchOutcome, Simulation, TickEvents};
use serde::{Deserialize, Serialize};

/// How a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// One team has no living members.
    Elimination,
    /// Both teams died out in the same tick.
    MutualDestruction,
    /// The tick limit was reached first.
    Timeout,
}

/// Per-team results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamReport {
    /// Team name.
    pub name: String,
    /// Members at match start.
    pub members: usize,
    /// Members alive at the end.
    pub survivors: usize,
    /// Damage dealt by this team's attackers.
    pub damage_dealt: f64,
    /// Enemies this team's attackers finished off.
    pub kills: u32,
}

/// One death as it was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathRecord {
    /// Tick in which the death was resolved.
    pub tick: u64,
    /// Combatant id.
    pub combatant: u32,
    /// Team name.
    pub team: String,
}

/// Complete report for a single match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Scenario name.
    pub scenario: String,
    /// Jitter seed, for batch runs.
    pub seed: Option<u64>,
    /// Ticks run.
    pub duration_ticks: u64,
    /// Match time in seconds.
    pub duration_seconds: f64,
    /// Winning team name (None = draw or timeout).
    pub winner: Option<String>,
    /// How the match ended; `None` while still running.
    pub end_reason: Option<EndReason>,
    /// First team, then second.
    pub teams: Vec<TeamReport>,
    /// Deaths in resolution order.
    pub deaths: Vec<DeathRecord>,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl MatchReport {
    /// Save as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        save_json(self, path)
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

pub(crate) fn save_json<T: Serialize>(value: &T, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

/// Accumulates a [`MatchReport`] tick by tick.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    report: MatchReport,
}

impl MetricsCollector {
    /// Start collecting for a freshly built simulation.
    #[must_use]
    pub fn new<D: LinkDisplay>(scenario: &str, seed: Option<u64>, sim: &Simulation<D>) -> Self {
        let teams = TeamSide::BOTH
            .iter()
            .map(|&side| {
                let team = sim.team(side);
                TeamReport {
                    name: team.name().to_string(),
                    members: team.roster().len(),
                    survivors: team.alive().len(),
                    ..TeamReport::default()
                }
            })
            .collect();

        Self {
            report: MatchReport {
                scenario: scenario.to_string(),
                seed,
                teams,
                ..MatchReport::default()
            },
        }
    }

    /// Fold one tick's events into the report.
    pub fn record<D: LinkDisplay>(&mut self, sim: &Simulation<D>, events: &TickEvents) {
        for hit in &events.damage {
            let Some(side) = sim.team_of(hit.attacker) else {
                continue;
            };
            let team = &mut self.report.teams[side.index()];
            team.damage_dealt += hit.amount.to_num::<f64>();
            if hit.outcome == clash_core::combatant::DamageOutcome::Killed {
                team.kills += 1;
            }
        }

        for &id in &events.deaths {
            let team = sim
                .team_of(id)
                .map(|side| sim.team(side).name().to_string())
                .unwrap_or_default();
            self.report.deaths.push(DeathRecord {
                tick: events.tick,
                combatant: id.0,
                team,
            });
        }
    }

    /// Close the report with the simulation's final state.
    #[must_use]
    pub fn finish<D: LinkDisplay>(mut self, sim: &Simulation<D>) -> MatchReport {
        for side in TeamSide::BOTH {
            self.report.teams[side.index()].survivors = sim.team(side).alive().len();
        }
        self.report.duration_ticks = sim.get_tick();
        self.report.duration_seconds = sim.elapsed().to_num::<f64>();
        self.report.final_state_hash = sim.state_hash();

        let (winner, reason) = match sim.outcome() {
            Some(MatchOutcome::Victory(side)) => (
                Some(sim.team(side).name().to_string()),
                EndReason::Elimination,
            ),
            Some(MatchOutcome::Draw) => (None, EndReason::MutualDestruction),
            None => (None, EndReason::Timeout),
        };
        self.report.winner = winner;
        self.report.end_reason = Some(reason);
        self.report
    }
}

/// Summary statistics across multiple matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total matches played.
    pub total_matches: u32,
    /// Matches won by each team.
    pub wins_by_team: BTreeMap<String, u32>,
    /// Win rates by team.
    pub win_rates: BTreeMap<String, f64>,
    /// Matches where both teams died in the same tick.
    pub draws: u32,
    /// Matches that hit the tick limit.
    pub timeouts: u32,
    /// Average match duration in ticks.
    pub avg_duration_ticks: f64,
    /// Shortest match.
    pub min_duration_ticks: u64,
    /// Longest match.
    pub max_duration_ticks: u64,
}

impl BatchSummary {
    /// Calculate summary from a list of match reports.
    #[must_use]
    pub fn from_reports(reports: &[MatchReport]) -> Self {
        if reports.is_empty() {
            return Self::default();
        }

        let mut summary = Self {
            total_matches: reports.len() as u32,
            min_duration_ticks: u64::MAX,
            ..Self::default()
        };

        let mut duration_sum = 0u64;
        for report in reports {
            duration_sum += report.duration_ticks;
            summary.min_duration_ticks = summary.min_duration_ticks.min(report.duration_ticks);
            summary.max_duration_ticks = summary.max_duration_ticks.max(report.duration_ticks);

            if let Some(winner) = &report.winner {
                *summary.wins_by_team.entry(winner.clone()).or_default() += 1;
            }
            match report.end_reason {
                Some(EndReason::MutualDestruction) => summary.draws += 1,
                Some(EndReason::Timeout) => summary.timeouts += 1,
                _ => {}
            }
        }

        let total = f64::from(summary.total_matches);
        summary.avg_duration_ticks = duration_sum as f64 / total;
        summary.win_rates = summary
            .wins_by_team
            .iter()
            .map(|(team, &wins)| (team.clone(), f64::from(wins) / total))
            .collect();
        summary
    }
}

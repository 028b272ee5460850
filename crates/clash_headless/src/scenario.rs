//! Scenario loading and configuration.
//!
//! Scenarios describe a match for headless runs: the two teams, their
//! colours and default stats, where every member stands, the fixed step
//! and how long to run before calling a timeout. They are stored as RON.
//!
//! ```ron
//! Scenario(
//!     name: "duel",
//!     fixed_dt: 0.02,
//!     max_ticks: 3000,
//!     teams: [
//!         TeamSetup(name: "red", color: (r: 255, g: 0, b: 0), members: [
//!             (position: (x: 0.0, y: 0.0)),
//!         ]),
//!         TeamSetup(name: "blue", color: (r: 0, g: 0, b: 255), members: [
//!             (position: (x: 8.0, y: 0.0), stats: Some((damage_per_second: 40.0))),
//!         ]),
//!     ],
//! )
//! ```

use std::path::Path;

use clash_core::config::{
    default_fixed_dt, CombatantSpawn, CombatantStats, MatchConfig, TeamConfig,
};
use clash_core::error::ClashError;
use clash_core::link::Rgba;
use clash_core::math::{fixed_serde, Fixed, Vec2Fixed};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default tick limit: two minutes of match time at the default step.
pub const DEFAULT_MAX_TICKS: u64 = 6000;

/// Names of the built-in scenarios.
pub const PRESETS: [&str; 2] = ["duel_1v1", "skirmish_3v3"];

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario does not describe a playable match.
    #[error("Invalid scenario: {0}")]
    Invalid(#[from] ClashError),
}

fn default_max_ticks() -> u64 {
    DEFAULT_MAX_TICKS
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Fixed simulation step in seconds.
    #[serde(with = "fixed_serde", default = "default_fixed_dt")]
    pub fixed_dt: Fixed,
    /// Ticks to run before the match is called a timeout.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    /// Exactly two teams.
    pub teams: Vec<TeamSetup>,
}

/// One side of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSetup {
    /// Team name used in reports.
    pub name: String,
    /// Link colour of this team's attackers.
    #[serde(default)]
    pub color: Rgba,
    /// Stats for members without their own.
    #[serde(default)]
    pub stats: CombatantStats,
    /// Members in spawn order.
    pub members: Vec<MemberPlacement>,
}

impl TeamSetup {
    /// Create an empty team with default stats.
    #[must_use]
    pub fn new(name: impl Into<String>, color: Rgba) -> Self {
        Self {
            name: name.into(),
            color,
            stats: CombatantStats::default(),
            members: Vec::new(),
        }
    }

    /// Builder method to add a member at integer coordinates.
    #[must_use]
    pub fn with_member_at(mut self, x: i32, y: i32) -> Self {
        self.members.push(MemberPlacement {
            position: Vec2Fixed::from_ints(x, y),
            stats: None,
        });
        self
    }
}

/// Placement of one member at scenario start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPlacement {
    /// Starting position.
    pub position: Vec2Fixed,
    /// Replaces the team stats for this member. Fields left out take the
    /// global defaults, not the team's.
    #[serde(default)]
    pub stats: Option<CombatantStats>,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario = Self::from_ron_str(&contents)?;
        tracing::debug!(name = %scenario.name, path = %path.display(), "Loaded scenario");
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Serialize to pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// A built-in scenario by name.
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "duel_1v1" => Some(Self::duel_1v1()),
            "skirmish_3v3" => Some(Self::skirmish_3v3()),
            _ => None,
        }
    }

    /// A preset name or, failing that, a path to a RON file.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match Self::preset(name_or_path) {
            Some(scenario) => Ok(scenario),
            None => Self::load(name_or_path),
        }
    }

    /// Two default combatants ten units apart.
    #[must_use]
    pub fn duel_1v1() -> Self {
        Self {
            name: "duel_1v1".to_string(),
            description: "Two default combatants walk into each other".to_string(),
            fixed_dt: default_fixed_dt(),
            max_ticks: DEFAULT_MAX_TICKS,
            teams: vec![
                TeamSetup::new("red", Rgba::RED).with_member_at(0, 0),
                TeamSetup::new("blue", Rgba::BLUE).with_member_at(10, 0),
            ],
        }
    }

    /// Three against three in facing columns.
    #[must_use]
    pub fn skirmish_3v3() -> Self {
        Self {
            name: "skirmish_3v3".to_string(),
            description: "Two columns of three close in and fight".to_string(),
            fixed_dt: default_fixed_dt(),
            max_ticks: DEFAULT_MAX_TICKS,
            teams: vec![
                TeamSetup::new("red", Rgba::RED)
                    .with_member_at(0, 0)
                    .with_member_at(0, 4)
                    .with_member_at(0, 8),
                TeamSetup::new("blue", Rgba::BLUE)
                    .with_member_at(16, 0)
                    .with_member_at(16, 4)
                    .with_member_at(16, 8),
            ],
        }
    }

    /// Build the core match configuration.
    ///
    /// # Errors
    ///
    /// Fails when the core would reject the result: wrong team count,
    /// non-positive step or unusable stats.
    pub fn to_match_config(&self) -> Result<MatchConfig, ScenarioError> {
        let teams = self
            .teams
            .iter()
            .map(|team| TeamConfig {
                name: team.name.clone(),
                link_color: team.color,
                members: team
                    .members
                    .iter()
                    .map(|member| {
                        CombatantSpawn::at(member.position)
                            .with_stats(member.stats.unwrap_or(team.stats))
                    })
                    .collect(),
            })
            .collect();

        let config = MatchConfig {
            teams,
            fixed_dt: self.fixed_dt,
        };
        config.validate()?;
        Ok(config)
    }

    /// Copy with every member nudged by up to `max_offset` on each axis.
    ///
    /// The same seed always gives the same nudges.
    #[must_use]
    pub fn with_jitter(&self, seed: u64, max_offset: Fixed) -> Self {
        let mut rng = crate::batch::SpawnRng::new(seed);
        let mut jittered = self.clone();
        for member in jittered.teams.iter_mut().flat_map(|t| t.members.iter_mut()) {
            let (dx, dy) = (rng.next_offset(max_offset), rng.next_offset(max_offset));
            member.position.x = member.position.x.saturating_add(dx);
            member.position.y = member.position.y.saturating_add(dy);
        }
        jittered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        for name in PRESETS {
            let scenario = Scenario::preset(name).unwrap();
            assert_eq!(scenario.name, name);
            assert!(scenario.to_match_config().is_ok());
        }
        assert!(Scenario::preset("nope").is_none());
    }

    #[test]
    fn test_parse_from_ron() {
        let ron = r#"
            Scenario(
                name: "Test",
                teams: [
                    TeamSetup(
                        name: "red",
                        color: (r: 200, g: 10, b: 10),
                        stats: (damage_per_second: 50.0),
                        members: [(position: (x: 0.0, y: 0.0))],
                    ),
                    TeamSetup(
                        name: "blue",
                        members: [
                            (position: (x: 6.5, y: 0.0), stats: Some((max_health: 250.0))),
                        ],
                    ),
                ],
            )
        "#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.name, "Test");
        assert_eq!(scenario.max_ticks, DEFAULT_MAX_TICKS);
        assert_eq!(scenario.fixed_dt, default_fixed_dt());
        assert_eq!(scenario.teams[1].color, Rgba::WHITE);

        let config = scenario.to_match_config().unwrap();
        let red = &config.teams[0].members[0].stats;
        assert_eq!(red.damage_per_second, Fixed::from_num(50));
        let blue = &config.teams[1].members[0];
        assert_eq!(blue.position.x, Fixed::from_num(6.5));
        assert_eq!(blue.stats.max_health, Fixed::from_num(250));
        assert_eq!(blue.stats.damage_per_second, Fixed::from_num(30));
    }

    #[test]
    fn test_wrong_team_count_rejected() {
        let mut scenario = Scenario::duel_1v1();
        scenario.teams.pop();
        assert!(matches!(
            scenario.to_match_config(),
            Err(ScenarioError::Invalid(ClashError::TeamCount { found: 1 }))
        ));
    }

    #[test]
    fn test_ron_round_trip_of_preset() {
        let scenario = Scenario::skirmish_3v3();
        let text = scenario.to_ron_string().unwrap();
        assert_eq!(Scenario::from_ron_str(&text).unwrap(), scenario);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Scenario::load("/definitely/not/here.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duel.ron");
        std::fs::write(&path, Scenario::duel_1v1().to_ron_string().unwrap()).unwrap();

        let loaded = Scenario::resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, Scenario::duel_1v1());
    }

    #[test]
    fn test_jitter_is_seeded() {
        let base = Scenario::skirmish_3v3();
        let offset = Fixed::from_num(2);
        let a = base.with_jitter(7, offset);
        let b = base.with_jitter(7, offset);
        let c = base.with_jitter(8, offset);
        assert_eq!(a, b);
        assert_ne!(a, c);

        for (moved, original) in a.teams[0].members.iter().zip(&base.teams[0].members) {
            assert!((moved.position.x - original.position.x).abs() <= offset);
            assert!((moved.position.y - original.position.y).abs() <= offset);
        }
    }
}

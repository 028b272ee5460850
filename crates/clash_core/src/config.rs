//! Match configuration.
//!
//! Pure data describing a match before it starts: the two teams, where
//! each combatant stands, and the stats of every combatant. The core
//! never reads files itself; hosts deserialize these structs (the
//! headless runner uses RON) and hand them to
//! [`Simulation::new`](crate::simulation::Simulation::new).

use serde::{Deserialize, Serialize};

use crate::error::{ClashError, Result};
use crate::link::Rgba;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Fixed steps per second used when a configuration does not say otherwise.
pub const TICK_RATE: u32 = 50;

/// Default fixed time step (one fiftieth of a second).
#[must_use]
pub fn default_fixed_dt() -> Fixed {
    Fixed::ONE / Fixed::from_num(TICK_RATE)
}

/// Per-combatant tuning values.
///
/// Missing fields fall back to the defaults below when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatantStats {
    /// Movement rate in world units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Radius of the area in which this combatant hits enemies.
    #[serde(with = "fixed_serde")]
    pub sensing_radius: Fixed,
    /// Damage dealt to a defender per second of sustained contact.
    #[serde(with = "fixed_serde")]
    pub damage_per_second: Fixed,
    /// Health at spawn and after a reset.
    #[serde(with = "fixed_serde")]
    pub max_health: Fixed,
    /// Radius of the combatant's body, used as stopping distance.
    #[serde(with = "fixed_serde")]
    pub body_radius: Fixed,
}

impl Default for CombatantStats {
    fn default() -> Self {
        Self {
            speed: Fixed::ONE,
            sensing_radius: Fixed::from_num(5),
            damage_per_second: Fixed::from_num(30),
            max_health: Fixed::from_num(100),
            body_radius: Fixed::from_num(0.5),
        }
    }
}

impl CombatantStats {
    /// Builder method to set movement speed.
    #[must_use]
    pub const fn with_speed(mut self, speed: Fixed) -> Self {
        self.speed = speed;
        self
    }

    /// Builder method to set the sensing radius.
    #[must_use]
    pub const fn with_sensing_radius(mut self, radius: Fixed) -> Self {
        self.sensing_radius = radius;
        self
    }

    /// Builder method to set damage per second.
    #[must_use]
    pub const fn with_damage_per_second(mut self, dps: Fixed) -> Self {
        self.damage_per_second = dps;
        self
    }

    /// Builder method to set maximum health.
    #[must_use]
    pub const fn with_max_health(mut self, health: Fixed) -> Self {
        self.max_health = health;
        self
    }

    /// Builder method to set the body radius.
    #[must_use]
    pub const fn with_body_radius(mut self, radius: Fixed) -> Self {
        self.body_radius = radius;
        self
    }

    /// Check that the stats can describe a living combatant.
    pub fn validate(&self) -> Result<()> {
        if self.max_health <= Fixed::ZERO {
            return Err(ClashError::InvalidConfig(format!(
                "max_health must be positive, got {}",
                self.max_health
            )));
        }
        let non_negative = [
            ("speed", self.speed),
            ("sensing_radius", self.sensing_radius),
            ("damage_per_second", self.damage_per_second),
            ("body_radius", self.body_radius),
        ];
        for (name, value) in non_negative {
            if value < Fixed::ZERO {
                return Err(ClashError::InvalidConfig(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// One combatant placed on the field at match setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantSpawn {
    /// Starting position.
    pub position: Vec2Fixed,
    /// Tuning values for this combatant.
    #[serde(default)]
    pub stats: CombatantStats,
}

impl CombatantSpawn {
    /// Spawn with default stats at `position`.
    #[must_use]
    pub fn at(position: Vec2Fixed) -> Self {
        Self {
            position,
            stats: CombatantStats::default(),
        }
    }

    /// Builder method to replace the stats.
    #[must_use]
    pub const fn with_stats(mut self, stats: CombatantStats) -> Self {
        self.stats = stats;
        self
    }
}

/// One side of the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Display name, used in logs and reports.
    pub name: String,
    /// Colour of the links drawn by this team's attackers.
    #[serde(default)]
    pub link_color: Rgba,
    /// Members in spawn order.
    pub members: Vec<CombatantSpawn>,
}

impl TeamConfig {
    /// Create an empty team with the given name and link colour.
    #[must_use]
    pub fn new(name: impl Into<String>, link_color: Rgba) -> Self {
        Self {
            name: name.into(),
            link_color,
            members: Vec::new(),
        }
    }

    /// Builder method to add a member.
    #[must_use]
    pub fn with_member(mut self, spawn: CombatantSpawn) -> Self {
        self.members.push(spawn);
        self
    }
}

/// Everything needed to construct a [`Simulation`](crate::simulation::Simulation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Exactly two teams; anything else is rejected at construction.
    pub teams: Vec<TeamConfig>,
    /// Fixed time step used for contact damage.
    #[serde(with = "fixed_serde", default = "default_fixed_dt")]
    pub fixed_dt: Fixed,
}

impl MatchConfig {
    /// Create a two-team configuration with the default time step.
    #[must_use]
    pub fn new(first: TeamConfig, second: TeamConfig) -> Self {
        Self {
            teams: vec![first, second],
            fixed_dt: default_fixed_dt(),
        }
    }

    /// Builder method to set the fixed time step.
    #[must_use]
    pub fn with_fixed_dt(mut self, dt: Fixed) -> Self {
        self.fixed_dt = dt;
        self
    }

    /// Validate team count, time step and every member's stats.
    pub fn validate(&self) -> Result<()> {
        if self.teams.len() != 2 {
            return Err(ClashError::TeamCount {
                found: self.teams.len(),
            });
        }
        if self.fixed_dt <= Fixed::ZERO {
            return Err(ClashError::InvalidConfig(format!(
                "fixed_dt must be positive, got {}",
                self.fixed_dt
            )));
        }
        for team in &self.teams {
            for spawn in &team.members {
                spawn.stats.validate().map_err(|e| match e {
                    ClashError::InvalidConfig(msg) => {
                        ClashError::InvalidConfig(format!("team '{}': {msg}", team.name))
                    }
                    other => other,
                })?;
            }
        }
        Ok(())
    }
}

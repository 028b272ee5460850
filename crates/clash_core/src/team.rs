//! Teams: the alive/dead partition of one side's combatants.

use fixed::types::I64F64;
use serde::{Deserialize, Serialize};

use crate::combatant::{CombatantArena, CombatantId, TeamSide};
use crate::link::Rgba;
use crate::math::Vec2Fixed;

/// One side of the match.
///
/// Every member id is in exactly one of `alive` or `dead`. `alive` keeps
/// spawn order, which fixes iteration and tie-breaking; `dead` keeps
/// death order and only grows until the match is reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    side: TeamSide,
    name: String,
    link_color: Rgba,
    roster: Vec<CombatantId>,
    alive: Vec<CombatantId>,
    dead: Vec<CombatantId>,
}

impl Team {
    /// Create a team whose members are all alive.
    #[must_use]
    pub fn new(
        side: TeamSide,
        name: impl Into<String>,
        link_color: Rgba,
        members: Vec<CombatantId>,
    ) -> Self {
        Self {
            side,
            name: name.into(),
            link_color,
            alive: members.clone(),
            roster: members,
            dead: Vec::new(),
        }
    }

    /// Which side this team plays.
    #[must_use]
    pub const fn side(&self) -> TeamSide {
        self.side
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Colour of links drawn by this team's attackers.
    #[must_use]
    pub const fn link_color(&self) -> Rgba {
        self.link_color
    }

    /// Living members in spawn order.
    #[must_use]
    pub fn alive(&self) -> &[CombatantId] {
        &self.alive
    }

    /// Fallen members in death order.
    #[must_use]
    pub fn dead(&self) -> &[CombatantId] {
        &self.dead
    }

    /// All members in spawn order.
    #[must_use]
    pub fn roster(&self) -> &[CombatantId] {
        &self.roster
    }

    /// Whether `id` belongs to this team.
    #[must_use]
    pub fn contains(&self, id: CombatantId) -> bool {
        self.roster.contains(&id)
    }

    /// Whether no member is left alive.
    #[must_use]
    pub fn is_wiped_out(&self) -> bool {
        self.alive.is_empty()
    }

    /// Move `id` from alive to dead.
    ///
    /// Returns `false` and changes nothing if `id` is already dead or is
    /// not a living member.
    pub fn mark_dead(&mut self, id: CombatantId) -> bool {
        let Some(index) = self.alive.iter().position(|&member| member == id) else {
            return false;
        };
        self.alive.remove(index);
        self.dead.push(id);
        true
    }

    /// Put every member back in the alive set, in spawn order.
    pub fn restore_all(&mut self) {
        self.alive.clone_from(&self.roster);
        self.dead.clear();
    }

    /// The living member closest to `point`.
    ///
    /// Compares squared distances; on a tie the member earlier in the
    /// alive order wins. `None` when nobody is alive. Members whose id
    /// does not resolve in `arena` are skipped.
    #[must_use]
    pub fn nearest_alive(&self, point: Vec2Fixed, arena: &CombatantArena) -> Option<CombatantId> {
        let mut nearest = None;
        let mut min_dist_sq = I64F64::MAX;

        for &id in &self.alive {
            let Some(member) = arena.get(id) else {
                continue;
            };
            let dist_sq = member.position.distance_squared_wide(point);
            if nearest.is_none() || dist_sq < min_dist_sq {
                nearest = Some(id);
                min_dist_sq = dist_sq;
            }
        }

        nearest
    }
}

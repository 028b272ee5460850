//! Combatants and the arena that stores them.
//!
//! A combatant is the leaf entity of the simulation: health, team,
//! position and a lookup-only reference to its current target. All
//! cross references (team membership, targets, links) go through
//! [`CombatantId`], an index into the [`CombatantArena`], so nothing
//! owns anything it points at and a dead target simply stops resolving
//! as alive.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{CombatantSpawn, CombatantStats};
use crate::math::{Fixed, Vec2Fixed};

/// Stable identifier of a combatant for the lifetime of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombatantId(pub u32);

impl CombatantId {
    /// Index into the arena's storage.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which of the two teams a combatant fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TeamSide {
    /// The first configured team.
    First,
    /// The second configured team.
    Second,
}

impl TeamSide {
    /// Both sides in processing order.
    pub const BOTH: [TeamSide; 2] = [TeamSide::First, TeamSide::Second];

    /// The other side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }

    /// Index of this side in a two-element array.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}

/// What a call to [`Combatant::apply_damage`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageOutcome {
    /// Damage taken, still alive.
    Hit,
    /// This hit crossed health from positive to zero or below.
    Killed,
    /// The combatant was already dead; nothing changed.
    AlreadyDead,
}

/// A single simulated fighter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    id: CombatantId,
    team: TeamSide,
    stats: CombatantStats,
    spawn_position: Vec2Fixed,
    /// Current world position.
    pub position: Vec2Fixed,
    #[serde(with = "crate::math::fixed_serde")]
    health: Fixed,
    died: bool,
    target: Option<CombatantId>,
    sensing: bool,
}

impl Combatant {
    /// Create a combatant at full health with sensing enabled.
    #[must_use]
    pub fn new(id: CombatantId, team: TeamSide, spawn: CombatantSpawn) -> Self {
        Self {
            id,
            team,
            stats: spawn.stats,
            spawn_position: spawn.position,
            position: spawn.position,
            health: spawn.stats.max_health,
            died: false,
            target: None,
            sensing: true,
        }
    }

    /// This combatant's id.
    #[must_use]
    pub const fn id(&self) -> CombatantId {
        self.id
    }

    /// Team this combatant belongs to.
    #[must_use]
    pub const fn team(&self) -> TeamSide {
        self.team
    }

    /// Tuning values fixed at spawn.
    #[must_use]
    pub const fn stats(&self) -> &CombatantStats {
        &self.stats
    }

    /// Where this combatant was placed at match setup.
    #[must_use]
    pub const fn spawn_position(&self) -> Vec2Fixed {
        self.spawn_position
    }

    /// Current health. May be negative after overkill.
    #[must_use]
    pub const fn health(&self) -> Fixed {
        self.health
    }

    /// Health restored by [`reset`](Self::reset).
    #[must_use]
    pub const fn max_health(&self) -> Fixed {
        self.stats.max_health
    }

    /// Body radius used as stopping distance.
    #[must_use]
    pub const fn radius(&self) -> Fixed {
        self.stats.body_radius
    }

    /// Damage per second dealt while in contact.
    #[must_use]
    pub const fn damage_per_second(&self) -> Fixed {
        self.stats.damage_per_second
    }

    /// Whether health is above zero.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > Fixed::ZERO
    }

    /// Whether the death transition has happened since the last reset.
    #[must_use]
    pub const fn has_died(&self) -> bool {
        self.died
    }

    /// Whether this combatant currently produces and receives contacts.
    #[must_use]
    pub const fn is_sensing(&self) -> bool {
        self.sensing
    }

    /// Current target, if any. Lookup only; the target may have died since.
    #[must_use]
    pub const fn target(&self) -> Option<CombatantId> {
        self.target
    }

    /// Subtract `amount` from health.
    ///
    /// Negative amounts count as zero. Crossing from alive to dead sets the
    /// died flag and reports [`DamageOutcome::Killed`] exactly once; later
    /// hits report [`DamageOutcome::AlreadyDead`] and leave health alone.
    pub fn apply_damage(&mut self, amount: Fixed) -> DamageOutcome {
        if !self.is_alive() {
            return DamageOutcome::AlreadyDead;
        }
        self.health -= amount.max(Fixed::ZERO);
        if self.is_alive() {
            DamageOutcome::Hit
        } else {
            self.died = true;
            DamageOutcome::Killed
        }
    }

    /// Restore full health, forget the target and re-enable sensing.
    pub fn reset(&mut self) {
        self.health = self.stats.max_health;
        self.died = false;
        self.target = None;
        self.sensing = true;
    }

    /// Point this combatant at `target`. No validation happens here.
    pub fn set_target(&mut self, target: CombatantId) {
        self.target = Some(target);
    }

    /// Forget the current target.
    pub fn clear_target(&mut self) {
        self.target = None;
    }

    /// Stop producing and receiving contacts.
    pub fn disable_sensing(&mut self) {
        self.sensing = false;
    }

    /// Move towards a target body, stopping where the two bodies touch.
    ///
    /// Travels at most `speed * dt`. Overlapping bodies back away until
    /// they touch again.
    pub fn step_towards(&mut self, target_position: Vec2Fixed, target_radius: Fixed, dt: Fixed) {
        let dist = self.position.distance(target_position);
        if dist == Fixed::ZERO {
            return;
        }
        let gap = dist - target_radius - self.radius();
        let stop = self.position + (target_position - self.position).scale(gap.saturating_div(dist));
        self.position = self.position.move_towards(stop, self.stats.speed * dt);
    }
}

/// Flat storage of every combatant, indexed by [`CombatantId`].
///
/// Combatants are never removed during a match, so ids stay valid and
/// iteration order is spawn order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantArena {
    combatants: Vec<Combatant>,
}

impl CombatantArena {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a combatant and return its id.
    pub fn spawn(&mut self, team: TeamSide, spawn: CombatantSpawn) -> CombatantId {
        let id = CombatantId(self.combatants.len() as u32);
        self.combatants.push(Combatant::new(id, team, spawn));
        id
    }

    /// Get a combatant by id.
    #[must_use]
    pub fn get(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.get(id.index())
    }

    /// Get a mutable reference to a combatant by id.
    pub fn get_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.combatants.get_mut(id.index())
    }

    /// Whether `id` resolves to a living combatant.
    #[must_use]
    pub fn is_alive(&self, id: CombatantId) -> bool {
        self.get(id).is_some_and(Combatant::is_alive)
    }

    /// Number of combatants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    /// Iterate in spawn order.
    pub fn iter(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.iter()
    }

    /// Iterate mutably in spawn order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Combatant> {
        self.combatants.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fighter() -> Combatant {
        Combatant::new(
            CombatantId(0),
            TeamSide::First,
            CombatantSpawn::at(Vec2Fixed::ZERO),
        )
    }

    #[test]
    fn test_spawns_alive_at_full_health() {
        let c = fighter();
        assert!(c.is_alive());
        assert!(!c.has_died());
        assert!(c.is_sensing());
        assert_eq!(c.health(), Fixed::from_num(100));
        assert_eq!(c.target(), None);
    }

    #[test]
    fn test_damage_reduces_health() {
        let mut c = fighter();
        assert_eq!(c.apply_damage(Fixed::from_num(30)), DamageOutcome::Hit);
        assert_eq!(c.health(), Fixed::from_num(70));
    }

    #[test]
    fn test_zero_damage_changes_nothing() {
        let mut c = fighter();
        assert_eq!(c.apply_damage(Fixed::ZERO), DamageOutcome::Hit);
        assert_eq!(c.health(), c.max_health());
    }

    #[test]
    fn test_negative_damage_does_not_heal() {
        let mut c = fighter();
        c.apply_damage(Fixed::from_num(10));
        c.apply_damage(Fixed::from_num(-50));
        assert_eq!(c.health(), Fixed::from_num(90));
    }

    #[test]
    fn test_killed_reported_once() {
        let mut c = fighter();
        assert_eq!(c.apply_damage(Fixed::from_num(150)), DamageOutcome::Killed);
        assert!(!c.is_alive());
        assert!(c.has_died());
        // Overkill stays internal
        assert_eq!(c.health(), Fixed::from_num(-50));

        assert_eq!(
            c.apply_damage(Fixed::from_num(10)),
            DamageOutcome::AlreadyDead
        );
        assert_eq!(c.health(), Fixed::from_num(-50));
    }

    #[test]
    fn test_exactly_zero_health_is_dead() {
        let mut c = fighter();
        assert_eq!(c.apply_damage(Fixed::from_num(100)), DamageOutcome::Killed);
        assert!(!c.is_alive());
    }

    #[test]
    fn test_reset_restores_everything() {
        let mut c = fighter();
        c.set_target(CombatantId(3));
        c.apply_damage(Fixed::from_num(500));
        c.disable_sensing();

        c.reset();
        assert!(c.is_alive());
        assert!(!c.has_died());
        assert!(c.is_sensing());
        assert_eq!(c.health(), c.max_health());
        assert_eq!(c.target(), None);
    }

    #[test]
    fn test_step_towards_stops_at_touching_distance() {
        let mut c = fighter();
        let target = Vec2Fixed::from_ints(3, 0);
        // Plenty of time to arrive
        for _ in 0..10 {
            c.step_towards(target, Fixed::from_num(0.5), Fixed::ONE);
        }
        // 3 - 0.5 - 0.5 = 2
        let eps = Fixed::ONE / Fixed::from_num(1000);
        assert!((c.position.x - Fixed::from_num(2)).abs() < eps);
    }

    #[test]
    fn test_step_towards_respects_speed() {
        let mut c = fighter();
        c.step_towards(Vec2Fixed::from_ints(100, 0), Fixed::from_num(0.5), Fixed::ONE);
        let eps = Fixed::ONE / Fixed::from_num(1000);
        assert!((c.position.x - Fixed::ONE).abs() < eps);
    }

    #[test]
    fn test_step_towards_extreme_distances() {
        let eps = Fixed::ONE / Fixed::from_num(1000);

        let mut far = fighter();
        far.step_towards(Vec2Fixed::from_ints(2_000_000, 0), Fixed::from_num(0.5), Fixed::ONE);
        assert!((far.position.x - Fixed::ONE).abs() < eps);

        let mut near = fighter();
        let on_top = Vec2Fixed::new(Fixed::DELTA, Fixed::ZERO);
        near.step_towards(on_top, Fixed::from_num(0.5), Fixed::ONE);
        assert!(near.position.x.abs() <= Fixed::ONE + eps);
    }

    #[test]
    fn test_arena_ids_are_spawn_order() {
        let mut arena = CombatantArena::new();
        let a = arena.spawn(TeamSide::First, CombatantSpawn::at(Vec2Fixed::ZERO));
        let b = arena.spawn(TeamSide::Second, CombatantSpawn::at(Vec2Fixed::ZERO));
        assert_eq!(a, CombatantId(0));
        assert_eq!(b, CombatantId(1));
        assert_eq!(arena.get(b).unwrap().team(), TeamSide::Second);
        assert!(arena.get(CombatantId(7)).is_none());
        assert!(!arena.is_alive(CombatantId(7)));
    }

    #[test]
    fn test_combatant_ron_roundtrip() {
        let mut arena = CombatantArena::new();
        let id = arena.spawn(TeamSide::Second, CombatantSpawn::at(Vec2Fixed::from_ints(3, -2)));
        let c = arena.get_mut(id).unwrap();
        c.apply_damage(Fixed::from_num(12.5));
        c.set_target(CombatantId(4));

        let text = ron::to_string(&arena).unwrap();
        let back: CombatantArena = ron::from_str(&text).unwrap();
        assert_eq!(back, arena);
        assert_eq!(back.get(id).unwrap().health(), Fixed::from_num(87.5));
    }

    #[test]
    fn test_team_side_opponent() {
        assert_eq!(TeamSide::First.opponent(), TeamSide::Second);
        assert_eq!(TeamSide::Second.opponent(), TeamSide::First);
    }
}

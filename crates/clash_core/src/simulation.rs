//! Match controller: the tick loop, death resolution and targeting.
//!
//! The [`Simulation`] owns every combatant, both teams and the link
//! registry. Contact handlers ([`on_engage`](Simulation::on_engage),
//! [`on_sustain`](Simulation::on_sustain),
//! [`on_disengage`](Simulation::on_disengage)) apply damage as the host's
//! physics reports overlaps; [`tick`](Simulation::tick) then settles the
//! consequences once per fixed step.
//!
//! # Determinism
//!
//! - All quantities are fixed-point ([`Fixed`])
//! - Iteration follows spawn order (teams keep their alive lists ordered)
//! - Same configuration and same event sequence give the same state hash
//!
//! # Example
//!
//! ```
//! use clash_core::config::{CombatantSpawn, MatchConfig, TeamConfig};
//! use clash_core::link::Rgba;
//! use clash_core::math::{Fixed, Vec2Fixed};
//! use clash_core::simulation::Simulation;
//!
//! let config = MatchConfig::new(
//!     TeamConfig::new("red", Rgba::RED).with_member(CombatantSpawn::at(Vec2Fixed::ZERO)),
//!     TeamConfig::new("blue", Rgba::BLUE)
//!         .with_member(CombatantSpawn::at(Vec2Fixed::from_ints(4, 0))),
//! );
//! let mut sim = Simulation::from_config(&config).unwrap();
//! sim.start().unwrap();
//!
//! let events = sim.tick(sim.fixed_dt());
//! assert_eq!(events.retargets.len(), 2);
//! assert_eq!(sim.get_tick(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::combatant::{Combatant, CombatantArena, CombatantId, DamageOutcome, TeamSide};
use crate::config::MatchConfig;
use crate::error::{ClashError, Result};
use crate::link::{LineBuffer, LinkDisplay, LinkRegistry, Rgba};
use crate::math::{Fixed, Vec2Fixed};
use crate::team::Team;

/// Lifecycle of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchState {
    /// Set up but not started, or reset.
    #[default]
    Idle,
    /// Contacts are routed and ticks run.
    Running,
    /// Contacts are dropped and ticks do nothing until resumed.
    Paused,
}

/// How a match ended, as far as the core can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// Only this side has living members.
    Victory(TeamSide),
    /// Nobody is left alive.
    Draw,
}

/// Damage applied by one contact callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageEvent {
    /// Who dealt the damage.
    pub attacker: CombatantId,
    /// Who took it.
    pub defender: CombatantId,
    /// Amount subtracted from the defender's health.
    pub amount: Fixed,
    /// What the hit did.
    pub outcome: DamageOutcome,
}

/// A combatant's target changed during targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retarget {
    /// Combatant whose target changed.
    pub combatant: CombatantId,
    /// Previous target.
    pub previous: Option<CombatantId>,
    /// New target; `None` once the enemy team is wiped out.
    pub target: Option<CombatantId>,
}

/// Everything that happened since the previous tick.
///
/// Hosts use these to drive effects, sounds or match statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Tick number after this tick completed.
    pub tick: u64,
    /// Damage dealt by contact callbacks since the previous tick.
    ///
    /// Only damage dealt while the match is running is recorded.
    pub damage: Vec<DamageEvent>,
    /// Combatants moved to their team's dead set this tick.
    pub deaths: Vec<CombatantId>,
    /// Target changes made this tick.
    pub retargets: Vec<Retarget>,
}

/// The combat simulation for one arena.
///
/// # Tick order
///
/// 1. **Death resolution**, first team then second team
/// 2. **Targeting**, first team then second team
///
/// Every death of a tick is settled before anyone picks a target, so a
/// combatant that died this tick is never chosen.
#[derive(Debug, Clone)]
pub struct Simulation<D = LineBuffer> {
    arena: CombatantArena,
    teams: [Team; 2],
    links: LinkRegistry<D>,
    state: MatchState,
    tick: u64,
    elapsed: Fixed,
    fixed_dt: Fixed,
    pending_damage: Vec<DamageEvent>,
}

impl Simulation<LineBuffer> {
    /// Build a simulation that records links in memory.
    pub fn from_config(config: &MatchConfig) -> Result<Self> {
        Self::new(config, LineBuffer::new())
    }
}

impl<D: LinkDisplay> Simulation<D> {
    /// Build a simulation from a validated configuration.
    ///
    /// # Errors
    ///
    /// [`ClashError::TeamCount`] unless exactly two teams are configured,
    /// [`ClashError::InvalidConfig`] for unusable stats or time step.
    pub fn new(config: &MatchConfig, display: D) -> Result<Self> {
        config.validate()?;

        let mut arena = CombatantArena::new();
        let mut build_team = |side: TeamSide| {
            let team_config = &config.teams[side.index()];
            let members = team_config
                .members
                .iter()
                .map(|spawn| arena.spawn(side, *spawn))
                .collect();
            Team::new(side, &team_config.name, team_config.link_color, members)
        };
        let teams = [build_team(TeamSide::First), build_team(TeamSide::Second)];

        tracing::debug!(
            first = teams[0].roster().len(),
            second = teams[1].roster().len(),
            "Match set up"
        );

        Ok(Self {
            arena,
            teams,
            links: LinkRegistry::new(display),
            state: MatchState::Idle,
            tick: 0,
            elapsed: Fixed::ZERO,
            fixed_dt: config.fixed_dt,
            pending_damage: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> MatchState {
        self.state
    }

    /// Whether contacts are being routed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == MatchState::Running
    }

    /// Number of ticks run since start or the last reset.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Match time accumulated by ticks.
    #[must_use]
    pub const fn elapsed(&self) -> Fixed {
        self.elapsed
    }

    /// Configured fixed time step.
    #[must_use]
    pub const fn fixed_dt(&self) -> Fixed {
        self.fixed_dt
    }

    /// All combatants.
    #[must_use]
    pub const fn arena(&self) -> &CombatantArena {
        &self.arena
    }

    /// One combatant.
    #[must_use]
    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.arena.get(id)
    }

    /// Mutable access to one combatant, for hosts that move bodies themselves.
    pub fn combatant_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.arena.get_mut(id)
    }

    /// One team.
    #[must_use]
    pub fn team(&self, side: TeamSide) -> &Team {
        &self.teams[side.index()]
    }

    /// Side a combatant fights for.
    #[must_use]
    pub fn team_of(&self, id: CombatantId) -> Option<TeamSide> {
        self.arena.get(id).map(Combatant::team)
    }

    /// The link registry and its display.
    #[must_use]
    pub const fn links(&self) -> &LinkRegistry<D> {
        &self.links
    }

    /// The living enemy closest to `id`, ties going to the earliest spawned.
    #[must_use]
    pub fn nearest_alive_enemy(&self, id: CombatantId) -> Option<CombatantId> {
        let combatant = self.arena.get(id)?;
        self.team(combatant.team().opponent())
            .nearest_alive(combatant.position, &self.arena)
    }

    /// Winner once a side has no living members.
    ///
    /// Reads the teams' alive sets, so deaths count only after the tick
    /// that resolves them.
    #[must_use]
    pub fn outcome(&self) -> Option<MatchOutcome> {
        match (
            self.teams[0].is_wiped_out(),
            self.teams[1].is_wiped_out(),
        ) {
            (false, false) => None,
            (false, true) => Some(MatchOutcome::Victory(TeamSide::First)),
            (true, false) => Some(MatchOutcome::Victory(TeamSide::Second)),
            (true, true) => Some(MatchOutcome::Draw),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Idle or Paused → Running.
    ///
    /// Binds a link for every ordered pair of living opponents up front
    /// (first team's attackers, then second team's) so that steady-state
    /// contacts never allocate.
    pub fn start(&mut self) -> Result<()> {
        if self.state == MatchState::Running {
            return Err(ClashError::InvalidTransition {
                from: self.state,
                action: "start",
            });
        }

        let first = self.teams[0].alive().to_vec();
        let second = self.teams[1].alive().to_vec();
        self.links.reserve(2 * first.len() * second.len());
        self.bind_links(&first, &second, self.teams[0].link_color());
        self.bind_links(&second, &first, self.teams[1].link_color());

        tracing::info!(
            from = ?self.state,
            links = self.links.bound_count(),
            "Match started"
        );
        self.state = MatchState::Running;
        Ok(())
    }

    /// Running → Paused. Contacts arriving while paused are dropped.
    pub fn pause(&mut self) -> Result<()> {
        if self.state != MatchState::Running {
            return Err(ClashError::InvalidTransition {
                from: self.state,
                action: "pause",
            });
        }
        self.state = MatchState::Paused;
        tracing::info!(tick = self.tick, "Match paused");
        Ok(())
    }

    /// Paused → Running.
    pub fn resume(&mut self) -> Result<()> {
        if self.state != MatchState::Paused {
            return Err(ClashError::InvalidTransition {
                from: self.state,
                action: "resume",
            });
        }
        self.state = MatchState::Running;
        tracing::info!(tick = self.tick, "Match resumed");
        Ok(())
    }

    /// Put everyone back at spawn with full health and return to Idle.
    ///
    /// Link bindings survive; every link is hidden.
    pub fn reset(&mut self) {
        for combatant in self.arena.iter_mut() {
            combatant.reset();
            combatant.position = combatant.spawn_position();
        }
        for team in &mut self.teams {
            team.restore_all();
        }
        self.links.hide_all();
        self.pending_damage.clear();
        self.state = MatchState::Idle;
        self.tick = 0;
        self.elapsed = Fixed::ZERO;
        tracing::info!("Match reset");
    }

    fn bind_links(&mut self, attackers: &[CombatantId], targets: &[CombatantId], color: Rgba) {
        for &attacker in attackers {
            for &target in targets {
                self.links.get_or_create(attacker, target);
                self.links.set_color(attacker, target, color);
            }
        }
    }

    // ------------------------------------------------------------------
    // Contact handlers
    // ------------------------------------------------------------------

    /// Contact began: draw the link, deal no damage yet.
    ///
    /// The caller (normally [`ContactRouter`](crate::contact::ContactRouter))
    /// is responsible for only forwarding contacts while running and from
    /// living attackers.
    pub fn on_engage(
        &mut self,
        attacker: CombatantId,
        defender: CombatantId,
    ) -> Result<DamageOutcome> {
        self.draw_link(attacker, defender)?;
        tracing::debug!(%attacker, %defender, "Engaged");
        self.deal_damage(attacker, defender, Fixed::ZERO)
    }

    /// Contact sustained for `dt`: refresh the link and deal `dps * dt`.
    pub fn on_sustain(
        &mut self,
        attacker: CombatantId,
        defender: CombatantId,
        dt: Fixed,
    ) -> Result<DamageOutcome> {
        let dps = self.draw_link(attacker, defender)?;
        self.deal_damage(attacker, defender, dps * dt)
    }

    /// Contact ended: hide the link and deal one last `dps * dt`.
    pub fn on_disengage(
        &mut self,
        attacker: CombatantId,
        defender: CombatantId,
        dt: Fixed,
    ) -> Result<DamageOutcome> {
        let dps = self.check_opponents(attacker, defender)?.damage_per_second();
        self.links.hide(attacker, defender);
        tracing::debug!(%attacker, %defender, "Disengaged");
        self.deal_damage(attacker, defender, dps * dt)
    }

    /// Returns the attacker after checking both exist on opposing teams.
    fn check_opponents(&self, attacker: CombatantId, defender: CombatantId) -> Result<&Combatant> {
        let a = self
            .arena
            .get(attacker)
            .ok_or(ClashError::UnknownCombatant(attacker))?;
        let d = self
            .arena
            .get(defender)
            .ok_or(ClashError::UnknownCombatant(defender))?;
        if a.team() == d.team() {
            return Err(ClashError::SameTeam { attacker, defender });
        }
        Ok(a)
    }

    /// Show the attacker's link to the defender; returns the attacker's dps.
    fn draw_link(&mut self, attacker: CombatantId, defender: CombatantId) -> Result<Fixed> {
        let a = self.check_opponents(attacker, defender)?;
        let (from, dps, side) = (a.position, a.damage_per_second(), a.team());
        let to = self
            .arena
            .get(defender)
            .map_or(Vec2Fixed::ZERO, |d| d.position);
        let color = self.team(side).link_color();
        self.links.show(attacker, defender, from, to, color);
        Ok(dps)
    }

    fn deal_damage(
        &mut self,
        attacker: CombatantId,
        defender: CombatantId,
        amount: Fixed,
    ) -> Result<DamageOutcome> {
        let target = self
            .arena
            .get_mut(defender)
            .ok_or(ClashError::UnknownCombatant(defender))?;
        let outcome = target.apply_damage(amount);

        if self.is_running() && amount > Fixed::ZERO && outcome != DamageOutcome::AlreadyDead {
            self.pending_damage.push(DamageEvent {
                attacker,
                defender,
                amount,
                outcome,
            });
        }
        if outcome == DamageOutcome::Killed {
            tracing::debug!(%attacker, %defender, "Lethal damage");
        }
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance one fixed step.
    ///
    /// Does nothing unless the match is running. Returns the damage dealt
    /// by contacts since the previous tick together with this tick's
    /// deaths and target changes.
    pub fn tick(&mut self, dt: Fixed) -> TickEvents {
        if !self.is_running() {
            return TickEvents {
                tick: self.tick,
                ..TickEvents::default()
            };
        }

        let mut events = TickEvents {
            damage: std::mem::take(&mut self.pending_damage),
            ..TickEvents::default()
        };

        for side in TeamSide::BOTH {
            events.deaths.extend(self.resolve_deaths(side));
        }
        for side in TeamSide::BOTH {
            events.retargets.extend(self.assign_targets(side));
        }

        self.tick += 1;
        self.elapsed += dt;
        events.tick = self.tick;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    /// Settle every member of `side` whose health ran out.
    fn resolve_deaths(&mut self, side: TeamSide) -> Vec<CombatantId> {
        let fallen: Vec<CombatantId> = self.teams[side.index()]
            .alive()
            .iter()
            .rev()
            .copied()
            .filter(|&id| !self.arena.is_alive(id))
            .collect();

        fallen
            .into_iter()
            .filter(|&id| self.resolve_death(id))
            .collect()
    }

    /// Apply the death side effect to `id` and move it to its team's dead set.
    ///
    /// Disables sensing, clears its target and hides every link where it
    /// is attacker or target. Safe to call again: the links are hidden
    /// again and the team is left alone. Returns whether `id` moved to
    /// the dead set on this call. Living combatants are refused.
    pub fn resolve_death(&mut self, id: CombatantId) -> bool {
        let Some(combatant) = self.arena.get_mut(id) else {
            tracing::warn!(%id, "Cannot resolve death of unknown combatant");
            return false;
        };
        if combatant.is_alive() {
            tracing::warn!(%id, "Refusing to resolve death of a living combatant");
            return false;
        }
        combatant.disable_sensing();
        combatant.clear_target();
        let side = combatant.team();

        self.links.hide_all_involving(id);
        let moved = self.teams[side.index()].mark_dead(id);
        if moved {
            tracing::info!(%id, team = self.teams[side.index()].name(), tick = self.tick, "Combatant died");
        }
        moved
    }

    /// Give every living member of `side` without a live target the nearest enemy.
    fn assign_targets(&mut self, side: TeamSide) -> Vec<Retarget> {
        let enemies = &self.teams[side.opponent().index()];
        let mut changes = Vec::new();

        for &id in self.teams[side.index()].alive() {
            let Some(combatant) = self.arena.get(id) else {
                continue;
            };
            let previous = combatant.target();
            let needs_target = previous.map_or(true, |target| !self.arena.is_alive(target));
            if !needs_target {
                continue;
            }
            let target = enemies.nearest_alive(combatant.position, &self.arena);
            if target != previous {
                changes.push(Retarget {
                    combatant: id,
                    previous,
                    target,
                });
            }
        }

        for change in &changes {
            if let Some(combatant) = self.arena.get_mut(change.combatant) {
                match change.target {
                    Some(target) => combatant.set_target(target),
                    None => combatant.clear_target(),
                }
            }
        }

        changes
    }

    /// Point `attacker` at `target` explicitly.
    ///
    /// # Errors
    ///
    /// Unknown ids, a target on the attacker's own team, or a dead target.
    pub fn set_target(&mut self, attacker: CombatantId, target: CombatantId) -> Result<()> {
        let target_combatant = self
            .arena
            .get(target)
            .ok_or(ClashError::UnknownCombatant(target))?;
        let target_team = target_combatant.team();
        let target_alive = target_combatant.is_alive();

        let holder = self
            .arena
            .get_mut(attacker)
            .ok_or(ClashError::UnknownCombatant(attacker))?;
        if holder.team() == target_team {
            return Err(ClashError::InvalidTarget {
                attacker,
                target,
                reason: "target is on the same team",
            });
        }
        if !target_alive {
            return Err(ClashError::InvalidTarget {
                attacker,
                target,
                reason: "target is dead",
            });
        }
        holder.set_target(target);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Movement
    // ------------------------------------------------------------------

    /// Move every living combatant towards its target for `dt`.
    ///
    /// Runs in spawn order against current positions. Combatants without
    /// a living target stand still. Does nothing unless running.
    pub fn advance_movement(&mut self, dt: Fixed) {
        if !self.is_running() {
            return;
        }
        for index in 0..self.arena.len() {
            let id = CombatantId(index as u32);
            let Some(target_id) = self
                .arena
                .get(id)
                .filter(|c| c.is_alive())
                .and_then(Combatant::target)
            else {
                continue;
            };
            let Some((target_position, target_radius)) = self
                .arena
                .get(target_id)
                .filter(|t| t.is_alive())
                .map(|t| (t.position, t.radius()))
            else {
                continue;
            };
            if let Some(combatant) = self.arena.get_mut(id) {
                combatant.step_towards(target_position, target_radius, dt);
            }
        }
    }

    // ------------------------------------------------------------------
    // Hashing
    // ------------------------------------------------------------------

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    /// Display state is not included.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.elapsed.to_bits().hash(&mut hasher);
        self.state.hash(&mut hasher);

        self.arena.len().hash(&mut hasher);
        for combatant in self.arena.iter() {
            combatant.id().hash(&mut hasher);
            combatant.position.x.to_bits().hash(&mut hasher);
            combatant.position.y.to_bits().hash(&mut hasher);
            combatant.health().to_bits().hash(&mut hasher);
            combatant.has_died().hash(&mut hasher);
            combatant.is_sensing().hash(&mut hasher);
            combatant.target().hash(&mut hasher);
        }

        for team in &self.teams {
            team.alive().hash(&mut hasher);
            team.dead().hash(&mut hasher);
        }

        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CombatantSpawn, CombatantStats, TeamConfig};

    fn at(x: i32, y: i32) -> CombatantSpawn {
        CombatantSpawn::at(Vec2Fixed::from_ints(x, y))
    }

    fn config(first: &[(i32, i32)], second: &[(i32, i32)]) -> MatchConfig {
        let mut red = TeamConfig::new("red", Rgba::RED);
        for &(x, y) in first {
            red = red.with_member(at(x, y));
        }
        let mut blue = TeamConfig::new("blue", Rgba::BLUE);
        for &(x, y) in second {
            blue = blue.with_member(at(x, y));
        }
        MatchConfig::new(red, blue).with_fixed_dt(Fixed::ONE)
    }

    fn running(first: &[(i32, i32)], second: &[(i32, i32)]) -> Simulation {
        let mut sim = Simulation::from_config(&config(first, second)).unwrap();
        sim.start().unwrap();
        sim
    }

    fn kill(sim: &mut Simulation, id: CombatantId) {
        sim.arena.get_mut(id).unwrap().apply_damage(Fixed::from_num(1000));
    }

    #[test]
    fn test_new_rejects_wrong_team_count() {
        let mut cfg = config(&[(0, 0)], &[(1, 0)]);
        cfg.teams.push(TeamConfig::new("green", Rgba::GREEN));
        assert_eq!(
            Simulation::from_config(&cfg).unwrap_err(),
            ClashError::TeamCount { found: 3 }
        );
    }

    #[test]
    fn test_new_assigns_ids_in_team_order() {
        let sim = Simulation::from_config(&config(&[(0, 0), (1, 0)], &[(5, 0)])).unwrap();
        assert_eq!(
            sim.team(TeamSide::First).alive(),
            &[CombatantId(0), CombatantId(1)]
        );
        assert_eq!(sim.team(TeamSide::Second).alive(), &[CombatantId(2)]);
        assert_eq!(sim.state(), MatchState::Idle);
    }

    #[test]
    fn test_state_transitions() {
        let mut sim = Simulation::from_config(&config(&[(0, 0)], &[(1, 0)])).unwrap();
        assert!(sim.pause().is_err());
        assert!(sim.resume().is_err());

        sim.start().unwrap();
        assert!(sim.is_running());
        assert!(matches!(
            sim.start(),
            Err(ClashError::InvalidTransition { action: "start", .. })
        ));

        sim.pause().unwrap();
        assert_eq!(sim.state(), MatchState::Paused);
        sim.resume().unwrap();
        assert!(sim.is_running());

        sim.pause().unwrap();
        sim.start().unwrap();
        assert!(sim.is_running());
    }

    #[test]
    fn test_start_binds_every_ordered_pair() {
        let sim = running(&[(0, 0), (1, 0)], &[(5, 0), (6, 0), (7, 0)]);
        assert_eq!(sim.links().bound_count(), 12);
        assert_eq!(sim.links().pool_size(), 12);

        // Team one's attacker block comes first in the pool
        assert_eq!(
            sim.links().handle(CombatantId(0), CombatantId(2)),
            Some(crate::link::LinkHandle(0))
        );
        assert_eq!(
            sim.links().handle(CombatantId(2), CombatantId(0)),
            Some(crate::link::LinkHandle(6))
        );
    }

    #[test]
    fn test_start_colours_links_by_attacker_team() {
        let sim = running(&[(0, 0)], &[(5, 0)]);
        let red_handle = sim.links().handle(CombatantId(0), CombatantId(1)).unwrap();
        let blue_handle = sim.links().handle(CombatantId(1), CombatantId(0)).unwrap();
        assert_eq!(sim.links().display().line(red_handle).unwrap().color, Rgba::RED);
        assert_eq!(sim.links().display().line(blue_handle).unwrap().color, Rgba::BLUE);
    }

    #[test]
    fn test_restart_does_not_grow_pool() {
        let mut sim = running(&[(0, 0)], &[(5, 0)]);
        sim.pause().unwrap();
        sim.start().unwrap();
        sim.reset();
        sim.start().unwrap();
        assert_eq!(sim.links().pool_size(), 2);
    }

    #[test]
    fn test_mutual_sustain_damage() {
        let mut sim = running(&[(0, 0)], &[(1, 0)]);
        let (a, b) = (CombatantId(0), CombatantId(1));

        sim.on_sustain(a, b, Fixed::ONE).unwrap();
        sim.on_sustain(b, a, Fixed::ONE).unwrap();

        assert_eq!(sim.combatant(a).unwrap().health(), Fixed::from_num(70));
        assert_eq!(sim.combatant(b).unwrap().health(), Fixed::from_num(70));
    }

    #[test]
    fn test_engage_shows_link_without_damage() {
        let mut sim = running(&[(0, 0)], &[(1, 0)]);
        let (a, b) = (CombatantId(0), CombatantId(1));

        assert_eq!(sim.on_engage(a, b).unwrap(), DamageOutcome::Hit);
        assert_eq!(sim.combatant(b).unwrap().health(), Fixed::from_num(100));

        let handle = sim.links().handle(a, b).unwrap();
        let line = sim.links().display().line(handle).unwrap();
        assert!(line.is_visible());
        assert_eq!(line.from, Vec2Fixed::from_ints(0, 0));
        assert_eq!(line.to, Vec2Fixed::from_ints(1, 0));

        // Zero damage is not reported
        assert!(sim.tick(Fixed::ONE).damage.is_empty());
    }

    #[test]
    fn test_disengage_hides_link_and_deals_final_tick() {
        let mut sim = running(&[(0, 0)], &[(1, 0)]);
        let (a, b) = (CombatantId(0), CombatantId(1));

        sim.on_engage(a, b).unwrap();
        sim.on_disengage(a, b, Fixed::from_num(0.5)).unwrap();

        assert_eq!(sim.combatant(b).unwrap().health(), Fixed::from_num(85));
        let handle = sim.links().handle(a, b).unwrap();
        assert!(!sim.links().display().line(handle).unwrap().is_visible());
    }

    #[test]
    fn test_contact_handlers_reject_teammates() {
        let mut sim = running(&[(0, 0), (1, 0)], &[(5, 0)]);
        assert!(matches!(
            sim.on_sustain(CombatantId(0), CombatantId(1), Fixed::ONE),
            Err(ClashError::SameTeam { .. })
        ));
        assert_eq!(
            sim.combatant(CombatantId(1)).unwrap().health(),
            Fixed::from_num(100)
        );
        assert!(matches!(
            sim.on_engage(CombatantId(0), CombatantId(9)),
            Err(ClashError::UnknownCombatant(_))
        ));
    }

    #[test]
    fn test_first_tick_assigns_nearest_targets() {
        let mut sim = running(&[(0, 0)], &[(10, 0), (3, 0)]);
        let events = sim.tick(Fixed::ONE);

        assert_eq!(
            sim.combatant(CombatantId(0)).unwrap().target(),
            Some(CombatantId(2))
        );
        assert_eq!(
            sim.combatant(CombatantId(1)).unwrap().target(),
            Some(CombatantId(0))
        );
        assert_eq!(events.retargets.len(), 3);
        assert_eq!(events.tick, 1);
    }

    #[test]
    fn test_targets_are_sticky_while_alive() {
        let mut sim = running(&[(0, 0)], &[(10, 0)]);
        sim.tick(Fixed::ONE);

        sim.combatant_mut(CombatantId(0)).unwrap().position = Vec2Fixed::from_ints(50, 0);
        let events = sim.tick(Fixed::ONE);
        assert!(events.retargets.is_empty());
    }

    #[test]
    fn test_death_resolution_and_retarget_same_tick() {
        let mut sim = running(&[(0, 0)], &[(2, 0), (9, 0)]);
        let (a, near, far) = (CombatantId(0), CombatantId(1), CombatantId(2));
        sim.tick(Fixed::ONE);
        assert_eq!(sim.combatant(a).unwrap().target(), Some(near));

        sim.on_engage(a, near).unwrap();
        sim.on_engage(near, a).unwrap();
        kill(&mut sim, near);

        let events = sim.tick(Fixed::ONE);
        assert_eq!(events.deaths, vec![near]);
        assert_eq!(sim.team(TeamSide::Second).dead(), &[near]);
        assert_eq!(sim.team(TeamSide::Second).alive(), &[far]);
        assert_eq!(sim.combatant(a).unwrap().target(), Some(far));
        assert!(!sim.combatant(near).unwrap().is_sensing());
        assert_eq!(sim.combatant(near).unwrap().target(), None);
        assert_eq!(sim.links().display().visible_count(), 0);
    }

    #[test]
    fn test_target_cleared_when_enemy_wiped_out() {
        let mut sim = running(&[(0, 0)], &[(2, 0)]);
        sim.tick(Fixed::ONE);
        kill(&mut sim, CombatantId(1));

        let events = sim.tick(Fixed::ONE);
        assert_eq!(sim.combatant(CombatantId(0)).unwrap().target(), None);
        assert_eq!(
            events.retargets,
            vec![Retarget {
                combatant: CombatantId(0),
                previous: Some(CombatantId(1)),
                target: None,
            }]
        );
        assert_eq!(sim.outcome(), Some(MatchOutcome::Victory(TeamSide::First)));
    }

    #[test]
    fn test_resolve_death_is_idempotent() {
        let mut sim = running(&[(0, 0)], &[(2, 0)]);
        let (a, b) = (CombatantId(0), CombatantId(1));
        sim.on_engage(a, b).unwrap();
        kill(&mut sim, b);

        assert!(sim.resolve_death(b));
        assert!(!sim.resolve_death(b));
        assert_eq!(sim.team(TeamSide::Second).dead(), &[b]);
        assert!(sim.team(TeamSide::Second).alive().is_empty());
        assert_eq!(sim.links().display().visible_count(), 0);
    }

    #[test]
    fn test_resolve_death_refuses_living() {
        let mut sim = running(&[(0, 0)], &[(2, 0)]);
        assert!(!sim.resolve_death(CombatantId(1)));
        assert!(sim.team(TeamSide::Second).dead().is_empty());
    }

    #[test]
    fn test_tick_does_nothing_unless_running() {
        let mut sim = running(&[(0, 0)], &[(2, 0)]);
        sim.pause().unwrap();
        kill(&mut sim, CombatantId(1));

        let events = sim.tick(Fixed::ONE);
        assert!(events.deaths.is_empty());
        assert_eq!(sim.get_tick(), 0);
        assert!(sim.team(TeamSide::Second).dead().is_empty());
    }

    #[test]
    fn test_tick_reports_pending_damage_once() {
        let mut sim = running(&[(0, 0)], &[(2, 0)]);
        sim.on_sustain(CombatantId(0), CombatantId(1), Fixed::ONE).unwrap();

        let events = sim.tick(Fixed::ONE);
        assert_eq!(events.damage.len(), 1);
        assert_eq!(events.damage[0].amount, Fixed::from_num(30));
        assert!(sim.tick(Fixed::ONE).damage.is_empty());
    }

    #[test]
    fn test_damage_outside_running_is_not_queued() {
        let mut sim = Simulation::from_config(&config(&[(0, 0)], &[(2, 0)])).unwrap();
        let (a, b) = (CombatantId(0), CombatantId(1));
        sim.on_sustain(a, b, Fixed::ONE).unwrap();
        assert_eq!(sim.combatant(b).unwrap().health(), Fixed::from_num(70));

        sim.start().unwrap();
        sim.pause().unwrap();
        sim.on_sustain(a, b, Fixed::ONE).unwrap();
        assert_eq!(sim.combatant(b).unwrap().health(), Fixed::from_num(40));
        assert!(sim.pending_damage.is_empty());

        sim.resume().unwrap();
        assert!(sim.tick(Fixed::ONE).damage.is_empty());
    }

    #[test]
    fn test_same_tick_deaths_settle_latest_spawn_first() {
        let mut sim = running(&[(0, 0)], &[(2, 0), (3, 0), (9, 0)]);
        let (first, second) = (CombatantId(1), CombatantId(2));
        kill(&mut sim, first);
        kill(&mut sim, second);

        let events = sim.tick(Fixed::ONE);
        assert_eq!(events.deaths, vec![second, first]);
        assert_eq!(sim.team(TeamSide::Second).dead(), &[second, first]);
        assert_eq!(sim.team(TeamSide::Second).alive(), &[CombatantId(3)]);
    }

    #[test]
    fn test_set_target_validation() {
        let mut sim = running(&[(0, 0), (1, 0)], &[(5, 0)]);
        assert!(matches!(
            sim.set_target(CombatantId(0), CombatantId(1)),
            Err(ClashError::InvalidTarget { .. })
        ));

        sim.set_target(CombatantId(0), CombatantId(2)).unwrap();
        assert_eq!(
            sim.combatant(CombatantId(0)).unwrap().target(),
            Some(CombatantId(2))
        );

        kill(&mut sim, CombatantId(2));
        assert!(matches!(
            sim.set_target(CombatantId(1), CombatantId(2)),
            Err(ClashError::InvalidTarget { reason: "target is dead", .. })
        ));
    }

    #[test]
    fn test_reset_restores_match() {
        let mut sim = running(&[(0, 0)], &[(2, 0)]);
        sim.tick(Fixed::ONE);
        sim.advance_movement(Fixed::ONE);
        sim.on_sustain(CombatantId(0), CombatantId(1), Fixed::ONE).unwrap();
        kill(&mut sim, CombatantId(1));
        sim.tick(Fixed::ONE);

        sim.reset();
        assert_eq!(sim.state(), MatchState::Idle);
        assert_eq!(sim.get_tick(), 0);
        assert_eq!(sim.team(TeamSide::Second).alive(), &[CombatantId(1)]);
        for combatant in sim.arena().iter() {
            assert!(combatant.is_alive());
            assert!(combatant.is_sensing());
            assert_eq!(combatant.position, combatant.spawn_position());
            assert_eq!(combatant.target(), None);
        }
        assert_eq!(sim.links().display().visible_count(), 0);
        assert_eq!(sim.outcome(), None);
    }

    #[test]
    fn test_movement_closes_distance() {
        let mut sim = running(&[(0, 0)], &[(10, 0)]);
        sim.tick(Fixed::ONE);
        sim.advance_movement(Fixed::ONE);

        let eps = Fixed::ONE / Fixed::from_num(1000);
        let red = sim.combatant(CombatantId(0)).unwrap().position;
        let blue = sim.combatant(CombatantId(1)).unwrap().position;
        assert!((red.x - Fixed::ONE).abs() < eps);
        assert!((blue.x - Fixed::from_num(9)).abs() < eps);
    }

    #[test]
    fn test_movement_without_target_stands_still() {
        let mut sim = running(&[(0, 0)], &[(10, 0)]);
        sim.advance_movement(Fixed::ONE);
        assert_eq!(
            sim.combatant(CombatantId(0)).unwrap().position,
            Vec2Fixed::ZERO
        );
    }

    #[test]
    fn test_nearest_alive_enemy_uses_own_position() {
        let sim = running(&[(0, 0), (20, 0)], &[(2, 0), (18, 0)]);
        assert_eq!(sim.nearest_alive_enemy(CombatantId(0)), Some(CombatantId(2)));
        assert_eq!(sim.nearest_alive_enemy(CombatantId(1)), Some(CombatantId(3)));
        assert_eq!(sim.nearest_alive_enemy(CombatantId(9)), None);
    }

    #[test]
    fn test_state_hash_tracks_health() {
        let mut a = running(&[(0, 0)], &[(2, 0)]);
        let b = running(&[(0, 0)], &[(2, 0)]);
        assert_eq!(a.state_hash(), b.state_hash());

        a.on_sustain(CombatantId(0), CombatantId(1), Fixed::ONE).unwrap();
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_custom_stats_flow_into_damage() {
        let strong = at(0, 0).with_stats(
            CombatantStats::default().with_damage_per_second(Fixed::from_num(45)),
        );
        let cfg = MatchConfig::new(
            TeamConfig::new("red", Rgba::RED).with_member(strong),
            TeamConfig::new("blue", Rgba::BLUE).with_member(at(1, 0)),
        );
        let mut sim = Simulation::from_config(&cfg).unwrap();
        sim.start().unwrap();
        sim.on_sustain(CombatantId(0), CombatantId(1), Fixed::ONE).unwrap();
        assert_eq!(
            sim.combatant(CombatantId(1)).unwrap().health(),
            Fixed::from_num(55)
        );
    }
}

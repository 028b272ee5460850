//! Routing of physics contacts into the simulation.
//!
//! The host's physics layer reports overlaps between sensing areas as
//! `(source, other)` collider pairs. Each report is directed: the owner of
//! `source` is the attacker and the owner of `other` the defender. A
//! mutual overlap therefore arrives as two reports, one per side.
//!
//! The [`ContactRouter`] maps colliders to combatants and decides whether
//! a report reaches the simulation at all. It never fails: every drop is
//! returned as a [`RouteOutcome`] and, where it indicates a wiring
//! problem, logged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::combatant::{CombatantId, DamageOutcome};
use crate::error::ClashError;
use crate::link::LinkDisplay;
use crate::simulation::Simulation;

/// Id of a sensing collider in the host's physics world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColliderId(pub u32);

/// Stage of a contact between two sensing areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactPhase {
    /// The areas started overlapping this step.
    Begin,
    /// The areas are still overlapping.
    Sustain,
    /// The areas stopped overlapping this step.
    End,
}

/// One directed contact report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactEvent {
    /// Stage of the contact.
    pub phase: ContactPhase,
    /// Collider whose owner attacks.
    pub source: ColliderId,
    /// Collider whose owner is hit.
    pub other: ColliderId,
}

impl ContactEvent {
    /// A [`ContactPhase::Begin`] report.
    #[must_use]
    pub const fn begin(source: ColliderId, other: ColliderId) -> Self {
        Self {
            phase: ContactPhase::Begin,
            source,
            other,
        }
    }

    /// A [`ContactPhase::Sustain`] report.
    #[must_use]
    pub const fn sustain(source: ColliderId, other: ColliderId) -> Self {
        Self {
            phase: ContactPhase::Sustain,
            source,
            other,
        }
    }

    /// A [`ContactPhase::End`] report.
    #[must_use]
    pub const fn end(source: ColliderId, other: ColliderId) -> Self {
        Self {
            phase: ContactPhase::End,
            source,
            other,
        }
    }
}

/// Why a contact report was not forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The match is idle or paused.
    NotRunning,
    /// The collider is not registered with the router.
    UnknownCollider(ColliderId),
    /// The attacker has no health left.
    AttackerDead,
    /// Both colliders belong to the same team.
    SameTeam,
    /// The simulation refused the contact.
    Rejected(ClashError),
}

/// What happened to a contact report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Forwarded; carries what the damage did to the defender.
    Dispatched(DamageOutcome),
    /// Ignored.
    Dropped(DropReason),
}

impl RouteOutcome {
    /// Whether the report reached the simulation.
    #[must_use]
    pub const fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched(_))
    }
}

/// Maps sensing colliders to the combatants that own them.
#[derive(Debug, Clone, Default)]
pub struct ContactRouter {
    owners: HashMap<ColliderId, CombatantId>,
}

impl ContactRouter {
    /// Create a router with no colliders registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one collider per combatant, numbered like the combatants.
    #[must_use]
    pub fn for_simulation<D: LinkDisplay>(sim: &Simulation<D>) -> Self {
        let mut router = Self::new();
        for combatant in sim.arena().iter() {
            router.register_collider(ColliderId(combatant.id().0), combatant.id());
        }
        router
    }

    /// Bind `collider` to `owner`, returning the previous owner if any.
    pub fn register_collider(
        &mut self,
        collider: ColliderId,
        owner: CombatantId,
    ) -> Option<CombatantId> {
        self.owners.insert(collider, owner)
    }

    /// Combatant owning `collider`.
    #[must_use]
    pub fn owner(&self, collider: ColliderId) -> Option<CombatantId> {
        self.owners.get(&collider).copied()
    }

    /// Number of registered colliders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Whether no collider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Forward one report according to its phase.
    pub fn route<D: LinkDisplay>(&self, sim: &mut Simulation<D>, event: ContactEvent) -> RouteOutcome {
        match event.phase {
            ContactPhase::Begin => self.on_contact_begin(sim, event.source, event.other),
            ContactPhase::Sustain => self.on_contact_sustain(sim, event.source, event.other),
            ContactPhase::End => self.on_contact_end(sim, event.source, event.other),
        }
    }

    /// Sensing areas started overlapping.
    pub fn on_contact_begin<D: LinkDisplay>(
        &self,
        sim: &mut Simulation<D>,
        source: ColliderId,
        other: ColliderId,
    ) -> RouteOutcome {
        match self.resolve(sim, source, other) {
            Ok((attacker, defender)) => finish(sim.on_engage(attacker, defender)),
            Err(reason) => RouteOutcome::Dropped(reason),
        }
    }

    /// Sensing areas are still overlapping; deals one fixed step of damage.
    pub fn on_contact_sustain<D: LinkDisplay>(
        &self,
        sim: &mut Simulation<D>,
        source: ColliderId,
        other: ColliderId,
    ) -> RouteOutcome {
        match self.resolve(sim, source, other) {
            Ok((attacker, defender)) => {
                let dt = sim.fixed_dt();
                finish(sim.on_sustain(attacker, defender, dt))
            }
            Err(reason) => RouteOutcome::Dropped(reason),
        }
    }

    /// Sensing areas stopped overlapping; deals one last fixed step of damage.
    pub fn on_contact_end<D: LinkDisplay>(
        &self,
        sim: &mut Simulation<D>,
        source: ColliderId,
        other: ColliderId,
    ) -> RouteOutcome {
        match self.resolve(sim, source, other) {
            Ok((attacker, defender)) => {
                let dt = sim.fixed_dt();
                finish(sim.on_disengage(attacker, defender, dt))
            }
            Err(reason) => RouteOutcome::Dropped(reason),
        }
    }

    /// Apply the forwarding rules in order: running, attacker known and
    /// alive, defender known, opposing teams.
    fn resolve<D: LinkDisplay>(
        &self,
        sim: &Simulation<D>,
        source: ColliderId,
        other: ColliderId,
    ) -> Result<(CombatantId, CombatantId), DropReason> {
        if !sim.is_running() {
            return Err(DropReason::NotRunning);
        }

        let attacker = self.lookup(source)?;
        if !sim.arena().is_alive(attacker) {
            return Err(DropReason::AttackerDead);
        }
        let defender = self.lookup(other)?;

        if sim.team_of(attacker) == sim.team_of(defender) {
            return Err(DropReason::SameTeam);
        }
        Ok((attacker, defender))
    }

    fn lookup(&self, collider: ColliderId) -> Result<CombatantId, DropReason> {
        self.owner(collider).ok_or_else(|| {
            tracing::warn!(collider = collider.0, "Contact from unregistered collider");
            DropReason::UnknownCollider(collider)
        })
    }
}

fn finish(result: crate::error::Result<DamageOutcome>) -> RouteOutcome {
    match result {
        Ok(outcome) => RouteOutcome::Dispatched(outcome),
        Err(error) => {
            tracing::warn!(%error, "Simulation rejected contact");
            RouteOutcome::Dropped(DropReason::Rejected(error))
        }
    }
}

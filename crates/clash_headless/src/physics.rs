//! Minimal overlap detection standing in for a physics engine.
//!
//! Each combatant carries a circular sensing area of radius
//! `sensing_radius`. Two combatants of opposing teams are in contact while
//! both are sensing and their circles overlap. Every contact is reported
//! once per side, so the router sees `(a, b)` and `(b, a)` and both
//! combatants deal damage.

use std::collections::BTreeSet;

use clash_core::combatant::CombatantId;
use clash_core::contact::{ColliderId, ContactEvent, ContactPhase};
use clash_core::link::LinkDisplay;
use clash_core::simulation::Simulation;

/// Tracks which pairs were touching on the previous step.
#[derive(Debug, Clone, Default)]
pub struct OverlapDetector {
    touching: BTreeSet<(CombatantId, CombatantId)>,
}

impl OverlapDetector {
    /// Create a detector with nothing touching.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs currently in contact, lower id first.
    pub fn touching(&self) -> impl Iterator<Item = (CombatantId, CombatantId)> + '_ {
        self.touching.iter().copied()
    }

    /// Forget every contact, e.g. after a match reset.
    pub fn clear(&mut self) {
        self.touching.clear();
    }

    /// Compare the current overlaps against the previous step.
    ///
    /// Returns begin events for new overlaps, sustain events for ongoing
    /// ones and end events for overlaps that stopped, in pair order.
    /// Colliders are numbered like combatants.
    pub fn detect<D: LinkDisplay>(&mut self, sim: &Simulation<D>) -> Vec<ContactEvent> {
        let current = overlapping_pairs(sim);

        let mut events = Vec::new();
        for &pair in self.touching.union(&current) {
            let phase = match (self.touching.contains(&pair), current.contains(&pair)) {
                (false, true) => ContactPhase::Begin,
                (true, true) => ContactPhase::Sustain,
                (true, false) => ContactPhase::End,
                (false, false) => continue,
            };
            let (a, b) = (ColliderId(pair.0 .0), ColliderId(pair.1 .0));
            events.push(ContactEvent {
                phase,
                source: a,
                other: b,
            });
            events.push(ContactEvent {
                phase,
                source: b,
                other: a,
            });
        }

        let began = events
            .iter()
            .filter(|e| e.phase == ContactPhase::Begin)
            .count();
        if began > 0 {
            tracing::debug!(began = began / 2, touching = current.len(), "New contacts");
        }

        self.touching = current;
        events
    }
}

fn overlapping_pairs<D: LinkDisplay>(sim: &Simulation<D>) -> BTreeSet<(CombatantId, CombatantId)> {
    let sensing: Vec<_> = sim
        .arena()
        .iter()
        .filter(|c| c.is_sensing())
        .collect();

    let mut pairs = BTreeSet::new();
    for (i, a) in sensing.iter().enumerate() {
        for b in &sensing[i + 1..] {
            if a.team() == b.team() {
                continue;
            }
            let reach = a.stats().sensing_radius + b.stats().sensing_radius;
            if a.position.distance_squared(b.position) <= reach.saturating_mul(reach) {
                pairs.insert((a.id(), b.id()));
            }
        }
    }
    pairs
}

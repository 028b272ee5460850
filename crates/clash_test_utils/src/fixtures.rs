//! Test fixtures and helpers.
//!
//! Pre-built match configurations and a crude contact source so tests can
//! run whole matches without a physics engine.

use clash_core::config::{CombatantSpawn, MatchConfig, TeamConfig};
use clash_core::contact::{ColliderId, ContactEvent, ContactRouter};
use clash_core::link::{LinkDisplay, Rgba};
use clash_core::math::Vec2Fixed;
use clash_core::simulation::{Simulation, TickEvents};
use fixed::types::I32F32;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Spawn with default stats at integer coordinates.
#[must_use]
pub fn spawn_at(x: i32, y: i32) -> CombatantSpawn {
    CombatantSpawn::at(Vec2Fixed::from_ints(x, y))
}

/// Two teams named `red` and `blue` placed at the given coordinates.
#[must_use]
pub fn two_teams(red: &[(i32, i32)], blue: &[(i32, i32)]) -> MatchConfig {
    let team = |name: &str, color: Rgba, positions: &[(i32, i32)]| {
        positions
            .iter()
            .fold(TeamConfig::new(name, color), |config, &(x, y)| {
                config.with_member(spawn_at(x, y))
            })
    };
    MatchConfig::new(
        team("red", Rgba::RED, red),
        team("blue", Rgba::BLUE, blue),
    )
}

/// One against one, four units apart: inside each other's sensing radius.
#[must_use]
pub fn duel_config() -> MatchConfig {
    two_teams(&[(0, 0)], &[(4, 0)])
}

/// Three against three in facing columns twenty units apart.
#[must_use]
pub fn skirmish_config() -> MatchConfig {
    two_teams(&[(0, 0), (0, 3), (0, 6)], &[(20, 0), (20, 3), (20, 6)])
}

/// Build and start a simulation.
///
/// # Panics
///
/// Panics if `config` is invalid.
#[must_use]
pub fn started(config: &MatchConfig) -> Simulation {
    let mut sim = Simulation::from_config(config).expect("fixture config is valid");
    sim.start().expect("fresh simulation starts");
    sim
}

/// Advance a match by one fixed step with a crude contact source.
///
/// Every living, sensing combatant whose sensing radius reaches the centre
/// of a living enemy deals one sustain step to it. Then the simulation
/// ticks and combatants move. Colliders are numbered like combatants, as
/// [`ContactRouter::for_simulation`] registers them.
pub fn brawl_step<D: LinkDisplay>(sim: &mut Simulation<D>, router: &ContactRouter) -> TickEvents {
    let mut contacts = Vec::new();
    for attacker in sim.arena().iter() {
        if !attacker.is_alive() || !attacker.is_sensing() {
            continue;
        }
        let reach = attacker.stats().sensing_radius;
        let reach_sq = reach.saturating_mul(reach);
        for defender in sim.arena().iter() {
            if defender.team() == attacker.team() || !defender.is_alive() {
                continue;
            }
            if attacker.position.distance_squared(defender.position) <= reach_sq {
                contacts.push(ContactEvent::sustain(
                    ColliderId(attacker.id().0),
                    ColliderId(defender.id().0),
                ));
            }
        }
    }

    for contact in contacts {
        router.route(sim, contact);
    }

    let dt = sim.fixed_dt();
    let events = sim.tick(dt);
    sim.advance_movement(dt);
    events
}

//! # Clash Core
//!
//! Deterministic two-team combat simulation.
//!
//! This crate contains **only** the match logic:
//! - No rendering (links are drawn through the [`link::LinkDisplay`] trait)
//! - No physics (overlaps are reported through [`contact::ContactRouter`])
//! - No IO
//! - No floating-point math (uses fixed-point)
//!
//! Hosts own the frame loop. Per fixed step they route the contacts their
//! physics produced, call [`simulation::Simulation::tick`], and optionally
//! let the core move combatants with
//! [`simulation::Simulation::advance_movement`].
//!
//! ## Crate Structure
//!
//! - [`combatant`] - Combatants, ids and the arena that stores them
//! - [`team`] - Alive/dead partition and nearest-enemy search
//! - [`link`] - Attacker-to-target links and their display seam
//! - [`contact`] - Physics contact routing
//! - [`simulation`] - Match state machine and tick loop
//! - [`config`] - Match setup data
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combatant;
pub mod config;
pub mod contact;
pub mod error;
pub mod link;
pub mod math;
pub mod simulation;
pub mod team;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::combatant::{Combatant, CombatantArena, CombatantId, DamageOutcome, TeamSide};
    pub use crate::config::{CombatantSpawn, CombatantStats, MatchConfig, TeamConfig};
    pub use crate::contact::{
        ColliderId, ContactEvent, ContactPhase, ContactRouter, DropReason, RouteOutcome,
    };
    pub use crate::error::{ClashError, Result};
    pub use crate::link::{LineBuffer, LinkDisplay, LinkHandle, LinkRegistry, Rgba};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::simulation::{MatchOutcome, MatchState, Simulation, TickEvents};
    pub use crate::team::Team;
}

//! Error types for the combat simulation.
//!
//! Only setup and explicit API misuse surface as errors. Logic warnings
//! raised while a match is running (a link requested for a pair that was
//! never bound, a contact from an unknown collider) are logged and
//! skipped instead, so they never abort a tick.

use thiserror::Error;

use crate::combatant::CombatantId;
use crate::simulation::MatchState;

/// Result type alias using [`ClashError`].
pub type Result<T> = std::result::Result<T, ClashError>;

/// Top-level error type for all simulation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClashError {
    /// A match needs exactly two teams.
    #[error("A match needs exactly 2 teams, got {found}")]
    TeamCount {
        /// Number of teams supplied.
        found: usize,
    },

    /// Configuration values that cannot produce a valid match.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No combatant with this id exists in the arena.
    #[error("Combatant not found: {0}")]
    UnknownCombatant(CombatantId),

    /// Two combatants of the same team were paired as attacker and defender.
    #[error("Combatants {attacker} and {defender} are on the same team")]
    SameTeam {
        /// Attacking combatant.
        attacker: CombatantId,
        /// Defending combatant.
        defender: CombatantId,
    },

    /// A target that is dead or not an enemy.
    #[error("Combatant {attacker} cannot target {target}: {reason}")]
    InvalidTarget {
        /// Combatant that would hold the target.
        attacker: CombatantId,
        /// Rejected target.
        target: CombatantId,
        /// Why the target was rejected.
        reason: &'static str,
    },

    /// The match state machine does not allow this transition.
    #[error("Cannot {action} a match that is {from:?}")]
    InvalidTransition {
        /// State the match was in.
        from: MatchState,
        /// Transition that was requested.
        action: &'static str,
    },
}

//! Replay harness for the combat simulation.
//!
//! A match started from the same configuration and fed the same contact
//! sequence must end in the same state, bit for bit. The helpers here run
//! a match several times (in sequence or on separate threads) and compare
//! final state hashes.
//!
//! Things that would break this and how the core avoids them:
//!
//! - **Floating-point math** differs between CPUs, so all positions,
//!   health and time use [`clash_core::math::Fixed`].
//! - **HashMap iteration order** is randomized per process. Teams keep
//!   alive lists in spawn order and links live in a `BTreeMap`.
//! - **Thread scheduling** must not leak between matches, which is what
//!   [`replay_match_parallel`] checks.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::thread;

use clash_core::config::MatchConfig;
use clash_core::contact::ContactRouter;
use clash_core::simulation::{Simulation, TickEvents};

use crate::fixtures::{brawl_step, started};

/// Final state hashes of repeated runs of one setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayHashes {
    /// One hash per run, in run order.
    pub hashes: Vec<u64>,
    /// Ticks each run was advanced.
    pub ticks: u64,
}

impl ReplayHashes {
    /// Whether every run ended in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.distinct().len() <= 1
    }

    /// The different hashes seen, sorted.
    #[must_use]
    pub fn distinct(&self) -> Vec<u64> {
        self.hashes.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
    }

    /// # Panics
    ///
    /// Panics with every hash listed if the runs disagree.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic(),
            "{} runs of {} ticks ended in {} different states: {:?}",
            self.hashes.len(),
            self.ticks,
            self.distinct().len(),
            self.hashes
        );
    }
}

/// Run any stepped state `runs` times and hash the result of each run.
///
/// # Example
///
/// ```
/// use clash_test_utils::determinism::replay_hashes;
///
/// let result = replay_hashes(3, 50, || 1u64, |n: &mut u64| *n = n.wrapping_mul(31), |n: &u64| *n);
/// result.assert_deterministic();
/// ```
pub fn replay_hashes<S>(
    runs: usize,
    ticks: u64,
    setup: impl Fn() -> S,
    step: impl Fn(&mut S),
    hash: impl Fn(&S) -> u64,
) -> ReplayHashes {
    let hashes = (0..runs)
        .map(|_| {
            let mut state = setup();
            (0..ticks).for_each(|_| step(&mut state));
            hash(&state)
        })
        .collect();
    ReplayHashes { hashes, ticks }
}

/// A started match and its router, advanced with [`brawl_step`].
#[derive(Debug, Clone)]
pub struct Brawl {
    /// The match.
    pub sim: Simulation,
    /// Router numbering colliders like combatants.
    pub router: ContactRouter,
}

impl Brawl {
    /// Build and start `config`.
    ///
    /// # Panics
    ///
    /// Panics if `config` is invalid.
    #[must_use]
    pub fn new(config: &MatchConfig) -> Self {
        let sim = started(config);
        let router = ContactRouter::for_simulation(&sim);
        Self { sim, router }
    }

    /// Advance one fixed step.
    pub fn step(&mut self) -> TickEvents {
        brawl_step(&mut self.sim, &self.router)
    }

    /// Advance `ticks` steps and return the final state hash.
    pub fn run(&mut self, ticks: u64) -> u64 {
        for _ in 0..ticks {
            self.step();
        }
        self.sim.state_hash()
    }
}

/// Play `config` `runs` times in sequence.
pub fn replay_match(config: &MatchConfig, runs: usize, ticks: u64) -> ReplayHashes {
    replay_hashes(
        runs,
        ticks,
        || Brawl::new(config),
        |brawl: &mut Brawl| {
            brawl.step();
        },
        |brawl: &Brawl| brawl.sim.state_hash(),
    )
}

/// Play `config` `runs` times at once, one scoped thread per run.
///
/// # Panics
///
/// Panics if a match thread panics.
pub fn replay_match_parallel(config: &MatchConfig, runs: usize, ticks: u64) -> ReplayHashes {
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..runs)
            .map(|_| s.spawn(|| Brawl::new(config).run(ticks)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("match thread panicked"))
            .collect()
    });
    ReplayHashes { hashes, ticks }
}

/// Step two copies of `config` side by side.
///
/// Returns the first tick after which their hashes differ, 0 if they
/// differ straight after start, or `None` if they never do.
pub fn find_first_divergence(config: &MatchConfig, ticks: u64) -> Option<u64> {
    let mut left = Brawl::new(config);
    let mut right = Brawl::new(config);
    if left.sim.state_hash() != right.sim.state_hash() {
        return Some(0);
    }

    (1..=ticks).find(|&tick| {
        left.step();
        right.step();
        let diverged = left.sim.state_hash() != right.sim.state_hash();
        if diverged {
            tracing::debug!(tick, "Matches diverged");
        }
        diverged
    })
}

/// Hash any hashable value with the std hasher.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for match setups.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of the simulation.
pub mod strategies {
    use clash_core::config::{CombatantSpawn, CombatantStats, MatchConfig, TeamConfig};
    use clash_core::link::Rgba;
    use clash_core::math::{Fixed, Vec2Fixed};
    use proptest::prelude::*;

    /// Generate a fixed-point coordinate on a small battlefield.
    ///
    /// Range: -50 to 50, in quarter units
    pub fn arb_coordinate() -> impl Strategy<Value = Fixed> {
        (-200i32..200i32).prop_map(|q| Fixed::from_num(q) / Fixed::from_num(4))
    }

    /// Generate a fixed-point 2D position.
    pub fn arb_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_coordinate(), arb_coordinate()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// Generate a damage amount (0-150), sometimes lethal in one hit.
    pub fn arb_damage() -> impl Strategy<Value = Fixed> {
        (0i32..150i32).prop_map(Fixed::from_num)
    }

    /// Generate valid combatant stats.
    pub fn arb_stats() -> impl Strategy<Value = CombatantStats> {
        (1i32..5, 1i32..10, 5i32..60, 20i32..200).prop_map(|(speed, radius, dps, health)| {
            CombatantStats::default()
                .with_speed(Fixed::from_num(speed))
                .with_sensing_radius(Fixed::from_num(radius))
                .with_damage_per_second(Fixed::from_num(dps))
                .with_max_health(Fixed::from_num(health))
        })
    }

    /// Generate one combatant placement.
    pub fn arb_spawn() -> impl Strategy<Value = CombatantSpawn> {
        (arb_position(), arb_stats())
            .prop_map(|(position, stats)| CombatantSpawn::at(position).with_stats(stats))
    }

    /// Generate a two-team match with 1 to `max_per_team` members per side.
    pub fn arb_match_config(max_per_team: usize) -> impl Strategy<Value = MatchConfig> {
        let side = move || proptest::collection::vec(arb_spawn(), 1..=max_per_team);
        (side(), side()).prop_map(|(red, blue)| {
            let mut first = TeamConfig::new("red", Rgba::RED);
            first.members = red;
            let mut second = TeamConfig::new("blue", Rgba::BLUE);
            second.members = blue;
            MatchConfig::new(first, second)
        })
    }
}

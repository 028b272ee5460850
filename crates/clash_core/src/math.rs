//! Fixed-point math utilities for deterministic simulation.
//!
//! Health, damage, positions and time steps all use fixed-point
//! arithmetic so that two runs fed the same inputs produce bit-identical
//! state on any CPU. Floating-point values only appear at the edges
//! (configuration files and reports).

use fixed::types::{I32F32, I64F64};
use serde::{Deserialize, Serialize};

/// Number type for every simulated quantity: 32 integer bits, 32 fractional bits.
pub type Fixed = I32F32;

/// A point or offset on the battlefield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers written by hand.
///
/// Configuration files are authored by people, so values are read and
/// written as decimals (`speed: 1.5`) and converted once at load time.
/// Values outside the representable range are rejected.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = f64::deserialize(deserializer)?;
        if !raw.is_finite() {
            return Err(D::Error::custom(format!("{raw} is not a finite number")));
        }
        Fixed::checked_from_num(raw)
            .ok_or_else(|| D::Error::custom(format!("{raw} is out of fixed-point range")))
    }
}

impl Vec2Fixed {
    /// The origin.
    pub const ZERO: Self = Self::new(Fixed::ZERO, Fixed::ZERO);

    /// Vector from two fixed-point components.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Squared distance to `other`; cheap enough for every range check.
    ///
    /// Saturates at [`Fixed::MAX`] for points more than about 46 000
    /// units apart.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let d = other - self;
        d.x.saturating_mul(d.x)
            .saturating_add(d.y.saturating_mul(d.y))
    }

    /// Squared distance to `other` at double width.
    ///
    /// Exact for any two positions a config can hold, so range ordering
    /// never collapses into ties the way the saturating version does.
    #[must_use]
    pub fn distance_squared_wide(self, other: Self) -> I64F64 {
        let dx = I64F64::from_num(other.x) - I64F64::from_num(self.x);
        let dy = I64F64::from_num(other.y) - I64F64::from_num(self.y);
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Distance to `other`, saturating at [`Fixed::MAX`].
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        wide_sqrt(self.distance_squared_wide(other))
    }

    /// Both components times `factor`, saturating per axis.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x.saturating_mul(factor), self.y.saturating_mul(factor))
    }

    /// Step from `self` towards `target`, covering at most `max_delta`.
    ///
    /// Lands exactly on `target` when it is within reach.
    #[must_use]
    pub fn move_towards(self, target: Self, max_delta: Fixed) -> Self {
        let dist = self.distance(target);
        if dist <= max_delta || dist == Fixed::ZERO {
            return target;
        }
        self + (target - self).scale(max_delta / dist)
    }
}

/// Square root by bisection.
///
/// Non-positive inputs give zero.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    let (mut below, mut above) = (Fixed::ZERO, value.max(Fixed::ONE));
    for _ in 0..48 {
        let guess = below + ((above - below) >> 1u32);
        if guess.saturating_mul(guess) > value {
            above = guess;
        } else {
            below = guess;
        }
    }
    below
}

/// Square root of a double-width value, saturating at [`Fixed::MAX`].
fn wide_sqrt(value: I64F64) -> Fixed {
    if value <= I64F64::ZERO {
        return Fixed::ZERO;
    }
    let (mut below, mut above) = (Fixed::ZERO, Fixed::MAX);
    for _ in 0..64 {
        let guess = below + ((above - below) >> 1u32);
        let wide = I64F64::from_num(guess);
        if wide.saturating_mul(wide) > value {
            above = guess;
        } else {
            below = guess;
        }
    }
    below
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x.saturating_add(rhs.x), self.y.saturating_add(rhs.y))
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x.saturating_sub(rhs.x), self.y.saturating_sub(rhs.y))
    }
}

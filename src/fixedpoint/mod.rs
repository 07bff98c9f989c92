//! Fixed-point multiplier derivation
//!
//! Integer-only inference replaces the floating rescaling multiply
//! `acc * real_multiplier` with an integer multiply followed by a right
//! shift. This module derives the `(multiplier, right_shift)` pair for a
//! real multiplier in the open interval `(0, 1)`.


use serde::{Deserialize, Serialize};

/// Integer approximation of a sub-unity real multiplier.
///
/// `multiplier / 2^31` approximates `real * 2^right_shift`, so
/// `value * multiplier >> (31 + right_shift)` approximates `value * real`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPointMultiplier {
    /// Fixed-point multiplier, in `[2^30, 2^31)` once derived.
    pub multiplier: i32,
    /// Non-negative right-shift amount.
    pub right_shift: i32,
}

impl FixedPointMultiplier {
    /// Apply the multiplier to an integer accumulator value.
    ///
    /// Computes `round(value * real)` using only integer arithmetic:
    /// a widening multiply and a rounding right shift by `31 + right_shift`.
    pub fn apply(&self, value: i32) -> i32 {
        let total_shift = 31 + self.right_shift;
        let product = i64::from(value) * i64::from(self.multiplier);
        let rounding = 1i64 << (total_shift - 1);
        ((product + rounding) >> total_shift) as i32
    }
}

/// Decompose a real multiplier in `(0, 1)` into a fixed-point pair.
///
/// The multiplier is doubled until it lands in `[0.5, 1.0)`, recording the
/// doubling count as the right shift, then rounded to a Q31 fixed-point
/// integer. Rounding that reaches exactly `2^31` is pulled back by halving
/// the multiplier and decrementing the shift.
///
/// A multiplier arbitrarily close to zero is valid but costs one doubling
/// iteration per halving of magnitude; no upper bound is enforced.
///
/// # Panics
///
/// Panics if `real_multiplier` is not strictly inside `(0, 1)`. Values at
/// or above one need a different decomposition and must be screened out by
/// the caller; [`crate::pass::quantize_network`] does so.
pub fn quantize_multiplier_smaller_than_one(real_multiplier: f32) -> FixedPointMultiplier {
    assert!(
        real_multiplier > 0.0,
        "real multiplier must be positive, got {real_multiplier}"
    );
    assert!(
        real_multiplier < 1.0,
        "real multiplier must be below one, got {real_multiplier}"
    );

    let mut real = f64::from(real_multiplier);
    let mut right_shift = 0i32;
    while real < 0.5 {
        real *= 2.0;
        right_shift += 1;
    }

    let mut quantized = (real * f64::from(1u32 << 31)).round() as i64;
    debug_assert!(quantized <= 1i64 << 31);
    if quantized == 1i64 << 31 {
        quantized /= 2;
        right_shift -= 1;
    }
    debug_assert!(right_shift >= 0);

    FixedPointMultiplier {
        multiplier: quantized as i32,
        right_shift,
    }
}

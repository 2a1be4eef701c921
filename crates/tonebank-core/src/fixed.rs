//! Fixed-point sample positions.
//!
//! Read cursors, loop points and pitch increments carry [`FRACTION_BITS`]
//! bits of sub-sample precision. Positions are stored as `i64` so that a
//! negative increment (bidirectional loops play backward) and very long
//! samples share one representation.

/// Number of fractional bits in a fixed-point sample position.
pub const FRACTION_BITS: u32 = 12;

/// Mask selecting the fractional part of a fixed-point position.
pub const FRACTION_MASK: i64 = (1 << FRACTION_BITS) - 1;

/// One whole sample in fixed-point units.
pub const FIXED_ONE: i64 = 1 << FRACTION_BITS;

/// Convert a whole-sample count to fixed point.
///
/// ```rust
/// use tonebank_core::{to_fixed, FRACTION_BITS};
///
/// assert_eq!(to_fixed(3), 3 << FRACTION_BITS);
/// ```
#[inline]
pub const fn to_fixed(samples: usize) -> i64 {
    (samples as i64) << FRACTION_BITS
}

/// Integer sample index of a fixed-point position.
#[inline]
pub const fn fixed_index(position: i64) -> usize {
    (position >> FRACTION_BITS) as usize
}

/// Fractional part of a fixed-point position in `[0, 1)`.
#[inline]
pub fn fixed_fraction(position: i64) -> f32 {
    (position & FRACTION_MASK) as f32 / FIXED_ONE as f32
}

/// Scale a real-valued ratio into a fixed-point increment, truncating toward zero.
#[inline]
pub fn ratio_to_fixed(ratio: f64) -> i64 {
    (ratio * FIXED_ONE as f64) as i64
}

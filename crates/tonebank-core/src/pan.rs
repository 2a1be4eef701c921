//! Stereo panning laws.
//!
//! Two laws coexist because the instrument formats disagree:
//!
//! - [`PanLaw::Hardware`] reproduces the log-domain pan of wavetable cards,
//!   expressed so it multiplies into [`gf1_amp`](crate::gf1_amp) output.
//! - [`PanLaw::EqualPower`] is `sqrt(1-p), sqrt(p)`.

use libm::{log, sqrt};

use crate::math::gf1_amp;

/// Panning law selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PanLaw {
    /// Log-domain law of hardware patches.
    Hardware,
    /// Constant-power law for soundfont and downloadable-sound regions.
    #[default]
    EqualPower,
}

/// Compute `(left, right)` gains for a pan position in `[0, 1]`.
///
/// Positions at or below 0 are hard left, positions at or above `127/128`
/// are hard right.
///
/// ```rust
/// use tonebank_core::{compute_pan, PanLaw};
///
/// let (l, r) = compute_pan(0.5, PanLaw::EqualPower);
/// assert!((l - r).abs() < 1e-6);
/// assert!((l * l + r * r - 1.0).abs() < 1e-6);
/// ```
pub fn compute_pan(pan: f64, law: PanLaw) -> (f32, f32) {
    if pan <= 0.0 {
        return (1.0, 0.0);
    }
    if pan >= 127.0 / 128.0 {
        return (0.0, 1.0);
    }
    match law {
        PanLaw::Hardware => {
            let scale = 1.0 / (core::f64::consts::LN_2 * 32.0);
            let right = gf1_amp(log(pan) * scale + 1.0);
            let left = gf1_amp(log(1.0 - pan) * scale + 1.0);
            (left as f32, right as f32)
        }
        PanLaw::EqualPower => (sqrt(1.0 - pan) as f32, sqrt(pan) as f32),
    }
}

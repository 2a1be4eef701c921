//! Pitch, time and amplitude conversions.
//!
//! All pitch math runs in `f64`: a note number must survive a round trip
//! through [`note_to_freq`] and [`freq_to_note`] to within a millionth of a
//! semitone, which `f32` cannot guarantee near the top of the MIDI range.
//!
//! # Units
//!
//! | Quantity | Unit |
//! |----------|------|
//! | Frequency | milli-Hertz (A4 = 440 000) |
//! | Attenuation | centibels, positive = quieter |
//! | Envelope times | timecents, `1200 * log2(seconds)` |

use libm::{log, log10, pow, sin};

/// Frequency of MIDI note 0 in milli-Hertz.
pub const NOTE_ZERO_FREQ: f64 = 8175.798_947_309_669;

/// Timecent value meaning "no time at all".
pub const TIMECENT_NONE: i32 = -32768;

/// Attenuation divisor used for soundfont regions.
///
/// The hardware these files were authored against applies attenuation at
/// roughly 0.376 dB per centibel rather than the nominal 0.1 dB.
pub const SF2_ATTEN_FACTOR: f64 = -531.509;

/// Convert a (possibly fractional) MIDI note number to milli-Hertz.
///
/// ```rust
/// use tonebank_core::note_to_freq;
///
/// assert!((note_to_freq(60.0) - 261_625.565).abs() < 1e-2);
/// ```
#[inline]
pub fn note_to_freq(note: f64) -> f64 {
    NOTE_ZERO_FREQ * pow(2.0, note / 12.0)
}

/// Convert milli-Hertz back to a fractional MIDI note number.
#[inline]
pub fn freq_to_note(freq: f64) -> f64 {
    log(freq / NOTE_ZERO_FREQ) * (12.0 / core::f64::consts::LN_2)
}

/// Convert cents to a frequency ratio.
#[inline]
pub fn cents_to_ratio(cents: f64) -> f64 {
    pow(2.0, cents / 1200.0)
}

/// Convert a timecent envelope field to seconds.
///
/// [`TIMECENT_NONE`] maps to exactly zero.
#[inline]
pub fn timecent_to_sec(timecent: i32) -> f64 {
    if timecent == TIMECENT_NONE {
        return 0.0;
    }
    pow(2.0, f64::from(timecent) / 1200.0)
}

/// Hardware volume curve: `2^(16x - 16)`.
///
/// `x` is a normalized log-volume where 1.0 is full scale and every 1/16 step
/// halves the output.
#[inline]
pub fn gf1_amp(x: f64) -> f64 {
    pow(2.0, x * 16.0 - 16.0)
}

/// Centibel attenuation to linear gain, nominal law `10^(-cB/200)`.
#[inline]
pub fn cb_to_amp(cb: f64) -> f64 {
    pow(10.0, cb / -200.0)
}

/// Centibel attenuation to linear gain using the soundfont hardware law.
#[inline]
pub fn atten_to_amp(cb: f64) -> f64 {
    pow(10.0, cb / SF2_ATTEN_FACTOR)
}

/// Linear gain to centibel attenuation, inverse of [`cb_to_amp`].
///
/// Gains at or below zero map to 960 cB, the envelope's silence floor.
#[inline]
pub fn amp_to_cb(gain: f64) -> f64 {
    if gain <= 0.0 {
        return 960.0;
    }
    log10(gain) * -200.0
}

/// Sine over a 1024-step cycle.
///
/// `sine(256.0)` is the positive peak.
#[inline]
pub fn sine(x: f64) -> f64 {
    sin((2.0 * core::f64::consts::PI / 1024.0) * x)
}

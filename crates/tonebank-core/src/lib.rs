//! Tonebank Core - numeric foundations for sample-based MIDI synthesis
//!
//! This crate holds the pure, allocation-free math shared by every part of the
//! tonebank engine. Nothing here owns state; every item is a constant, a table
//! or a function.
//!
//! # Fixed-Point Positions
//!
//! Sample positions, loop points and pitch increments are fixed-point values
//! with [`FRACTION_BITS`] fractional bits:
//!
//! - [`to_fixed`] / [`fixed_index`] / [`fixed_fraction`] - Conversions
//! - [`FRACTION_MASK`] - Mask selecting the fractional part
//!
//! ## Pitch
//!
//! Frequencies are expressed in milli-Hertz, the unit instrument records use:
//!
//! - [`note_to_freq`] / [`freq_to_note`] - MIDI note ↔ frequency
//! - [`cents_to_ratio`] - Tuning offsets
//!
//! ```rust
//! use tonebank_core::{freq_to_note, note_to_freq};
//!
//! let a4 = note_to_freq(69.0);
//! assert!((a4 - 440_000.0).abs() < 1e-6 * 440_000.0);
//! assert!((freq_to_note(a4) - 69.0).abs() < 1e-6);
//! ```
//!
//! ## Amplitude and Time
//!
//! - [`gf1_amp`] - Hardware log-volume curve
//! - [`cb_to_amp`] / [`atten_to_amp`] - Centibel attenuation to linear gain
//! - [`timecent_to_sec`] - Timecent envelope fields to seconds
//! - [`VOL_TABLE`] / [`gus_attenuation`] / [`sf2_attenuation`] - Channel volume laws
//!
//! ## Panning
//!
//! - [`compute_pan`] with [`PanLaw`] - Hardware log-domain or equal-power law
//!
//! ## Control Rate
//!
//! Envelopes and modulators run at roughly [`CONTROLS_PER_SECOND`] ticks per
//! second. [`control_ratio`] gives the audio samples per tick, and the
//! [`modulation`] module converts record bytes into per-tick increments.
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible. Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! tonebank-core = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

pub mod fixed;
pub mod math;
pub mod modulation;
pub mod pan;
pub mod tables;

pub use fixed::{FRACTION_BITS, FRACTION_MASK, fixed_fraction, fixed_index, to_fixed};
pub use math::{
    TIMECENT_NONE, atten_to_amp, cb_to_amp, cents_to_ratio, freq_to_note, gf1_amp, note_to_freq,
    sine, timecent_to_sec,
};
pub use modulation::{
    CONTROLS_PER_SECOND, MAX_CONTROL_RATIO, RATE_SHIFT, SWEEP_SHIFT, VIBRATO_SAMPLE_INCREMENTS,
    control_ratio,
};
pub use pan::{PanLaw, compute_pan};
pub use tables::{VOL_TABLE, gus_attenuation, sf2_attenuation};

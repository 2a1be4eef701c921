//! Property-based tests for tonebank-core math.
//!
//! Tests pitch round trips, pan law bounds and fixed-point conversions
//! using proptest for randomized input generation.

use proptest::prelude::*;
use tonebank_core::{
    PanLaw, compute_pan, fixed_fraction, fixed_index, freq_to_note, gf1_amp, note_to_freq,
    sf2_attenuation, timecent_to_sec,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Any fractional note in the MIDI range survives a frequency round trip
    /// to within a millionth of a semitone.
    #[test]
    fn note_freq_roundtrip(note in 0.0f64..128.0f64) {
        let back = freq_to_note(note_to_freq(note));
        prop_assert!(
            (back - note).abs() < 1e-6,
            "note {} came back as {}", note, back
        );
    }

    /// Frequency grows strictly with note number.
    #[test]
    fn note_to_freq_monotonic(note in 0.0f64..127.0f64, step in 0.001f64..1.0f64) {
        prop_assert!(note_to_freq(note + step) > note_to_freq(note));
    }

    /// Both pan laws produce gains in [0, 1] and never NaN.
    #[test]
    fn pan_gains_bounded(pan in -1.0f64..2.0f64, hardware in any::<bool>()) {
        let law = if hardware { PanLaw::Hardware } else { PanLaw::EqualPower };
        let (l, r) = compute_pan(pan, law);
        prop_assert!((0.0..=1.0).contains(&l), "left {} for pan {}", l, pan);
        prop_assert!((0.0..=1.0).contains(&r), "right {} for pan {}", r, pan);
    }

    /// Equal-power panning keeps total power at unity.
    #[test]
    fn equal_power_is_constant_power(pan in 0.0f64..1.0f64) {
        let (l, r) = compute_pan(pan, PanLaw::EqualPower);
        prop_assert!((l * l + r * r - 1.0).abs() < 1e-5);
    }

    /// The hardware volume curve never exceeds unity below full scale.
    #[test]
    fn gf1_amp_bounded(x in 0.0f64..=1.0f64) {
        let a = gf1_amp(x);
        prop_assert!(a > 0.0 && a <= 1.0);
    }

    /// Timecents are monotonic in seconds.
    #[test]
    fn timecents_monotonic(tc in -12000i32..8000i32) {
        prop_assert!(timecent_to_sec(tc + 1) > timecent_to_sec(tc));
    }

    /// Soundfont attenuation never decreases as velocity drops.
    #[test]
    fn sf2_attenuation_velocity_order(vel in 2u8..=127u8) {
        prop_assert!(sf2_attenuation(100, 127, vel - 1, 0.0) >= sf2_attenuation(100, 127, vel, 0.0));
    }

    /// Splitting a fixed-point position into index and fraction is lossless.
    #[test]
    fn fixed_split_reassembles(pos in 0i64..(1i64 << 40)) {
        let idx = fixed_index(pos) as f64;
        let frac = f64::from(fixed_fraction(pos));
        let rebuilt = (idx + frac) * 4096.0;
        prop_assert!((rebuilt - pos as f64).abs() < 1.0);
    }
}

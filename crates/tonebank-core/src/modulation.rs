//! Control-rate constants and record-to-increment conversions.
//!
//! Envelopes, tremolo and vibrato are not evaluated every audio sample. They
//! advance once per control tick, every [`control_ratio`] samples. The
//! functions here turn the byte-sized rate/sweep/depth fields found in
//! instrument records into per-tick increments for a given output rate.

/// Target number of control ticks per second.
pub const CONTROLS_PER_SECOND: u32 = 1000;

/// Upper bound on samples per control tick.
pub const MAX_CONTROL_RATIO: u32 = 255;

/// Fixed-point shift of tremolo/vibrato sweep positions.
pub const SWEEP_SHIFT: u32 = 16;

/// Shift applied to the tremolo phase before table lookup.
pub const RATE_SHIFT: u32 = 5;

/// Number of cached vibrato increments (one half-cycle).
pub const VIBRATO_SAMPLE_INCREMENTS: usize = 32;

/// Empirical tuning constant for sweep conversions.
pub const SWEEP_TUNING: u32 = 38;

/// Empirical tuning constant for vibrato rate conversion.
pub const VIBRATO_RATE_TUNING: u32 = 38;

/// Empirical tuning constant for tremolo rate conversion.
pub const TREMOLO_RATE_TUNING: u32 = 38;

/// Audio samples per control tick for an output rate.
///
/// ```rust
/// use tonebank_core::control_ratio;
///
/// assert_eq!(control_ratio(44100), 44);
/// assert_eq!(control_ratio(400), 1);
/// ```
#[inline]
pub fn control_ratio(output_rate: u32) -> u32 {
    (output_rate / CONTROLS_PER_SECOND).clamp(1, MAX_CONTROL_RATIO)
}

/// Convert a hardware envelope rate byte to a per-tick volume increment.
///
/// The top two bits select a range (each range is 8x slower than the one
/// before), the low six bits give the step within it. The result is a 15.15
/// fixed-point increment on a volume scale whose full range is `255 << 22`.
#[inline]
pub fn envelope_rate(rate: u8, output_rate: u32, control_ratio: u32) -> i64 {
    let shift = 3 * (3 - u32::from((rate >> 6) & 0x3));
    let r = i64::from(rate & 0x3f) << shift;
    // Integer division truncates before the control ratio scales it up.
    let scaled = (r * 44100) / i64::from(output_rate.max(1));
    (scaled * i64::from(control_ratio)) << 9
}

/// Convert a hardware envelope offset byte to the envelope volume scale.
#[inline]
pub fn envelope_offset(offset: u8) -> i64 {
    i64::from(offset) << (7 + 15)
}

/// Per-tick tremolo sweep increment; zero disables sweeping.
#[inline]
pub fn tremolo_sweep_increment(sweep: u8, control_ratio: u32, output_rate: u32) -> i32 {
    if sweep == 0 {
        return 0;
    }
    let num = f64::from((control_ratio * SWEEP_TUNING) << SWEEP_SHIFT);
    (num / (f64::from(output_rate) * f64::from(sweep))) as i32
}

/// Per-tick tremolo phase increment.
#[inline]
pub fn tremolo_phase_increment(rate: u8, control_ratio: u32, output_rate: u32) -> i32 {
    let num = f64::from((control_ratio * u32::from(rate)) << RATE_SHIFT);
    (num / (f64::from(TREMOLO_RATE_TUNING) * f64::from(output_rate))) as i32
}

/// Samples between vibrato increment updates.
#[inline]
pub fn vibrato_control_ratio(rate: u8, output_rate: u32) -> i32 {
    if rate == 0 {
        return 0;
    }
    let denom = f64::from(rate) * 2.0 * VIBRATO_SAMPLE_INCREMENTS as f64;
    ((f64::from(VIBRATO_RATE_TUNING) * f64::from(output_rate)) / denom) as i32
}

/// Per-update vibrato sweep increment.
#[inline]
pub fn vibrato_sweep_increment(sweep: u8, vibrato_control_ratio: i32, output_rate: u32) -> i32 {
    if sweep == 0 {
        return 0;
    }
    let num = f64::from(vibrato_control_ratio)
        * f64::from(SWEEP_TUNING)
        * f64::from(1u32 << SWEEP_SHIFT);
    (num / (f64::from(output_rate) * f64::from(sweep))) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_ratio_bounds() {
        assert_eq!(control_ratio(0), 1);
        assert_eq!(control_ratio(48000), 48);
        assert_eq!(control_ratio(1_000_000), MAX_CONTROL_RATIO);
    }

    #[test]
    fn test_envelope_rate_ranges() {
        // Same low bits, slower range → smaller increment.
        let fast = envelope_rate(0x3f, 44100, 44);
        let slow = envelope_rate(0x3f | 0xc0, 44100, 44);
        assert!(fast > slow);
        assert_eq!(envelope_rate(0, 44100, 44), 0);
        // 63 << 9 at 44.1 kHz, ratio 44.
        assert_eq!(fast, (63i64 << 9) * 44 << 9);
    }

    #[test]
    fn test_envelope_rate_truncates_before_ratio() {
        // 512 * 44100 / 48000 = 470.4, truncated to 470.
        assert_eq!(envelope_rate(0x01, 48000, 48), (470i64 * 48) << 9);
    }

    #[test]
    fn test_envelope_offset_scale() {
        assert_eq!(envelope_offset(255), 255i64 << 22);
        assert_eq!(envelope_offset(0), 0);
    }

    #[test]
    fn test_sweep_zero_disables() {
        assert_eq!(tremolo_sweep_increment(0, 44, 44100), 0);
        assert_eq!(vibrato_sweep_increment(0, 100, 44100), 0);
        assert!(tremolo_sweep_increment(10, 44, 44100) > 0);
    }

    #[test]
    fn test_vibrato_control_ratio() {
        assert_eq!(vibrato_control_ratio(0, 44100), 0);
        // 38 * 44100 / (10 * 64)
        assert_eq!(vibrato_control_ratio(10, 44100), 2618);
    }

    #[test]
    fn test_tremolo_phase_increment() {
        // (44 * 40) << 5 / (38 * 44100)
        assert_eq!(tremolo_phase_increment(40, 44, 44100), 0);
        assert!(tremolo_phase_increment(200, 255, 8000) > 0);
    }
}

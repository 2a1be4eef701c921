//! Channel volume laws.

use libm::log10;

/// Hardware volume curve indexed by a 7-bit MIDI value.
pub const VOL_TABLE: [u8; 128] = [
    0, 129, 145, 155, 161, 166, 171, 174, 177, 180, 182, 185, 187, 188, 190, 192, //
    193, 195, 196, 197, 198, 199, 201, 202, 203, 203, 204, 205, 206, 207, 208, 208, //
    209, 210, 211, 211, 212, 213, 213, 214, 214, 215, 215, 216, 217, 217, 218, 218, //
    219, 219, 219, 220, 220, 221, 221, 222, 222, 222, 223, 223, 224, 224, 224, 225, //
    225, 226, 227, 228, 229, 230, 231, 231, 232, 233, 234, 234, 235, 236, 236, 237, //
    238, 238, 239, 239, 240, 241, 241, 242, 242, 243, 243, 244, 244, 244, 245, 245, //
    246, 246, 247, 247, 247, 248, 248, 249, 249, 249, 250, 250, 250, 251, 251, 251, //
    252, 252, 252, 253, 253, 253, 254, 254, 254, 254, 255, 255, 255, 255, 255, 255, //
];

/// Normalizes two table lookups so that full volume lands just under 1.0.
const GUS_SCALE: f32 = (127.0 + 64.0) / 12_419_775.0;

/// Attenuation reported for a zero volume, expression or velocity, in centibels.
pub const SILENT_CB: f32 = 9600.0;

/// Linear attenuation multiplier for hardware patches.
///
/// The result feeds the hardware volume curve, so 1.0 means full scale.
///
/// ```rust
/// use tonebank_core::gus_attenuation;
///
/// assert!(gus_attenuation(127, 127, 127) > 0.99);
/// assert_eq!(gus_attenuation(0, 127, 127), 0.0);
/// ```
#[inline]
pub fn gus_attenuation(volume: u8, expression: u8, velocity: u8) -> f32 {
    let combined = (usize::from(volume & 0x7f) * usize::from(expression & 0x7f)) / 127;
    let v = f32::from(VOL_TABLE[combined]) * f32::from(VOL_TABLE[usize::from(velocity & 0x7f)]);
    v * GUS_SCALE
}

/// Centibel attenuation for soundfont and downloadable-sound regions.
///
/// Velocity, volume and expression each contribute `400 * log10(127 / x)`,
/// on top of the region's own initial attenuation.
#[inline]
pub fn sf2_attenuation(volume: u8, expression: u8, velocity: u8, initial: f32) -> f32 {
    if volume == 0 || expression == 0 || velocity == 0 {
        return SILENT_CB + initial;
    }
    let term = |x: u8| log10(127.0 / f64::from(x.min(127)));
    let cb = 400.0 * (term(velocity) + term(volume) + term(expression));
    cb as f32 + initial
}

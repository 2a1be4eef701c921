//! Format-normalized waveform regions.
//!
//! A [`Sample`] is what every instrument format converts into. Once built it
//! is wrapped in an [`Arc`] and shared read-only by every voice that plays it.
//!
//! Positions (`data_length`, `loop_start`, `loop_end`) are fixed-point with
//! [`FRACTION_BITS`](tonebank_core::FRACTION_BITS) fractional bits, so loops
//! can start and end between source frames.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ops::BitOr;

use tonebank_core::{PanLaw, TIMECENT_NONE, compute_pan, note_to_freq, to_fixed};

/// Which format a sample came from.
///
/// Selects the envelope algorithm, the attenuation law and the pan law.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SampleKind {
    /// Hardware patch: 6-stage rate/offset envelope, log-domain pan.
    #[default]
    Gus,
    /// Soundfont region: ADSR envelope in timecents, equal-power pan.
    Sf2,
    /// Downloadable-sound region: ADSR envelope, nominal centibel law.
    Dls,
}

/// Playback mode flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SampleModes(u8);

impl SampleModes {
    /// Source PCM is 16 bits wide.
    pub const PATCH_16: Self = Self(1 << 0);
    /// Source PCM is unsigned.
    pub const UNSIGNED: Self = Self(1 << 1);
    /// Loop between `loop_start` and `loop_end`.
    pub const LOOP: Self = Self(1 << 2);
    /// Loop bounces back and forth.
    pub const BIDIR: Self = Self(1 << 3);
    /// Loop was authored to be played backwards.
    pub const BACKWARD: Self = Self(1 << 4);
    /// Envelope holds at the release stage until note-off.
    pub const SUSTAIN: Self = Self(1 << 5);
    /// No synthetic release: note-off enters the natural release stage.
    pub const NO_SRELEASE: Self = Self(1 << 6);
    /// Force a synthetic release even when `NO_SRELEASE` is set.
    pub const FAST_RELEASE: Self = Self(1 << 7);

    /// No flags.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bit pattern.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build from a raw bit pattern.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// True if every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the flags in `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the flags in `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for SampleModes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// ADSR-style envelope timing.
///
/// Times are timecents (`TIMECENT_NONE` means zero time), the sustain level is
/// an attenuation in centibels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sf2EnvelopeParams {
    /// Delay before the attack starts.
    pub delay: i32,
    /// Linear 0 to 1 ramp time.
    pub attack: i32,
    /// Time held at full level.
    pub hold: i32,
    /// Time to fall the full 960 cB range.
    pub decay: i32,
    /// Sustain attenuation in centibels.
    pub sustain: f32,
    /// Time to fall the full 960 cB range after note-off.
    pub release: i32,
}

impl Default for Sf2EnvelopeParams {
    fn default() -> Self {
        Self {
            delay: TIMECENT_NONE,
            attack: TIMECENT_NONE,
            hold: TIMECENT_NONE,
            decay: TIMECENT_NONE,
            sustain: 0.0,
            release: TIMECENT_NONE,
        }
    }
}

/// Envelope parameters in one of the two mutually exclusive shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EnvelopeParams {
    /// Six rate/offset byte pairs: attack, hold, decay, release, release B, release C.
    Gf1 {
        /// Encoded rates: top two bits range, low six bits step.
        rates: [u8; 6],
        /// Target levels, 0-255.
        offsets: [u8; 6],
    },
    /// Timecent-based ADSR.
    Sf2(Sf2EnvelopeParams),
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self::Gf1 {
            rates: [63; 6],
            offsets: [255, 255, 255, 255, 0, 0],
        }
    }
}

/// Tremolo parameters converted to per-tick units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tremolo {
    /// Sweep-in step per control tick, 0 for full depth immediately.
    pub sweep_increment: i32,
    /// Phase step per control tick; 0 disables tremolo.
    pub phase_increment: i32,
    /// Depth byte.
    pub depth: u8,
}

/// Vibrato parameters converted to per-update units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Vibrato {
    /// Sweep-in step per update.
    pub sweep_increment: i32,
    /// Audio samples between increment updates; 0 disables vibrato.
    pub control_ratio: i32,
    /// Depth byte.
    pub depth: u8,
}

/// One playable waveform region.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Mono waveform with the final frame duplicated for interpolation lookahead.
    pub data: Arc<[f32]>,
    /// Playable length, fixed-point.
    pub data_length: i64,
    /// Loop start, fixed-point.
    pub loop_start: i64,
    /// Loop end, fixed-point.
    pub loop_end: i64,
    /// Native rate in Hz; 0 once pre-resampled to the output rate.
    pub sample_rate: u32,
    /// Lowest frequency this region answers to, milli-Hertz.
    pub low_freq: f64,
    /// Highest frequency this region answers to, milli-Hertz.
    pub high_freq: f64,
    /// Frequency recorded at the native rate, milli-Hertz.
    pub root_freq: f64,
    /// Lowest velocity this region answers to.
    pub low_vel: u8,
    /// Highest velocity this region answers to.
    pub high_vel: u8,
    /// Note the pitch scaling pivots around.
    pub scale_note: i32,
    /// Semitone scaling in 1/1024ths; 1024 is normal, 0 is fixed pitch.
    pub scale_factor: i32,
    /// Fine tuning in cents.
    pub tune: f64,
    /// Pan in per mille, -500 (left) to 500 (right).
    pub panning: i32,
    /// Precomputed left gain.
    pub left_offset: f32,
    /// Precomputed right gain.
    pub right_offset: f32,
    /// Playback flags.
    pub modes: SampleModes,
    /// Source format.
    pub kind: SampleKind,
    /// Exclusive class; non-zero groups choke each other on a channel.
    pub key_group: u32,
    /// Allow several voices of this region on the same note.
    pub self_nonexclusive: bool,
    /// Region attenuation in centibels.
    pub initial_attenuation: f32,
    /// Amplitude modulation.
    pub tremolo: Tremolo,
    /// Pitch modulation.
    pub vibrato: Vibrato,
    /// Envelope shape.
    pub envelope: EnvelopeParams,
}

impl Sample {
    /// Build a centered, full-range, non-looping region from raw frames.
    ///
    /// The final frame is duplicated. `root_freq` is in milli-Hertz.
    pub fn new(frames: &[f32], sample_rate: u32, root_freq: f64, kind: SampleKind) -> Self {
        let mut data = Vec::with_capacity(frames.len() + 1);
        data.extend_from_slice(frames);
        data.push(frames.last().copied().unwrap_or(0.0));
        let law = match kind {
            SampleKind::Gus => PanLaw::Hardware,
            SampleKind::Sf2 | SampleKind::Dls => PanLaw::EqualPower,
        };
        let (left_offset, right_offset) = compute_pan(0.5, law);
        let envelope = match kind {
            SampleKind::Gus => EnvelopeParams::default(),
            SampleKind::Sf2 | SampleKind::Dls => EnvelopeParams::Sf2(Sf2EnvelopeParams::default()),
        };
        Self {
            data: Arc::from(data),
            data_length: to_fixed(frames.len()),
            loop_start: 0,
            loop_end: to_fixed(frames.len()),
            sample_rate,
            low_freq: 0.0,
            high_freq: note_to_freq(128.0),
            root_freq,
            low_vel: 0,
            high_vel: 127,
            scale_note: 60,
            scale_factor: 1024,
            tune: 0.0,
            panning: 0,
            left_offset,
            right_offset,
            modes: SampleModes::empty(),
            kind,
            key_group: 0,
            self_nonexclusive: false,
            initial_attenuation: 0.0,
            tremolo: Tremolo::default(),
            vibrato: Vibrato::default(),
            envelope,
        }
    }

    /// Enable a forward loop between two frame positions.
    pub fn with_loop(mut self, start: usize, end: usize) -> Self {
        self.loop_start = to_fixed(start);
        self.loop_end = to_fixed(end);
        self.modes.insert(SampleModes::LOOP);
        self
    }

    /// True if this region answers to `velocity` at `freq` milli-Hertz.
    pub fn matches(&self, velocity: u8, freq: f64) -> bool {
        self.low_vel <= velocity
            && self.high_vel >= velocity
            && self.low_freq <= freq
            && self.high_freq >= freq
    }

    /// True if `freq` lies in the key range, ignoring velocity.
    pub fn matches_freq(&self, freq: f64) -> bool {
        self.low_freq <= freq && self.high_freq >= freq
    }

    /// Frequency for `note` after applying `scale_note`, `scale_factor` and `tune`.
    pub fn scaled_frequency(&self, note: u8) -> f64 {
        let scaled = f64::from(i32::from(note) - self.scale_note) * f64::from(self.scale_factor)
            / 1024.0
            + f64::from(self.scale_note)
            + self.tune * 0.01;
        note_to_freq(scaled)
    }

    /// Number of playable frames.
    pub fn frames(&self) -> usize {
        tonebank_core::fixed_index(self.data_length)
    }

    /// True if the region loops.
    pub fn is_looped(&self) -> bool {
        self.modes.contains(SampleModes::LOOP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes_flags() {
        let mut m = SampleModes::LOOP | SampleModes::SUSTAIN;
        assert!(m.contains(SampleModes::LOOP));
        assert!(!m.contains(SampleModes::BIDIR));
        m.remove(SampleModes::LOOP);
        assert!(!m.contains(SampleModes::LOOP));
        assert!(m.contains(SampleModes::SUSTAIN));
        assert_eq!(SampleModes::from_bits(m.bits()), m);
    }

    #[test]
    fn test_new_duplicates_last_frame() {
        let s = Sample::new(&[0.1, 0.2, 0.3], 22050, note_to_freq(60.0), SampleKind::Sf2);
        assert_eq!(s.data.len(), 4);
        assert_eq!(s.data[3], 0.3);
        assert_eq!(s.frames(), 3);
        assert!((s.left_offset - s.right_offset).abs() < 1e-6);
    }

    #[test]
    fn test_matches_ranges() {
        let mut s = Sample::new(&[0.0; 8], 44100, note_to_freq(60.0), SampleKind::Sf2);
        s.low_freq = note_to_freq(48.0);
        s.high_freq = note_to_freq(72.0);
        s.low_vel = 10;
        s.high_vel = 100;
        assert!(s.matches(64, note_to_freq(60.0)));
        assert!(!s.matches(5, note_to_freq(60.0)));
        assert!(!s.matches(64, note_to_freq(80.0)));
        assert!(s.matches_freq(note_to_freq(48.0)));
    }

    #[test]
    fn test_scaled_frequency() {
        let mut s = Sample::new(&[0.0; 8], 44100, note_to_freq(60.0), SampleKind::Gus);
        assert!((s.scaled_frequency(69) - note_to_freq(69.0)).abs() < 1e-6);

        s.scale_factor = 0;
        s.scale_note = 36;
        assert!((s.scaled_frequency(90) - note_to_freq(36.0)).abs() < 1e-6);

        s.scale_factor = 512;
        s.scale_note = 60;
        assert!((s.scaled_frequency(72) - note_to_freq(66.0)).abs() < 1e-6);
    }
}

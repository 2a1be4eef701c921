//! Playback slots and the fixed-size pool that owns them.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ops::BitOr;

use tonebank_core::fixed::FIXED_ONE;
use tonebank_core::{RATE_SHIFT, SWEEP_SHIFT, VIBRATO_SAMPLE_INCREMENTS, sine};

use crate::envelope::Envelope;
use crate::sample::{Sample, SampleModes};

/// Voice lifecycle flags.
///
/// An empty set means the slot is free. `RUNNING` combines with the other
/// flags: a held note is `RUNNING | SUSTAINING`, a fading one
/// `RUNNING | RELEASING | STOPPING`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VoiceStatus(u8);

impl VoiceStatus {
    /// Slot is bound to a sample and producing output.
    pub const RUNNING: Self = Self(1 << 0);
    /// Envelope is frozen at its sustain point.
    pub const SUSTAINING: Self = Self(1 << 1);
    /// Note-off has been processed.
    pub const RELEASING: Self = Self(1 << 2);
    /// Fade out over a short window, then free.
    pub const STOPPING: Self = Self(1 << 3);
    /// Loop points are honored.
    pub const LOOPING: Self = Self(1 << 4);
    /// Note-off arrived while the sustain pedal was down.
    pub const NOTE_SUSTAIN: Self = Self(1 << 5);

    /// Free slot.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// True for a free slot.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any flag in `other` is set.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
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

impl BitOr for VoiceStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One playback slot.
#[derive(Clone, Debug, Default)]
pub struct Voice {
    /// Lifecycle flags.
    pub status: VoiceStatus,
    /// Sample being played; `None` only while free.
    pub sample: Option<Arc<Sample>>,
    /// MIDI channel.
    pub channel: u8,
    /// MIDI note.
    pub note: u8,
    /// Note-on velocity (or latest key pressure).
    pub velocity: u8,
    /// Read cursor, fixed-point.
    pub sample_offset: i64,
    /// Signed cursor step per output frame, fixed-point.
    pub sample_increment: i64,
    /// Output frames produced so far.
    pub sample_count: u64,
    /// Pitch before bend, milli-Hertz.
    pub orig_frequency: f64,
    /// Pitch after bend, milli-Hertz.
    pub frequency: f64,
    /// Channel-derived attenuation.
    pub attenuation: f32,
    /// Left pan gain.
    pub left_offset: f32,
    /// Right pan gain.
    pub right_offset: f32,
    /// Final left gain.
    pub left_mix: f32,
    /// Final right gain.
    pub right_mix: f32,
    /// Frames left until the next control tick.
    pub control_counter: u32,
    /// Amplitude envelope.
    pub envelope: Envelope,
    /// Tremolo phase accumulator.
    pub tremolo_phase: i32,
    /// Tremolo sweep-in step; cleared once fully swept.
    pub tremolo_sweep: i32,
    /// Tremolo sweep-in position.
    pub tremolo_sweep_position: i32,
    /// Current tremolo multiplier.
    pub tremolo_volume: f32,
    /// Vibrato phase, `0..2 * VIBRATO_SAMPLE_INCREMENTS`.
    pub vibrato_phase: usize,
    /// Vibrato sweep-in step; cleared once fully swept.
    pub vibrato_sweep: i32,
    /// Vibrato sweep-in position.
    pub vibrato_sweep_position: i32,
    /// Frames left until the next vibrato update.
    pub vibrato_control_counter: i32,
    /// Cached increments for one half-cycle; zero means not yet computed.
    pub vibrato_increments: [i64; VIBRATO_SAMPLE_INCREMENTS],
}

impl Voice {
    /// True while the slot holds a note.
    pub fn is_running(&self) -> bool {
        self.status.contains(VoiceStatus::RUNNING)
    }

    /// True while the note sounds and has not been released or stopped.
    pub fn is_held(&self) -> bool {
        self.is_running()
            && !self
                .status
                .intersects(VoiceStatus::RELEASING | VoiceStatus::STOPPING)
    }

    /// Return the slot to the pool.
    pub fn free(&mut self) {
        self.status = VoiceStatus::empty();
        self.sample = None;
    }

    /// Force a short fade-out.
    pub fn kill(&mut self) {
        if self.is_running() {
            self.status.remove(VoiceStatus::SUSTAINING);
            self.status.insert(VoiceStatus::RELEASING | VoiceStatus::STOPPING);
        }
    }

    /// Start the release phase. No effect unless held.
    pub fn finish(&mut self) {
        if self.is_running() && !self.status.contains(VoiceStatus::RELEASING) {
            let Some(sample) = self.sample.clone() else {
                return;
            };
            self.status.remove(VoiceStatus::SUSTAINING);
            self.status.insert(VoiceStatus::RELEASING);
            if !sample.modes.contains(SampleModes::NO_SRELEASE) {
                // Play the sampled release.
                self.status.remove(VoiceStatus::LOOPING);
            }
            self.envelope.release(&sample, &mut self.status);
        }
    }

    /// Unmodulated cursor step for the current frequency.
    ///
    /// Returns 0 for pre-resampled samples, which bypass pitch control.
    pub fn base_increment(&self, output_rate: u32) -> f64 {
        match &self.sample {
            Some(s) if s.sample_rate != 0 && s.root_freq > 0.0 => {
                let ratio = (f64::from(s.sample_rate) * self.frequency)
                    / (s.root_freq * f64::from(output_rate.max(1)));
                ratio * FIXED_ONE as f64
            }
            _ => 0.0,
        }
    }

    /// Recompute the cursor step from `frequency`, keeping the loop direction.
    pub fn recompute_increment(&mut self, output_rate: u32) {
        let Some(sample) = &self.sample else {
            return;
        };
        if sample.sample_rate == 0 {
            return;
        }
        if sample.vibrato.control_ratio != 0 {
            self.vibrato_increments = [0; VIBRATO_SAMPLE_INCREMENTS];
        }
        let a = self.base_increment(output_rate) as i64;
        self.sample_increment = if self.sample_increment < 0 { -a } else { a };
    }

    /// Turn envelope state and attenuation into the final left/right gains.
    pub fn apply_envelope(&mut self) {
        let Some(sample) = &self.sample else {
            return;
        };
        let tremolo = (sample.tremolo.phase_increment != 0).then_some(self.tremolo_volume);
        let gain = self.envelope.gain(sample, self.attenuation, tremolo);
        self.left_mix = gain * self.left_offset;
        self.right_mix = gain * self.right_offset;
    }

    /// Advance the tremolo by one control tick.
    pub fn update_tremolo(&mut self) {
        let Some(sample) = &self.sample else {
            return;
        };
        let mut depth = i64::from(sample.tremolo.depth) << 7;
        if self.tremolo_sweep != 0 {
            self.tremolo_sweep_position += self.tremolo_sweep;
            if self.tremolo_sweep_position >= 1 << SWEEP_SHIFT {
                self.tremolo_sweep = 0;
            } else {
                depth = (depth * i64::from(self.tremolo_sweep_position)) >> SWEEP_SHIFT;
            }
        }
        self.tremolo_phase = self
            .tremolo_phase
            .wrapping_add(sample.tremolo.phase_increment);
        let wave = sine(f64::from(self.tremolo_phase >> RATE_SHIFT)) + 1.0;
        self.tremolo_volume = (1.0 - wave * depth as f64 / f64::from(1u32 << 17)) as f32;
    }

    /// One control tick: envelope, tremolo, gains.
    ///
    /// Returns true if the envelope ran out and the voice should stop mixing.
    pub fn update_signal(&mut self) -> bool {
        let Some(sample) = self.sample.clone() else {
            return true;
        };
        if self.envelope.is_updating()
            && self
                .envelope
                .update(&sample, &mut self.status, self.sample_count)
        {
            return true;
        }
        if sample.tremolo.phase_increment != 0 {
            self.update_tremolo();
        }
        self.apply_envelope();
        false
    }

    /// Next vibrato-modulated increment.
    ///
    /// Only half a cycle of increments is cached; the other half mirrors it.
    pub fn update_vibrato(&mut self, output_rate: u32, negative: bool) -> i64 {
        const CYCLE: usize = 2 * VIBRATO_SAMPLE_INCREMENTS;
        const HALF: usize = VIBRATO_SAMPLE_INCREMENTS / 2;

        self.vibrato_phase = if self.vibrato_phase + 1 >= CYCLE {
            0
        } else {
            self.vibrato_phase + 1
        };
        let phase = self.vibrato_phase;
        let slot = if phase < HALF {
            HALF - 1 - phase
        } else if phase >= VIBRATO_SAMPLE_INCREMENTS * 3 / 2 {
            VIBRATO_SAMPLE_INCREMENTS * 5 / 2 - 1 - phase
        } else {
            phase - HALF
        };

        let signed = |a: i64| if negative { -a } else { a };
        if self.vibrato_increments[slot] != 0 {
            return signed(self.vibrato_increments[slot]);
        }

        let depth_byte = self.sample.as_ref().map_or(0, |s| s.vibrato.depth);
        let mut depth = i64::from(depth_byte) << 7;
        if self.vibrato_sweep != 0 {
            self.vibrato_sweep_position += self.vibrato_sweep;
            if self.vibrato_sweep_position >= 1 << SWEEP_SHIFT {
                self.vibrato_sweep = 0;
            } else {
                depth = (depth * i64::from(self.vibrato_sweep_position)) >> SWEEP_SHIFT;
            }
        }

        // 64 phases span one 1024-step cycle, sampled mid-phase so that
        // mirrored phases agree on their cached increment.
        let bend = sine((phase * 16 + 8) as f64) * depth as f64;
        let base = self.base_increment(output_rate);
        let a = (base * libm::pow(2.0, bend / (8192.0 * 12.0))) as i64;

        if self.vibrato_sweep == 0 {
            self.vibrato_increments[slot] = a;
        }
        signed(a)
    }
}

/// Fixed-size voice array with stealing.
#[derive(Clone, Debug)]
pub struct VoicePool {
    voices: Vec<Voice>,
    lost_notes: u32,
    cut_notes: u32,
}

impl VoicePool {
    /// Pool of `count` free voices.
    pub fn new(count: usize) -> Self {
        let mut voices = Vec::with_capacity(count);
        voices.resize_with(count, Voice::default);
        Self {
            voices,
            lost_notes: 0,
            cut_notes: 0,
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    /// True for a zero-slot pool.
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// All slots.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// All slots, mutably.
    pub fn voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }

    /// Slots currently holding a note.
    pub fn active(&self) -> usize {
        self.voices.iter().filter(|v| v.is_running()).count()
    }

    /// Notes dropped because no slot could be found.
    pub fn lost_notes(&self) -> u32 {
        self.lost_notes
    }

    /// Releasing notes cut short to make room.
    pub fn cut_notes(&self) -> u32 {
        self.cut_notes
    }

    /// Free every slot and zero the counters.
    pub fn reset(&mut self) {
        for v in &mut self.voices {
            *v = Voice::default();
        }
        self.lost_notes = 0;
        self.cut_notes = 0;
    }

    /// Find a slot for a new note.
    ///
    /// A free slot is used first. Otherwise the quietest releasing voice that
    /// is not already stopping is cut. With neither, the note is lost.
    pub fn allocate(&mut self) -> Option<usize> {
        if let Some(i) = self.voices.iter().position(|v| !v.is_running()) {
            return Some(i);
        }

        let mut lowest = None;
        let mut level = f32::INFINITY;
        for (i, v) in self.voices.iter().enumerate().rev() {
            if v.status.contains(VoiceStatus::RELEASING)
                && !v.status.contains(VoiceStatus::STOPPING)
            {
                let loudness = v.left_mix.max(v.right_mix);
                if loudness < level {
                    level = loudness;
                    lowest = Some(i);
                }
            }
        }

        match lowest {
            Some(i) => {
                self.cut_notes += 1;
                self.voices[i].free();
                #[cfg(feature = "tracing")]
                tracing::debug!(voice = i, "cut releasing note");
                Some(i)
            }
            None => {
                self.lost_notes += 1;
                #[cfg(feature = "tracing")]
                tracing::debug!(lost = self.lost_notes, "no voice available");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleKind;
    use tonebank_core::note_to_freq;

    fn running(pool: &mut VoicePool, i: usize, status: VoiceStatus, mix: f32) {
        let v = &mut pool.voices_mut()[i];
        v.status = status;
        v.left_mix = mix;
        v.right_mix = mix;
    }

    #[test]
    fn test_vibrato_full_depth_swing() {
        use crate::sample::Vibrato;

        let mut sample = Sample::new(&[0.0; 100], 44100, note_to_freq(60.0), SampleKind::Sf2);
        sample.vibrato = Vibrato {
            sweep_increment: 0,
            control_ratio: 1,
            depth: 255,
        };
        let mut v = Voice {
            sample: Some(Arc::new(sample)),
            frequency: note_to_freq(60.0),
            ..Voice::default()
        };
        let base = v.base_increment(44100);
        assert_eq!(base as i64, FIXED_ONE);

        let steps: Vec<i64> = (0..64).map(|_| v.update_vibrato(44100, false)).collect();
        let peak = sine(248.0) * f64::from(255u32 << 7) / (8192.0 * 12.0);
        let max = *steps.iter().max().unwrap();
        let min = *steps.iter().min().unwrap();
        assert_eq!(max, (base * libm::pow(2.0, peak)) as i64);
        assert!((min - (base * libm::pow(2.0, -peak)) as i64).abs() <= 1);
        // Full depth swings just under four semitones each way.
        let semitones = 12.0 * libm::log2(max as f64 / base);
        assert!((semitones - 3.98).abs() < 0.01, "swing {semitones}");
    }

    #[test]
    fn test_status_flags() {
        let mut s = VoiceStatus::RUNNING | VoiceStatus::SUSTAINING;
        assert!(s.contains(VoiceStatus::RUNNING));
        assert!(s.intersects(VoiceStatus::SUSTAINING | VoiceStatus::STOPPING));
        s.remove(VoiceStatus::SUSTAINING);
        assert!(!s.contains(VoiceStatus::SUSTAINING));
        assert!(!s.is_empty());
        assert!(VoiceStatus::empty().is_empty());
    }

    #[test]
    fn test_allocate_prefers_free() {
        let mut pool = VoicePool::new(4);
        running(&mut pool, 0, VoiceStatus::RUNNING, 1.0);
        assert_eq!(pool.allocate(), Some(1));
        assert_eq!(pool.lost_notes(), 0);
    }

    #[test]
    fn test_allocate_steals_quietest_releasing() {
        let mut pool = VoicePool::new(3);
        running(&mut pool, 0, VoiceStatus::RUNNING | VoiceStatus::RELEASING, 0.5);
        running(&mut pool, 1, VoiceStatus::RUNNING | VoiceStatus::RELEASING, 0.1);
        running(&mut pool, 2, VoiceStatus::RUNNING, 0.01);
        assert_eq!(pool.allocate(), Some(1));
        assert_eq!(pool.cut_notes(), 1);
        assert!(pool.voices()[1].status.is_empty());
    }

    #[test]
    fn test_allocate_skips_stopping() {
        let mut pool = VoicePool::new(2);
        let stopping = VoiceStatus::RUNNING | VoiceStatus::RELEASING | VoiceStatus::STOPPING;
        running(&mut pool, 0, stopping, 0.0);
        running(&mut pool, 1, VoiceStatus::RUNNING, 1.0);
        assert_eq!(pool.allocate(), None);
        assert_eq!(pool.lost_notes(), 1);
        pool.reset();
        assert_eq!(pool.lost_notes(), 0);
        assert_eq!(pool.active(), 0);
    }

    #[test]
    fn test_kill_and_finish() {
        let sample = Arc::new(Sample::new(&[0.0; 8], 44100, note_to_freq(60.0), SampleKind::Sf2));
        let mut v = Voice {
            status: VoiceStatus::RUNNING | VoiceStatus::SUSTAINING | VoiceStatus::LOOPING,
            sample: Some(sample),
            ..Voice::default()
        };
        v.finish();
        assert!(v.status.contains(VoiceStatus::RELEASING));
        assert!(!v.status.contains(VoiceStatus::SUSTAINING));
        assert!(!v.status.contains(VoiceStatus::LOOPING));
        assert!(v.envelope.is_released());

        v.kill();
        assert!(v.status.contains(VoiceStatus::STOPPING));
        assert!(!v.is_held());
    }

    #[test]
    fn test_increment_keeps_direction() {
        let sample = Arc::new(Sample::new(&[0.0; 8], 22050, note_to_freq(60.0), SampleKind::Gus));
        let mut v = Voice {
            status: VoiceStatus::RUNNING,
            frequency: sample.root_freq * 2.0,
            sample: Some(sample),
            sample_increment: -1,
            ..Voice::default()
        };
        v.recompute_increment(44100);
        assert_eq!(v.sample_increment, -4096);
    }
}

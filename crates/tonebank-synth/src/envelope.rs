//! Per-voice amplitude envelopes.
//!
//! Two unrelated state machines share one call surface:
//!
//! - [`Gf1Envelope`] - Six rate/offset stages on an integer volume scale,
//!   mapped through the hardware log-volume curve.
//! - [`Sf2Envelope`] - Delay, attack, hold, decay, sustain, release. The
//!   attack ramps a linear gain 0 to 1; every later stage ramps an
//!   attenuation in centibels from 0 towards 960.
//!
//! [`Envelope`] is the tagged union a voice owns. It runs once per control
//! tick: [`Envelope::update`] advances the state, [`Envelope::gain`] turns it
//! into the mono gain the mixer multiplies by the pan offsets.
//!
//! # Status Interaction
//!
//! Envelopes write voice status flags directly. Reaching a sustain point sets
//! `SUSTAINING`; running out sets `RELEASING` (and `STOPPING` when the voice
//! should be faded and freed).

use tonebank_core::math::amp_to_cb;
use tonebank_core::modulation::{envelope_offset, envelope_rate};
use tonebank_core::{TIMECENT_NONE, atten_to_amp, cb_to_amp, gf1_amp, timecent_to_sec};

use crate::output::OutputSpec;
use crate::sample::{EnvelopeParams, Sample, SampleKind, SampleModes, Sf2EnvelopeParams};
use crate::voice::VoiceStatus;

/// Output scale applied after the envelope.
const FINAL_MIX_SCALE: f64 = 0.5;

/// Attenuation at which the ADSR release counts as silent.
const SILENCE_CB: f64 = 960.0;

/// Shortest ramp the ADSR envelope will compute a rate for, in seconds.
const MIN_RAMP_SECONDS: f64 = 0.006;

/// Stage index of the hardware envelope's sustain point.
pub const GF1_RELEASE: usize = 3;
/// Stage index of the last hardware envelope stage.
pub const GF1_RELEASE_C: usize = 5;

/// Hardware envelope stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gf1Stage {
    /// Ramp towards offset 0.
    Attack,
    /// Ramp towards offset 1.
    Hold,
    /// Ramp towards offset 2.
    Decay,
    /// Sustain point, then ramp towards offset 3.
    Release,
    /// Ramp towards offset 4.
    ReleaseB,
    /// Ramp towards offset 5.
    ReleaseC,
    /// All stages done.
    Finished,
}

impl Gf1Stage {
    fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Attack,
            1 => Self::Hold,
            2 => Self::Decay,
            3 => Self::Release,
            4 => Self::ReleaseB,
            5 => Self::ReleaseC,
            _ => Self::Finished,
        }
    }
}

/// Six-stage hardware envelope.
///
/// `stage` always names the stage that will be entered next; the ramp in
/// progress is towards `offsets[stage - 1]`.
#[derive(Clone, Debug, Default)]
pub struct Gf1Envelope {
    stage: usize,
    volume: i64,
    target: i64,
    increment: i64,
    rates: [i64; 6],
    offsets: [i64; 6],
    updating: bool,
    released: bool,
}

impl Gf1Envelope {
    /// Start from silence and head for the first stage.
    pub fn init(
        rates: &[u8; 6],
        offsets: &[u8; 6],
        modes: SampleModes,
        status: &mut VoiceStatus,
        output: &OutputSpec,
    ) -> Self {
        let mut env = Self {
            updating: true,
            ..Self::default()
        };
        for i in 0..6 {
            env.rates[i] = envelope_rate(rates[i], output.sample_rate, output.control_ratio);
            env.offsets[i] = envelope_offset(offsets[i]);
        }
        env.recompute(modes, status);
        env
    }

    /// Stage currently being ramped through.
    pub fn stage(&self) -> Gf1Stage {
        Gf1Stage::from_index(self.stage.saturating_sub(1))
    }

    /// Current volume on the `255 << 22` scale.
    pub fn volume(&self) -> i64 {
        self.volume
    }

    /// Per-tick volume change.
    pub fn increment(&self) -> i64 {
        self.increment
    }

    /// Move to the next stage with a non-zero distance to travel.
    ///
    /// Returns true when the envelope ran out at zero volume.
    fn recompute(&mut self, modes: SampleModes, status: &mut VoiceStatus) -> bool {
        loop {
            let stage = self.stage;
            if stage > GF1_RELEASE_C {
                self.increment = 0;
                self.updating = false;
                status.remove(VoiceStatus::SUSTAINING | VoiceStatus::LOOPING);
                status.insert(VoiceStatus::RELEASING);
                if self.volume <= 0 {
                    status.insert(VoiceStatus::STOPPING);
                    return true;
                }
                // Anything still audible plays out its sampled release.
                return false;
            }

            if stage == GF1_RELEASE
                && !status.contains(VoiceStatus::RELEASING)
                && modes.contains(SampleModes::SUSTAIN)
            {
                status.insert(VoiceStatus::SUSTAINING);
                self.increment = 0;
                self.updating = false;
                return false;
            }

            self.stage = stage + 1;
            if self.volume == self.offsets[stage] {
                continue;
            }
            self.target = self.offsets[stage];
            self.increment = if self.target < self.volume {
                -self.rates[stage]
            } else {
                self.rates[stage]
            };
            return false;
        }
    }

    /// One control tick. Returns true when the envelope ran out.
    pub fn update(&mut self, modes: SampleModes, status: &mut VoiceStatus) -> bool {
        self.volume += self.increment;
        let crossed = (self.increment < 0 && self.volume <= self.target)
            || (self.increment > 0 && self.volume >= self.target);
        if crossed {
            self.volume = self.target;
            return self.recompute(modes, status);
        }
        false
    }

    /// Note-off.
    ///
    /// Unless the sample forbids a synthetic release, ramp straight to zero
    /// at the final stage's rate. Otherwise resume the natural release stages.
    pub fn release(&mut self, modes: SampleModes, status: &mut VoiceStatus) {
        if self.released {
            return;
        }
        self.released = true;
        if !modes.contains(SampleModes::NO_SRELEASE) || modes.contains(SampleModes::FAST_RELEASE) {
            self.stage = GF1_RELEASE_C + 1;
            self.target = 0;
            self.increment = -self.rates[GF1_RELEASE_C];
        } else if modes.contains(SampleModes::SUSTAIN) {
            self.stage = self.stage.max(GF1_RELEASE);
            self.recompute(modes, status);
        }
        self.updating = true;
    }

    /// Mono gain for the current volume.
    pub fn gain(&self, attenuation: f32, tremolo: Option<f32>) -> f32 {
        let mut env = f64::from(attenuation);
        if let Some(t) = tremolo {
            env *= f64::from(t);
        }
        env *= self.volume as f64 / f64::from(1u32 << 30);
        (gf1_amp(env) * FINAL_MIX_SCALE) as f32
    }
}

/// ADSR envelope stages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sf2Stage {
    /// Silent until the delay elapses.
    #[default]
    Delay,
    /// Linear gain ramp 0 to 1.
    Attack,
    /// Full level until the hold time elapses.
    Hold,
    /// Attenuation ramp towards the sustain level.
    Decay,
    /// Holding at the sustain level.
    Sustain,
    /// Attenuation ramp towards silence.
    Release,
    /// Done; the voice is stopping.
    Finished,
}

/// Timecent-driven ADSR envelope.
#[derive(Clone, Debug, Default)]
pub struct Sf2Envelope {
    stage: Sf2Stage,
    /// Linear gain during the attack, centibels afterwards.
    volume: f64,
    params: Sf2EnvelopeParams,
    sample_rate: f64,
    hold_start: u64,
    rate_mul: f64,
    rate_mul_cb: f64,
    updating: bool,
    released: bool,
}

fn calc_rate(mul: f64, seconds: f64) -> f64 {
    mul / seconds.max(MIN_RAMP_SECONDS)
}

impl Sf2Envelope {
    /// Start in the delay stage.
    pub fn init(params: &Sf2EnvelopeParams, output: &OutputSpec) -> Self {
        let rate = f64::from(output.sample_rate.max(1));
        let rate_mul = f64::from(output.control_ratio) / rate;
        Self {
            stage: Sf2Stage::Delay,
            volume: 0.0,
            params: *params,
            sample_rate: rate,
            hold_start: 0,
            rate_mul,
            rate_mul_cb: rate_mul * SILENCE_CB,
            updating: true,
            released: false,
        }
    }

    /// Current stage.
    pub fn stage(&self) -> Sf2Stage {
        self.stage
    }

    /// Linear gain in the attack stage, centibels afterwards.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    fn elapsed(&self, since: u64, sample_count: u64, timecents: i32) -> bool {
        sample_count.saturating_sub(since) as f64
            >= timecent_to_sec(timecents) * self.sample_rate
    }

    /// One control tick. Returns true when the release reached silence.
    pub fn update(&mut self, status: &mut VoiceStatus, sample_count: u64) -> bool {
        loop {
            let new_volume = match self.stage {
                Sf2Stage::Delay => {
                    if self.elapsed(0, sample_count, self.params.delay) {
                        self.stage = Sf2Stage::Attack;
                        continue;
                    }
                    return false;
                }
                Sf2Stage::Attack => {
                    let sec = timecent_to_sec(self.params.attack);
                    let v = if sec <= 0.0 {
                        1.0
                    } else {
                        self.volume + calc_rate(self.rate_mul, sec)
                    };
                    if v >= 1.0 {
                        self.volume = 0.0;
                        self.hold_start = sample_count;
                        self.stage = if self.params.hold <= TIMECENT_NONE {
                            Sf2Stage::Decay
                        } else {
                            Sf2Stage::Hold
                        };
                        continue;
                    }
                    v
                }
                Sf2Stage::Hold => {
                    if self.elapsed(self.hold_start, sample_count, self.params.hold) {
                        self.stage = Sf2Stage::Decay;
                        continue;
                    }
                    return false;
                }
                Sf2Stage::Decay => {
                    let sustain = f64::from(self.params.sustain);
                    let sec = timecent_to_sec(self.params.decay);
                    let v = if sec <= 0.0 {
                        sustain
                    } else {
                        self.volume + calc_rate(self.rate_mul_cb, sec)
                    };
                    if v >= sustain {
                        self.stage = Sf2Stage::Sustain;
                        self.updating = false;
                        if !status.contains(VoiceStatus::RELEASING) {
                            status.insert(VoiceStatus::SUSTAINING);
                        }
                        sustain
                    } else {
                        v
                    }
                }
                Sf2Stage::Sustain => return false,
                Sf2Stage::Release => {
                    let sec = timecent_to_sec(self.params.release);
                    let v = if sec <= 0.0 {
                        SILENCE_CB + 40.0
                    } else {
                        self.volume + calc_rate(self.rate_mul_cb, sec)
                    };
                    if v >= SILENCE_CB {
                        self.stage = Sf2Stage::Finished;
                        status.remove(VoiceStatus::SUSTAINING | VoiceStatus::LOOPING);
                        status.insert(VoiceStatus::RELEASING | VoiceStatus::STOPPING);
                        self.updating = false;
                        return true;
                    }
                    v
                }
                Sf2Stage::Finished => return true,
            };
            self.volume = new_volume;
            return false;
        }
    }

    /// Note-off: enter the release stage from wherever the envelope is.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.stage {
            // The attack ramps a gain, every later stage an attenuation.
            Sf2Stage::Attack => self.volume = amp_to_cb(self.volume),
            Sf2Stage::Delay => self.volume = SILENCE_CB,
            Sf2Stage::Finished => return,
            _ => {}
        }
        self.stage = Sf2Stage::Release;
        self.updating = true;
    }

    /// Mono gain for the current stage.
    ///
    /// Soundfont regions use the hardware attenuation law, downloadable-sound
    /// regions the nominal one.
    pub fn gain(&self, kind: SampleKind, attenuation: f32) -> f32 {
        if self.stage == Sf2Stage::Delay {
            return 0.0;
        }
        let mut amp = match kind {
            SampleKind::Sf2 => atten_to_amp(f64::from(attenuation)),
            SampleKind::Gus | SampleKind::Dls => cb_to_amp(f64::from(attenuation)),
        };
        match self.stage {
            Sf2Stage::Attack => amp *= self.volume,
            Sf2Stage::Hold => {}
            _ => amp *= cb_to_amp(self.volume),
        }
        (amp * FINAL_MIX_SCALE * 0.5) as f32
    }
}

/// The envelope a voice owns, selected by the sample's envelope shape.
#[derive(Clone, Debug)]
pub enum Envelope {
    /// Hardware rate/offset envelope.
    Gf1(Gf1Envelope),
    /// Timecent ADSR envelope.
    Sf2(Sf2Envelope),
}

impl Default for Envelope {
    fn default() -> Self {
        Self::Gf1(Gf1Envelope::default())
    }
}

impl Envelope {
    /// Initialize from a sample at note-on.
    pub fn init(sample: &Sample, status: &mut VoiceStatus, output: &OutputSpec) -> Self {
        match &sample.envelope {
            EnvelopeParams::Gf1 { rates, offsets } => {
                Self::Gf1(Gf1Envelope::init(rates, offsets, sample.modes, status, output))
            }
            EnvelopeParams::Sf2(params) => Self::Sf2(Sf2Envelope::init(params, output)),
        }
    }

    /// One control tick. Returns true if the note died.
    pub fn update(&mut self, sample: &Sample, status: &mut VoiceStatus, sample_count: u64) -> bool {
        match self {
            Self::Gf1(env) => env.update(sample.modes, status),
            Self::Sf2(env) => env.update(status, sample_count),
        }
    }

    /// Note-off. Calling it again has no further effect.
    pub fn release(&mut self, sample: &Sample, status: &mut VoiceStatus) {
        match self {
            Self::Gf1(env) => env.release(sample.modes, status),
            Self::Sf2(env) => env.release(),
        }
    }

    /// Mono gain given the voice's attenuation and tremolo multiplier.
    ///
    /// Tremolo only affects hardware envelopes.
    pub fn gain(&self, sample: &Sample, attenuation: f32, tremolo: Option<f32>) -> f32 {
        match self {
            Self::Gf1(env) => env.gain(attenuation, tremolo),
            Self::Sf2(env) => env.gain(sample.kind, attenuation),
        }
    }

    /// True while the envelope still changes from tick to tick.
    pub fn is_updating(&self) -> bool {
        match self {
            Self::Gf1(env) => env.updating,
            Self::Sf2(env) => env.updating,
        }
    }

    /// True once a note-off reached the envelope.
    pub fn is_released(&self) -> bool {
        match self {
            Self::Gf1(env) => env.released,
            Self::Sf2(env) => env.released,
        }
    }
}

//! The engine: channels, voices and banks behind one event/render surface.
//!
//! A [`Renderer`] owns everything playback touches. Events arrive one at a
//! time through the `note_*`/`control_change`/... methods (or raw bytes via
//! [`Renderer::handle_event`]), and [`Renderer::compute_output`] renders the
//! current state into interleaved stereo frames.
//!
//! Instrument loading never happens here. Slots are marked during a usage
//! scan and filled by [`Renderer::load_missing_instruments`] before playback;
//! a note whose instrument is missing is dropped.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use tonebank_core::{PanLaw, compute_pan, gus_attenuation, note_to_freq, sf2_attenuation};

use crate::bank::{BankKind, BankRegistry};
use crate::channel::{Channel, MAX_CHANNELS, controller};
use crate::envelope::Envelope;
use crate::error::EngineError;
use crate::event::MidiEvent;
use crate::instrument::Instrument;
use crate::mix::mix_voice;
use crate::output::OutputSpec;
use crate::sample::{Sample, SampleKind, SampleModes};
use crate::source::InstrumentSource;
use crate::voice::{Voice, VoicePool, VoiceStatus};

/// Lowest supported output rate in Hz.
pub const MIN_SAMPLE_RATE: u32 = 400;
/// Highest supported output rate in Hz.
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Engine construction parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RendererConfig {
    /// Output rate in Hz.
    pub sample_rate: u32,
    /// Voice pool size.
    pub voices: usize,
    /// Largest block rendered in one internal pass, in frames.
    pub max_block: usize,
    /// Bit `n` set makes channel `n` (zero-based) a drum channel.
    pub drum_channels: u16,
    /// Program channels start on; `None` plays the default instrument.
    pub default_program: Option<u8>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            voices: 32,
            max_block: 1024,
            drum_channels: 1 << 9,
            default_program: Some(0),
        }
    }
}

fn pan_law(kind: SampleKind) -> PanLaw {
    match kind {
        SampleKind::Gus => PanLaw::Hardware,
        SampleKind::Sf2 | SampleKind::Dls => PanLaw::EqualPower,
    }
}

/// Pan gains for a region under a channel pan.
///
/// Soundfont regions add their own pan to the channel's.
fn region_pan(sample: &Sample, channel_pan: Option<u8>) -> (f32, f32) {
    match (sample.kind, channel_pan) {
        (SampleKind::Sf2, None) => compute_pan(
            f64::from(sample.panning + 500) / 1000.0,
            PanLaw::EqualPower,
        ),
        (SampleKind::Sf2, Some(p)) => compute_pan(
            f64::from(p) / 128.0 + f64::from(sample.panning) / 1000.0,
            PanLaw::EqualPower,
        ),
        (kind, Some(p)) => compute_pan(f64::from(p) / 128.0, pan_law(kind)),
        (_, None) => (sample.left_offset, sample.right_offset),
    }
}

/// Apply the channel's pitch wheel to a voice.
fn retune(voice: &mut Voice, channel: &mut Channel, output_rate: u32) {
    voice.frequency = match channel.bend_ratio() {
        Some((factor, true)) => voice.orig_frequency / factor,
        Some((factor, false)) => voice.orig_frequency * factor,
        None => voice.orig_frequency,
    };
    voice.recompute_increment(output_rate);
}

/// Recompute a voice's attenuation from channel volume, expression and velocity.
fn reamp(voice: &mut Voice, channel: &Channel) {
    let Some(sample) = &voice.sample else {
        return;
    };
    voice.attenuation = match sample.kind {
        SampleKind::Gus => gus_attenuation(channel.volume, channel.expression, voice.velocity),
        SampleKind::Sf2 | SampleKind::Dls => sf2_attenuation(
            channel.volume,
            channel.expression,
            voice.velocity,
            sample.initial_attenuation,
        ),
    };
}

/// Kill every held voice on the same channel sharing `voices[i]`'s key group.
fn choke_key_group(voices: &mut [Voice], i: usize) {
    let (channel, group) = match &voices[i].sample {
        Some(s) if s.key_group != 0 => (voices[i].channel, s.key_group),
        _ => return,
    };
    for (j, v) in voices.iter_mut().enumerate().rev() {
        if j == i || v.channel != channel || !v.is_held() {
            continue;
        }
        if v.sample.as_ref().is_some_and(|s| s.key_group == group) {
            v.kill();
        }
    }
}

/// Sample-based MIDI renderer.
///
/// ## Example
///
/// ```rust
/// use tonebank_synth::{Renderer, RendererConfig, WaveformSource};
///
/// let mut r = Renderer::new(RendererConfig::default()).unwrap();
/// r.mark_instrument(0, false, 0);
/// r.load_missing_instruments(&mut WaveformSource::default());
///
/// r.note_on(0, 60, 100);
/// let mut buf = vec![0.0f32; 512];
/// r.compute_output(&mut buf, 256);
/// assert!(buf.iter().any(|&s| s != 0.0));
/// ```
#[derive(Clone, Debug)]
pub struct Renderer {
    output: OutputSpec,
    channels: [Channel; MAX_CHANNELS],
    pool: VoicePool,
    banks: BankRegistry,
    default_instrument: Option<Arc<Instrument>>,
    default_program: Option<u8>,
    drum_channels: u16,
    max_block: usize,
    scratch: Vec<f32>,
}

impl Renderer {
    /// Build an engine with empty banks.
    pub fn new(config: RendererConfig) -> Result<Self, EngineError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&config.sample_rate) {
            return Err(EngineError::InvalidSampleRate(config.sample_rate));
        }
        if config.voices == 0 {
            return Err(EngineError::NoVoices);
        }
        if config.max_block == 0 {
            return Err(EngineError::InvalidBlockSize);
        }

        let mut channels = [Channel::default(); MAX_CHANNELS];
        for ch in &mut channels {
            ch.reset(config.default_program);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            sample_rate = config.sample_rate,
            voices = config.voices,
            max_block = config.max_block,
            "renderer created"
        );

        Ok(Self {
            output: OutputSpec::new(config.sample_rate),
            channels,
            pool: VoicePool::new(config.voices),
            banks: BankRegistry::new(),
            default_instrument: None,
            default_program: config.default_program,
            drum_channels: config.drum_channels,
            max_block: config.max_block,
            scratch: vec![0.0; config.max_block],
        })
    }

    /// Output rate and control ratio.
    pub fn output(&self) -> OutputSpec {
        self.output
    }

    /// Instrument banks.
    pub fn banks(&self) -> &BankRegistry {
        &self.banks
    }

    /// Instrument banks, for configuration.
    pub fn banks_mut(&mut self) -> &mut BankRegistry {
        &mut self.banks
    }

    /// Replace the banks wholesale. Playing voices keep their samples.
    pub fn set_banks(&mut self, banks: BankRegistry) {
        self.banks = banks;
    }

    /// Voice pool.
    pub fn voices(&self) -> &VoicePool {
        &self.pool
    }

    /// Controller state of a channel.
    pub fn channel(&self, channel: u8) -> &Channel {
        &self.channels[usize::from(channel & 0x0f)]
    }

    /// True if `channel` plays drum sets.
    pub fn is_drum_channel(&self, channel: u8) -> bool {
        self.drum_channels & (1 << (channel & 0x0f)) != 0
    }

    /// Make `channel` a drum channel or a melodic one.
    pub fn set_drum_channel(&mut self, channel: u8, drum: bool) {
        let bit = 1 << (channel & 0x0f);
        if drum {
            self.drum_channels |= bit;
        } else {
            self.drum_channels &= !bit;
        }
    }

    /// Instrument played by channels with no program.
    pub fn set_default_instrument(&mut self, instrument: Instrument) {
        self.default_instrument = Some(Arc::new(instrument));
    }

    /// Notes dropped for lack of a voice.
    pub fn lost_notes(&self) -> u32 {
        self.pool.lost_notes()
    }

    /// Releasing notes cut to make room.
    pub fn cut_notes(&self) -> u32 {
        self.pool.cut_notes()
    }

    /// Flag an instrument as needed by the upcoming playback.
    pub fn mark_instrument(&mut self, bank: u8, drum: bool, program: u8) {
        let kind = if drum { BankKind::Drum } else { BankKind::Tone };
        self.banks.mark(kind, bank & 0x7f, program & 0x7f);
    }

    /// Mark packed slot references, then load them.
    ///
    /// Returns the number of slots that failed to load.
    pub fn precache(&mut self, packed: &[u16], source: &mut dyn InstrumentSource) -> usize {
        self.banks.precache(packed);
        self.load_missing_instruments(source)
    }

    /// Load every marked slot. Returns the number of failures.
    pub fn load_missing_instruments(&mut self, source: &mut dyn InstrumentSource) -> usize {
        let errors = self.banks.load_missing(source, &self.output);
        #[cfg(feature = "tracing")]
        if errors > 0 {
            tracing::warn!(errors, "some instruments could not be loaded");
        }
        errors
    }

    /// Full MIDI reset: channels to defaults, every voice freed, counters zeroed.
    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.reset(self.default_program);
        }
        self.pool.reset();
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Decode and apply a raw channel message.
    pub fn handle_event(&mut self, status: u8, data1: u8, data2: u8) {
        if let Some(event) = MidiEvent::parse(status, data1, data2) {
            self.dispatch(event);
        }
    }

    /// Apply a decoded channel message.
    pub fn dispatch(&mut self, event: MidiEvent) {
        match event {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => self.note_on(channel, note, velocity),
            MidiEvent::NoteOff {
                channel,
                note,
                velocity,
            } => self.note_off(channel, note, velocity),
            MidiEvent::KeyPressure {
                channel,
                note,
                pressure,
            } => self.key_pressure(channel, note, pressure),
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => self.control_change(channel, controller, value),
            MidiEvent::ProgramChange { channel, program } => self.program_change(channel, program),
            MidiEvent::ChannelPressure { .. } => {}
            MidiEvent::PitchBend { channel, lsb, msb } => self.pitch_bend(channel, lsb, msb),
        }
    }

    /// Start a note. Velocity 0 releases it instead.
    ///
    /// A note already sounding on the channel is released first, unless its
    /// region allows overlapping copies. Mono channels kill everything.
    pub fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        // Data bytes arrive as 7-bit MIDI; stray high bits are masked off
        // rather than clamped, as the byte stream would carry them.
        let (chan, note, velocity) = (channel & 0x0f, note & 0x7f, velocity & 0x7f);
        if velocity == 0 {
            self.note_off(chan, note, 0);
            return;
        }

        let mono = self.channels[usize::from(chan)].mono;
        for v in self.pool.voices_mut().iter_mut().rev() {
            if !v.is_running() || v.channel != chan {
                continue;
            }
            if mono {
                v.kill();
            } else if v.note == note && !v.sample.as_ref().is_some_and(|s| s.self_nonexclusive) {
                v.finish();
            }
        }

        self.start_note(chan, note, velocity);
    }

    /// Release a note, or defer the release while the sustain pedal is down.
    pub fn note_off(&mut self, channel: u8, note: u8, _velocity: u8) {
        let (chan, note) = (channel & 0x0f, note & 0x7f);
        let sustain = self.channels[usize::from(chan)].sustain;
        for v in self.pool.voices_mut().iter_mut().rev() {
            if v.is_held() && v.channel == chan && v.note == note {
                if sustain {
                    v.status.insert(VoiceStatus::NOTE_SUSTAIN);
                } else {
                    v.finish();
                }
            }
        }
    }

    /// Polyphonic aftertouch: re-level matching voices.
    pub fn key_pressure(&mut self, channel: u8, note: u8, pressure: u8) {
        let (chan, note) = (channel & 0x0f, note & 0x7f);
        let ch = &self.channels[usize::from(chan)];
        for v in self.pool.voices_mut().iter_mut().rev() {
            if v.is_running() && v.channel == chan && v.note == note {
                v.velocity = pressure & 0x7f;
                reamp(v, ch);
                v.apply_envelope();
                if !v.sample.as_ref().is_some_and(|s| s.self_nonexclusive) {
                    return;
                }
            }
        }
    }

    /// Select a program, or a drum set on drum channels.
    pub fn program_change(&mut self, channel: u8, program: u8) {
        let drum = self.is_drum_channel(channel);
        let ch = &mut self.channels[usize::from(channel & 0x0f)];
        if drum {
            ch.bank = program & 0x7f;
        } else {
            ch.program = Some(program & 0x7f);
        }
    }

    /// Move the pitch wheel and retune sounding voices.
    pub fn pitch_bend(&mut self, channel: u8, lsb: u8, msb: u8) {
        let chan = channel & 0x0f;
        self.channels[usize::from(chan)].set_pitchbend(lsb, msb);
        self.adjust_pitchbend(chan);
    }

    /// Apply a controller change.
    pub fn control_change(&mut self, channel: u8, controller: u8, value: u8) {
        let chan = channel & 0x0f;
        let value = value & 0x7f;
        let ch = &mut self.channels[usize::from(chan)];
        match controller & 0x7f {
            controller::BANK_SELECT => ch.bank = value,
            controller::BANK_SELECT_FINE => {
                if value == 0 {
                    ch.bank = 0;
                }
            }
            controller::VOLUME => {
                ch.volume = value;
                self.adjust_volume(chan);
            }
            controller::EXPRESSION => {
                ch.expression = value;
                self.adjust_volume(chan);
            }
            controller::PAN => {
                ch.panning = Some(value);
                self.adjust_panning(chan);
            }
            controller::SUSTAIN => {
                ch.sustain = value != 0;
                if value == 0 {
                    self.drop_sustain(chan);
                }
            }
            controller::NRPN_LSB => ch.select_nrpn(value, false),
            controller::NRPN_MSB => ch.select_nrpn(value, true),
            controller::RPN_LSB => ch.select_rpn(value, false),
            controller::RPN_MSB => ch.select_rpn(value, true),
            controller::DATA_ENTRY => {
                if ch.data_entry(value, true) {
                    self.adjust_pitchbend(chan);
                }
            }
            controller::DATA_ENTRY_FINE => {
                if ch.data_entry(value, false) {
                    self.adjust_pitchbend(chan);
                }
            }
            controller::ALL_SOUNDS_OFF => self.all_sounds_off(chan),
            controller::RESET_CONTROLLERS => ch.reset_controllers(),
            controller::ALL_NOTES_OFF => self.all_notes_off(chan),
            _other => {
                #[cfg(feature = "tracing")]
                tracing::trace!(channel = chan, controller = _other, "ignored controller");
            }
        }
    }

    /// Release every held note on a channel, pedal-aware.
    pub fn all_notes_off(&mut self, channel: u8) {
        let chan = channel & 0x0f;
        let sustain = self.channels[usize::from(chan)].sustain;
        for v in self.pool.voices_mut().iter_mut().rev() {
            if v.is_held() && v.channel == chan {
                if sustain {
                    v.status.insert(VoiceStatus::NOTE_SUSTAIN);
                } else {
                    v.finish();
                }
            }
        }
    }

    /// Fade out everything sounding on a channel.
    pub fn all_sounds_off(&mut self, channel: u8) {
        let chan = channel & 0x0f;
        for v in self.pool.voices_mut().iter_mut().rev() {
            if v.is_running() && v.channel == chan && !v.status.contains(VoiceStatus::STOPPING) {
                v.kill();
            }
        }
    }

    fn drop_sustain(&mut self, chan: u8) {
        for v in self.pool.voices_mut().iter_mut().rev() {
            if v.channel == chan && v.status.contains(VoiceStatus::NOTE_SUSTAIN) {
                v.status.remove(VoiceStatus::NOTE_SUSTAIN);
                v.finish();
            }
        }
    }

    fn adjust_volume(&mut self, chan: u8) {
        let ch = &self.channels[usize::from(chan)];
        for v in self.pool.voices_mut().iter_mut().rev() {
            if v.is_running() && v.channel == chan {
                reamp(v, ch);
                v.apply_envelope();
            }
        }
    }

    fn adjust_panning(&mut self, chan: u8) {
        let pan = self.channels[usize::from(chan)].panning;
        for v in self.pool.voices_mut().iter_mut().rev() {
            if !v.is_running() || v.channel != chan {
                continue;
            }
            let Some(sample) = &v.sample else {
                continue;
            };
            let (left, right) = region_pan(sample, pan);
            v.left_offset = left;
            v.right_offset = right;
            v.apply_envelope();
        }
    }

    fn adjust_pitchbend(&mut self, chan: u8) {
        let rate = self.output.sample_rate;
        let ch = &mut self.channels[usize::from(chan)];
        for v in self.pool.voices_mut().iter_mut().rev() {
            if v.is_running() && v.channel == chan {
                retune(v, ch, rate);
            }
        }
    }

    // ------------------------------------------------------------------
    // Note start
    // ------------------------------------------------------------------

    fn instrument_for(&self, chan: u8, note: u8) -> Option<Arc<Instrument>> {
        let ch = &self.channels[usize::from(chan)];
        if self.is_drum_channel(chan) {
            return self.banks.resolve(BankKind::Drum, ch.bank, note);
        }
        match ch.program {
            Some(program) => self.banks.resolve(BankKind::Tone, ch.bank, program),
            None => self.default_instrument.clone(),
        }
    }

    fn start_note(&mut self, chan: u8, note: u8, velocity: u8) {
        let Some(inst) = self.instrument_for(chan, note) else {
            #[cfg(feature = "tracing")]
            tracing::debug!(channel = chan, note, "no instrument for note");
            return;
        };
        let freq = inst.note_frequency(note);

        if inst.kind() == Some(SampleKind::Gus) {
            // Hardware patches ignore velocity and play a single region.
            if let Some(sample) = inst.select_gus_region(freq) {
                self.start_region(chan, note, velocity, sample, freq);
            }
            return;
        }

        for sample in inst.matching_regions(velocity, freq) {
            if !self.start_region(chan, note, velocity, sample, freq) {
                break;
            }
        }
    }

    /// Bind a free voice to `sample`. Returns false if no voice was available.
    fn start_region(
        &mut self,
        chan: u8,
        note: u8,
        velocity: u8,
        sample: &Arc<Sample>,
        freq: f64,
    ) -> bool {
        let Some(i) = self.pool.allocate() else {
            return false;
        };

        let orig_frequency = match sample.kind {
            SampleKind::Gus => freq,
            _ if sample.scale_factor != 1024 => sample.scaled_frequency(note),
            _ if sample.tune != 0.0 => note_to_freq(f64::from(note) + sample.tune * 0.01),
            _ => note_to_freq(f64::from(note)),
        };

        let output = self.output;
        let ch = &mut self.channels[usize::from(chan)];
        let voices = self.pool.voices_mut();
        voices[i] = Voice {
            status: VoiceStatus::RUNNING,
            sample: Some(Arc::clone(sample)),
            channel: chan,
            note,
            velocity,
            orig_frequency,
            frequency: orig_frequency,
            tremolo_sweep: sample.tremolo.sweep_increment,
            tremolo_volume: 1.0,
            vibrato_sweep: sample.vibrato.sweep_increment,
            ..Voice::default()
        };

        choke_key_group(voices, i);

        let v = &mut voices[i];
        let (left, right) = region_pan(sample, ch.panning);
        v.left_offset = left;
        v.right_offset = right;

        retune(v, ch, output.sample_rate);
        reamp(v, ch);
        v.envelope = Envelope::init(sample, &mut v.status, &output);
        if sample.modes.contains(SampleModes::LOOP) {
            v.status.insert(VoiceStatus::LOOPING);
        }
        v.apply_envelope();

        #[cfg(feature = "tracing")]
        tracing::trace!(voice = i, channel = chan, note, velocity, "note started");
        true
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Render `frames` interleaved stereo frames into `buffer`.
    ///
    /// The buffer is zeroed first. `frames` is clamped to what `buffer` can
    /// hold. Rendering proceeds in internal blocks, so this never allocates.
    pub fn compute_output(&mut self, buffer: &mut [f32], frames: usize) {
        let frames = frames.min(buffer.len() / 2);
        let out = &mut buffer[..frames * 2];
        out.fill(0.0);

        let output = self.output;
        for block in out.chunks_mut(self.max_block * 2) {
            for voice in self.pool.voices_mut() {
                if voice.is_running() {
                    mix_voice(voice, block, &mut self.scratch, &output);
                }
            }
        }
    }
}

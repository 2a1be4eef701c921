//! Where instruments come from.
//!
//! The bank registry never reads files itself. It asks an
//! [`InstrumentSource`] for each pending slot; the I/O crate provides a WAV
//! directory source and this module a file-free [`WaveformSource`].

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::f64::consts::PI;

use tonebank_core::note_to_freq;

use crate::bank::BankKind;
use crate::error::LoadError;
use crate::instrument::Instrument;
use crate::output::OutputSpec;
use crate::records::{PatchOverrides, PatchRecord, PatchSet, convert_patch};
use crate::sample::SampleModes;

/// One slot the registry wants filled.
#[derive(Clone, Copy, Debug)]
pub struct LoadRequest<'a> {
    /// Tone bank or drum set.
    pub kind: BankKind,
    /// Bank number.
    pub bank: u8,
    /// Program, or note for drum sets.
    pub program: u8,
    /// Configured instrument name, if any.
    pub name: Option<&'a str>,
    /// Overrides with drum defaults already applied.
    pub overrides: PatchOverrides,
    /// Output the instrument will be played at.
    pub output: OutputSpec,
}

/// A provider of instruments.
pub trait InstrumentSource {
    /// Load the instrument for `request`.
    ///
    /// `Ok(None)` means this source does not define the slot, letting a
    /// later source try. `Err` means it does but could not load it.
    fn load(&mut self, request: &LoadRequest<'_>) -> Result<Option<Instrument>, LoadError>;
}

impl<S: InstrumentSource + ?Sized> InstrumentSource for Box<S> {
    fn load(&mut self, request: &LoadRequest<'_>) -> Result<Option<Instrument>, LoadError> {
        (**self).load(request)
    }
}

/// Sources tried in ascending `order`; the first to answer wins.
#[derive(Default)]
pub struct SourceChain {
    sources: Vec<(i32, Box<dyn InstrumentSource>)>,
}

impl SourceChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source. Equal orders keep insertion order.
    pub fn push(&mut self, order: i32, source: Box<dyn InstrumentSource>) {
        let at = self.sources.partition_point(|(o, _)| *o <= order);
        self.sources.insert(at, (order, source));
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True if no sources were added.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl InstrumentSource for SourceChain {
    fn load(&mut self, request: &LoadRequest<'_>) -> Result<Option<Instrument>, LoadError> {
        let mut last_err = None;
        for (_, source) in &mut self.sources {
            match source.load(request) {
                Ok(Some(inst)) => return Ok(Some(inst)),
                Ok(None) => {}
                Err(e) => last_err = Some(e),
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

/// Single-cycle shapes for [`WaveformSource`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Waveform {
    /// Pure fundamental.
    #[default]
    Sine,
    /// Odd harmonics, soft.
    Triangle,
    /// All harmonics, bright.
    Saw,
    /// Odd harmonics, hollow.
    Square,
}

impl Waveform {
    /// Value at `phase` in `[0, 1)`.
    pub fn value(self, phase: f64) -> f64 {
        match self {
            Self::Sine => libm::sin(2.0 * PI * phase),
            Self::Triangle => {
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
            Self::Saw => 2.0 * phase - 1.0,
            Self::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// Frames in one generated cycle.
const CYCLE_FRAMES: usize = 256;
/// Rate generated waveforms are stored at.
const SOURCE_RATE: u32 = 44100;
/// Length of generated drum hits.
const DRUM_FRAMES: usize = 8820;

/// Generates an instrument for every slot, so the engine can play without
/// instrument files.
///
/// Melodic programs get a looped cycle of the configured shape with a
/// sustaining envelope. Drum notes get a short decaying hit: a falling sine
/// for kicks and toms, noise for everything else.
#[derive(Clone, Copy, Debug, Default)]
pub struct WaveformSource {
    /// Shape of melodic programs.
    pub shape: Waveform,
}

impl WaveformSource {
    /// Source generating `shape` for melodic programs.
    pub fn new(shape: Waveform) -> Self {
        Self { shape }
    }

    fn melodic(&self) -> PatchRecord {
        let frames: Vec<i16> = (0..CYCLE_FRAMES)
            .map(|i| {
                let v = self.shape.value(i as f64 / CYCLE_FRAMES as f64);
                (v * 0.8 * f64::from(i16::MAX)) as i16
            })
            .collect();
        let root = u64::from(SOURCE_RATE) * 1000 / CYCLE_FRAMES as u64;
        PatchRecord {
            data: pcm16(&frames),
            loop_start: 0,
            loop_end: (CYCLE_FRAMES * 2) as u32,
            sample_rate: SOURCE_RATE,
            low_freq: 0,
            high_freq: note_to_freq(127.0) as u32 + 1,
            root_freq: root as u32,
            balance: 7,
            envelope_rates: [0x3f, 0x3f, 0x3f, 0x50, 0x50, 0x50],
            envelope_offsets: [250, 250, 250, 5, 5, 5],
            modes: SampleModes::PATCH_16 | SampleModes::LOOP | SampleModes::SUSTAIN,
            scale_frequency: 60,
            scale_factor: 1024,
            ..PatchRecord::default()
        }
    }

    fn drum(note: u8) -> PatchRecord {
        let tonal = matches!(note, 35 | 36 | 41..=50);
        let mut state = 0x9E37_79B9u32 ^ u32::from(note);
        let frames: Vec<i16> = (0..DRUM_FRAMES)
            .map(|i| {
                let t = i as f64 / f64::from(SOURCE_RATE);
                let decay = libm::exp(-t * 30.0);
                let v = if tonal {
                    let freq = 60.0 + 4.0 * f64::from(note) * libm::exp(-t * 20.0);
                    libm::sin(2.0 * PI * freq * t)
                } else {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    f64::from(state as i32) / f64::from(i32::MAX)
                };
                (v * decay * 0.8 * f64::from(i16::MAX)) as i16
            })
            .collect();
        PatchRecord {
            data: pcm16(&frames),
            sample_rate: SOURCE_RATE,
            low_freq: 0,
            high_freq: note_to_freq(127.0) as u32 + 1,
            root_freq: note_to_freq(f64::from(note)) as u32,
            balance: 7,
            envelope_rates: [0x3f; 6],
            envelope_offsets: [250; 6],
            modes: SampleModes::PATCH_16,
            scale_frequency: i16::from(note),
            scale_factor: 1024,
            ..PatchRecord::default()
        }
    }
}

fn pcm16(frames: &[i16]) -> Vec<u8> {
    frames.iter().flat_map(|v| v.to_le_bytes()).collect()
}

impl InstrumentSource for WaveformSource {
    fn load(&mut self, request: &LoadRequest<'_>) -> Result<Option<Instrument>, LoadError> {
        let record = match request.kind {
            BankKind::Tone => self.melodic(),
            BankKind::Drum => Self::drum(request.program),
        };
        let set = PatchSet {
            description: None,
            samples: alloc::vec![record],
        };
        convert_patch(&set, &request.overrides, &request.output).map(Some)
    }
}

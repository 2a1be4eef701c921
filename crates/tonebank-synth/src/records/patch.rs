//! Hardware patch records.
//!
//! A patch is a list of waveforms, each with a 6-stage rate/offset envelope,
//! a frequency range in milli-Hertz and optional tremolo and vibrato bytes.
//! Lengths and loop points arrive in bytes, as the patch header stores them.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use tonebank_core::modulation::{
    tremolo_phase_increment, tremolo_sweep_increment, vibrato_control_ratio,
    vibrato_sweep_increment,
};
use tonebank_core::{FRACTION_BITS, PanLaw, compute_pan, note_to_freq, to_fixed};

use super::check_frames;
use super::pcm::{PcmFormat, decode_pcm};
use crate::error::LoadError;
use crate::instrument::Instrument;
use crate::output::OutputSpec;
use crate::resample::pre_resample;
use crate::sample::{EnvelopeParams, Sample, SampleKind, SampleModes, Tremolo, Vibrato};

/// Smallest envelope offset a patch may use.
const MIN_OFFSET: u8 = 5;
/// Largest envelope offset a patch may use.
const MAX_OFFSET: u8 = 251;

/// One waveform of a patch, fields as stored in the header.
#[derive(Clone, Debug, Default)]
pub struct PatchRecord {
    /// Raw PCM, layout given by `modes`.
    pub data: Vec<u8>,
    /// Loop start in bytes.
    pub loop_start: u32,
    /// Loop end in bytes.
    pub loop_end: u32,
    /// Sub-frame loop positions: low nibble start, high nibble end.
    pub fractions: u8,
    /// Native sample rate in Hz.
    pub sample_rate: u32,
    /// Lowest frequency, milli-Hertz.
    pub low_freq: u32,
    /// Highest frequency, milli-Hertz.
    pub high_freq: u32,
    /// Recorded frequency, milli-Hertz.
    pub root_freq: u32,
    /// Pan nibble, 0 (left) to 15 (right).
    pub balance: u8,
    /// Envelope rate bytes.
    pub envelope_rates: [u8; 6],
    /// Envelope offset bytes.
    pub envelope_offsets: [u8; 6],
    /// Tremolo sweep byte.
    pub tremolo_sweep: u8,
    /// Tremolo rate byte.
    pub tremolo_rate: u8,
    /// Tremolo depth byte.
    pub tremolo_depth: u8,
    /// Vibrato sweep byte.
    pub vibrato_sweep: u8,
    /// Vibrato rate byte.
    pub vibrato_rate: u8,
    /// Vibrato depth byte.
    pub vibrato_depth: u8,
    /// Mode flags.
    pub modes: SampleModes,
    /// Note the scaling pivots around.
    pub scale_frequency: i16,
    /// Scale factor: 0-2 are multiples of 1024, otherwise 1/1024ths.
    pub scale_factor: i16,
}

/// A parsed patch: an optional description plus its waveforms.
#[derive(Clone, Debug, Default)]
pub struct PatchSet {
    /// Header description. Loop and envelope stripping only apply when it is empty.
    pub description: Option<String>,
    /// Waveforms in file order.
    pub samples: Vec<PatchRecord>,
}

impl PatchSet {
    fn is_undescribed(&self) -> bool {
        self.description
            .as_deref()
            .is_none_or(|d| d.trim_matches(char::from(0)).trim().is_empty())
    }
}

/// Per-entry adjustments a bank configuration applies while loading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatchOverrides {
    /// Fixed pan, 0 (left) to 127 (right).
    pub pan: Option<u8>,
    /// Always play at this note.
    pub note: Option<u8>,
    /// `Some(true)` removes loops, `Some(false)` keeps them.
    pub strip_loop: Option<bool>,
    /// `Some(true)` flattens the envelope, `Some(false)` keeps it.
    pub strip_envelope: Option<bool>,
    /// Cut playback at the loop end.
    pub strip_tail: bool,
    /// Amplification in percent.
    pub amp: Option<u16>,
}

/// Rate substituted for records claiming 0 Hz.
const MIN_RECORD_RATE: u32 = 400;

/// Convert a patch into an instrument.
///
/// Recoverable oddities (out-of-range loops, extreme envelope offsets, odd
/// scale factors, zero rates or roots) are repaired. Empty waveforms and oversize data fail.
pub fn convert_patch(
    set: &PatchSet,
    overrides: &PatchOverrides,
    output: &OutputSpec,
) -> Result<Instrument, LoadError> {
    if set.samples.is_empty() {
        return Err(LoadError::NoSamples);
    }
    let undescribed = set.is_undescribed();
    let samples = set
        .samples
        .iter()
        .map(|record| convert_record(record, overrides, undescribed, output))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Instrument::new(samples))
}

fn convert_record(
    record: &PatchRecord,
    overrides: &PatchOverrides,
    undescribed: bool,
    output: &OutputSpec,
) -> Result<Sample, LoadError> {
    let mut modes = record.modes;
    let format = PcmFormat::from_modes(modes);
    let frames = record.data.len() / format.width();
    if frames == 0 {
        return Err(LoadError::EmptyData);
    }
    check_frames(frames)?;

    let panning = match overrides.pan {
        Some(pan) => i32::from(pan & 0x7f) * 1000 / 127 - 500,
        None => i32::from(record.balance & 0x0f) * 1000 / 15 - 500,
    };
    let (left_offset, right_offset) =
        compute_pan(f64::from(panning + 500) / 1000.0, PanLaw::Hardware);

    let tremolo = if record.tremolo_rate == 0 || record.tremolo_depth == 0 {
        Tremolo::default()
    } else {
        Tremolo {
            sweep_increment: tremolo_sweep_increment(
                record.tremolo_sweep,
                output.control_ratio,
                output.sample_rate,
            ),
            phase_increment: tremolo_phase_increment(
                record.tremolo_rate,
                output.control_ratio,
                output.sample_rate,
            ),
            depth: record.tremolo_depth,
        }
    };

    let vibrato = if record.vibrato_rate == 0 || record.vibrato_depth == 0 {
        Vibrato::default()
    } else {
        let control_ratio = vibrato_control_ratio(record.vibrato_rate, output.sample_rate);
        Vibrato {
            sweep_increment: vibrato_sweep_increment(
                record.vibrato_sweep,
                control_ratio,
                output.sample_rate,
            ),
            control_ratio,
            depth: record.vibrato_depth,
        }
    };

    let (scale_note, scale_factor) = match overrides.note {
        Some(note) => (i32::from(note & 0x7f), 0),
        None => {
            let factor = i32::from(record.scale_factor);
            let factor = if factor <= 2 {
                factor * 1024
            } else if factor > 2048 {
                1024
            } else {
                factor
            };
            (i32::from(record.scale_frequency), factor)
        }
    };

    let loop_modes =
        SampleModes::SUSTAIN | SampleModes::LOOP | SampleModes::BIDIR | SampleModes::BACKWARD;
    if overrides.strip_loop == Some(true) && undescribed {
        modes.remove(loop_modes);
    }

    let mut rates = record.envelope_rates;
    let mut offsets = record.envelope_offsets;
    if overrides.strip_envelope == Some(true) && undescribed {
        let top = offsets.iter().copied().max().unwrap_or(0);
        rates = [63; 6];
        offsets = [top; 6];
    }
    for offset in &mut offsets {
        *offset = (*offset).clamp(MIN_OFFSET, MAX_OFFSET);
    }

    let mut data = decode_pcm(&record.data, format);
    let width = format.width() as u32;
    let mut loop_end = ((record.loop_end / width) as usize).min(frames);
    let mut loop_start = ((record.loop_start / width) as usize).min(loop_end);

    if modes.contains(SampleModes::BACKWARD) {
        data[..frames].reverse();
        data[frames] = data[frames - 1];
        let start = loop_start;
        loop_start = frames - loop_end;
        loop_end = frames - start;
        modes.remove(SampleModes::BACKWARD);
        modes.insert(SampleModes::LOOP);
    }

    if let Some(amp) = overrides.amp {
        let gain = f32::from(amp) / 100.0;
        for v in &mut data {
            *v *= gain;
        }
    }

    let fractions = i64::from(record.fractions);
    let loop_start = to_fixed(loop_start) | ((fractions & 0x0f) << (FRACTION_BITS - 4));
    let loop_end = to_fixed(loop_end) | ((fractions & 0xf0) << (FRACTION_BITS - 8));

    let mut sample = Sample {
        data: Arc::from(data),
        data_length: to_fixed(frames),
        loop_start,
        loop_end,
        sample_rate: if record.sample_rate == 0 {
            MIN_RECORD_RATE
        } else {
            record.sample_rate
        },
        low_freq: f64::from(record.low_freq),
        high_freq: f64::from(record.high_freq),
        // A zero root would give the voice no pitch to step at.
        root_freq: if record.root_freq == 0 {
            note_to_freq(60.0)
        } else {
            f64::from(record.root_freq)
        },
        low_vel: 0,
        high_vel: 127,
        scale_note,
        scale_factor,
        tune: 0.0,
        panning,
        left_offset,
        right_offset,
        modes,
        kind: SampleKind::Gus,
        key_group: 0,
        self_nonexclusive: false,
        initial_attenuation: 0.0,
        tremolo,
        vibrato,
        envelope: EnvelopeParams::Gf1 { rates, offsets },
    };

    if sample.scale_factor == 0 && !sample.modes.contains(SampleModes::LOOP) {
        pre_resample(&mut sample, output.sample_rate);
    }

    if overrides.strip_tail {
        sample.data_length = sample.loop_end;
    }

    Ok(sample)
}

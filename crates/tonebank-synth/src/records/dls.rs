//! Downloadable-sound regions.

use alloc::sync::Arc;
use alloc::vec::Vec;

use tonebank_core::{PanLaw, TIMECENT_NONE, compute_pan, note_to_freq, to_fixed};

use super::check_frames;
use super::pcm::{PcmFormat, decode_pcm};
use crate::error::LoadError;
use crate::instrument::Instrument;
use crate::sample::{
    EnvelopeParams, Sample, SampleKind, SampleModes, Sf2EnvelopeParams, Tremolo, Vibrato,
};

/// Volume envelope and pan connections of a region or instrument.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DlsArticulation {
    /// Attack time in timecents.
    pub attack: i32,
    /// Hold time in timecents.
    pub hold: i32,
    /// Decay time in timecents.
    pub decay: i32,
    /// Release time in timecents.
    pub release: i32,
    /// Sustain level in tenths of a percent, 0 to 1000.
    pub sustain: i32,
    /// Pan in tenths of a percent, -500 (left) to 500 (right).
    pub pan: i32,
}

impl Default for DlsArticulation {
    fn default() -> Self {
        Self {
            attack: TIMECENT_NONE,
            hold: TIMECENT_NONE,
            decay: TIMECENT_NONE,
            release: TIMECENT_NONE,
            sustain: 1000,
            pan: 0,
        }
    }
}

/// One wave-linked region.
#[derive(Clone, Debug)]
pub struct DlsRegion {
    /// Lowest key.
    pub key_lo: u8,
    /// Highest key.
    pub key_hi: u8,
    /// Lowest velocity.
    pub vel_lo: u8,
    /// Highest velocity.
    pub vel_hi: u8,
    /// Allow several voices of this region on one note.
    pub self_nonexclusive: bool,
    /// Exclusive class.
    pub key_group: u16,
    /// Key the wave was recorded at.
    pub unity_note: u8,
    /// Fine tuning in cents.
    pub fine_tune: i16,
    /// Raw PCM: 8-bit unsigned or 16-bit signed little-endian.
    pub data: Arc<[u8]>,
    /// 8 or 16.
    pub bits_per_sample: u16,
    /// Native rate in Hz.
    pub sample_rate: u32,
    /// Loop as `(start, length)` in frames.
    pub sample_loop: Option<(u32, u32)>,
    /// Region articulation; the instrument-level one applies when absent.
    pub articulation: Option<DlsArticulation>,
}

/// Convert the regions of one instrument.
///
/// `instrument_articulation` takes precedence over region articulations, the
/// way instrument-level connection lists do in the format.
pub fn convert_dls(
    regions: &[DlsRegion],
    instrument_articulation: Option<&DlsArticulation>,
) -> Result<Instrument, LoadError> {
    if regions.is_empty() {
        return Err(LoadError::NoSamples);
    }
    let samples = regions
        .iter()
        .map(|r| convert_region(r, instrument_articulation))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Instrument::new(samples))
}

fn convert_region(
    region: &DlsRegion,
    instrument_articulation: Option<&DlsArticulation>,
) -> Result<Sample, LoadError> {
    let format = match region.bits_per_sample {
        8 => PcmFormat::U8,
        16 => PcmFormat::S16,
        other => {
            return Err(LoadError::UnsupportedFormat(alloc::format!(
                "{other}-bit DLS wave"
            )));
        }
    };
    let frames = region.data.len() / format.width();
    if frames == 0 {
        return Err(LoadError::EmptyData);
    }
    check_frames(frames)?;
    let data = decode_pcm(&region.data, format);

    let mut modes = if format == PcmFormat::U8 {
        SampleModes::UNSIGNED
    } else {
        SampleModes::PATCH_16
    };
    let (mut loop_start, mut loop_end) = (0, to_fixed(frames));
    if let Some((start, length)) = region.sample_loop {
        let start = (start as usize).min(frames);
        let end = start.saturating_add(length as usize).min(frames);
        loop_start = to_fixed(start);
        loop_end = to_fixed(end);
        modes.insert(SampleModes::LOOP | SampleModes::SUSTAIN);
    }

    let art = instrument_articulation
        .or(region.articulation.as_ref())
        .copied()
        .unwrap_or_default();
    let sustain_level = art.sustain.clamp(0, 1000);
    let envelope = EnvelopeParams::Sf2(Sf2EnvelopeParams {
        delay: TIMECENT_NONE,
        attack: art.attack,
        hold: art.hold,
        decay: art.decay,
        sustain: 960.0 * (1.0 - sustain_level as f32 / 1000.0),
        release: art.release,
    });
    let panning = art.pan.clamp(-500, 500);
    let (left_offset, right_offset) =
        compute_pan(f64::from(panning + 500) / 1000.0, PanLaw::EqualPower);

    let unity = f64::from(region.unity_note) + f64::from(region.fine_tune) * 0.01;
    Ok(Sample {
        data: Arc::from(data),
        data_length: to_fixed(frames),
        loop_start,
        loop_end,
        sample_rate: region.sample_rate,
        low_freq: note_to_freq(f64::from(region.key_lo)),
        high_freq: note_to_freq(f64::from(region.key_hi)),
        root_freq: note_to_freq(unity),
        low_vel: region.vel_lo,
        high_vel: region.vel_hi,
        scale_note: i32::from(region.unity_note),
        scale_factor: 1024,
        tune: 0.0,
        panning,
        left_offset,
        right_offset,
        modes,
        kind: SampleKind::Dls,
        key_group: u32::from(region.key_group),
        self_nonexclusive: region.self_nonexclusive,
        initial_attenuation: 0.0,
        tremolo: Tremolo::default(),
        vibrato: Vibrato::default(),
        envelope,
    })
}

//! Soundfont sample headers and generator regions.
//!
//! A soundfont stores every waveform in one 16-bit pool. Sample headers
//! index into that pool, and regions layer generator offsets on top of a
//! header. Header fields are repaired on construction the way the format
//! asks readers to: the nearest practical value replaces an illegal one.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use tonebank_core::{FRACTION_BITS, PanLaw, TIMECENT_NONE, compute_pan, note_to_freq, to_fixed};

use super::check_frames;
use crate::error::LoadError;
use crate::instrument::Instrument;
use crate::sample::{
    EnvelopeParams, Sample, SampleKind, SampleModes, Sf2EnvelopeParams, Tremolo, Vibrato,
};

/// Default generator time: 2^(-12000/1200) seconds, about 1 ms.
pub const DEFAULT_TIMECENTS: i32 = -12000;

/// One sample header, positions in frames of the shared pool.
#[derive(Clone, Debug)]
pub struct SoundFontSample {
    /// Header name.
    pub name: String,
    /// The font's whole 16-bit sample pool.
    pub pool: Arc<[i16]>,
    /// First frame.
    pub start: u32,
    /// One past the last frame.
    pub end: u32,
    /// Loop start frame.
    pub loop_start: u32,
    /// Loop end frame.
    pub loop_end: u32,
    /// Native rate in Hz.
    pub sample_rate: u32,
    /// Recorded MIDI key.
    pub original_pitch: u8,
    /// Recorded pitch error in cents.
    pub pitch_correction: i8,
    /// Set when the header cannot be played.
    pub bad: bool,
}

impl SoundFontSample {
    /// Build a header and repair it against the pool.
    ///
    /// - A zero rate becomes 400 Hz.
    /// - Pitches above 127 (including the 255 "unpitched" marker) become 60.
    /// - Positions are clamped to the last pool frame.
    /// - `start >= end` marks the header bad.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        pool: Arc<[i16]>,
        start: u32,
        end: u32,
        loop_start: u32,
        loop_end: u32,
        sample_rate: u32,
        original_pitch: u8,
    ) -> Self {
        let mut header = Self {
            name: name.into(),
            pool,
            start,
            end,
            loop_start,
            loop_end,
            sample_rate,
            original_pitch,
            pitch_correction: 0,
            bad: false,
        };
        header.repair();
        header
    }

    fn repair(&mut self) {
        if self.sample_rate == 0 {
            self.sample_rate = 400;
        }
        if self.original_pitch > 127 {
            self.original_pitch = 60;
        }
        let last = u32::try_from(self.pool.len().saturating_sub(1)).unwrap_or(u32::MAX);
        self.start = self.start.min(last);
        self.end = self.end.min(last);
        self.loop_start = self.loop_start.min(last);
        self.loop_end = self.loop_end.min(last);
        if self.start >= self.end {
            self.bad = true;
        }
    }
}

/// Generator values of one region after instrument and preset zones merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct SoundFontRegion {
    pub key_lo: u8,
    pub key_hi: u8,
    pub vel_lo: u8,
    pub vel_hi: u8,
    /// Index into the header list.
    pub sample_id: usize,
    /// Pan in 0.1% units, -500 to 500.
    pub pan: i16,
    pub delay_vol_env: i16,
    pub attack_vol_env: i16,
    pub hold_vol_env: i16,
    pub decay_vol_env: i16,
    /// Sustain attenuation in centibels.
    pub sustain_vol_env: i16,
    pub release_vol_env: i16,
    /// Centibels.
    pub initial_attenuation: i16,
    pub coarse_tune: i16,
    pub fine_tune: i16,
    /// Cents per key; 100 is normal.
    pub scale_tuning: i16,
    pub start_offset: i32,
    pub end_offset: i32,
    pub start_loop_offset: i32,
    pub end_loop_offset: i32,
    /// Fixed key, -1 for none.
    pub keynum: i16,
    pub sample_modes: u16,
    pub exclusive_class: u16,
    /// Root key override, -1 for none.
    pub overriding_root_key: i16,
}

impl Default for SoundFontRegion {
    fn default() -> Self {
        let t = DEFAULT_TIMECENTS as i16;
        Self {
            key_lo: 0,
            key_hi: 127,
            vel_lo: 0,
            vel_hi: 127,
            sample_id: 0,
            pan: 0,
            delay_vol_env: t,
            attack_vol_env: t,
            hold_vol_env: t,
            decay_vol_env: t,
            sustain_vol_env: 0,
            release_vol_env: t,
            initial_attenuation: 0,
            coarse_tune: 0,
            fine_tune: 0,
            scale_tuning: 100,
            start_offset: 0,
            end_offset: 0,
            start_loop_offset: 0,
            end_loop_offset: 0,
            keynum: -1,
            sample_modes: 0,
            exclusive_class: 0,
            overriding_root_key: -1,
        }
    }
}

/// Convert the regions of one preset into an instrument.
///
/// Regions pointing at missing or bad headers are skipped. With `percussion`
/// set, each region's key range collapses to its low key so it only answers
/// to that one drum note.
pub fn convert_soundfont(
    headers: &[SoundFontSample],
    regions: &[SoundFontRegion],
    percussion: bool,
) -> Result<Instrument, LoadError> {
    let mut samples = Vec::with_capacity(regions.len());
    for region in regions {
        let Some(header) = headers.get(region.sample_id) else {
            continue;
        };
        if header.bad {
            continue;
        }
        samples.push(convert_region(header, region, percussion)?);
    }
    if samples.is_empty() {
        return Err(LoadError::NoSamples);
    }
    Ok(Instrument::new(samples))
}

fn timecents(value: i16) -> i32 {
    if value <= -32768 {
        TIMECENT_NONE
    } else {
        i32::from(value)
    }
}

fn convert_region(
    header: &SoundFontSample,
    region: &SoundFontRegion,
    percussion: bool,
) -> Result<Sample, LoadError> {
    let h_start = i64::from(header.start);
    let h_end = i64::from(header.end);
    let start = h_start.max(h_start + i64::from(region.start_offset));
    let end = h_end.min(h_end + i64::from(region.end_offset));
    if end <= start {
        return Err(LoadError::EmptyData);
    }
    let loop_start =
        start.max(i64::from(header.loop_start) + i64::from(region.start_loop_offset));
    let loop_end = end.min(i64::from(header.loop_end) + i64::from(region.end_loop_offset));
    let loop_start = loop_start.min(end);
    let loop_end = loop_end.clamp(loop_start, end);

    let (s, e) = (start as usize, end as usize);
    let Some(pcm) = header.pool.get(s..e) else {
        return Err(LoadError::EmptyData);
    };
    check_frames(pcm.len())?;
    let mut data: Vec<f32> = pcm.iter().map(|&v| f32::from(v) / 32768.0).collect();
    data.push(0.0);

    let mut scale_note = match region.overriding_root_key {
        k @ 0..=127 => i32::from(k),
        _ => i32::from(header.original_pitch),
    };
    let root_freq = note_to_freq(f64::from(scale_note));
    let scale_factor = match region.keynum {
        k @ 0..=127 => {
            scale_note = i32::from(k);
            0
        }
        _ if region.scale_tuning >= 0 => i32::from(region.scale_tuning) * 1024 / 100,
        _ => {
            scale_note = 60;
            1024
        }
    };

    let modes = match region.sample_modes {
        1 => SampleModes::LOOP | SampleModes::SUSTAIN | SampleModes::NO_SRELEASE,
        3 => SampleModes::LOOP | SampleModes::SUSTAIN,
        _ => SampleModes::SUSTAIN,
    };

    let (low_freq, high_freq) = if percussion {
        let f = note_to_freq(f64::from(region.key_lo));
        (f, f)
    } else {
        (
            note_to_freq(f64::from(region.key_lo)),
            note_to_freq(f64::from(region.key_hi)),
        )
    };

    let envelope = EnvelopeParams::Sf2(Sf2EnvelopeParams {
        delay: timecents(region.delay_vol_env),
        attack: timecents(region.attack_vol_env),
        hold: timecents(region.hold_vol_env),
        decay: timecents(region.decay_vol_env),
        sustain: f32::from(region.sustain_vol_env),
        release: timecents(region.release_vol_env),
    });

    let frames = data.len() - 1;
    let panning = i32::from(region.pan).clamp(-500, 500);
    let (left_offset, right_offset) =
        compute_pan(f64::from(panning + 500) / 1000.0, PanLaw::EqualPower);
    Ok(Sample {
        data: Arc::from(data),
        data_length: to_fixed(frames),
        loop_start: (loop_start - start) << FRACTION_BITS,
        loop_end: (loop_end - start) << FRACTION_BITS,
        sample_rate: header.sample_rate,
        low_freq,
        high_freq,
        root_freq,
        low_vel: region.vel_lo,
        high_vel: region.vel_hi,
        scale_note,
        scale_factor,
        tune: f64::from(region.coarse_tune) * 100.0 + f64::from(region.fine_tune),
        panning,
        left_offset,
        right_offset,
        modes,
        kind: SampleKind::Sf2,
        key_group: u32::from(region.exclusive_class),
        self_nonexclusive: false,
        initial_attenuation: f32::from(region.initial_attenuation),
        tremolo: Tremolo::default(),
        vibrato: Vibrato::default(),
        envelope,
    })
}

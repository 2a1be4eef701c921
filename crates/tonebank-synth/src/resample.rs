//! Fixed-point sample-rate conversion.
//!
//! [`resample_voice`] fills a buffer with a voice's waveform at its current
//! pitch. The cursor (`sample_offset`) and step (`sample_increment`) are
//! fixed-point with [`FRACTION_BITS`](tonebank_core::FRACTION_BITS) fraction
//! bits; output is linearly interpolated between neighbouring frames.
//!
//! # Modes
//!
//! | Voice looping | Sample flags | Behavior                                  |
//! |---------------|--------------|-------------------------------------------|
//! | no            | -            | Play to the end, then free the voice      |
//! | yes           | -            | Wrap by the loop length past `loop_end`   |
//! | yes           | `BIDIR`      | Reverse at either loop point              |
//!
//! Each mode has a vibrato twin that recomputes the step every
//! `vibrato.control_ratio` frames. Inner loops run for a precomputed number of
//! steps to the next boundary instead of testing the boundary every frame.
//!
//! Samples pre-resampled at load time (`sample_rate == 0`) are copied out
//! directly.

use alloc::vec::Vec;

use tonebank_core::fixed::FIXED_ONE;
use tonebank_core::{FRACTION_MASK, fixed_fraction, fixed_index, note_to_freq, to_fixed};

use crate::records::MAX_SAMPLE_FRAMES;
use crate::sample::{Sample, SampleModes};
use crate::voice::{Voice, VoiceStatus};

/// Loops shorter than this (fixed-point) are played as one-shots.
const MIN_LOOP_LENGTH: i64 = 2;

#[inline]
fn interpolate(data: &[f32], ofs: i64) -> f32 {
    let ofs = ofs.max(0);
    let i = fixed_index(ofs);
    let s0 = data.get(i).copied().unwrap_or(0.0);
    let s1 = data.get(i + 1).copied().unwrap_or(s0);
    s0 + (s1 - s0) * fixed_fraction(ofs)
}

/// Steps until the cursor reaches or passes `boundary`, counting the step
/// that lands on it.
#[inline]
fn steps_to(boundary: i64, ofs: i64, incr: i64) -> usize {
    if incr == 0 {
        return usize::MAX;
    }
    let steps = (boundary - ofs) / incr + 1;
    usize::try_from(steps.max(1)).unwrap_or(usize::MAX)
}

#[inline]
fn fill(out: &mut [f32], data: &[f32], ofs: &mut i64, incr: i64) {
    for slot in out {
        *slot = interpolate(data, *ofs);
        *ofs += incr;
    }
}

/// Fill `out` from the voice's sample and advance its cursor.
///
/// Returns the number of frames written. When a non-looping sample runs out
/// the voice status is cleared and fewer frames than requested may be
/// returned; the sample reference stays for the mixer to finish with.
pub fn resample_voice(voice: &mut Voice, out: &mut [f32], output_rate: u32) -> usize {
    let Some(sample) = voice.sample.clone() else {
        return 0;
    };
    if sample.sample_rate == 0 {
        return copy_pre_resampled(voice, &sample, out);
    }

    if voice.status.contains(VoiceStatus::LOOPING)
        && sample.loop_end - sample.loop_start < MIN_LOOP_LENGTH
    {
        voice.status.remove(VoiceStatus::LOOPING);
    }
    let looping = voice.status.contains(VoiceStatus::LOOPING);
    if !looping && voice.sample_increment == 0 {
        // A stalled one-shot would never reach the end of its data.
        voice.status = VoiceStatus::empty();
        return 0;
    }
    let bidir = sample.modes.contains(SampleModes::BIDIR);
    let data = &sample.data[..];

    if sample.vibrato.control_ratio > 0 {
        match (looping, bidir) {
            (true, true) => vib_bidir(voice, &sample, data, out, output_rate),
            (true, false) => vib_loop(voice, &sample, data, out, output_rate),
            (false, _) => vib_plain(voice, &sample, data, out, output_rate),
        }
    } else {
        match (looping, bidir) {
            (true, true) => rs_bidir(voice, &sample, data, out),
            (true, false) => rs_loop(voice, &sample, data, out),
            (false, _) => rs_plain(voice, &sample, data, out),
        }
    }
}

fn copy_pre_resampled(voice: &mut Voice, sample: &Sample, out: &mut [f32]) -> usize {
    let ofs = fixed_index(voice.sample_offset.max(0));
    let remaining = sample.frames().saturating_sub(ofs);
    let count = if out.len() >= remaining {
        voice.status = VoiceStatus::empty();
        remaining
    } else {
        voice.sample_offset += to_fixed(out.len());
        out.len()
    };
    match sample.data.get(ofs..ofs + count) {
        Some(src) => out[..count].copy_from_slice(src),
        None => out[..count].fill(0.0),
    }
    count
}

fn rs_plain(voice: &mut Voice, sample: &Sample, data: &[f32], out: &mut [f32]) -> usize {
    let le = sample.data_length;
    let mut ofs = voice.sample_offset;
    // Coming out of a reversed loop the step may be negative.
    let incr = voice.sample_increment.abs();

    let count = steps_to(le, ofs, incr).min(out.len());
    fill(&mut out[..count], data, &mut ofs, incr);
    if ofs >= le {
        voice.status = VoiceStatus::empty();
    }
    voice.sample_offset = ofs;
    count
}

#[inline]
fn wrap(ofs: i64, ls: i64, ll: i64) -> i64 {
    ls + (ofs - ls) % ll
}

fn rs_loop(voice: &mut Voice, sample: &Sample, data: &[f32], out: &mut [f32]) -> usize {
    let (ls, le) = (sample.loop_start, sample.loop_end);
    let ll = le - ls;
    let incr = voice.sample_increment.abs();
    let mut ofs = voice.sample_offset;

    let mut pos = 0;
    while pos < out.len() {
        if ofs >= le {
            ofs = wrap(ofs, ls, ll);
        }
        let n = steps_to(le, ofs, incr).min(out.len() - pos);
        fill(&mut out[pos..pos + n], data, &mut ofs, incr);
        pos += n;
    }
    voice.sample_offset = ofs;
    out.len()
}

/// Mirror the cursor back inside the loop after crossing a loop point.
#[inline]
fn fold(ofs: &mut i64, incr: &mut i64, ls: i64, le: i64) {
    if *ofs >= le {
        *ofs = (2 * le - *ofs).max(ls);
        *incr = -*incr;
    } else if *ofs <= ls {
        *ofs = (2 * ls - *ofs).min(le);
        *incr = -*incr;
    }
}

fn rs_bidir(voice: &mut Voice, sample: &Sample, data: &[f32], out: &mut [f32]) -> usize {
    let (ls, le) = (sample.loop_start, sample.loop_end);
    let mut ofs = voice.sample_offset;
    let mut incr = voice.sample_increment;
    let mut pos = 0;

    // Play normally until inside the loop.
    if ofs <= ls && incr > 0 {
        let n = steps_to(ls, ofs, incr).min(out.len());
        fill(&mut out[..n], data, &mut ofs, incr);
        pos = n;
    }

    while pos < out.len() {
        let boundary = if incr > 0 { le } else { ls };
        let n = steps_to(boundary, ofs, incr).min(out.len() - pos);
        fill(&mut out[pos..pos + n], data, &mut ofs, incr);
        pos += n;
        if incr != 0 {
            fold(&mut ofs, &mut incr, ls, le);
        }
    }

    voice.sample_increment = incr;
    voice.sample_offset = ofs;
    out.len()
}

/// Clip a run length to the vibrato countdown.
///
/// Returns the run length and whether the countdown expired.
#[inline]
fn vibrato_run(n: usize, cc: &mut i32) -> (usize, bool) {
    let budget = usize::try_from(*cc).unwrap_or(0);
    if n > budget {
        (budget, true)
    } else {
        *cc -= n as i32;
        (n, false)
    }
}

fn vib_plain(
    voice: &mut Voice,
    sample: &Sample,
    data: &[f32],
    out: &mut [f32],
    output_rate: u32,
) -> usize {
    let le = sample.data_length;
    let ratio = sample.vibrato.control_ratio;
    let mut ofs = voice.sample_offset;
    let mut incr = voice.sample_increment.abs();
    let mut cc = voice.vibrato_control_counter;
    let mut written = out.len();

    for (i, slot) in out.iter_mut().enumerate() {
        if cc <= 0 {
            cc = ratio;
            incr = voice.update_vibrato(output_rate, false);
        } else {
            cc -= 1;
        }
        *slot = interpolate(data, ofs);
        ofs += incr;
        if ofs >= le {
            voice.status = VoiceStatus::empty();
            written = i + 1;
            break;
        }
    }

    voice.vibrato_control_counter = cc;
    voice.sample_increment = incr;
    voice.sample_offset = ofs;
    written
}

fn vib_loop(
    voice: &mut Voice,
    sample: &Sample,
    data: &[f32],
    out: &mut [f32],
    output_rate: u32,
) -> usize {
    let (ls, le) = (sample.loop_start, sample.loop_end);
    let ll = le - ls;
    let ratio = sample.vibrato.control_ratio;
    let mut ofs = voice.sample_offset;
    let mut incr = voice.sample_increment.abs();
    let mut cc = voice.vibrato_control_counter;

    let mut pos = 0;
    while pos < out.len() {
        if ofs >= le {
            ofs = wrap(ofs, ls, ll);
        }
        let want = steps_to(le, ofs, incr).min(out.len() - pos);
        let (n, expired) = vibrato_run(want, &mut cc);
        fill(&mut out[pos..pos + n], data, &mut ofs, incr);
        pos += n;
        if expired {
            cc = ratio;
            incr = voice.update_vibrato(output_rate, false);
        }
    }

    voice.vibrato_control_counter = cc;
    voice.sample_increment = incr;
    voice.sample_offset = ofs;
    out.len()
}

fn vib_bidir(
    voice: &mut Voice,
    sample: &Sample,
    data: &[f32],
    out: &mut [f32],
    output_rate: u32,
) -> usize {
    let (ls, le) = (sample.loop_start, sample.loop_end);
    let ratio = sample.vibrato.control_ratio;
    let mut ofs = voice.sample_offset;
    let mut incr = voice.sample_increment;
    let mut cc = voice.vibrato_control_counter;

    let mut pos = 0;
    while pos < out.len() && ofs <= ls && incr > 0 {
        let want = steps_to(ls, ofs, incr).min(out.len() - pos);
        let (n, expired) = vibrato_run(want, &mut cc);
        fill(&mut out[pos..pos + n], data, &mut ofs, incr);
        pos += n;
        if expired {
            cc = ratio;
            incr = voice.update_vibrato(output_rate, false);
        }
    }

    while pos < out.len() {
        let boundary = if incr > 0 { le } else { ls };
        let want = steps_to(boundary, ofs, incr).min(out.len() - pos);
        let (n, expired) = vibrato_run(want, &mut cc);
        fill(&mut out[pos..pos + n], data, &mut ofs, incr);
        pos += n;
        if expired {
            cc = ratio;
            incr = voice.update_vibrato(output_rate, incr < 0);
        }
        if incr != 0 {
            fold(&mut ofs, &mut incr, ls, le);
        }
    }

    voice.vibrato_control_counter = cc;
    voice.sample_increment = incr;
    voice.sample_offset = ofs;
    out.len()
}

/// Resample a fixed-pitch sample once to the output rate.
///
/// Applies to samples with `scale_factor == 0`: every note plays
/// `scale_note`, so the waveform is converted with cubic interpolation and
/// marked pre-resampled (`sample_rate = 0`). Loop points are scaled along.
pub fn pre_resample(sample: &mut Sample, output_rate: u32) {
    if sample.scale_factor != 0 || sample.sample_rate == 0 || sample.root_freq <= 0.0 {
        return;
    }
    let a = (f64::from(sample.sample_rate) * note_to_freq(f64::from(sample.scale_note)))
        / (sample.root_freq * f64::from(output_rate.max(1)));
    if !(a > 0.0 && a.is_finite()) {
        return;
    }
    let new_len = (sample.data_length as f64 / a) as i64;
    let count = fixed_index(new_len.max(0));
    if new_len < 0 || count > MAX_SAMPLE_FRAMES || count < 2 {
        return;
    }

    #[cfg(feature = "tracing")]
    tracing::info!(note = sample.scale_note, frames = count, "pre-resampling");

    let src = &sample.data[..];
    let at = |i: usize| src.get(i).copied().unwrap_or(0.0);
    let incr = (sample.data_length - FIXED_ONE) / count as i64;
    let mut data = Vec::with_capacity(count + 1);
    data.push(at(0));

    let mut ofs = incr;
    for _ in 1..count - 1 {
        let i = fixed_index(ofs);
        let v1 = if i == 0 { at(0) } else { at(i - 1) };
        let (v2, v3, v4) = (at(i), at(i + 1), at(i + 2));
        let x = fixed_fraction(ofs);
        let v = v2
            + (x / 6.0)
                * (-2.0 * v1 - 3.0 * v2 + 6.0 * v3 - v4
                    + x * (3.0 * (v1 - 2.0 * v2 + v3) + x * (-v1 + 3.0 * (v2 - v3) + v4)));
        data.push(v);
        ofs += incr;
    }
    if ofs & FRACTION_MASK != 0 {
        data.push(interpolate(src, ofs));
    } else {
        data.push(at(fixed_index(ofs)));
    }
    data.push(data.last().copied().unwrap_or(0.0));

    sample.data_length = new_len;
    sample.loop_start = (sample.loop_start as f64 / a) as i64;
    sample.loop_end = (sample.loop_end as f64 / a) as i64;
    sample.data = data.into();
    sample.sample_rate = 0;
}

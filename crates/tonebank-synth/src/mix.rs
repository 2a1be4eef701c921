//! Accumulate voices into an interleaved stereo buffer.
//!
//! Gains change only on control ticks: every `control_ratio` frames the
//! voice's envelope and tremolo advance and new left/right gains are taken.
//! Between ticks the gains are held.

use crate::output::OutputSpec;
use crate::resample::resample_voice;
use crate::voice::{Voice, VoiceStatus};

/// Longest fade, in frames, for a voice being stopped.
pub const MAX_DIE_TIME: usize = 20;

#[inline]
fn accumulate(src: &[f32], dst: &mut [f32], left: f32, right: f32) {
    for (s, frame) in src.iter().zip(dst.chunks_exact_mut(2)) {
        frame[0] += left * s;
        frame[1] += right * s;
    }
}

/// Linear fade from the current gains to silence over `src.len()` frames.
fn ramp_out(src: &[f32], dst: &mut [f32], voice: &Voice) {
    let c = src.len().max(1) as f32;
    let (li, ri) = (voice.left_mix / c, voice.right_mix / c);
    let (mut left, mut right) = (voice.left_mix, voice.right_mix);
    for (s, frame) in src.iter().zip(dst.chunks_exact_mut(2)) {
        left = (left - li).max(0.0);
        right = (right - ri).max(0.0);
        frame[0] += left * s;
        frame[1] += right * s;
    }
}

/// Mix with a control tick every `control_ratio` frames.
fn mix_signal(voice: &mut Voice, src: &[f32], dst: &mut [f32], control_ratio: u32) {
    let mut cc = voice.control_counter;
    if cc == 0 {
        cc = control_ratio;
        if voice.update_signal() {
            return;
        }
    }

    let mut pos = 0;
    loop {
        let rest = src.len() - pos;
        let run = cc as usize;
        if run < rest {
            accumulate(
                &src[pos..pos + run],
                &mut dst[2 * pos..],
                voice.left_mix,
                voice.right_mix,
            );
            pos += run;
            cc = control_ratio;
            if voice.update_signal() {
                // Envelope ran out; the voice is stopping.
                voice.control_counter = 0;
                return;
            }
        } else {
            voice.control_counter = cc - rest as u32;
            accumulate(&src[pos..], &mut dst[2 * pos..], voice.left_mix, voice.right_mix);
            return;
        }
    }
}

/// Add one voice's contribution to `buf`.
///
/// `buf` holds interleaved stereo frames; `scratch` must hold at least as
/// many mono frames. Voices that stop or run out of data are freed.
pub fn mix_voice(voice: &mut Voice, buf: &mut [f32], scratch: &mut [f32], output: &OutputSpec) {
    if !voice.is_running() {
        return;
    }
    let frames = (buf.len() / 2).min(scratch.len());

    if voice.status.contains(VoiceStatus::STOPPING) {
        let count = frames.min(MAX_DIE_TIME);
        let n = resample_voice(voice, &mut scratch[..count], output.sample_rate);
        ramp_out(&scratch[..n], buf, voice);
        voice.free();
        return;
    }

    let n = resample_voice(voice, &mut scratch[..frames], output.sample_rate);
    let modulated = voice.sample.as_ref().is_some_and(|s| s.tremolo.phase_increment != 0);
    if voice.envelope.is_updating() || modulated {
        mix_signal(voice, &scratch[..n], buf, output.control_ratio);
    } else {
        accumulate(&scratch[..n], buf, voice.left_mix, voice.right_mix);
    }
    voice.sample_count += n as u64;

    if !voice.is_running() {
        voice.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use crate::sample::{Sample, SampleKind};
    use alloc::sync::Arc;
    use alloc::vec;
    use tonebank_core::fixed::FIXED_ONE;
    use tonebank_core::note_to_freq;

    fn dc_voice(frames: usize, looping: bool) -> Voice {
        let mut s = Sample::new(&vec![1.0; frames], 44100, note_to_freq(60.0), SampleKind::Sf2);
        if looping {
            s = s.with_loop(0, frames);
        }
        let mut status = VoiceStatus::RUNNING;
        if looping {
            status.insert(VoiceStatus::LOOPING);
        }
        let output = OutputSpec::default();
        let envelope = Envelope::init(&s, &mut status, &output);
        Voice {
            status,
            sample: Some(Arc::new(s)),
            sample_increment: FIXED_ONE,
            left_offset: 1.0,
            right_offset: 0.5,
            envelope,
            ..Voice::default()
        }
    }

    #[test]
    fn test_mix_accumulates_with_pan() {
        let mut v = dc_voice(1000, true);
        let mut buf = vec![0.0f32; 512];
        let mut scratch = vec![0.0f32; 256];
        for _ in 0..4 {
            buf.fill(0.0);
            mix_voice(&mut v, &mut buf, &mut scratch, &OutputSpec::default());
        }
        let (l, r) = (buf[510], buf[511]);
        assert!(l > 0.0);
        assert!((r - l * 0.5).abs() < 1e-6);
        assert!(v.is_running());
        assert!(v.sample_count >= 1024);
    }

    #[test]
    fn test_stopping_ramps_and_frees() {
        let mut v = dc_voice(1000, true);
        let mut buf = vec![0.0f32; 512];
        let mut scratch = vec![0.0f32; 256];
        mix_voice(&mut v, &mut buf, &mut scratch, &OutputSpec::default());
        v.kill();
        let before = v.left_mix;
        buf.fill(0.0);
        mix_voice(&mut v, &mut buf, &mut scratch, &OutputSpec::default());
        assert!(v.status.is_empty());
        assert!(v.sample.is_none());
        assert!(buf[0] < before);
        assert!(buf[0] > 0.0);
        assert!(buf[2 * MAX_DIE_TIME..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_one_shot_frees_at_end() {
        let mut v = dc_voice(100, false);
        let mut buf = vec![0.0f32; 512];
        let mut scratch = vec![0.0f32; 256];
        mix_voice(&mut v, &mut buf, &mut scratch, &OutputSpec::default());
        assert!(v.status.is_empty());
        assert!(buf[2 * 120..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_free_voice_is_ignored() {
        let mut v = Voice::default();
        let mut buf = vec![0.0f32; 64];
        let mut scratch = vec![0.0f32; 32];
        mix_voice(&mut v, &mut buf, &mut scratch, &OutputSpec::default());
        assert!(buf.iter().all(|&x| x == 0.0));
    }
}

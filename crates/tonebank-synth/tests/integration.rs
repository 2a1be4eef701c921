//! Integration tests for tonebank-synth crate.
//!
//! Tests cover pitch math, loop resampling, envelope release, voice
//! allocation, key groups, the sustain pedal and full renders through the
//! public renderer API.

use std::sync::Arc;

use tonebank_core::{FRACTION_BITS, freq_to_note, note_to_freq, to_fixed};
use tonebank_synth::mix::mix_voice;
use tonebank_synth::resample::resample_voice;
use tonebank_synth::{
    BankKind, EnvelopeParams, Instrument, OutputSpec, Renderer, RendererConfig, Sample,
    SampleKind, SampleModes, Sf2EnvelopeParams, SourceChain, ToneEntry, Voice, VoiceStatus,
    Waveform, WaveformSource,
};

const SR: u32 = 44100;

fn ramp(frames: usize) -> Vec<f32> {
    (0..frames).map(|i| i as f32).collect()
}

fn sustained_sf2(frames: &[f32], looped: bool) -> Sample {
    let mut s = Sample::new(frames, SR, note_to_freq(60.0), SampleKind::Sf2);
    if looped {
        s = s.with_loop(0, frames.len());
    }
    s.modes.insert(SampleModes::SUSTAIN);
    s.envelope = EnvelopeParams::Sf2(Sf2EnvelopeParams {
        release: -1200,
        ..Sf2EnvelopeParams::default()
    });
    s
}

fn renderer(voices: usize, sample: Sample) -> Renderer {
    let mut r = Renderer::new(RendererConfig {
        voices,
        ..RendererConfig::default()
    })
    .unwrap();
    r.banks_mut()
        .insert(BankKind::Tone, 0, 0, Instrument::new(vec![sample]));
    r
}

fn running(r: &Renderer) -> Vec<&Voice> {
    r.voices().voices().iter().filter(|v| v.is_running()).collect()
}

// ---------------------------------------------------------------------------
// 1. Pitch
// ---------------------------------------------------------------------------

#[test]
fn note_frequency_matches_formula() {
    for note in 0..=127u8 {
        let n = f64::from(note);
        let expected = 8175.798_947_309_669 * 2f64.powf(n / 12.0);
        let got = note_to_freq(n);
        assert!(
            (got - expected).abs() / expected < 1e-12,
            "note {note}: {got} vs {expected}"
        );
        assert!((freq_to_note(got) - n).abs() < 1e-6);
    }
}

// ---------------------------------------------------------------------------
// 2. Loop resampling
// ---------------------------------------------------------------------------

#[test]
fn forward_loop_wraps_within_one_increment() {
    let mut s = Sample::new(&ramp(16), SR, note_to_freq(60.0), SampleKind::Sf2);
    s.loop_start = 1000;
    s.loop_end = 2000;
    s.modes.insert(SampleModes::LOOP);
    let (ls, le) = (s.loop_start, s.loop_end);
    let incr = 130;

    let mut voice = Voice {
        status: VoiceStatus::RUNNING | VoiceStatus::LOOPING,
        sample: Some(Arc::new(s)),
        sample_increment: incr,
        ..Voice::default()
    };

    // Enough frames to pass the loop well over three times.
    let mut out = vec![0.0f32; 60];
    let n = resample_voice(&mut voice, &mut out, SR);
    assert_eq!(n, out.len());
    assert!(voice.sample_offset <= le + incr);

    let scale = (1i64 << FRACTION_BITS) as f32;
    let mut p = 0i64;
    let mut wraps = 0;
    for (k, &value) in out.iter().enumerate() {
        if p > le {
            p = ls + (p - ls) % (le - ls);
            wraps += 1;
        }
        let expected = p as f32 / scale;
        assert!(
            (value - expected).abs() < 1e-4,
            "frame {k}: {value} vs {expected}"
        );
        p += incr;
    }
    assert!(wraps >= 3);
}

#[test]
fn bidirectional_loop_is_palindromic() {
    let mut s = Sample::new(&ramp(64), SR, note_to_freq(60.0), SampleKind::Sf2);
    s = s.with_loop(16, 48);
    s.modes.insert(SampleModes::BIDIR);
    let mut voice = Voice {
        status: VoiceStatus::RUNNING | VoiceStatus::LOOPING,
        sample: Some(Arc::new(s)),
        sample_offset: to_fixed(20),
        sample_increment: 1 << FRACTION_BITS,
        ..Voice::default()
    };

    let mut out = vec![0.0f32; 80];
    resample_voice(&mut voice, &mut out, SR);

    let turn = out.iter().position(|&v| v == 48.0).unwrap();
    assert_eq!(turn, 28);
    for j in 1..=28 {
        assert_eq!(out[turn + j], out[turn - j], "mirror offset {j}");
    }
    // Direction survives across calls.
    let before = voice.sample_increment;
    resample_voice(&mut voice, &mut out[..1], SR);
    assert_eq!(voice.sample_increment.signum(), before.signum());
}

// ---------------------------------------------------------------------------
// 3. Envelope release
// ---------------------------------------------------------------------------

fn render_voice(mut voice: Voice, frames: usize) -> Vec<f32> {
    let output = OutputSpec::new(SR);
    let mut buf = vec![0.0f32; frames * 2];
    let mut scratch = vec![0.0f32; frames];
    mix_voice(&mut voice, &mut buf, &mut scratch, &output);
    buf
}

fn started_voice(sample: Sample) -> Voice {
    let output = OutputSpec::new(SR);
    let mut status = VoiceStatus::RUNNING;
    if sample.is_looped() {
        status.insert(VoiceStatus::LOOPING);
    }
    let envelope = tonebank_synth::Envelope::init(&sample, &mut status, &output);
    let mut voice = Voice {
        status,
        sample: Some(Arc::new(sample)),
        sample_increment: 1 << FRACTION_BITS,
        attenuation: 1.0,
        left_offset: 1.0,
        right_offset: 1.0,
        tremolo_volume: 1.0,
        envelope,
        ..Voice::default()
    };
    voice.apply_envelope();
    voice
}

#[test]
fn release_twice_equals_release_once() {
    let mut gus = Sample::new(&vec![0.5; 4000], SR, note_to_freq(60.0), SampleKind::Gus);
    gus = gus.with_loop(0, 4000);
    gus.modes.insert(SampleModes::SUSTAIN);
    let sf2 = sustained_sf2(&vec![0.5; 4000], true);

    for sample in [gus, sf2] {
        let mut voice = started_voice(sample);
        let warm = render_voice(voice.clone(), 512);
        assert!(warm.iter().all(|s| s.is_finite()));
        // Advance both copies into the sustain.
        let output = OutputSpec::new(SR);
        let mut buf = vec![0.0f32; 1024];
        let mut scratch = vec![0.0f32; 512];
        mix_voice(&mut voice, &mut buf, &mut scratch, &output);

        let mut once = voice.clone();
        once.finish();
        let mut twice = voice.clone();
        twice.finish();
        twice.finish();
        let sample = twice.sample.clone().unwrap();
        twice.envelope.release(&sample, &mut twice.status);

        assert_eq!(once.status, twice.status);
        assert_eq!(render_voice(once, 2048), render_voice(twice, 2048));
    }
}

// ---------------------------------------------------------------------------
// 4. Voice allocation
// ---------------------------------------------------------------------------

#[test]
fn pool_overflow_loses_exactly_one_note() {
    let k = 4;
    let mut r = renderer(k, sustained_sf2(&vec![0.25; 1000], true));
    for i in 0..k as u8 {
        r.note_on(0, 60 + i, 100);
    }
    let before: Vec<(u8, VoiceStatus)> = running(&r).iter().map(|v| (v.note, v.status)).collect();
    assert_eq!(before.len(), k);

    r.note_on(0, 80, 100);
    assert_eq!(r.lost_notes(), 1);
    assert_eq!(r.cut_notes(), 0);
    let after: Vec<(u8, VoiceStatus)> = running(&r).iter().map(|v| (v.note, v.status)).collect();
    assert_eq!(before, after);
}

#[test]
fn releasing_voice_is_stolen_before_losing() {
    let mut r = renderer(2, sustained_sf2(&vec![0.25; 1000], true));
    r.note_on(0, 60, 100);
    r.note_on(0, 62, 100);
    r.note_off(0, 60, 0);
    r.note_on(0, 64, 100);
    assert_eq!(r.lost_notes(), 0);
    assert_eq!(r.cut_notes(), 1);
    let notes: Vec<u8> = running(&r).iter().map(|v| v.note).collect();
    assert!(notes.contains(&64));
    assert!(!notes.contains(&60));
}

// ---------------------------------------------------------------------------
// 5. Key groups
// ---------------------------------------------------------------------------

#[test]
fn key_group_chokes_previous_note() {
    let mut s = sustained_sf2(&vec![0.25; 1000], true);
    s.key_group = 7;
    let mut r = renderer(8, s);
    r.note_on(0, 42, 100);
    r.note_on(0, 46, 100);

    let first = running(&r).into_iter().find(|v| v.note == 42).unwrap();
    assert!(first.status.contains(VoiceStatus::RELEASING));
    let second = running(&r).into_iter().find(|v| v.note == 46).unwrap();
    assert!(second.is_held());

    // Other channels are untouched.
    r.note_on(1, 42, 100);
    let other = running(&r)
        .into_iter()
        .find(|v| v.channel == 1)
        .unwrap();
    assert!(other.is_held());
    let second = running(&r).into_iter().find(|v| v.note == 46).unwrap();
    assert!(second.is_held());
}

// ---------------------------------------------------------------------------
// 6. End to end
// ---------------------------------------------------------------------------

#[test]
fn first_render_ramps_up_without_nan() {
    let mut s = Sample::new(&vec![1.0; 44100], SR, note_to_freq(60.0), SampleKind::Sf2);
    // Shortest real stages; the attack still takes the minimum ramp time.
    s.envelope = EnvelopeParams::Sf2(Sf2EnvelopeParams {
        attack: -12000,
        hold: -12000,
        decay: -12000,
        ..Sf2EnvelopeParams::default()
    });
    let mut r = renderer(16, s);
    r.note_on(0, 60, 100);
    let mut buf = vec![0.0f32; 512];
    r.compute_output(&mut buf, 256);

    assert!(buf.iter().all(|s| s.is_finite()));
    let peak = buf.iter().copied().fold(0.0f32, f32::max);
    assert!(peak > 0.0);
    assert!(buf[0] < peak, "first frame {} should be below peak {}", buf[0], peak);
}

#[test]
fn zero_root_one_shot_still_ends() {
    let s = Sample::new(&vec![0.5; 100], SR, 0.0, SampleKind::Sf2);
    let mut r = renderer(4, s);
    r.note_on(0, 60, 100);
    let mut buf = vec![0.0f32; 2048];
    for _ in 0..(5 * SR as usize / 1024) {
        r.compute_output(&mut buf, 1024);
    }
    assert!(running(&r).is_empty());
    assert!(buf.iter().all(|&s| s == 0.0));
}

#[test]
fn out_of_range_event_bytes_are_brought_into_range() {
    let mut r = renderer(4, sustained_sf2(&vec![0.25; 1000], true));
    r.note_on(20, 200, 255);
    let v = running(&r);
    assert_eq!(v.len(), 1);
    assert_eq!(v[0].channel, 20 & 0x0f);
    assert_eq!(v[0].note, 200 & 0x7f);
    assert_eq!(v[0].velocity, 127);

    r.control_change(20, 7, 200);
    r.pitch_bend(20, 0xff, 0xff);
    let mut buf = vec![0.0f32; 1024];
    r.compute_output(&mut buf, 512);
    assert!(buf.iter().all(|s| s.is_finite()));
    assert!(buf.iter().any(|&s| s != 0.0));
}

#[test]
fn sustain_pedal_defers_release() {
    let mut r = renderer(4, sustained_sf2(&vec![0.25; 1000], true));
    r.note_on(0, 60, 100);
    r.control_change(0, 64, 127);
    r.note_off(0, 60, 0);
    let v = running(&r)[0];
    assert!(!v.status.contains(VoiceStatus::RELEASING));
    assert!(v.status.contains(VoiceStatus::NOTE_SUSTAIN));

    r.control_change(0, 64, 0);
    assert!(running(&r)[0].status.contains(VoiceStatus::RELEASING));
}

#[test]
fn waveform_source_renders_audio() {
    let mut chain = SourceChain::new();
    chain.push(0, Box::new(WaveformSource::new(Waveform::Square)));

    let mut r = Renderer::new(RendererConfig::default()).unwrap();
    r.banks_mut()
        .set_entry(BankKind::Tone, 0, 0, ToneEntry::named("square"));
    r.mark_instrument(0, false, 0);
    r.mark_instrument(0, true, 36);
    assert_eq!(r.load_missing_instruments(&mut chain), 0);

    r.handle_event(0x90, 60, 110);
    r.handle_event(0x99, 36, 110);
    let mut buf = vec![0.0f32; 4096];
    for _ in 0..8 {
        r.compute_output(&mut buf, 2048);
        assert!(buf.iter().all(|s| s.is_finite()));
    }
    assert!(buf.iter().any(|&s| s != 0.0));

    r.handle_event(0x80, 60, 0);
    for _ in 0..100 {
        r.compute_output(&mut buf, 2048);
    }
    assert!(running(&r).is_empty());
}

#[test]
fn block_size_does_not_change_output() {
    let make = |max_block| {
        let mut r = Renderer::new(RendererConfig {
            max_block,
            ..RendererConfig::default()
        })
        .unwrap();
        r.mark_instrument(0, false, 0);
        r.load_missing_instruments(&mut WaveformSource::default());
        r.note_on(0, 64, 100);
        r
    };
    let mut a = make(1024);
    let mut b = make(64);
    let mut buf_a = vec![0.0f32; 2048];
    let mut buf_b = vec![0.0f32; 2048];
    a.compute_output(&mut buf_a, 1024);
    b.compute_output(&mut buf_b, 1024);
    for (x, y) in buf_a.iter().zip(&buf_b) {
        assert!((x - y).abs() < 1e-6);
    }
}

//! Criterion benchmarks for tonebank-core conversions
//!
//! Run with: cargo bench -p tonebank-core
#![allow(missing_docs)]

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tonebank_core::{PanLaw, compute_pan, gf1_amp, note_to_freq, sf2_attenuation};

fn bench_pitch(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pitch");

    group.bench_function("note_to_freq_128", |b| {
        b.iter(|| {
            for n in 0..128 {
                black_box(note_to_freq(black_box(f64::from(n))));
            }
        });
    });

    group.finish();
}

fn bench_amplitude(c: &mut Criterion) {
    let mut group = c.benchmark_group("Amplitude");

    group.bench_function("gf1_amp", |b| {
        b.iter(|| black_box(gf1_amp(black_box(0.8))));
    });

    group.bench_function("sf2_attenuation", |b| {
        b.iter(|| black_box(sf2_attenuation(black_box(100), 127, black_box(90), 0.0)));
    });

    for law in [PanLaw::Hardware, PanLaw::EqualPower] {
        group.bench_function(format!("compute_pan_{law:?}"), |b| {
            b.iter(|| black_box(compute_pan(black_box(0.3), law)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pitch, bench_amplitude);
criterion_main!(benches);

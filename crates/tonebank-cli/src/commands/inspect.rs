//! Load one instrument and describe its regions.

use anyhow::bail;
use clap::Args;
use std::path::PathBuf;
use tonebank_core::FRACTION_BITS;
use tonebank_synth::{BankKind, EnvelopeParams, Sample, SampleModes};

use super::common::{build_renderer, build_sources, load_config};

/// Load one instrument and print its regions.
#[derive(Args)]
pub struct InspectArgs {
    /// Program, or note for drum sets
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..128))]
    program: u8,

    /// Bank number
    #[arg(short, long, default_value = "0", value_parser = clap::value_parser!(u8).range(0..128))]
    bank: u8,

    /// Look in the drum sets instead of the tone banks
    #[arg(long)]
    drum: bool,

    /// Bank configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

const FIXED_SCALE: f64 = (1u64 << FRACTION_BITS) as f64;

fn hz(millihertz: f64) -> f64 {
    millihertz / 1000.0
}

fn mode_names(modes: SampleModes) -> String {
    let names = [
        (SampleModes::LOOP, "loop"),
        (SampleModes::BIDIR, "bidir"),
        (SampleModes::SUSTAIN, "sustain"),
        (SampleModes::NO_SRELEASE, "no-release"),
        (SampleModes::FAST_RELEASE, "fast-release"),
    ];
    let set: Vec<&str> = names
        .iter()
        .filter(|(flag, _)| modes.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
    if set.is_empty() {
        "one-shot".to_string()
    } else {
        set.join(" ")
    }
}

fn print_region(index: usize, s: &Sample) {
    let frames = s.frames();
    println!("  Region {index}: {:?}", s.kind);
    println!(
        "    Data:      {frames} frames at {} Hz",
        if s.sample_rate == 0 {
            "output".to_string()
        } else {
            s.sample_rate.to_string()
        }
    );
    if s.is_looped() {
        println!(
            "    Loop:      {:.2} .. {:.2}",
            s.loop_start as f64 / FIXED_SCALE,
            s.loop_end as f64 / FIXED_SCALE
        );
    }
    println!("    Modes:     {}", mode_names(s.modes));
    println!(
        "    Keys:      {:.1} .. {:.1} Hz, root {:.2} Hz",
        hz(s.low_freq),
        hz(s.high_freq),
        hz(s.root_freq)
    );
    println!("    Velocity:  {} .. {}", s.low_vel, s.high_vel);
    println!(
        "    Scaling:   note {}, factor {}/1024, tune {:+.1} cents",
        s.scale_note, s.scale_factor, s.tune
    );
    println!("    Pan:       {:+}", s.panning);
    if s.key_group != 0 {
        println!("    Key Group: {}", s.key_group);
    }
    match &s.envelope {
        EnvelopeParams::Gf1 { rates, offsets } => {
            println!("    Envelope:  rates {rates:?}");
            println!("               offsets {offsets:?}");
        }
        EnvelopeParams::Sf2(p) => {
            println!("    Envelope:  {p:?}");
        }
    }
}

/// Run the inspect command.
pub fn run(args: InspectArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let mut renderer = build_renderer(&config)?;
    let kind = if args.drum {
        BankKind::Drum
    } else {
        BankKind::Tone
    };

    renderer.mark_instrument(args.bank, args.drum, args.program);
    renderer.load_missing_instruments(&mut build_sources(&config));

    let Some(instrument) = renderer.banks().resolve(kind, args.bank, args.program) else {
        bail!(
            "no instrument for {} {} program {}",
            kind.label(),
            args.bank,
            args.program
        );
    };

    let name = renderer
        .banks()
        .bank(kind, args.bank)
        .and_then(|b| b.entry(args.program).name.clone())
        .unwrap_or_else(|| "(unnamed)".to_string());
    println!(
        "{} {} program {}: {} ({} regions)",
        kind.label(),
        args.bank,
        args.program,
        name,
        instrument.len()
    );
    for (i, sample) in instrument.samples.iter().enumerate() {
        print_region(i, sample);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names() {
        assert_eq!(mode_names(SampleModes::empty()), "one-shot");
        assert_eq!(
            mode_names(SampleModes::LOOP | SampleModes::SUSTAIN),
            "loop sustain"
        );
    }
}

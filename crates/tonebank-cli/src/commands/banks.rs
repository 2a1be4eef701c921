//! List configured banks.

use clap::Args;
use std::path::PathBuf;
use tonebank_config::SourceConfig;
use tonebank_synth::{BankKind, PatchOverrides};

use super::common::{build_renderer, load_config};

/// List configured tone banks and drum sets.
#[derive(Args)]
pub struct BanksArgs {
    /// Bank configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the configuration as JSON
    #[arg(long)]
    json: bool,
}

fn describe(overrides: &PatchOverrides) -> String {
    let mut parts = Vec::new();
    if let Some(note) = overrides.note {
        parts.push(format!("note={note}"));
    }
    if let Some(pan) = overrides.pan {
        parts.push(format!("pan={pan}"));
    }
    if let Some(amp) = overrides.amp {
        parts.push(format!("amp={amp}%"));
    }
    match overrides.strip_loop {
        Some(true) => parts.push("strip loop".to_string()),
        Some(false) => parts.push("keep loop".to_string()),
        None => {}
    }
    match overrides.strip_envelope {
        Some(true) => parts.push("strip env".to_string()),
        Some(false) => parts.push("keep env".to_string()),
        None => {}
    }
    if overrides.strip_tail {
        parts.push("strip tail".to_string());
    }
    parts.join(", ")
}

/// Run the banks command.
pub fn run(args: BanksArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let renderer = build_renderer(&config)?;
    let registry = renderer.banks();

    println!("Engine:");
    println!("  Sample Rate:   {} Hz", config.sample_rate);
    println!("  Voices:        {}", config.voices);
    println!("  Drum Channels: {:?}", config.drum_channels);

    println!();
    println!("Sources:");
    if config.sources.is_empty() {
        println!("  (none configured, generated sine waves)");
    }
    for source in config.ordered_sources() {
        match source {
            SourceConfig::Wav { dir, order } => {
                println!("  [{order:>3}] wav       {}", config.resolve_dir(dir).display());
            }
            SourceConfig::Waveform { shape, order } => {
                println!("  [{order:>3}] waveform  {shape:?}");
            }
        }
    }

    for kind in [BankKind::Tone, BankKind::Drum] {
        println!();
        let title = match kind {
            BankKind::Tone => "Tone Banks:",
            BankKind::Drum => "Drum Sets:",
        };
        println!("{title}");
        for number in registry.defined(kind) {
            let Some(bank) = registry.bank(kind, number) else {
                continue;
            };
            println!("  {} {number}", kind.label());
            let mut any = false;
            for (program, entry) in bank.named() {
                any = true;
                let name = entry.name.as_deref().unwrap_or_default();
                let extra = describe(&entry.overrides);
                if extra.is_empty() {
                    println!("    {program:>3}  {name}");
                } else {
                    println!("    {program:>3}  {name:<20} ({extra})");
                }
            }
            if !any {
                println!("    (no named programs)");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_overrides() {
        let overrides = PatchOverrides {
            note: Some(36),
            strip_envelope: Some(false),
            strip_tail: true,
            ..PatchOverrides::default()
        };
        assert_eq!(describe(&overrides), "note=36, keep env, strip tail");
        assert_eq!(describe(&PatchOverrides::default()), "");
    }
}

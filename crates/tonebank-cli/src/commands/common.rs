//! Shared CLI helpers used across multiple commands.

use anyhow::Context;
use std::path::Path;
use tonebank_config::{BankConfig, SourceConfig, find_config};
use tonebank_io::{WavHint, WavSource};
use tonebank_synth::{MidiEvent, Renderer, SourceChain, WaveformSource, channel::controller};

use crate::events::TimedEvent;

/// Load the configuration named on the command line, or the default one.
///
/// With no file anywhere, the built-in defaults are used.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<BankConfig> {
    match find_config(explicit) {
        Some(path) => BankConfig::load(&path)
            .with_context(|| format!("failed to load configuration {}", path.display())),
        None => {
            tracing::debug!("no configuration file found, using defaults");
            Ok(BankConfig::default())
        }
    }
}

/// Build a renderer with the configuration's banks applied.
pub fn build_renderer(config: &BankConfig) -> anyhow::Result<Renderer> {
    let mut renderer =
        Renderer::new(config.renderer_config()).context("invalid engine settings")?;
    config.apply(renderer.banks_mut());
    Ok(renderer)
}

/// Instrument sources in configured order.
///
/// WAV directories get the root and loop hints of every configured entry.
/// With no sources configured, generated sine waves stand in.
pub fn build_sources(config: &BankConfig) -> SourceChain {
    let mut chain = SourceChain::new();
    if config.sources.is_empty() {
        chain.push(0, Box::new(WaveformSource::default()));
        return chain;
    }

    for source in &config.sources {
        match source {
            SourceConfig::Wav { dir, order } => {
                let dir = config.resolve_dir(dir);
                let mut wav = WavSource::new(&dir);
                for (_, _, entry) in config.entries() {
                    let Some(name) = &entry.name else { continue };
                    let loop_points = entry.loop_start.zip(entry.loop_end);
                    if entry.root.is_some() || loop_points.is_some() {
                        wav.set_hint(
                            name.clone(),
                            WavHint {
                                root: entry.root,
                                loop_points,
                            },
                        );
                    }
                }
                tracing::debug!(dir = %dir.display(), order, "wav source");
                chain.push(*order, Box::new(wav));
            }
            SourceConfig::Waveform { shape, order } => {
                chain.push(*order, Box::new(WaveformSource::new((*shape).into())));
            }
        }
    }
    chain
}

/// Mark every instrument `events` will play.
///
/// Follows bank selects and program changes per channel the way the
/// renderer will, so only instruments actually reached get loaded.
pub fn mark_used_instruments(renderer: &mut Renderer, events: &[TimedEvent]) {
    let mut banks = [0u8; 16];
    let mut programs: [Option<u8>; 16] =
        core::array::from_fn(|ch| renderer.channel(ch as u8).program);

    for timed in events {
        match timed.event {
            MidiEvent::ControlChange {
                channel,
                controller: controller::BANK_SELECT,
                value,
            } => banks[usize::from(channel)] = value,
            MidiEvent::ProgramChange { channel, program } => {
                if renderer.is_drum_channel(channel) {
                    banks[usize::from(channel)] = program;
                } else {
                    programs[usize::from(channel)] = Some(program);
                }
            }
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } if velocity > 0 => {
                let ch = usize::from(channel);
                if renderer.is_drum_channel(channel) {
                    renderer.mark_instrument(banks[ch], true, note);
                } else if let Some(program) = programs[ch] {
                    renderer.mark_instrument(banks[ch], false, program);
                }
            }
            _ => {}
        }
    }
}

//! Render notes or an event file to WAV.

use anyhow::{Context, bail};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tonebank_io::write_stereo_wav;

use super::common::{build_renderer, build_sources, load_config, mark_used_instruments};
use crate::events::{TimedEvent, chord, parse_events};

/// Frames rendered between progress updates when no event intervenes.
const RENDER_BLOCK: usize = 1024;

/// Seconds rendered past the last event of an event file.
const EVENT_TAIL: f64 = 1.0;

/// Render notes or an event file to WAV.
#[derive(Args)]
pub struct RenderArgs {
    /// Output WAV file
    #[arg(short, long)]
    out: PathBuf,

    /// Bank configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Notes to play together, e.g. 60,64,67
    #[arg(short, long, value_delimiter = ',', conflicts_with = "events")]
    notes: Vec<u8>,

    /// Program for --notes
    #[arg(short, long, default_value = "0", value_parser = clap::value_parser!(u8).range(0..128))]
    program: u8,

    /// Velocity for --notes
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u8).range(1..128))]
    velocity: u8,

    /// Length in seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Event file: one `<seconds> <status hex> <data1> <data2>` per line
    #[arg(short, long)]
    events: Option<PathBuf>,

    /// Output sample rate, overriding the configuration
    #[arg(long)]
    sample_rate: Option<u32>,
}

/// Run the render command.
pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(rate) = args.sample_rate {
        config.sample_rate = rate;
    }

    let (events, duration) = match &args.events {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let events =
                parse_events(&text).with_context(|| format!("in {}", path.display()))?;
            let last = events.last().map_or(0.0, |e| e.time);
            (events, args.duration.unwrap_or(last + EVENT_TAIL))
        }
        None => {
            let notes = if args.notes.is_empty() {
                vec![60, 64, 67]
            } else {
                args.notes.clone()
            };
            let duration = args.duration.unwrap_or(2.0);
            let events = chord(args.program, &notes, args.velocity, duration * 0.75);
            (events, duration)
        }
    };
    if !duration.is_finite() || duration <= 0.0 {
        bail!("duration must be positive, got {duration}");
    }

    let mut renderer = build_renderer(&config)?;
    mark_used_instruments(&mut renderer, &events);
    let mut sources = build_sources(&config);
    let failed = renderer.load_missing_instruments(&mut sources);

    let rate = renderer.output().sample_rate;
    let total = (duration * f64::from(rate)).round() as usize;

    println!("Rendering {} events", events.len());
    println!("  Output:      {}", args.out.display());
    println!("  Sample Rate: {} Hz", rate);
    println!("  Duration:    {:.2}s ({} frames)", duration, total);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    let buffer = render_events(&mut renderer, &events, total, |n| pb.inc(n as u64));
    pb.finish_and_clear();

    write_stereo_wav(&args.out, &buffer, rate)
        .with_context(|| format!("failed to write {}", args.out.display()))?;

    println!("Done.");
    if failed > 0 {
        println!("  Instruments that failed to load: {failed}");
    }
    println!("  Lost notes: {}", renderer.lost_notes());
    println!("  Cut notes:  {}", renderer.cut_notes());
    Ok(())
}

/// Render `total` frames, applying each event on its frame.
///
/// Events past the end are dropped. `progress` receives frames as they
/// are rendered.
pub fn render_events(
    renderer: &mut tonebank_synth::Renderer,
    events: &[TimedEvent],
    total: usize,
    mut progress: impl FnMut(usize),
) -> Vec<f32> {
    let rate = renderer.output().sample_rate;
    let mut buffer = vec![0.0f32; total * 2];
    let mut pending = events.iter().peekable();
    let mut pos = 0;

    while pos < total {
        while let Some(e) = pending.next_if(|e| e.frame(rate) <= pos) {
            renderer.dispatch(e.event);
        }
        let next = pending.peek().map_or(total, |e| e.frame(rate).min(total));
        let frames = (next - pos).min(RENDER_BLOCK);
        renderer.compute_output(&mut buffer[pos * 2..(pos + frames) * 2], frames);
        pos += frames;
        progress(frames);
    }
    buffer
}

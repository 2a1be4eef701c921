//! Timed event files.
//!
//! One event per line: `<seconds> <status hex> <data1> <data2>`. Blank lines
//! and everything after `#` are ignored. Status bytes take an optional `0x`
//! prefix; data bytes are decimal.

use anyhow::{Context, bail};
use tonebank_synth::MidiEvent;

/// An event and the time it fires.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedEvent {
    /// Seconds from the start of the render.
    pub time: f64,
    /// The message.
    pub event: MidiEvent,
}

impl TimedEvent {
    /// Event at `time` built from raw bytes.
    pub fn new(time: f64, status: u8, data1: u8, data2: u8) -> Option<Self> {
        MidiEvent::parse(status, data1, data2).map(|event| Self { time, event })
    }

    /// Output frame the event fires on.
    pub fn frame(&self, sample_rate: u32) -> usize {
        (self.time * f64::from(sample_rate)).round() as usize
    }
}

fn parse_line(line: &str) -> anyhow::Result<Option<TimedEvent>> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 4 {
        bail!("expected '<seconds> <status> <data1> <data2>', got '{line}'");
    }

    let time: f64 = fields[0].parse().context("invalid time")?;
    if !time.is_finite() || time < 0.0 {
        bail!("time must be a non-negative number, got {time}");
    }
    let hex = fields[1].trim_start_matches("0x").trim_start_matches("0X");
    let status = u8::from_str_radix(hex, 16).context("invalid status byte")?;
    let data1: u8 = fields[2].parse().context("invalid first data byte")?;
    let data2: u8 = fields[3].parse().context("invalid second data byte")?;

    match TimedEvent::new(time, status, data1, data2) {
        Some(event) => Ok(Some(event)),
        None => bail!("unsupported status byte {status:#04x}"),
    }
}

/// Parse an event file, sorted by time. Equal times keep file order.
pub fn parse_events(text: &str) -> anyhow::Result<Vec<TimedEvent>> {
    let mut events = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if let Some(event) = parse_line(line).with_context(|| format!("line {}", number + 1))? {
            events.push(event);
        }
    }
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
    Ok(events)
}

/// Events playing `notes` together on channel 1 from zero to `release`.
pub fn chord(program: u8, notes: &[u8], velocity: u8, release: f64) -> Vec<TimedEvent> {
    let mut events: Vec<TimedEvent> = TimedEvent::new(0.0, 0xC0, program, 0).into_iter().collect();
    events.extend(notes.iter().filter_map(|&n| TimedEvent::new(0.0, 0x90, n, velocity)));
    events.extend(notes.iter().filter_map(|&n| TimedEvent::new(release, 0x80, n, 0)));
    events
}

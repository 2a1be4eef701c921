//! Integration tests for tonebank-cli.
//!
//! Tests drive the built binary end to end: rendering notes and event files,
//! listing banks, and inspecting instruments.

use std::process::Command;

use tempfile::TempDir;
use tonebank_io::read_wav_info;

/// Helper to get the path to the `tonebank` binary built by cargo.
fn tonebank_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tonebank"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

const CONFIG: &str = r#"
sample_rate = 22050
voices = 8

[[source]]
kind = "waveform"
shape = "saw"

[[tonebank]]
bank = 0
[[tonebank.program]]
program = 0
name = "saw-lead"
pan = "right"

[[drumset]]
bank = 0
[[drumset.program]]
program = 36
name = "kick"
"#;

fn write_config(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("banks.toml");
    std::fs::write(&path, CONFIG).unwrap();
    path
}

// ---------------------------------------------------------------------------
// 1. tonebank render
// ---------------------------------------------------------------------------

#[test]
fn render_default_chord() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("chord.wav");

    let output = tonebank_bin()
        .args(["render", "--duration", "0.5", "--out"])
        .arg(&out)
        .output()
        .expect("failed to run tonebank render");
    assert!(
        output.status.success(),
        "render failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Lost notes: 0"), "got: {stdout}");

    let info = read_wav_info(&out).unwrap();
    assert_eq!(info.channels, 2);
    assert_eq!(info.sample_rate, 44100);
    assert_eq!(info.num_frames, 22050);
}

#[test]
fn render_event_file_with_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);
    let events = dir.path().join("song.txt");
    std::fs::write(
        &events,
        "# kick and lead\n0.0 99 36 120\n0.0 90 60 100\n0.2 80 60 0\n",
    )
    .unwrap();
    let out = dir.path().join("song.wav");

    let output = tonebank_bin()
        .arg("render")
        .arg("--config")
        .arg(&config)
        .arg("--events")
        .arg(&events)
        .arg("--out")
        .arg(&out)
        .output()
        .expect("failed to run tonebank render");
    assert!(
        output.status.success(),
        "render failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let info = read_wav_info(&out).unwrap();
    assert_eq!(info.sample_rate, 22050);
    // last event at 0.2s plus one second of tail
    assert_eq!(info.num_frames, 26460);
}

#[test]
fn render_rejects_bad_event_file() {
    let dir = TempDir::new().unwrap();
    let events = dir.path().join("bad.txt");
    std::fs::write(&events, "0.0 90 60\n").unwrap();

    let output = tonebank_bin()
        .arg("render")
        .arg("--events")
        .arg(&events)
        .arg("--out")
        .arg(dir.path().join("never.wav"))
        .output()
        .expect("failed to run tonebank render");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 1"));
}

#[test]
fn render_sample_rate_override() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("low.wav");

    let output = tonebank_bin()
        .args(["render", "--notes", "48,55", "--program", "5"])
        .args(["--duration", "0.25", "--sample-rate", "16000", "--out"])
        .arg(&out)
        .output()
        .expect("failed to run tonebank render");
    assert!(output.status.success());
    assert_eq!(read_wav_info(&out).unwrap().num_frames, 4000);
}

// ---------------------------------------------------------------------------
// 2. tonebank banks / inspect
// ---------------------------------------------------------------------------

#[test]
fn banks_lists_configured_entries() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    let output = tonebank_bin()
        .arg("banks")
        .arg("--config")
        .arg(&config)
        .output()
        .expect("failed to run tonebank banks");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("saw-lead"), "got: {stdout}");
    assert!(stdout.contains("pan=127"), "got: {stdout}");
    assert!(stdout.contains("kick"), "got: {stdout}");
    assert!(stdout.contains("waveform"), "got: {stdout}");
}

#[test]
fn inspect_prints_regions() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    let output = tonebank_bin()
        .args(["inspect", "--program", "0", "--config"])
        .arg(&config)
        .output()
        .expect("failed to run tonebank inspect");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("saw-lead (1 regions)"), "got: {stdout}");
    assert!(stdout.contains("Region 0: Gus"), "got: {stdout}");
    assert!(stdout.contains("loop sustain"), "got: {stdout}");
}

#[test]
fn inspect_missing_config_fails() {
    let output = tonebank_bin()
        .args(["inspect", "--drum", "--program", "38", "--config", "/nonexistent/banks.toml"])
        .output()
        .expect("failed to run tonebank inspect");
    // explicit config that does not exist is an error
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load configuration"));
}

#[test]
fn banks_json_output() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    let output = tonebank_bin()
        .args(["banks", "--json", "--config"])
        .arg(&config)
        .output()
        .expect("failed to run tonebank banks");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.trim_start().starts_with('{'), "got: {stdout}");
    assert!(stdout.contains("\"sample_rate\": 22050"), "got: {stdout}");
    assert!(stdout.contains("\"kind\": \"waveform\""), "got: {stdout}");
}

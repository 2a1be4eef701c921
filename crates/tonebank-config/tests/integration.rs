//! Integration tests for tonebank-config.
//!
//! These tests verify configuration files drive a working renderer end to end.

use tempfile::TempDir;
use tonebank_config::{BankConfig, ConfigError, SourceConfig, ValidationError, WaveShape};
use tonebank_synth::{BankKind, Renderer, SlotState, WaveformSource};

const SAMPLE_CONFIG: &str = r#"
sample_rate = 22050
voices = 16
default_program = 4
drum_channels = [10, 11]

[[source]]
kind = "waveform"
shape = "triangle"

[[tonebank]]
bank = 0
[[tonebank.program]]
program = 4
name = "triangle-lead"
pan = "left"
amp = 80

[[tonebank]]
bank = 2
[[tonebank.program]]
program = 4
name = "bright-lead"
strip = ["env"]

[[drumset]]
bank = 0
[[drumset.program]]
program = 36
name = "kick"
keep = ["env"]
"#;

// ---------------------------------------------------------------------------
// 1. File round trips
// ---------------------------------------------------------------------------

/// Saving into a missing directory creates it and reloads identically.
#[test]
fn save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("banks.toml");

    let config = BankConfig::from_toml(SAMPLE_CONFIG).unwrap();
    config.save(&path).unwrap();

    let loaded = BankConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.tonebanks.len(), 2);
    assert!(matches!(
        loaded.sources[0],
        SourceConfig::Waveform {
            shape: WaveShape::Triangle,
            order: 0
        }
    ));
}

/// A missing file reports its path.
#[test]
fn load_missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    match BankConfig::load(&path) {
        Err(ConfigError::ReadFile { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected ReadFile, got {other:?}"),
    }
}

/// Out-of-range values fail at load time, not at render time.
#[test]
fn load_rejects_invalid_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "voices = 0\ndrum_channels = [20]\n").unwrap();

    match BankConfig::load(&path) {
        Err(ConfigError::Validation(ValidationError::Multiple(errors))) => {
            assert_eq!(errors.len(), 2)
        }
        other => panic!("expected validation errors, got {other:?}"),
    }
}

/// Malformed TOML surfaces the parser error.
#[test]
fn malformed_toml_is_parse_error() {
    assert!(matches!(
        BankConfig::from_toml("[[tonebank]\nbank = 0"),
        Err(ConfigError::TomlParse(_))
    ));
}

// ---------------------------------------------------------------------------
// 2. Configuration to renderer
// ---------------------------------------------------------------------------

/// Engine settings and drum channels carry into the renderer.
#[test]
fn renderer_follows_config() {
    let config = BankConfig::from_toml(SAMPLE_CONFIG).unwrap();
    let renderer = Renderer::new(config.renderer_config()).unwrap();

    assert_eq!(renderer.output().sample_rate, 22050);
    assert_eq!(renderer.voices().len(), 16);
    assert!(renderer.is_drum_channel(9));
    assert!(renderer.is_drum_channel(10));
    assert!(!renderer.is_drum_channel(0));
    assert_eq!(renderer.channel(0).program, Some(4));
}

/// Configured slots load through a source and play.
#[test]
fn configured_banks_load_and_render() {
    let config = BankConfig::from_toml(SAMPLE_CONFIG).unwrap();
    let mut renderer = Renderer::new(config.renderer_config()).unwrap();
    config.apply(renderer.banks_mut());

    renderer.mark_instrument(2, false, 4);
    renderer.mark_instrument(0, true, 36);
    let failed = renderer.load_missing_instruments(&mut WaveformSource::default());
    assert_eq!(failed, 0);

    let banks = renderer.banks();
    assert!(matches!(
        banks.slot(BankKind::Tone, 2, 4),
        Some(SlotState::Loaded(_))
    ));
    assert!(matches!(
        banks.slot(BankKind::Tone, 0, 4),
        Some(SlotState::Loaded(_))
    ));
    assert!(matches!(
        banks.slot(BankKind::Drum, 0, 36),
        Some(SlotState::Loaded(_))
    ));

    renderer.handle_event(0x90, 60, 100);
    renderer.handle_event(0x99, 36, 100);
    let mut buf = vec![0.0f32; 2 * 2048];
    renderer.compute_output(&mut buf, 2048);
    assert!(buf.iter().all(|v| v.is_finite()));
    assert!(buf.iter().any(|&v| v != 0.0));
}

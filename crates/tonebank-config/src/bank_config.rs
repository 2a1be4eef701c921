//! Bank configuration file format and operations.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tonebank_synth::{BankKind, BankRegistry, PatchOverrides, RendererConfig, ToneEntry, Waveform};

use crate::error::ConfigError;
use crate::validation::validate_config;

/// Engine settings, instrument sources and bank layout.
///
/// # TOML Format
///
/// ```toml
/// sample_rate = 44100
/// voices = 48
/// drum_channels = [10]
///
/// [[source]]
/// kind = "wav"
/// dir = "/usr/share/tonebank/samples"
/// order = 0
///
/// [[source]]
/// kind = "waveform"
/// shape = "saw"
/// order = 10
///
/// [[tonebank]]
/// bank = 0
///
/// [[tonebank.program]]
/// program = 0
/// name = "piano"
/// root = 60
/// loop_start = 1200
/// loop_end = 8800
///
/// [[drumset]]
/// bank = 0
///
/// [[drumset.program]]
/// program = 36
/// name = "kick"
/// pan = "center"
/// keep = ["env"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BankConfig {
    /// Output rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Voice pool size.
    #[serde(default = "default_voices")]
    pub voices: usize,

    /// Program every channel starts on.
    #[serde(default)]
    pub default_program: u8,

    /// Drum channels, numbered 1 to 16.
    #[serde(default = "default_drum_channels")]
    pub drum_channels: Vec<u8>,

    /// Directories searched for relative source paths, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_dirs: Vec<PathBuf>,

    /// Instrument sources.
    #[serde(default, rename = "source", skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceConfig>,

    /// Melodic banks.
    #[serde(default, rename = "tonebank", skip_serializing_if = "Vec::is_empty")]
    pub tonebanks: Vec<BankSection>,

    /// Percussion banks.
    #[serde(default, rename = "drumset", skip_serializing_if = "Vec::is_empty")]
    pub drumsets: Vec<BankSection>,
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_voices() -> usize {
    32
}

fn default_drum_channels() -> Vec<u8> {
    vec![10]
}

/// Where instruments are loaded from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// A directory of `<name>.wav` files.
    Wav {
        /// Directory holding the files.
        dir: PathBuf,
        /// Lower orders are tried first.
        #[serde(default)]
        order: i32,
    },
    /// Generated single-cycle waveforms.
    Waveform {
        /// Shape of melodic programs.
        #[serde(default)]
        shape: WaveShape,
        /// Lower orders are tried first.
        #[serde(default)]
        order: i32,
    },
}

impl SourceConfig {
    /// Position of the source in the load order.
    pub fn order(&self) -> i32 {
        match self {
            Self::Wav { order, .. } | Self::Waveform { order, .. } => *order,
        }
    }
}

/// Waveform named in a configuration file.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WaveShape {
    /// Sine.
    #[default]
    Sine,
    /// Triangle.
    Triangle,
    /// Sawtooth.
    Saw,
    /// Square.
    Square,
}

impl From<WaveShape> for Waveform {
    fn from(shape: WaveShape) -> Self {
        match shape {
            WaveShape::Sine => Waveform::Sine,
            WaveShape::Triangle => Waveform::Triangle,
            WaveShape::Saw => Waveform::Saw,
            WaveShape::Square => Waveform::Square,
        }
    }
}

/// One `[[tonebank]]` or `[[drumset]]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BankSection {
    /// Bank number, 0 to 127.
    pub bank: u8,

    /// Configured slots.
    #[serde(default, rename = "program", skip_serializing_if = "Vec::is_empty")]
    pub programs: Vec<ProgramEntry>,
}

/// One configured program (or drum note).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProgramEntry {
    /// Program number, or note for drum sets.
    pub program: u8,

    /// Instrument name resolved by the sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Always play at this note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<u8>,

    /// Fixed pan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<PanSetting>,

    /// Parts of the instrument kept even where the bank would strip them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keep: Vec<KeepFlag>,

    /// Parts of the instrument removed while loading.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strip: Vec<StripFlag>,

    /// Amplification in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amp: Option<u16>,

    /// Root note of a WAV instrument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<u8>,

    /// Loop start of a WAV instrument, in frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_start: Option<u32>,

    /// Loop end of a WAV instrument, in frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_end: Option<u32>,
}

impl ProgramEntry {
    /// Entry for `program` loading `name`.
    pub fn new(program: u8, name: impl Into<String>) -> Self {
        Self {
            program,
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Conversion overrides this entry asks for.
    pub fn overrides(&self) -> PatchOverrides {
        let mut overrides = PatchOverrides {
            pan: self.pan.map(PanSetting::to_midi),
            note: self.note,
            amp: self.amp,
            ..PatchOverrides::default()
        };
        for flag in &self.keep {
            match flag {
                KeepFlag::Env => overrides.strip_envelope = Some(false),
                KeepFlag::Loop => overrides.strip_loop = Some(false),
            }
        }
        for flag in &self.strip {
            match flag {
                StripFlag::Env => overrides.strip_envelope = Some(true),
                StripFlag::Loop => overrides.strip_loop = Some(true),
                StripFlag::Tail => overrides.strip_tail = true,
            }
        }
        overrides
    }

    /// Registry entry for this program.
    pub fn tone_entry(&self) -> ToneEntry {
        ToneEntry {
            name: self.name.clone(),
            overrides: self.overrides(),
        }
    }
}

/// A pan position: a side name or -100 (left) to 100 (right).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PanSetting {
    /// Numeric position.
    Position(i32),
    /// Named position.
    Named(PanName),
}

/// Named pan positions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PanName {
    /// Hard left.
    Left,
    /// Middle.
    #[serde(alias = "centre")]
    Center,
    /// Hard right.
    Right,
}

impl PanSetting {
    /// MIDI pan, 0 (left) to 127 (right).
    pub fn to_midi(self) -> u8 {
        match self {
            Self::Named(PanName::Left) => 0,
            Self::Named(PanName::Center) => 64,
            Self::Named(PanName::Right) => 127,
            Self::Position(x) => (((x.clamp(-100, 100) + 100) * 100) / 157) as u8,
        }
    }
}

/// Instrument parts `keep` can protect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeepFlag {
    /// The envelope.
    Env,
    /// The loop.
    Loop,
}

/// Instrument parts `strip` can remove.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StripFlag {
    /// The envelope.
    Env,
    /// The loop.
    Loop,
    /// Everything after the loop end.
    Tail,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            voices: default_voices(),
            default_program: 0,
            drum_channels: default_drum_channels(),
            search_dirs: Vec::new(),
            sources: Vec::new(),
            tonebanks: Vec::new(),
            drumsets: Vec::new(),
        }
    }
}

impl BankConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(
            path = %path.display(),
            tonebanks = config.tonebanks.len(),
            drumsets = config.drumsets.len(),
            "loaded bank configuration"
        );
        Ok(config)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: BankConfig = toml::from_str(toml_str)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every value is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_config(self)?;
        Ok(())
    }

    /// Drum channel bit mask, bit 0 for channel 1.
    pub fn drum_channel_mask(&self) -> u16 {
        self.drum_channels
            .iter()
            .filter(|c| (1..=16).contains(*c))
            .fold(0u16, |mask, c| mask | (1 << (c - 1)))
    }

    /// Engine parameters described by this configuration.
    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            sample_rate: self.sample_rate,
            voices: self.voices,
            drum_channels: self.drum_channel_mask(),
            default_program: Some(self.default_program & 0x7f),
            ..RendererConfig::default()
        }
    }

    /// Every configured slot with its bank kind and number.
    pub fn entries(&self) -> impl Iterator<Item = (BankKind, u8, &ProgramEntry)> {
        let tone = self
            .tonebanks
            .iter()
            .flat_map(|s| s.programs.iter().map(move |p| (BankKind::Tone, s.bank, p)));
        let drum = self
            .drumsets
            .iter()
            .flat_map(|s| s.programs.iter().map(move |p| (BankKind::Drum, s.bank, p)));
        tone.chain(drum)
    }

    /// Sources sorted by load order.
    pub fn ordered_sources(&self) -> Vec<&SourceConfig> {
        let mut sources: Vec<_> = self.sources.iter().collect();
        sources.sort_by_key(|s| s.order());
        sources
    }

    /// Resolve a source directory against `search_dirs`.
    ///
    /// Absolute paths are returned as is. Relative paths resolve to the first
    /// search directory containing them, or stay relative if none does.
    pub fn resolve_dir(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            return dir.to_path_buf();
        }
        self.search_dirs
            .iter()
            .map(|base| base.join(dir))
            .find(|p| p.is_dir())
            .unwrap_or_else(|| dir.to_path_buf())
    }

    /// Define every configured bank and slot in `registry`.
    ///
    /// Returns the number of slots written.
    pub fn apply(&self, registry: &mut BankRegistry) -> usize {
        let mut written = 0;
        for section in &self.tonebanks {
            registry.define_bank(BankKind::Tone, section.bank);
        }
        for section in &self.drumsets {
            registry.define_bank(BankKind::Drum, section.bank);
        }
        for (kind, bank, entry) in self.entries() {
            registry.set_entry(kind, bank, entry.program, entry.tone_entry());
            written += 1;
        }
        tracing::info!(
            tonebanks = self.tonebanks.len(),
            drumsets = self.drumsets.len(),
            slots = written,
            "applied bank configuration"
        );
        written
    }
}

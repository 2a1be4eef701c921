//! Instruments from a directory of WAV files.
//!
//! An entry named `piano` resolves to `<dir>/piano.wav`. The file becomes a
//! single-region patch: 8-bit files stay 8-bit, everything else is stored as
//! 16-bit, multi-channel audio is mixed to mono. WAV headers carry no pitch
//! or loop data, so both come from a [`WavHint`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};
use tonebank_core::note_to_freq;
use tonebank_synth::records::{PatchRecord, PatchSet, convert_patch};
use tonebank_synth::{Instrument, InstrumentSource, LoadError, LoadRequest, SampleModes};

use crate::{Error, Result};

/// Root note assumed when no hint names one.
pub const DEFAULT_ROOT: u8 = 60;

/// Pitch and loop data a WAV file cannot carry itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WavHint {
    /// Note the recording plays at its own rate.
    pub root: Option<u8>,
    /// Loop start and end, in frames.
    pub loop_points: Option<(u32, u32)>,
}

fn mixdown(samples: &[i32], channels: usize) -> Vec<i32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| (frame.iter().map(|&v| i64::from(v)).sum::<i64>() / channels as i64) as i32)
        .collect()
}

/// Convert a WAV file into a patch record.
///
/// The record plays with a sustaining envelope and, when the hint gives a
/// non-empty loop inside the file, a forward loop.
pub fn read_patch(path: &Path, hint: &WavHint) -> Result<PatchRecord> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let (frames, wide) = match spec.sample_format {
        SampleFormat::Int => {
            let raw = reader
                .into_samples::<i32>()
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let shift = spec.bits_per_sample.saturating_sub(16);
            let frames = mixdown(&raw, channels)
                .into_iter()
                .map(|v| v >> shift)
                .collect();
            (frames, spec.bits_per_sample > 8)
        }
        SampleFormat::Float => {
            if spec.bits_per_sample != 32 {
                return Err(Error::UnsupportedFormat(format!(
                    "{}-bit float",
                    spec.bits_per_sample
                )));
            }
            let raw: Vec<i32> = reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * 32767.0) as i32))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            (mixdown(&raw, channels), true)
        }
    };

    let (data, width, mut modes): (Vec<u8>, u32, SampleModes) = if wide {
        let data = frames
            .iter()
            .flat_map(|&v| (v.clamp(-32768, 32767) as i16).to_le_bytes())
            .collect();
        (data, 2, SampleModes::PATCH_16)
    } else {
        let data = frames.iter().map(|&v| v.clamp(-128, 127) as i8 as u8).collect();
        (data, 1, SampleModes::empty())
    };
    modes.insert(SampleModes::SUSTAIN);

    let (mut loop_start, mut loop_end) = (0, 0);
    if let Some((start, end)) = hint.loop_points {
        let end = end.min(frames.len() as u32);
        if start < end {
            modes.insert(SampleModes::LOOP);
            loop_start = start * width;
            loop_end = end * width;
        }
    }

    let root = hint.root.unwrap_or(DEFAULT_ROOT) & 0x7f;
    Ok(PatchRecord {
        data,
        loop_start,
        loop_end,
        sample_rate: spec.sample_rate,
        low_freq: 0,
        high_freq: note_to_freq(127.0) as u32 + 1,
        root_freq: note_to_freq(f64::from(root)) as u32,
        balance: 7,
        envelope_rates: [0x3f, 0x3f, 0x3f, 0x50, 0x50, 0x50],
        envelope_offsets: [250, 250, 250, 5, 5, 5],
        modes,
        scale_frequency: i16::from(root),
        scale_factor: 1024,
        ..PatchRecord::default()
    })
}

/// Resolves entry names to WAV files in one directory.
#[derive(Clone, Debug)]
pub struct WavSource {
    dir: PathBuf,
    hints: HashMap<String, WavHint>,
}

impl WavSource {
    /// Source reading from `dir`, which need not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            hints: HashMap::new(),
        }
    }

    /// Source reading from an existing directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(Error::NotFound(dir));
        }
        Ok(Self::new(dir))
    }

    /// Directory files are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Attach pitch and loop data to the entry `name`.
    pub fn set_hint(&mut self, name: impl Into<String>, hint: WavHint) {
        self.hints.insert(name.into(), hint);
    }

    /// Builder form of [`set_hint`](Self::set_hint).
    pub fn with_hint(mut self, name: impl Into<String>, hint: WavHint) -> Self {
        self.set_hint(name, hint);
        self
    }

    /// File an entry name resolves to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        let has_ext = Path::new(name)
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if has_ext {
            self.dir.join(name)
        } else {
            self.dir.join(format!("{name}.wav"))
        }
    }
}

impl InstrumentSource for WavSource {
    fn load(&mut self, request: &LoadRequest<'_>) -> std::result::Result<Option<Instrument>, LoadError> {
        let Some(name) = request.name else {
            return Ok(None);
        };
        let path = self.path_for(name);
        if !path.is_file() {
            return Ok(None);
        }

        let hint = self.hints.get(name).copied().unwrap_or_default();
        let record = read_patch(&path, &hint)
            .map_err(|e| LoadError::Source(format!("{}: {e}", path.display())))?;
        tracing::debug!(
            path = %path.display(),
            kind = request.kind.label(),
            bank = request.bank,
            program = request.program,
            "loading wav instrument"
        );

        let set = PatchSet {
            description: None,
            samples: vec![record],
        };
        convert_patch(&set, &request.overrides, &request.output).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonebank_synth::{BankKind, OutputSpec, PatchOverrides};

    fn request(name: Option<&str>) -> LoadRequest<'_> {
        LoadRequest {
            kind: BankKind::Tone,
            bank: 0,
            program: 0,
            name,
            overrides: PatchOverrides::default(),
            output: OutputSpec::new(44100),
        }
    }

    #[test]
    fn test_path_for_appends_extension() {
        let source = WavSource::new("/samples");
        assert_eq!(source.path_for("piano"), Path::new("/samples/piano.wav"));
        assert_eq!(source.path_for("kick.WAV"), Path::new("/samples/kick.WAV"));
    }

    #[test]
    fn test_unnamed_slot_is_not_defined() {
        let mut source = WavSource::new("/nonexistent");
        assert!(matches!(source.load(&request(None)), Ok(None)));
    }

    #[test]
    fn test_missing_file_is_not_defined() {
        let mut source = WavSource::new("/nonexistent");
        assert!(matches!(source.load(&request(Some("piano"))), Ok(None)));
    }

    #[test]
    fn test_open_requires_directory() {
        assert!(matches!(
            WavSource::open("/nonexistent/tonebank"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_mixdown_averages_frames() {
        assert_eq!(mixdown(&[100, 300, -50, 50], 2), vec![200, 0]);
        assert_eq!(mixdown(&[1, 2, 3], 1), vec![1, 2, 3]);
    }
}

//! WAV input and output for the tonebank synthesizer.
//!
//! This crate provides:
//!
//! - **WAV file I/O**: [`read_wav`] and [`write_stereo_wav`] for loading and saving audio
//! - **WAV instruments**: [`WavSource`] turns a directory of `.wav` files into instruments
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tonebank_io::{WavSource, write_stereo_wav};
//! use tonebank_synth::{Renderer, RendererConfig, ToneEntry, BankKind};
//!
//! let mut renderer = Renderer::new(RendererConfig::default())?;
//! renderer
//!     .banks_mut()
//!     .set_entry(BankKind::Tone, 0, 0, ToneEntry::named("piano"));
//! renderer.mark_instrument(0, false, 0);
//! renderer.load_missing_instruments(&mut WavSource::open("samples")?);
//!
//! renderer.handle_event(0x90, 60, 100);
//! let mut buf = vec![0.0f32; 2 * 44100];
//! renderer.compute_output(&mut buf, 44100);
//! write_stereo_wav("out.wav", &buf, 44100)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod wav;
mod wav_source;

pub use wav::{WavFormat, WavInfo, WavSpec, read_wav, read_wav_info, write_stereo_wav};
pub use wav_source::{WavHint, WavSource, read_patch};

use std::path::PathBuf;

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// The file holds a sample layout the converter cannot use.
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// A file or directory that should exist does not.
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

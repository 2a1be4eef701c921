//! Tonebank Synth - sample-based MIDI synthesis engine
//!
//! This crate turns MIDI channel messages plus a library of sampled
//! instruments into interleaved stereo PCM. It implements the classic
//! wavetable-card model: instruments are lists of looped sample regions, each
//! note binds one voice per region, and every voice is resampled, enveloped
//! and panned into the output.
//!
//! # Core Components
//!
//! ## Rendering
//!
//! - [`Renderer`] - Owns channels, voices and banks; accepts events, renders frames
//! - [`RendererConfig`] - Sample rate, voice count, block size, drum channels
//! - [`MidiEvent`] - Decoded channel message
//!
//! ```rust
//! use tonebank_synth::{Renderer, RendererConfig, WaveformSource};
//!
//! let mut renderer = Renderer::new(RendererConfig::default()).unwrap();
//! renderer.mark_instrument(0, false, 0);
//! renderer.load_missing_instruments(&mut WaveformSource::default());
//!
//! renderer.handle_event(0x90, 60, 100);
//! let mut buf = vec![0.0f32; 2 * 512];
//! renderer.compute_output(&mut buf, 512);
//! ```
//!
//! ## Instruments
//!
//! - [`Sample`] - One playable region with loop, pitch, pan and envelope data
//! - [`Instrument`] - The regions of one program or drum note
//! - [`records`] - Converters from patch, soundfont and downloadable-sound records
//!
//! ## Banks and Sources
//!
//! - [`BankRegistry`] - 128 tone banks and 128 drum sets with lazy slots
//! - [`InstrumentSource`] - Where the registry gets instruments from
//! - [`SourceChain`] - Several sources in priority order
//! - [`WaveformSource`] - Generated instruments, no files needed
//!
//! ## Playback Internals
//!
//! - [`Envelope`] - Hardware or ADSR amplitude envelope
//! - [`Voice`] / [`VoicePool`] - Playback slots with stealing
//! - [`resample`] - Fixed-point resampling with loops and vibrato
//! - [`mix`] - Control-rate gain updates and accumulation
//!
//! # no_std Support
//!
//! The crate is `no_std` compatible with `alloc`. Disable the default `std`
//! feature:
//!
//! ```toml
//! [dependencies]
//! tonebank-synth = { version = "0.1", default-features = false }
//! ```
//!
//! Enable the `tracing` feature to log instrument loads, voice stealing and
//! lost notes.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

pub mod bank;
pub mod channel;
pub mod envelope;
pub mod error;
pub mod event;
pub mod instrument;
pub mod mix;
pub mod output;
pub mod records;
pub mod renderer;
pub mod resample;
pub mod sample;
pub mod source;
pub mod voice;

pub use bank::{BankKind, BankRegistry, SlotState, ToneBank, ToneEntry};
pub use channel::Channel;
pub use envelope::{Envelope, Gf1Envelope, Gf1Stage, Sf2Envelope, Sf2Stage};
pub use error::{EngineError, LoadError};
pub use event::MidiEvent;
pub use instrument::Instrument;
pub use output::OutputSpec;
pub use records::PatchOverrides;
pub use renderer::{Renderer, RendererConfig};
pub use sample::{EnvelopeParams, Sample, SampleKind, SampleModes, Sf2EnvelopeParams};
pub use source::{InstrumentSource, LoadRequest, SourceChain, Waveform, WaveformSource};
pub use voice::{Voice, VoicePool, VoiceStatus};

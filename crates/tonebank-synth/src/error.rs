//! Error types for instrument loading and engine construction.
//!
//! Only unrecoverable conditions surface here. Out-of-range record fields are
//! repaired during conversion and never produce an error.

use alloc::string::String;

/// Errors raised while turning instrument records into an [`Instrument`](crate::Instrument).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The record set contained no playable regions.
    NoSamples,
    /// A region carried no waveform data.
    EmptyData,
    /// A waveform exceeds the addressable fixed-point range.
    TooLarge(usize),
    /// The PCM layout is not one the converter understands.
    UnsupportedFormat(String),
    /// An instrument source failed for a reason of its own (I/O, parsing).
    Source(String),
}

impl core::fmt::Display for LoadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoSamples => write!(f, "instrument has no playable samples"),
            Self::EmptyData => write!(f, "sample has no waveform data"),
            Self::TooLarge(n) => write!(f, "sample of {n} frames is too large"),
            Self::UnsupportedFormat(msg) => write!(f, "unsupported sample format: {msg}"),
            Self::Source(msg) => write!(f, "instrument source error: {msg}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LoadError {}

/// Errors raised when a [`Renderer`](crate::Renderer) cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// Output sample rate outside the supported range.
    InvalidSampleRate(u32),
    /// Internal block size of zero.
    InvalidBlockSize,
    /// Voice pool of zero voices.
    NoVoices,
}

impl core::fmt::Display for EngineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidSampleRate(rate) => write!(f, "unsupported sample rate {rate} Hz"),
            Self::InvalidBlockSize => write!(f, "block size must be at least one frame"),
            Self::NoVoices => write!(f, "voice pool must hold at least one voice"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EngineError {}

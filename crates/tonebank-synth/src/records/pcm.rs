//! Integer PCM to normalized float conversion.

use alloc::vec::Vec;

use crate::sample::SampleModes;

/// Integer PCM layouts instrument records carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PcmFormat {
    /// 8-bit two's complement.
    S8,
    /// 8-bit offset binary, silence at 128.
    U8,
    /// 16-bit little-endian two's complement.
    S16,
    /// 16-bit little-endian offset binary, silence at 32768.
    U16,
}

impl PcmFormat {
    /// Derive the layout from patch mode flags.
    pub fn from_modes(modes: SampleModes) -> Self {
        match (
            modes.contains(SampleModes::PATCH_16),
            modes.contains(SampleModes::UNSIGNED),
        ) {
            (false, false) => Self::S8,
            (false, true) => Self::U8,
            (true, false) => Self::S16,
            (true, true) => Self::U16,
        }
    }

    /// Bytes per frame.
    pub const fn width(self) -> usize {
        match self {
            Self::S8 | Self::U8 => 1,
            Self::S16 | Self::U16 => 2,
        }
    }
}

#[inline]
fn normalize(value: i32, negative_scale: f32, positive_scale: f32) -> f32 {
    if value < 0 {
        value as f32 / negative_scale
    } else {
        value as f32 / positive_scale
    }
}

/// Decode raw PCM bytes into floats in `[-1, 1]`.
///
/// Negative values divide by the magnitude of the most negative code and
/// positive values by the most positive one, so both extremes land exactly on
/// full scale. The final frame is duplicated for interpolation lookahead. A
/// trailing odd byte of 16-bit data is ignored.
pub fn decode_pcm(bytes: &[u8], format: PcmFormat) -> Vec<f32> {
    let mut out: Vec<f32> = match format {
        PcmFormat::S8 => bytes
            .iter()
            .map(|&b| normalize(i32::from(b as i8), 128.0, 127.0))
            .collect(),
        PcmFormat::U8 => bytes
            .iter()
            .map(|&b| normalize(i32::from(b) - 128, 128.0, 127.0))
            .collect(),
        PcmFormat::S16 => bytes
            .chunks_exact(2)
            .map(|c| normalize(i32::from(i16::from_le_bytes([c[0], c[1]])), 32768.0, 32767.0))
            .collect(),
        PcmFormat::U16 => bytes
            .chunks_exact(2)
            .map(|c| normalize(i32::from(u16::from_le_bytes([c[0], c[1]])) - 32768, 32768.0, 32767.0))
            .collect(),
    };
    let last = out.last().copied().unwrap_or(0.0);
    out.push(last);
    out
}

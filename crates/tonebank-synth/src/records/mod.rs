//! Structured instrument records and their conversion into samples.
//!
//! Container parsing lives outside the engine. Parsers (or tests, or the
//! built-in waveform source) hand over these records, and the converters here
//! normalize them into [`Sample`](crate::Sample)s:
//!
//! - [`patch`] - Hardware patches with rate/offset envelopes
//! - [`soundfont`] - Soundfont sample headers plus generator regions
//! - [`dls`] - Downloadable-sound wave regions
//! - [`pcm`] - Integer PCM decoding shared by all three

pub mod dls;
pub mod patch;
pub mod pcm;
pub mod soundfont;

pub use dls::{DlsArticulation, DlsRegion, convert_dls};
pub use patch::{PatchOverrides, PatchRecord, PatchSet, convert_patch};
pub use pcm::{PcmFormat, decode_pcm};
pub use soundfont::{SoundFontRegion, SoundFontSample, convert_soundfont};

use crate::error::LoadError;

/// Largest waveform a region may hold, in frames.
pub const MAX_SAMPLE_FRAMES: usize = 1 << (32 - tonebank_core::FRACTION_BITS);

pub(crate) fn check_frames(frames: usize) -> Result<(), LoadError> {
    if frames > MAX_SAMPLE_FRAMES {
        return Err(LoadError::TooLarge(frames));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_limit() {
        assert!(check_frames(MAX_SAMPLE_FRAMES).is_ok());
        assert_eq!(
            check_frames(MAX_SAMPLE_FRAMES + 1),
            Err(LoadError::TooLarge(MAX_SAMPLE_FRAMES + 1))
        );
    }
}

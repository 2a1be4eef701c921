//! Output format shared by instrument conversion and playback.

use tonebank_core::control_ratio;

/// Output sample rate and the derived control-tick length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputSpec {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Audio samples per control tick.
    pub control_ratio: u32,
}

impl OutputSpec {
    /// Create an output spec, deriving the control ratio from the rate.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            control_ratio: control_ratio(sample_rate),
        }
    }
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self::new(44100)
    }
}

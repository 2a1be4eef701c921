//! Range and consistency checks for bank configurations.
//!
//! Every problem in a file is collected before reporting, so a user fixing a
//! configuration sees all of them at once.
//!
//! # Example
//!
//! ```rust
//! use tonebank_config::{BankConfig, validate_config};
//!
//! let config = BankConfig { voices: 0, ..BankConfig::default() };
//! assert!(validate_config(&config).is_err());
//! ```

use std::collections::HashSet;
use thiserror::Error;

use crate::bank_config::{BankConfig, BankSection, PanSetting};

/// Lowest sample rate a configuration may ask for.
pub const MIN_SAMPLE_RATE: u32 = 8000;
/// Highest sample rate a configuration may ask for.
pub const MAX_SAMPLE_RATE: u32 = 192_000;
/// Largest voice pool a configuration may ask for.
pub const MAX_VOICES: usize = 1024;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A value outside its allowed range.
    #[error("{field} value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Where the value appears.
        field: String,
        /// The offending value.
        value: i64,
        /// Minimum allowed value.
        min: i64,
        /// Maximum allowed value.
        max: i64,
    },

    /// The same bank number appears twice for one kind.
    #[error("{kind} {bank} defined twice")]
    DuplicateBank {
        /// `tonebank` or `drumset`.
        kind: String,
        /// Bank number.
        bank: u8,
    },

    /// The same program appears twice within one bank.
    #[error("program {program} defined twice in {kind} {bank}")]
    DuplicateProgram {
        /// `tonebank` or `drumset`.
        kind: String,
        /// Bank number.
        bank: u8,
        /// Program number.
        program: u8,
    },

    /// Loop end not after loop start.
    #[error("{field}: loop_end {end} must be greater than loop_start {start}")]
    InvalidLoop {
        /// Where the loop appears.
        field: String,
        /// Loop start in frames.
        start: u32,
        /// Loop end in frames.
        end: u32,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn check_range(
    errors: &mut Vec<ValidationError>,
    field: impl Into<String>,
    value: i64,
    min: i64,
    max: i64,
) {
    if !(min..=max).contains(&value) {
        errors.push(ValidationError::OutOfRange {
            field: field.into(),
            value,
            min,
            max,
        });
    }
}

fn check_sections(errors: &mut Vec<ValidationError>, kind: &str, sections: &[BankSection]) {
    let mut banks = HashSet::new();
    for section in sections {
        check_range(errors, format!("{kind}.bank"), section.bank.into(), 0, 127);
        if !banks.insert(section.bank) {
            errors.push(ValidationError::DuplicateBank {
                kind: kind.to_string(),
                bank: section.bank,
            });
        }

        let mut programs = HashSet::new();
        for entry in &section.programs {
            let at = format!("{kind} {} program {}", section.bank, entry.program);
            check_range(errors, format!("{at}: program"), entry.program.into(), 0, 127);
            if !programs.insert(entry.program) {
                errors.push(ValidationError::DuplicateProgram {
                    kind: kind.to_string(),
                    bank: section.bank,
                    program: entry.program,
                });
            }
            if let Some(note) = entry.note {
                check_range(errors, format!("{at}: note"), note.into(), 0, 127);
            }
            if let Some(root) = entry.root {
                check_range(errors, format!("{at}: root"), root.into(), 0, 127);
            }
            if let Some(PanSetting::Position(pan)) = entry.pan {
                check_range(errors, format!("{at}: pan"), pan.into(), -100, 100);
            }
            if let (Some(start), Some(end)) = (entry.loop_start, entry.loop_end)
                && end <= start
            {
                errors.push(ValidationError::InvalidLoop {
                    field: at,
                    start,
                    end,
                });
            }
        }
    }
}

/// Check every value in `config`.
///
/// A single problem is returned as is; several are wrapped in
/// [`ValidationError::Multiple`].
pub fn validate_config(config: &BankConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    check_range(
        &mut errors,
        "sample_rate",
        config.sample_rate.into(),
        MIN_SAMPLE_RATE.into(),
        MAX_SAMPLE_RATE.into(),
    );
    check_range(
        &mut errors,
        "voices",
        config.voices as i64,
        1,
        MAX_VOICES as i64,
    );
    check_range(
        &mut errors,
        "default_program",
        config.default_program.into(),
        0,
        127,
    );
    for &channel in &config.drum_channels {
        check_range(&mut errors, "drum_channels", channel.into(), 1, 16);
    }
    check_sections(&mut errors, "tonebank", &config.tonebanks);
    check_sections(&mut errors, "drumset", &config.drumsets);

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

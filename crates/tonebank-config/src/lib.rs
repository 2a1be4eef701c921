//! Bank configuration for the tonebank synthesizer.
//!
//! A configuration file names the instruments each tone bank and drum set
//! plays, where they are loaded from, and how the engine is set up.
//!
//! # Features
//!
//! - **Bank files**: Load and save [`BankConfig`] as TOML
//! - **Validation**: Range and duplicate checks with every problem reported
//! - **Paths**: Platform-specific config and sample directories
//!
//! # Example
//!
//! ```rust
//! use tonebank_config::BankConfig;
//! use tonebank_synth::{BankKind, BankRegistry};
//!
//! let config = BankConfig::from_toml(
//!     r#"
//!     voices = 48
//!
//!     [[tonebank]]
//!     bank = 0
//!     [[tonebank.program]]
//!     program = 0
//!     name = "piano"
//!     "#,
//! )
//! .unwrap();
//!
//! let mut registry = BankRegistry::new();
//! config.apply(&mut registry);
//! assert_eq!(config.renderer_config().voices, 48);
//! assert!(registry.bank(BankKind::Tone, 0).is_some());
//! ```

mod bank_config;
mod error;

/// Platform-specific paths for configuration and samples.
#[cfg(feature = "std")]
pub mod paths;

/// Configuration validation.
pub mod validation;

pub use bank_config::{
    BankConfig, BankSection, KeepFlag, PanName, PanSetting, ProgramEntry, SourceConfig,
    StripFlag, WaveShape,
};
pub use error::ConfigError;
#[cfg(feature = "std")]
pub use paths::{
    default_search_dirs, ensure_user_config_dir, find_config, system_samples_dir,
    user_config_dir, user_config_file, user_samples_dir,
};
pub use validation::{ValidationError, ValidationResult, validate_config};

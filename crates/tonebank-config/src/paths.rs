//! Platform-specific paths for bank configuration and instrument files.
//!
//! # Directory Structure
//!
//! - **User config**: `~/.config/tonebank/` (Linux), `~/Library/Application Support/tonebank/` (macOS), `%APPDATA%\tonebank\` (Windows)
//! - **User samples**: `<user config>/samples/`
//! - **System samples**: `/usr/share/tonebank/samples/` (Linux), `/Library/Application Support/tonebank/samples/` (macOS)

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Application name used for directory paths.
const APP_NAME: &str = "tonebank";

/// File name of the default configuration.
pub const CONFIG_FILE: &str = "tonebank.toml";

/// Subdirectory name for instrument files.
const SAMPLES_SUBDIR: &str = "samples";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path of the user's default configuration file.
pub fn user_config_file() -> PathBuf {
    user_config_dir().join(CONFIG_FILE)
}

/// Returns the user-specific instrument directory.
pub fn user_samples_dir() -> PathBuf {
    user_config_dir().join(SAMPLES_SUBDIR)
}

/// Returns the system-wide instrument directory.
pub fn system_samples_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/usr/share").join(APP_NAME).join(SAMPLES_SUBDIR)
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Library/Application Support")
            .join(APP_NAME)
            .join(SAMPLES_SUBDIR)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join(SAMPLES_SUBDIR)
    }
}

/// Default search directories for relative instrument paths.
pub fn default_search_dirs() -> Vec<PathBuf> {
    vec![user_samples_dir(), system_samples_dir()]
}

/// Find the configuration file to use.
///
/// Searches in the following order:
/// 1. `explicit`, if given (returned even when missing, so the caller reports it)
/// 2. `tonebank.toml` in the current directory
/// 3. The user configuration file
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = PathBuf::from(CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    let user = user_config_file();
    user.is_file().then_some(user)
}

/// Ensure the user configuration directory exists.
pub fn ensure_user_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_config_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_config_dir_ends_with_app_name() {
        assert!(user_config_dir().ends_with(APP_NAME));
    }

    #[test]
    fn test_user_config_file_name() {
        assert_eq!(
            user_config_file().file_name().and_then(|n| n.to_str()),
            Some(CONFIG_FILE)
        );
    }

    #[test]
    fn test_samples_dirs() {
        assert!(user_samples_dir().ends_with(SAMPLES_SUBDIR));
        assert!(system_samples_dir().ends_with(SAMPLES_SUBDIR));
        assert_eq!(default_search_dirs().len(), 2);
    }

    #[test]
    fn test_find_config_prefers_explicit() {
        let path = Path::new("/nonexistent/custom.toml");
        assert_eq!(find_config(Some(path)), Some(path.to_path_buf()));
    }
}

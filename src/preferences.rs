//! User preferences storage
//!
//! Handles saving and loading user preferences to a JSON file
//! in the application config directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Default target language when none is stored
pub(crate) const DEFAULT_TARGET_LANGUAGE: &str = "en";

/// User preferences
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Preferences {
    /// Language code translations are requested in (e.g., "en", "de", "ja")
    /// Defaults to "en" if not set
    pub target_language: Option<String>,
    /// Custom prompt sent along with every translation request
    pub custom_prompt: Option<String>,
}

/// Get the preferences file path
pub(crate) fn preferences_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("TranslationArena").join("preferences.json"))
}

/// Load preferences from a file
///
/// Returns default preferences if the file doesn't exist or can't be read
pub(crate) fn load_preferences_from(path: &Path) -> Preferences {
    if !path.exists() {
        return Preferences::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(prefs) => prefs,
            Err(e) => {
                error!("Failed to parse preferences: {}", e);
                Preferences::default()
            }
        },
        Err(e) => {
            error!("Failed to read preferences file: {}", e);
            Preferences::default()
        }
    }
}

/// Save preferences to a file
pub(crate) fn save_preferences_to(path: &Path, prefs: &Preferences) -> Result<(), PreferencesError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            info!("Created preferences directory: {:?}", parent);
        }
    }

    let json = serde_json::to_string_pretty(prefs)?;
    fs::write(path, json)?;
    info!("Saved preferences to: {:?}", path);

    Ok(())
}

impl Preferences {
    /// Target language, falling back to English
    pub(crate) fn target_language(&self) -> String {
        self.target_language
            .clone()
            .filter(|code| !code.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TARGET_LANGUAGE.to_string())
    }

    /// Custom prompt, treating blank text as unset
    pub(crate) fn custom_prompt(&self) -> Option<String> {
        self.custom_prompt
            .clone()
            .filter(|prompt| !prompt.trim().is_empty())
    }
}

/// Preferences errors
#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("Could not find config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

//! Translation request configuration
//!
//! Builds the JSON bodies sent to the streaming endpoints from the user's
//! stored preferences.

use crate::preferences::Preferences;
use serde::Serialize;

/// Settings applied to every translation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TranslationConfig {
    /// Language code for output (e.g., "en", "de", "ja")
    pub(crate) target_language: String,
    /// Optional prompt forwarded to the models
    pub(crate) custom_prompt: Option<String>,
}

/// Convert a language code to its full name for display
pub(crate) fn language_code_to_name(code: &str) -> &str {
    match code {
        "en" => "English",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        "no" => "Norwegian",
        "da" => "Danish",
        "sv" => "Swedish",
        "fi" => "Finnish",
        "pl" => "Polish",
        "ru" => "Russian",
        "uk" => "Ukrainian",
        "tr" => "Turkish",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        _ => code, // Return code itself for unknown languages
    }
}

impl TranslationConfig {
    /// Create a config from stored preferences
    pub(crate) fn from_preferences(prefs: &Preferences) -> Self {
        Self {
            target_language: prefs.target_language(),
            custom_prompt: prefs.custom_prompt(),
        }
    }

    /// Body for a single-model stream
    pub(crate) fn request(&self, text: &str) -> TranslationRequest {
        TranslationRequest {
            text: text.to_string(),
            target_language: self.target_language.clone(),
            custom_prompt: self.custom_prompt.clone(),
        }
    }

    /// Body for a side-by-side stream of two models
    pub(crate) fn comparison(&self, text: &str, model_a: &str, model_b: &str) -> ComparisonRequest {
        ComparisonRequest {
            translation: self.request(text),
            models: [model_a.to_string(), model_b.to_string()],
        }
    }
}

/// Request body for `POST /translate/stream`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct TranslationRequest {
    pub(crate) text: String,
    pub(crate) target_language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) custom_prompt: Option<String>,
}

/// Request body for `POST /translate/compare/stream`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ComparisonRequest {
    #[serde(flatten)]
    pub(crate) translation: TranslationRequest,
    /// Model ids in channel order: `[A, B]`
    pub(crate) models: [String; 2],
}

impl ComparisonRequest {
    pub(crate) fn model_a(&self) -> &str {
        &self.models[0]
    }

    pub(crate) fn model_b(&self) -> &str {
        &self.models[1]
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

pub const ERROR_ARABIC_TEXT: &str = "Error during processing.";
pub const ERROR_ENGLISH_TRANSLATION: &str = "Could not translate this image.";
pub const DUA_SEPARATOR: &str = "\n\n";

const MIN_IMPROVEMENT_FIELD_CHARS: usize = 5;

/// A file selected for translation, already encoded as a data URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadItem {
    pub id: String,
    pub name: String,
    pub data_uri: String,
}

/// Structured output of one image-translation oracle call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrTranslation {
    pub arabic_text: String,
    pub english_translation: String,
    pub is_dua: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data_uri: Option<String>,
    pub arabic_text: String,
    pub english_translation: String,
    pub is_dua: bool,
}

impl TranslationResult {
    pub fn from_item(item: &UploadItem, output: OcrTranslation) -> Self {
        Self {
            id: item.id.clone(),
            filename: Some(item.name.clone()),
            image_data_uri: Some(item.data_uri.clone()),
            arabic_text: output.arabic_text,
            english_translation: output.english_translation,
            is_dua: output.is_dua,
        }
    }

    /// Placeholder recorded when the oracle fails for one item of a batch.
    pub fn failed(item: &UploadItem) -> Self {
        Self {
            id: item.id.clone(),
            filename: Some(item.name.clone()),
            image_data_uri: Some(item.data_uri.clone()),
            arabic_text: ERROR_ARABIC_TEXT.to_string(),
            english_translation: ERROR_ENGLISH_TRANSLATION.to_string(),
            is_dua: false,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.arabic_text == ERROR_ARABIC_TEXT
    }

    /// Source and translation segments when the result is a well-formed Dua/Ayah.
    pub fn dua_segments(&self) -> Option<DuaSegments<'_>> {
        if !self.is_dua {
            return None;
        }
        split_dua(&self.english_translation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuaSegments<'a> {
    pub arabic: &'a str,
    pub english: &'a str,
}

impl DuaSegments<'_> {
    pub fn join(&self) -> String {
        format!("{}{}{}", self.arabic, DUA_SEPARATOR, self.english)
    }
}

/// Splits at the first blank line. Later blank lines stay inside the English part.
pub fn split_dua(text: &str) -> Option<DuaSegments<'_>> {
    let (arabic, english) = text.split_once(DUA_SEPARATOR)?;
    Some(DuaSegments { arabic, english })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementRequest {
    pub arabic_text: String,
    pub initial_translation: String,
    pub corrected_translation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImprovementFeedback {
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

impl ImprovementRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_min_chars("arabicText", "Arabic text", &self.arabic_text)?;
        check_min_chars(
            "initialTranslation",
            "Initial translation",
            &self.initial_translation,
        )?;
        check_min_chars(
            "correctedTranslation",
            "Corrected translation",
            &self.corrected_translation,
        )
    }
}

fn check_min_chars(field: &'static str, label: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().chars().count() < MIN_IMPROVEMENT_FIELD_CHARS {
        return Err(ValidationError {
            field,
            message: format!(
                "{} must be at least {} characters.",
                label, MIN_IMPROVEMENT_FIELD_CHARS
            ),
        });
    }
    Ok(())
}

impl OcrTranslation {
    /// Reports whether a Dua result follows the "source, blank line, translation" layout.
    pub fn follows_dua_contract(&self) -> bool {
        if !self.is_dua {
            return true;
        }
        match split_dua(&self.english_translation) {
            Some(segments) => segments.arabic.trim() == self.arabic_text.trim(),
            None => false,
        }
    }
}

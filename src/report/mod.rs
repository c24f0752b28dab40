//! Translation report composer.
//!
//! Results are laid out into pages of draw operations first, then rendered
//! to PDF. Fonts are loaded per face; a face that cannot be loaded only
//! degrades the output and is reported as a [`FontWarning`].

pub mod bidi;
pub mod font;
pub mod layout;
mod pdf;

use anyhow::Result;
use futures_util::future::join_all;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

pub use font::{Face, FontPaths, FontSet};
pub use layout::{Align, DrawOp, Layout, Page, Rule, TextRun};

use crate::types::TranslationResult;

pub const DEFAULT_FILE_NAME: &str = "tarjama-translations.pdf";
pub const DEFAULT_TITLE_PREFIX: &str = "Translation for: ";

/// Page geometry and typography, lengths in millimetres and sizes in points.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub margin_mm: f32,
    pub line_height_mm: f32,
    pub title_size_pt: f32,
    pub body_size_pt: f32,
    pub rule_thickness_pt: f32,
    pub title_prefix: String,
    pub file_name: String,
    pub document_title: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 15.0,
            line_height_mm: 7.0,
            title_size_pt: 14.0,
            body_size_pt: 12.0,
            rule_thickness_pt: 0.5,
            title_prefix: DEFAULT_TITLE_PREFIX.to_string(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            document_title: "Tarjama Translations".to_string(),
        }
    }
}

impl ReportSettings {
    pub fn text_width_mm(&self) -> f32 {
        self.page_width_mm - 2.0 * self.margin_mm
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FontWarning {
    pub face: &'static str,
    pub path: String,
    pub message: String,
}

impl fmt::Display for FontWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} font unavailable ({}); output formatting may be impacted",
            self.face, self.message
        )
    }
}

#[derive(Debug, Clone)]
pub struct ComposedReport {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub page_count: usize,
    pub warnings: Vec<FontWarning>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportComposer {
    settings: ReportSettings,
    fonts: FontPaths,
}

impl ReportComposer {
    pub fn new(settings: ReportSettings, fonts: FontPaths) -> Self {
        Self { settings, fonts }
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Loads all four faces concurrently. Never fails as a whole.
    pub async fn load_fonts(&self) -> (FontSet, Vec<FontWarning>) {
        let loads = Face::ALL.map(|face| async move {
            let path = self.fonts.path(face);
            (face, font::load_font_metrics(path).await)
        });

        let mut fonts = FontSet::default();
        let mut warnings = Vec::new();
        for (face, loaded) in join_all(loads).await {
            match loaded {
                Ok(metrics) => {
                    info!(
                        "loaded {} font: {}",
                        face.as_str(),
                        metrics.family().unwrap_or("unnamed")
                    );
                    fonts.insert(face, metrics);
                }
                Err(err) => {
                    let warning = FontWarning {
                        face: face.as_str(),
                        path: self.fonts.path(face).display().to_string(),
                        message: format!("{:#}", err),
                    };
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }
        (fonts, warnings)
    }

    pub fn layout(&self, results: &[TranslationResult], fonts: &FontSet) -> Layout {
        layout::layout_results(results, &self.settings, fonts)
    }

    pub async fn compose(&self, results: &[TranslationResult]) -> Result<ComposedReport> {
        let (fonts, warnings) = self.load_fonts().await;
        let layout = self.layout(results, &fonts);
        let bytes = pdf::render_pdf(&layout, &self.settings, &fonts)?;
        info!(
            "composed {} result(s) into {} page(s), {} bytes",
            results.len(),
            layout.page_count(),
            bytes.len()
        );
        Ok(ComposedReport {
            bytes,
            file_name: self.settings.file_name.clone(),
            page_count: layout.page_count(),
            warnings,
        })
    }
}

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

pub mod data;
pub mod improvement;
pub mod logging;
pub mod oracle;
mod providers;
pub mod report;
pub mod server;
pub mod session;
pub mod settings;
pub mod translations;
mod translator;
pub mod types;

pub use oracle::{Oracle, OracleFuture};
pub use providers::{Gemini, OpenAI, Provider, ProviderKind, ProviderUsage};
pub use report::{ComposedReport, FontWarning, ReportComposer, ReportSettings};
pub use session::{BatchReport, SelectedFile, SessionError, UploadSession};
pub use translator::{ExecutionOutput, Translator};
pub use types::{
    ImprovementFeedback, ImprovementRequest, OcrTranslation, TranslationResult, UploadItem,
};

use report::layout::{graphemes, wrap_text};

const COLUMN_WIDTH: usize = 38;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub model: Option<String>,
    pub key: Option<String>,
    pub settings_path: Option<String>,
}

impl Config {
    fn load_settings(&self) -> Result<settings::Settings> {
        settings::load_settings(self.settings_path.as_deref().map(Path::new))
    }
}

fn build_oracle(config: &Config, settings: &settings::Settings) -> Result<Arc<dyn Oracle>> {
    let model_arg = config.model.as_deref().or(settings.oracle_model.as_deref());
    let selection = providers::resolve_provider_selection(model_arg, config.key.as_deref())?;
    let key = providers::resolve_key(selection.provider, config.key.as_deref())
        .with_context(|| "no API key found for selected provider")?;
    let model = selection.model();
    info!("using {}:{}", selection.provider.as_str(), model);
    let provider = providers::build_provider(selection.provider, key, model);
    Ok(Arc::new(Translator::new(provider)))
}

fn build_composer(settings: &settings::Settings) -> ReportComposer {
    ReportComposer::new(settings.report.clone(), settings.fonts.clone())
}

/// Translates image files in order, writes the PDF report and returns a text
/// rendering of every result. Ctrl-C stops the batch after the current image.
pub async fn translate_files(
    config: &Config,
    files: Vec<String>,
    output: Option<String>,
) -> Result<String> {
    if files.is_empty() {
        return Err(SessionError::NoFilesSelected.into());
    }
    let settings = config.load_settings()?;
    let oracle = build_oracle(config, &settings)?;
    let composer = build_composer(&settings);

    let mut session = UploadSession::new();
    let added = session
        .add_files(files.iter().map(SelectedFile::from_path).collect())
        .await;
    for name in &added.rejected {
        warn!("skipped '{}': not a readable image", name);
    }
    for name in &added.duplicates {
        warn!("skipped '{}': already selected", name);
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("cancelling after the current image");
                cancel.store(true, Ordering::SeqCst);
            }
        })
    };
    let batch = session.submit_all_until(oracle.as_ref(), &cancel).await;
    watcher.abort();
    let batch = batch?;

    let mut sections = batch
        .results
        .iter()
        .map(format_side_by_side)
        .collect::<Vec<_>>();
    if batch.cancelled {
        sections.push(format!(
            "Cancelled: {} image(s) were not translated.",
            session.pending().len()
        ));
    }

    let composed = session.compose_report(&composer).await?;
    let path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&composed.file_name));
    tokio::fs::write(&path, &composed.bytes)
        .await
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    sections.push(format!(
        "Saved {} page(s) to {}",
        composed.page_count,
        path.display()
    ));
    Ok(sections.join("\n\n"))
}

pub async fn improve(config: &Config, request: ImprovementRequest) -> Result<String> {
    let settings = config.load_settings()?;
    let oracle = build_oracle(config, &settings)?;
    let feedback = improvement::submit_improvement(oracle.as_ref(), &request).await?;
    Ok(feedback.feedback)
}

pub async fn serve(config: &Config, addr: Option<String>) -> Result<()> {
    let settings = config.load_settings()?;
    let oracle = build_oracle(config, &settings)?;
    let state = Arc::new(server::ServerState::new(oracle, build_composer(&settings)));
    let addr = addr.unwrap_or_else(|| settings.server_addr.clone());
    server::run_server(state, addr).await
}

/// Renders a result as two columns: English on the left, Arabic on the right.
pub fn format_side_by_side(result: &TranslationResult) -> String {
    let width = COLUMN_WIDTH as f32;
    let count = |line: &str| graphemes(line).len() as f32;
    let english = match result.dua_segments() {
        Some(segments) => segments.english,
        None => result.english_translation.as_str(),
    };
    let left = wrap_text(english, width, count);
    let right = wrap_text(&result.arabic_text, width, count);

    let mut title = result
        .filename
        .clone()
        .unwrap_or_else(|| result.id.clone());
    if result.is_dua {
        title.push_str(" (Dua/Ayah)");
    }
    let mut out = vec![format!("== {} ==", title)];
    for row in 0..left.len().max(right.len()) {
        let en = left.get(row).map(String::as_str).unwrap_or("");
        let ar = right.get(row).map(String::as_str).unwrap_or("");
        out.push(format!(
            "{}{} | {}{}",
            en,
            padding(en),
            padding(ar),
            ar
        ));
    }
    out.join("\n")
}

fn padding(text: &str) -> String {
    " ".repeat(COLUMN_WIDTH.saturating_sub(graphemes(text).len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(english: &str, arabic: &str, is_dua: bool) -> TranslationResult {
        TranslationResult {
            id: "r1".to_string(),
            filename: Some("page.png".to_string()),
            image_data_uri: None,
            arabic_text: arabic.to_string(),
            english_translation: english.to_string(),
            is_dua,
        }
    }

    #[test]
    fn columns_are_padded_to_equal_width() {
        let text = format_side_by_side(&result("Peace be upon you.", "السلام عليكم", false));
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "== page.png ==");
        let row = lines[1];
        let (left, right) = row.split_once(" | ").unwrap();
        assert_eq!(graphemes(left).len(), COLUMN_WIDTH);
        assert_eq!(graphemes(right).len(), COLUMN_WIDTH);
        assert!(left.starts_with("Peace be upon you."));
        assert!(right.ends_with("السلام عليكم"));
    }

    #[test]
    fn dua_shows_only_the_english_segment_on_the_left() {
        let text = format_side_by_side(&result("دعاء\n\nO Allah, guide me.", "دعاء", true));
        assert!(text.starts_with("== page.png (Dua/Ayah) =="));
        assert!(text.lines().nth(1).unwrap().starts_with("O Allah, guide me."));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn longer_column_sets_the_row_count() {
        let english = "word ".repeat(30);
        let text = format_side_by_side(&result(&english, "نص", false));
        assert!(text.lines().count() > 3);
        let blank_right = format!(" | {}", " ".repeat(COLUMN_WIDTH));
        assert!(text.lines().skip(2).all(|line| line.ends_with(&blank_right)));
    }
}

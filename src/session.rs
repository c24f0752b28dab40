use anyhow::Result;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::data::{self, DataAttachment};
use crate::oracle::Oracle;
use crate::report::{ComposedReport, ReportComposer};
use crate::types::{TranslationResult, UploadItem};

#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub source: FileSource,
}

impl SelectedFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|value| value.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            source: FileSource::Path(path),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Bytes(bytes),
        }
    }

    async fn decode(self) -> Result<DataAttachment> {
        match self.source {
            FileSource::Path(path) => {
                let mut data = data::load_image(&path).await?;
                data.name = Some(self.name);
                Ok(data)
            }
            FileSource::Bytes(bytes) => data::image_from_bytes(bytes, Some(self.name)),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct AddFilesReport {
    pub added: Vec<UploadItem>,
    pub duplicates: Vec<String>,
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub results: Vec<TranslationResult>,
    pub failures: usize,
    pub cancelled: bool,
}

impl BatchReport {
    /// True only when every submitted item produced a real result.
    pub fn success(&self) -> bool {
        !self.results.is_empty() && self.failures == 0 && !self.cancelled
    }
}

#[derive(Debug)]
pub enum SessionError {
    NoFilesSelected,
    NoTranslations,
    Report(anyhow::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NoFilesSelected => {
                f.write_str("No files selected. Please select one or more images to translate.")
            }
            SessionError::NoTranslations => {
                f.write_str("No translations to export. Please process some images first.")
            }
            SessionError::Report(err) => write!(f, "PDF generation failed: {}", err),
        }
    }
}

impl std::error::Error for SessionError {}

/// Pending uploads and the results of the last submitted batch for one user.
#[derive(Debug, Default)]
pub struct UploadSession {
    pending: Vec<UploadItem>,
    results: Vec<TranslationResult>,
}

impl UploadSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[UploadItem] {
        &self.pending
    }

    pub fn results(&self) -> &[TranslationResult] {
        &self.results
    }

    /// Decodes the files concurrently; each one joins the pending set as soon as it is
    /// ready unless an item with the same name is already pending at that moment.
    pub async fn add_files(&mut self, files: Vec<SelectedFile>) -> AddFilesReport {
        let stamp = unix_millis();
        let mut decodes = files
            .into_iter()
            .enumerate()
            .map(|(index, file)| async move {
                let name = file.name.clone();
                (index, name, file.decode().await)
            })
            .collect::<FuturesUnordered<_>>();

        let mut report = AddFilesReport::default();
        while let Some((index, name, decoded)) = decodes.next().await {
            let data = match decoded {
                Ok(data) => data,
                Err(err) => {
                    warn!("skipping '{}': {:#}", name, err);
                    report.rejected.push(name);
                    continue;
                }
            };
            if self.pending.iter().any(|item| item.name == name) {
                report.duplicates.push(name);
                continue;
            }
            let item = UploadItem {
                id: format!("{}-{}-{}", name, stamp, index),
                name,
                data_uri: data.to_data_uri(),
            };
            report.added.push(item.clone());
            self.pending.push(item);
        }
        info!(
            "{} file(s) pending ({} added, {} duplicate, {} rejected)",
            self.pending.len(),
            report.added.len(),
            report.duplicates.len(),
            report.rejected.len()
        );
        report
    }

    pub fn remove(&mut self, id: &str) {
        self.pending.retain(|item| item.id != id);
    }

    pub async fn submit_all(&mut self, oracle: &dyn Oracle) -> Result<BatchReport, SessionError> {
        self.submit_all_until(oracle, &AtomicBool::new(false)).await
    }

    /// Submits pending items one at a time, in order. A failing item becomes a
    /// sentinel result and the batch goes on. `cancel` is checked between items;
    /// items not yet submitted then stay pending.
    pub async fn submit_all_until(
        &mut self,
        oracle: &dyn Oracle,
        cancel: &AtomicBool,
    ) -> Result<BatchReport, SessionError> {
        if self.pending.is_empty() {
            return Err(SessionError::NoFilesSelected);
        }

        let items = std::mem::take(&mut self.pending);
        let mut results = Vec::with_capacity(items.len());
        let mut failures = 0usize;
        let mut cancelled = false;
        let mut remaining = items.into_iter();
        while let Some(item) = remaining.next() {
            if cancel.load(Ordering::SeqCst) {
                cancelled = true;
                self.pending.push(item);
                self.pending.extend(remaining.by_ref());
                break;
            }
            match oracle.translate_image(&item.data_uri).await {
                Ok(output) => results.push(TranslationResult::from_item(&item, output)),
                Err(err) => {
                    warn!("error processing '{}': {:#}", item.name, err);
                    failures += 1;
                    results.push(TranslationResult::failed(&item));
                }
            }
        }

        info!(
            "processed {} image(s), {} failed{}",
            results.len(),
            failures,
            if cancelled { ", cancelled" } else { "" }
        );
        self.results = results.clone();
        Ok(BatchReport {
            results,
            failures,
            cancelled,
        })
    }

    pub async fn compose_report(
        &self,
        composer: &ReportComposer,
    ) -> Result<ComposedReport, SessionError> {
        if self.results.is_empty() {
            return Err(SessionError::NoTranslations);
        }
        composer
            .compose(&self.results)
            .await
            .map_err(SessionError::Report)
    }
}

fn unix_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PNG_MAGIC;
    use crate::oracle::OracleFuture;
    use crate::types::{
        ERROR_ARABIC_TEXT, ImprovementFeedback, ImprovementRequest, OcrTranslation,
    };
    use anyhow::anyhow;
    use std::sync::Mutex;

    /// Fails for every call whose 1-based position is listed in `fail_on`.
    struct ScriptedOracle {
        fail_on: Vec<usize>,
        calls: Mutex<usize>,
        cancel_after: Option<(usize, &'static AtomicBool)>,
    }

    impl ScriptedOracle {
        fn new(fail_on: Vec<usize>) -> Self {
            Self {
                fail_on,
                calls: Mutex::new(0),
                cancel_after: None,
            }
        }
    }

    impl Oracle for ScriptedOracle {
        fn translate_image<'a>(&'a self, _: &'a str) -> OracleFuture<'a, OcrTranslation> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if let Some((after, flag)) = self.cancel_after
                && call == after
            {
                flag.store(true, Ordering::SeqCst);
            }
            let fail = self.fail_on.contains(&call);
            Box::pin(async move {
                if fail {
                    return Err(anyhow!("model timeout"));
                }
                Ok(OcrTranslation {
                    arabic_text: format!("نص {}", call),
                    english_translation: format!("Text {}", call),
                    is_dua: false,
                })
            })
        }

        fn improve_translation<'a>(
            &'a self,
            _: &'a ImprovementRequest,
        ) -> OracleFuture<'a, ImprovementFeedback> {
            Box::pin(async { Err(anyhow!("unused")) })
        }
    }

    fn png(name: &str) -> SelectedFile {
        SelectedFile::from_bytes(name, PNG_MAGIC.to_vec())
    }

    #[tokio::test]
    async fn duplicates_by_name_are_skipped() {
        let mut session = UploadSession::new();
        let first = session.add_files(vec![png("a.png"), png("b.png")]).await;
        assert_eq!(first.added.len(), 2);

        let second = session
            .add_files(vec![png("b.png"), png("c.png"), png("c.png")])
            .await;
        assert_eq!(second.added.len(), 1);
        let mut duplicates = second.duplicates.clone();
        duplicates.sort();
        assert_eq!(duplicates, vec!["b.png", "c.png"]);

        let mut names = session
            .pending()
            .iter()
            .map(|item| item.name.as_str())
            .collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
        assert!(
            session
                .pending()
                .iter()
                .all(|item| item.data_uri.starts_with("data:image/png;base64,"))
        );
    }

    #[tokio::test]
    async fn unreadable_files_are_rejected() {
        let mut session = UploadSession::new();
        let report = session
            .add_files(vec![
                SelectedFile::from_bytes("notes.txt", b"hello".to_vec()),
                SelectedFile::from_path("/nonexistent/scan.png"),
                png("ok.png"),
            ])
            .await;
        let mut rejected = report.rejected.clone();
        rejected.sort();
        assert_eq!(rejected, vec!["notes.txt", "scan.png"]);
        assert_eq!(session.pending().len(), 1);
    }

    #[tokio::test]
    async fn remove_drops_one_item() {
        let mut session = UploadSession::new();
        session.add_files(vec![png("a.png"), png("b.png")]).await;
        let id = session.pending()[0].id.clone();
        session.remove("missing");
        assert_eq!(session.pending().len(), 2);
        session.remove(&id);
        assert_eq!(session.pending().len(), 1);
        assert!(session.pending().iter().all(|item| item.id != id));
    }

    #[tokio::test]
    async fn empty_submission_is_rejected() {
        let mut session = UploadSession::new();
        let oracle = ScriptedOracle::new(Vec::new());
        let err = session.submit_all(&oracle).await.unwrap_err();
        assert!(matches!(err, SessionError::NoFilesSelected));
        assert_eq!(*oracle.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_item_becomes_sentinel_in_order() {
        let mut session = UploadSession::new();
        session.add_files(vec![png("1.png")]).await;
        session.add_files(vec![png("2.png")]).await;
        session.add_files(vec![png("3.png")]).await;

        let oracle = ScriptedOracle::new(vec![2]);
        let report = session.submit_all(&oracle).await.expect("batch");

        let names = report
            .results
            .iter()
            .map(|result| result.filename.as_deref().unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["1.png", "2.png", "3.png"]);
        assert_eq!(report.results[0].english_translation, "Text 1");
        assert_eq!(report.results[1].arabic_text, ERROR_ARABIC_TEXT);
        assert!(report.results[1].image_data_uri.is_some());
        assert_eq!(report.results[2].english_translation, "Text 3");
        assert_eq!(report.failures, 1);
        assert!(!report.success());
        assert!(session.pending().is_empty());
        assert_eq!(session.results().len(), 3);
    }

    #[tokio::test]
    async fn new_batch_replaces_results() {
        let mut session = UploadSession::new();
        let oracle = ScriptedOracle::new(Vec::new());
        session.add_files(vec![png("a.png"), png("b.png")]).await;
        session.submit_all(&oracle).await.expect("first");
        session.add_files(vec![png("c.png")]).await;
        let report = session.submit_all(&oracle).await.expect("second");
        assert!(report.success());
        assert_eq!(session.results().len(), 1);
        assert_eq!(session.results()[0].filename.as_deref(), Some("c.png"));
    }

    #[tokio::test]
    async fn cancellation_keeps_finished_results() {
        static CANCEL: AtomicBool = AtomicBool::new(false);
        let mut session = UploadSession::new();
        for name in ["1.png", "2.png", "3.png"] {
            session.add_files(vec![png(name)]).await;
        }
        let oracle = ScriptedOracle {
            cancel_after: Some((1, &CANCEL)),
            ..ScriptedOracle::new(Vec::new())
        };
        let report = session
            .submit_all_until(&oracle, &CANCEL)
            .await
            .expect("batch");
        assert!(report.cancelled);
        assert_eq!(report.results.len(), 1);
        assert_eq!(session.results().len(), 1);
        let pending = session
            .pending()
            .iter()
            .map(|item| item.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(pending, vec!["2.png", "3.png"]);
    }

    #[tokio::test]
    async fn export_requires_results() {
        let session = UploadSession::new();
        let composer = ReportComposer::new(Default::default(), Default::default());
        let err = session.compose_report(&composer).await.unwrap_err();
        assert!(matches!(err, SessionError::NoTranslations));
    }
}

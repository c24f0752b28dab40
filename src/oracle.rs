//! The external OCR/translation service, seen as a black box.
//!
//! Implementations must report transport and model failures as `Err` so
//! batch callers can tell them apart from real results.

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

use crate::types::{ImprovementFeedback, ImprovementRequest, OcrTranslation};

pub type OracleFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

pub trait Oracle: Send + Sync {
    /// Extracts and translates the Arabic text of one image given as a data URI.
    fn translate_image<'a>(&'a self, photo_data_uri: &'a str) -> OracleFuture<'a, OcrTranslation>;

    /// Analyzes a user correction of an earlier translation.
    fn improve_translation<'a>(
        &'a self,
        request: &'a ImprovementRequest,
    ) -> OracleFuture<'a, ImprovementFeedback>;
}

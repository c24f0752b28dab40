use serde::{Deserialize, Serialize};

use crate::types::{TranslationResult, UploadItem};

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct UploadRequest {
    pub(crate) files: Vec<UploadFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadFile {
    pub(crate) name: String,
    pub(crate) data_base64: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadResponse {
    pub(crate) pending: Vec<UploadItem>,
    pub(crate) duplicates: Vec<String>,
    pub(crate) rejected: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TranslateResponse {
    pub(crate) results: Vec<TranslationResult>,
    pub(crate) success: bool,
    pub(crate) failures: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

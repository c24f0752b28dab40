use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::Path;

/// Raw image bytes plus the metadata needed to send or embed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataAttachment {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: Option<String>,
}

impl DataAttachment {
    pub fn to_data_uri(&self) -> String {
        encode_data_uri(&self.mime, &self.bytes)
    }
}

pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// Parses `data:<mime>;base64,<payload>`.
pub fn parse_data_uri(uri: &str) -> Result<DataAttachment> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| anyhow!("data uri must start with 'data:'"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("data uri is missing the ',' separator"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| anyhow!("data uri must use base64 encoding"))?
        .trim()
        .to_lowercase();
    if mime.is_empty() {
        return Err(anyhow!("data uri has no mime type"));
    }
    let bytes = BASE64
        .decode(payload.trim())
        .with_context(|| "failed to decode data uri payload")?;
    Ok(DataAttachment {
        bytes,
        mime,
        name: None,
    })
}

pub fn parse_image_data_uri(uri: &str) -> Result<DataAttachment> {
    let data = parse_data_uri(uri)?;
    if !data.mime.starts_with("image/") {
        return Err(anyhow!("expected an image data uri (got '{}')", data.mime));
    }
    Ok(data)
}

pub async fn load_image(path: &Path) -> Result<DataAttachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .map(|value| value.to_string());
    image_from_bytes(bytes, name)
}

pub fn image_from_bytes(bytes: Vec<u8>, name: Option<String>) -> Result<DataAttachment> {
    let mime = detect_image_mime(&bytes, name.as_deref())?;
    Ok(DataAttachment { bytes, mime, name })
}

fn detect_image_mime(bytes: &[u8], name: Option<&str>) -> Result<String> {
    if let Some(kind) = infer::get(bytes) {
        let detected = kind.mime_type();
        if detected.starts_with("image/") {
            return Ok(detected.to_string());
        }
        return Err(anyhow!(
            "'{}' is not an image (detected '{}')",
            name.unwrap_or("upload"),
            detected
        ));
    }
    let ext = name
        .and_then(|value| Path::new(value).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    if let Some(mime) = ext.as_deref().and_then(image_mime_from_extension) {
        return Ok(mime.to_string());
    }
    Err(anyhow!(
        "unable to detect image type for '{}'",
        name.unwrap_or("upload")
    ))
}

fn image_mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tiff" | "tif" => Some("image/tiff"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_round_trip() {
        let data = image_from_bytes(PNG_MAGIC.to_vec(), Some("scan.png".to_string()))
            .expect("png");
        assert_eq!(data.mime, "image/png");
        let uri = data.to_data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));
        let parsed = parse_image_data_uri(&uri).expect("parse");
        assert_eq!(parsed.bytes, PNG_MAGIC);
        assert_eq!(parsed.mime, "image/png");
    }

    #[test]
    fn rejects_malformed_data_uris() {
        assert!(parse_data_uri("image/png;base64,AAAA").is_err());
        assert!(parse_data_uri("data:image/png,AAAA").is_err());
        assert!(parse_data_uri("data:;base64,AAAA").is_err());
        assert!(parse_data_uri("data:image/png;base64,@@@").is_err());
        assert!(parse_image_data_uri("data:text/plain;base64,AAAA").is_err());
    }

    #[test]
    fn falls_back_to_extension() {
        let data = image_from_bytes(vec![1, 2, 3], Some("photo.JPG".to_string())).expect("jpg");
        assert_eq!(data.mime, "image/jpeg");
        assert!(image_from_bytes(vec![1, 2, 3], Some("notes.txt".to_string())).is_err());
    }

    #[test]
    fn rejects_non_image_content() {
        let err = image_from_bytes(b"%PDF-1.7\n".to_vec(), Some("a.png".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("not an image"));
    }
}

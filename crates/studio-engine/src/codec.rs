use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use studio_contracts::media::InlineImage;

use crate::error::{MediaError, StudioResult};

const FALLBACK_MIME: &str = "application/octet-stream";

/// Reads an uploaded file into an inline payload.
///
/// The MIME type is the file's declared type: its extension, or the sniffed
/// image format when the extension is unknown.
pub fn read_inline_image(path: &Path) -> StudioResult<InlineImage> {
    read_inline_image_as(path, None)
}

/// Like [`read_inline_image`], but a non-empty `declared_mime` wins verbatim.
pub fn read_inline_image_as(path: &Path, declared_mime: Option<&str>) -> StudioResult<InlineImage> {
    let bytes = fs::read(path).map_err(|source| MediaError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(MediaError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "file is empty"),
        });
    }
    let mime_type = declared_mime
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| mime_for_path(path).map(str::to_string))
        .or_else(|| sniff_mime(&bytes).map(str::to_string))
        .unwrap_or_else(|| FALLBACK_MIME.to_string());
    tracing::debug!(path = %path.display(), %mime_type, bytes = bytes.len(), "read upload");
    Ok(encode_bytes(&bytes, &mime_type))
}

pub fn encode_bytes(bytes: &[u8], mime_type: &str) -> InlineImage {
    InlineImage::new(BASE64.encode(bytes), mime_type)
}

pub fn decode_payload(image: &InlineImage) -> StudioResult<Vec<u8>> {
    BASE64
        .decode(image.data.as_bytes())
        .map_err(|err| MediaError::InvalidDataUrl(format!("payload is not valid base64: {err}")))
}

/// Splits `data:<mime>;base64,<payload>` and validates the payload.
pub fn inline_from_data_url(url: &str) -> StudioResult<InlineImage> {
    let trimmed = url.trim();
    let Some(rest) = trimmed.strip_prefix("data:") else {
        return Err(MediaError::InvalidDataUrl(
            "missing 'data:' prefix".to_string(),
        ));
    };
    let Some((mime_type, data)) = rest.split_once(";base64,") else {
        return Err(MediaError::InvalidDataUrl(
            "missing ';base64,' marker".to_string(),
        ));
    };
    let image = InlineImage::new(
        data,
        if mime_type.is_empty() {
            FALLBACK_MIME
        } else {
            mime_type
        },
    );
    decode_payload(&image)?;
    Ok(image)
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "bmp" => Some("image/bmp"),
        "mp4" => Some("video/mp4"),
        _ => None,
    }
}

pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}

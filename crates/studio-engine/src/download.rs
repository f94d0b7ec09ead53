use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::{decode_payload, inline_from_data_url};
use crate::error::{MediaError, StudioResult};
use crate::objects::ObjectUrlStore;
use crate::transport::{remote_error_message, MediaTransport};

/// The host's "save this object URL as a file" primitive.
pub trait SaveSink {
    fn save(&self, store: &ObjectUrlStore, object_url: &str, filename: &str)
        -> StudioResult<PathBuf>;
}

/// Writes saved media into one directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SaveSink for DirectorySink {
    fn save(
        &self,
        store: &ObjectUrlStore,
        object_url: &str,
        filename: &str,
    ) -> StudioResult<PathBuf> {
        let blob = store
            .resolve(object_url)
            .ok_or_else(|| MediaError::ObjectUrlNotFound(object_url.to_string()))?;
        let name = Path::new(filename.trim())
            .file_name()
            .ok_or_else(|| MediaError::InvalidRequest(format!("invalid filename '{filename}'")))?;
        let path = self.dir.join(name);
        fs::create_dir_all(&self.dir).map_err(|source| MediaError::Save {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, blob.bytes.as_slice()).map_err(|source| MediaError::Save {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Saves whatever `url` points at (data URL, object URL or remote file)
/// under `filename`.
///
/// The bytes are staged behind a fresh object URL for the duration of the
/// save; it is revoked afterwards whether or not the save succeeded.
pub fn download_media(
    store: &ObjectUrlStore,
    transport: &dyn MediaTransport,
    url: &str,
    filename: &str,
    sink: &dyn SaveSink,
) -> StudioResult<PathBuf> {
    let (bytes, mime_type) = fetch_bytes(store, transport, url)?;
    let staged = store.create_scoped(bytes, &mime_type);
    let saved = sink.save(store, staged.url(), filename);
    match &saved {
        Ok(path) => tracing::info!(path = %path.display(), %mime_type, "media saved"),
        Err(err) => tracing::warn!(error = %err, filename, "media save failed"),
    }
    saved
}

fn fetch_bytes(
    store: &ObjectUrlStore,
    transport: &dyn MediaTransport,
    url: &str,
) -> StudioResult<(Vec<u8>, String)> {
    let trimmed = url.trim();
    if trimmed.starts_with("data:") {
        let image = inline_from_data_url(trimmed)?;
        let bytes = decode_payload(&image)?;
        return Ok((bytes, image.mime_type));
    }
    if ObjectUrlStore::is_object_url(trimmed) {
        let blob = store
            .resolve(trimmed)
            .ok_or_else(|| MediaError::ObjectUrlNotFound(trimmed.to_string()))?;
        return Ok((blob.bytes.as_ref().clone(), blob.mime_type));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        let reply = transport.get(trimmed)?;
        if !reply.is_success() {
            return Err(MediaError::RemoteRejected {
                context: "media download",
                status: reply.status,
                message: remote_error_message(&reply.text()),
            });
        }
        let mime_type = reply
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        return Ok((reply.body, mime_type));
    }
    Err(MediaError::InvalidRequest(format!(
        "cannot download from '{trimmed}'"
    )))
}

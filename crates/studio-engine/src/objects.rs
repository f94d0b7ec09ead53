use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

pub const OBJECT_URL_PREFIX: &str = "blob:media-studio/";

/// Bytes held behind an object URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Arc<Vec<u8>>,
    pub mime_type: String,
}

/// Session-local registry of `blob:` URLs, the stand-in for the browser's
/// object URL table. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct ObjectUrlStore {
    entries: Arc<Mutex<HashMap<String, Blob>>>,
}

impl ObjectUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, bytes: Vec<u8>, mime_type: &str) -> String {
        let url = format!("{OBJECT_URL_PREFIX}{}", Uuid::new_v4());
        self.lock().insert(
            url.clone(),
            Blob {
                bytes: Arc::new(bytes),
                mime_type: mime_type.to_string(),
            },
        );
        url
    }

    /// Creates an object URL that is revoked when the guard drops.
    pub fn create_scoped(&self, bytes: Vec<u8>, mime_type: &str) -> ObjectUrlGuard {
        ObjectUrlGuard {
            store: self.clone(),
            url: self.create(bytes, mime_type),
        }
    }

    pub fn resolve(&self, url: &str) -> Option<Blob> {
        self.lock().get(url).cloned()
    }

    /// Returns `false` when the URL was unknown or already revoked.
    pub fn revoke(&self, url: &str) -> bool {
        self.lock().remove(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_object_url(url: &str) -> bool {
        url.starts_with("blob:")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Blob>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct ObjectUrlGuard {
    store: ObjectUrlStore,
    url: String,
}

impl ObjectUrlGuard {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for ObjectUrlGuard {
    fn drop(&mut self) {
        self.store.revoke(&self.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_resolve_revoke() {
        let store = ObjectUrlStore::new();
        let url = store.create(b"mp4 bytes".to_vec(), "video/mp4");
        assert!(url.starts_with(OBJECT_URL_PREFIX));
        assert!(ObjectUrlStore::is_object_url(&url));

        let blob = store.resolve(&url).expect("blob registered");
        assert_eq!(blob.bytes.as_slice(), b"mp4 bytes");
        assert_eq!(blob.mime_type, "video/mp4");

        assert!(store.revoke(&url));
        assert!(!store.revoke(&url));
        assert!(store.resolve(&url).is_none());
    }

    #[test]
    fn scoped_url_is_revoked_on_drop() {
        let store = ObjectUrlStore::new();
        let url = {
            let guard = store.create_scoped(vec![1, 2, 3], "image/png");
            assert_eq!(store.len(), 1);
            guard.url().to_string()
        };
        assert!(store.resolve(&url).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn clones_share_entries() {
        let store = ObjectUrlStore::new();
        let other = store.clone();
        let url = store.create(vec![7], "application/octet-stream");
        assert!(other.resolve(&url).is_some());
    }
}

//! Object handles for in-memory media.
//!
//! A [`HandleStore`] maps opaque `blob:anitemp/<uuid>` URLs to bytes and a MIME
//! type. Handles revoke their URL when dropped, so a URL stays resolvable
//! exactly as long as something holds its [`ObjectHandle`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use uuid::Uuid;

use anitemp_common::error::AnitempResult;

pub const URL_PREFIX: &str = "blob:anitemp/";

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Bytes,
    mime: String,
}

/// Process-local registry of live object URLs.
#[derive(Debug, Clone, Default)]
pub struct HandleStore {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

impl HandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish bytes under a fresh URL.
    pub fn create(&self, bytes: impl Into<Bytes>, mime: impl Into<String>) -> ObjectHandle {
        let url = format!("{URL_PREFIX}{}", Uuid::new_v4());
        let object = StoredObject {
            bytes: bytes.into(),
            mime: mime.into(),
        };
        tracing::debug!(url = %url, bytes = object.bytes.len(), mime = %object.mime, "Published object");
        self.lock().insert(url.clone(), object.clone());
        ObjectHandle {
            url,
            bytes: object.bytes,
            mime: object.mime,
            store: self.clone(),
        }
    }

    /// Bytes and MIME type behind a live URL.
    pub fn resolve(&self, url: &str) -> Option<(Bytes, String)> {
        self.lock()
            .get(url)
            .map(|o| (o.bytes.clone(), o.mime.clone()))
    }

    /// Revoke a URL. Returns `false` if it was not live.
    pub fn revoke(&self, url: &str) -> bool {
        let removed = self.lock().remove(url).is_some();
        if removed {
            tracing::debug!(url, "Revoked object");
        }
        removed
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.lock().contains_key(url)
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A live object URL. Revoked when dropped.
pub struct ObjectHandle {
    url: String,
    bytes: Bytes,
    mime: String,
    store: HandleStore,
}

impl ObjectHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Save the object into `dir` as `video-<unix-ms>.<ext>`.
    pub async fn save_to(&self, dir: &Path) -> AnitempResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let name = format!(
            "video-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            extension_for(&self.mime)
        );
        let path = dir.join(name);
        tokio::fs::write(&path, &self.bytes).await?;
        tracing::info!(path = %path.display(), bytes = self.bytes.len(), "Saved artifact");
        Ok(path)
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("url", &self.url)
            .field("bytes", &self.bytes.len())
            .field("mime", &self.mime)
            .finish()
    }
}

impl Drop for ObjectHandle {
    fn drop(&mut self) {
        self.store.revoke(&self.url);
    }
}

/// Holds at most one live handle.
#[derive(Debug, Default)]
pub struct HandleSlot {
    current: Option<ObjectHandle>,
}

impl HandleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handle`, revoking whatever the slot held before.
    pub fn replace(&mut self, handle: ObjectHandle) -> &ObjectHandle {
        self.clear();
        self.current.insert(handle)
    }

    /// Revoke the current handle, then publish `bytes` into the slot.
    pub fn publish(
        &mut self,
        store: &HandleStore,
        bytes: impl Into<Bytes>,
        mime: impl Into<String>,
    ) -> &ObjectHandle {
        self.clear();
        self.current.insert(store.create(bytes, mime))
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&ObjectHandle> {
        self.current.as_ref()
    }

    pub fn url(&self) -> Option<&str> {
        self.current.as_ref().map(ObjectHandle::url)
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        _ => "bin",
    }
}

//! Segment media loading.
//!
//! Inline replacement media is served from memory. Remote locators are
//! fetched over HTTP(S) or read from disk, depending on their form:
//!
//! | Locator | Resolution |
//! |---|---|
//! | `http://…`, `https://…` | HTTP GET |
//! | `file:///abs/path.mp4` | local file |
//! | `/default1.mp4` | `base_url` + path when configured, else `asset_root` + path |
//! | `clips/a.mp4` | `asset_root` + path |

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};

use anitemp_common::config::LoaderConfig;
use anitemp_common::error::{AnitempError, AnitempResult};
use anitemp_edit_model::{EffectiveSource, Segment};

/// Resolved location of a segment's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Http(String),
    File(PathBuf),
}

/// Resolves and fetches segment bytes.
#[derive(Debug, Clone)]
pub struct MediaLoader {
    client: reqwest::Client,
    base_url: Option<String>,
    asset_root: PathBuf,
    max_concurrent: usize,
}

impl MediaLoader {
    pub fn new(config: &LoaderConfig) -> AnitempResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnitempError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
            asset_root: config.asset_root.clone(),
            max_concurrent: config.max_concurrent_loads.max(1),
        })
    }

    /// Load the effective bytes of the segment at position `index`.
    pub async fn load(&self, index: usize, segment: &Segment) -> AnitempResult<Bytes> {
        match segment.effective() {
            EffectiveSource::Inline(blob) => {
                if blob.bytes.is_empty() {
                    return Err(AnitempError::load_failure(
                        index,
                        segment.locator_label(),
                        "replacement media is empty",
                    ));
                }
                tracing::debug!(index, bytes = blob.bytes.len(), "Using inline segment media");
                Ok(blob.bytes.clone())
            }
            EffectiveSource::Remote(locator) => {
                let location = self
                    .resolve(locator)
                    .map_err(|msg| AnitempError::load_failure(index, locator, msg))?;
                let bytes = self
                    .fetch(&location)
                    .await
                    .map_err(|msg| AnitempError::load_failure(index, locator, msg))?;
                if bytes.is_empty() {
                    return Err(AnitempError::load_failure(index, locator, "source is empty"));
                }
                tracing::debug!(index, locator, bytes = bytes.len(), "Fetched segment media");
                Ok(bytes)
            }
        }
    }

    /// Load every segment, at most `max_concurrent_loads` at a time.
    ///
    /// Results come back in segment order. The first failure aborts the
    /// remaining loads and is returned.
    pub async fn load_all(&self, segments: &[Segment]) -> AnitempResult<Vec<Bytes>> {
        // Futures are built up front so the returned future stays `Send`.
        let loads: Vec<_> = segments
            .iter()
            .enumerate()
            .map(|(index, segment)| self.load(index, segment))
            .collect();
        stream::iter(loads)
            .buffered(self.max_concurrent)
            .try_collect()
            .await
    }

    fn resolve(&self, locator: &str) -> Result<Location, String> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err("empty locator".to_string());
        }

        let lower = locator.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = reqwest::Url::parse(locator).map_err(|e| format!("malformed URL: {e}"))?;
            return Ok(Location::Http(url.to_string()));
        }

        if let Some(path) = locator.strip_prefix("file://") {
            if path.is_empty() {
                return Err("malformed file URL".to_string());
            }
            return Ok(Location::File(PathBuf::from(path)));
        }

        if locator.contains("://") {
            return Err("unsupported locator scheme".to_string());
        }

        if let Some(site_path) = locator.strip_prefix('/') {
            return Ok(match &self.base_url {
                Some(base) => Location::Http(format!("{base}/{site_path}")),
                None => Location::File(self.asset_root.join(site_path)),
            });
        }

        Ok(Location::File(self.asset_root.join(locator)))
    }

    async fn fetch(&self, location: &Location) -> Result<Bytes, String> {
        match location {
            Location::Http(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| format!("request failed: {e}"))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(format!("HTTP {status}"));
                }
                response
                    .bytes()
                    .await
                    .map_err(|e| format!("failed to read response body: {e}"))
            }
            Location::File(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|e| format!("{}: {e}", path.display())),
        }
    }
}

//! Editing session.
//!
//! A [`Studio`] owns the edit list for one template plus every object handle
//! the session has published: one preview per replaced segment and the last
//! generated video. Dropping the studio revokes all of them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use anitemp_common::error::{AnitempError, AnitempResult};
use anitemp_edit_model::{
    advisory_total_duration, EditList, MediaBlob, OverlayText, Segment, TemplateRecord,
    TransitionSpec,
};

use crate::compose::{check_segments, Composer};
use crate::progress::ProgressCallback;
use crate::publisher::{HandleSlot, ObjectHandle};

pub struct Studio {
    edits: EditList,
    previews: HashMap<u32, HandleSlot>,
    artifact: HandleSlot,
    composer: Composer,
    advertised_secs: Option<f64>,
}

impl Studio {
    pub fn from_segments(composer: Composer, segments: Vec<Segment>) -> AnitempResult<Self> {
        Ok(Self {
            edits: EditList::new(segments)?,
            previews: HashMap::new(),
            artifact: HandleSlot::new(),
            composer,
            advertised_secs: None,
        })
    }

    /// Open a session on a template's default edit list.
    pub fn from_template(composer: Composer, template: &TemplateRecord) -> AnitempResult<Self> {
        let mut studio = Self::from_segments(composer, template.to_segments()?)?;
        studio.advertised_secs = template.duration.filter(|d| d.is_finite() && *d > 0.0);
        tracing::info!(
            template = %template.id,
            title = %template.title,
            segments = studio.edits.len(),
            "Opened template"
        );
        Ok(studio)
    }

    pub fn edits(&self) -> &EditList {
        &self.edits
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// Set or replace a segment's overlay text, keeping its placement.
    pub fn set_text(&mut self, id: u32, content: impl Into<String>) -> AnitempResult<()> {
        let segment = self.segment_mut(id)?;
        let content = content.into();
        match &mut segment.overlay {
            Some(overlay) => overlay.content = content,
            None => segment.overlay = Some(OverlayText::new(content)),
        }
        Ok(())
    }

    /// Set or clear a segment's transition.
    pub fn set_transition(&mut self, id: u32, spec: Option<TransitionSpec>) -> AnitempResult<()> {
        self.segment_mut(id)?.transition = spec;
        Ok(())
    }

    /// Use `bytes` instead of the segment's remote source and publish a
    /// preview handle for it. The previous preview is revoked first.
    pub fn replace_media(
        &mut self,
        id: u32,
        bytes: impl Into<Bytes>,
        mime: impl Into<String>,
    ) -> AnitempResult<&ObjectHandle> {
        let blob = MediaBlob::new(bytes, mime);
        if blob.bytes.is_empty() {
            return Err(AnitempError::invalid_edit_list(format!(
                "replacement media for segment {id} is empty"
            )));
        }

        let segment = self.segment_mut(id)?;
        segment.source.replacement = Some(blob.clone());
        tracing::debug!(id, bytes = blob.bytes.len(), mime = %blob.mime, "Replaced segment media");

        let store = self.composer.store().clone();
        let slot = self.previews.entry(id).or_default();
        Ok(slot.publish(&store, blob.bytes, blob.mime))
    }

    /// What a player should show for a segment: its preview handle when the
    /// media was replaced, else the remote locator.
    pub fn preview_url(&self, id: u32) -> Option<&str> {
        if let Some(url) = self.previews.get(&id).and_then(HandleSlot::url) {
            return Some(url);
        }
        self.edits.get(id).map(|s| s.source.remote.as_str())
    }

    /// Compose the current edit list. The previous artifact is released
    /// once the job is accepted; a rejected call leaves it in place.
    pub async fn generate(&mut self, on_progress: ProgressCallback) -> AnitempResult<&ObjectHandle> {
        let snapshot = self.edits.snapshot();
        check_segments(&snapshot)?;
        let busy = self.composer.reserve()?;
        self.artifact.clear();
        let handle = self
            .composer
            .generate_reserved(busy, &snapshot, on_progress)
            .await?;
        Ok(self.artifact.replace(handle))
    }

    pub fn artifact(&self) -> Option<&ObjectHandle> {
        self.artifact.current()
    }

    /// Save the last generated video into `dir`.
    pub async fn download(&self, dir: &Path) -> AnitempResult<PathBuf> {
        let handle = self
            .artifact
            .current()
            .ok_or_else(|| anyhow::anyhow!("No generated video to download"))?;
        handle.save_to(dir).await
    }

    /// Total running time for display. Uses measured source durations when
    /// any are known, else the template's advertised duration.
    pub fn advisory_duration(&self, source_secs: &[f64]) -> Option<f64> {
        let total = advisory_total_duration(source_secs);
        if total > 0.0 {
            Some(total)
        } else {
            self.advertised_secs
        }
    }

    fn segment_mut(&mut self, id: u32) -> AnitempResult<&mut Segment> {
        self.edits
            .get_mut(id)
            .ok_or_else(|| AnitempError::invalid_edit_list(format!("unknown segment id {id}")))
    }
}

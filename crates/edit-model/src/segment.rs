//! Segment records.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::transition::{Transition, TransitionSpec};

/// One ordered unit of the edit list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Unique, stable ordering key within the edit list.
    pub id: u32,

    /// Where the segment's video bytes come from.
    pub source: SegmentSource,

    /// Text shown over the segment. Not consumed by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayText>,

    /// Transition applied at the segment boundary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionSpec>,
}

/// Segment media source: a remote locator plus optional inline replacement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentSource {
    /// URL, site-relative path, or local path.
    pub remote: String,

    /// User-supplied replacement media. Takes precedence over `remote`.
    #[serde(skip)]
    pub replacement: Option<MediaBlob>,
}

/// In-memory media bytes with their MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBlob {
    pub bytes: Bytes,
    pub mime: String,
}

/// The source that is authoritative at processing time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectiveSource<'a> {
    Inline(&'a MediaBlob),
    Remote(&'a str),
}

/// Overlay text with optional placement and timing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayText {
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<OverlayPosition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at_secs: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

/// Overlay anchor position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayPosition {
    pub x: f64,
    pub y: f64,
}

impl MediaBlob {
    pub fn new(bytes: impl Into<Bytes>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }
}

impl SegmentSource {
    pub fn effective(&self) -> EffectiveSource<'_> {
        match &self.replacement {
            Some(blob) => EffectiveSource::Inline(blob),
            None => EffectiveSource::Remote(&self.remote),
        }
    }
}

impl OverlayText {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

impl Segment {
    /// A segment backed by a remote locator.
    pub fn remote(id: u32, locator: impl Into<String>) -> Self {
        Self {
            id,
            source: SegmentSource {
                remote: locator.into(),
                replacement: None,
            },
            overlay: None,
            transition: None,
        }
    }

    pub fn with_transition(mut self, spec: TransitionSpec) -> Self {
        self.transition = Some(spec);
        self
    }

    pub fn with_overlay(mut self, overlay: OverlayText) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_replacement(mut self, blob: MediaBlob) -> Self {
        self.source.replacement = Some(blob);
        self
    }

    /// The authoritative source for this segment.
    pub fn effective(&self) -> EffectiveSource<'_> {
        self.source.effective()
    }

    /// The recognized transition, if any. Unknown tags resolve to `None`.
    pub fn transition_kind(&self) -> Option<Transition> {
        self.transition.as_ref().and_then(TransitionSpec::kind)
    }

    /// Human-readable description of the effective source, for errors and logs.
    pub fn locator_label(&self) -> String {
        match self.effective() {
            EffectiveSource::Inline(blob) => {
                format!("<inline {} bytes, {}>", blob.bytes.len(), blob.mime)
            }
            EffectiveSource::Remote(locator) => locator.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_replacement_takes_precedence() {
        let seg = Segment::remote(1, "/default1.mp4")
            .with_replacement(MediaBlob::new(vec![1u8, 2, 3], "video/mp4"));
        match seg.effective() {
            EffectiveSource::Inline(blob) => assert_eq!(blob.bytes.as_ref(), &[1, 2, 3]),
            other => panic!("expected inline source, got {other:?}"),
        }
    }

    #[test]
    fn test_remote_used_without_replacement() {
        let seg = Segment::remote(2, "https://cdn.example/a.mp4");
        assert_eq!(
            seg.effective(),
            EffectiveSource::Remote("https://cdn.example/a.mp4")
        );
        assert_eq!(seg.locator_label(), "https://cdn.example/a.mp4");
    }

    #[test]
    fn test_unknown_transition_is_pass_through() {
        let seg = Segment::remote(1, "b.mp4").with_transition(TransitionSpec::new("unknownTag"));
        assert!(seg.transition.is_some());
        assert_eq!(seg.transition_kind(), None);
    }

    #[test]
    fn test_replacement_is_not_serialized() {
        let seg = Segment::remote(1, "a.mp4")
            .with_replacement(MediaBlob::new(vec![0u8; 4], "video/mp4"))
            .with_overlay(OverlayText::new("Intro Text"));
        let json = serde_json::to_string(&seg).unwrap();
        assert!(!json.contains("replacement"));
        let back: Segment = serde_json::from_str(&json).unwrap();
        assert!(back.source.replacement.is_none());
        assert_eq!(back.overlay.unwrap().content, "Intro Text");
    }
}

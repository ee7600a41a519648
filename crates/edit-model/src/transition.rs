//! Transition catalog.
//!
//! Tags are matched case-insensitively after trimming. Anything outside the
//! catalog resolves to `None`, which the engine treats as a pass-through.

use serde::{Deserialize, Serialize};

/// A named visual transition applied at the start of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Fade,
    Dissolve,
    WipeLeft,
    WipeRight,
    SlideLeft,
    SlideRight,
    ZoomIn,
    ZoomOut,
    CircleCrop,
    CircleOpen,
    FadeBlack,
    FadeWhite,
}

impl Transition {
    /// Every transition in catalog order.
    pub const ALL: [Transition; 12] = [
        Transition::Fade,
        Transition::Dissolve,
        Transition::WipeLeft,
        Transition::WipeRight,
        Transition::SlideLeft,
        Transition::SlideRight,
        Transition::ZoomIn,
        Transition::ZoomOut,
        Transition::CircleCrop,
        Transition::CircleOpen,
        Transition::FadeBlack,
        Transition::FadeWhite,
    ];

    /// Resolve a tag against the catalog.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Canonical tag string.
    pub fn tag(self) -> &'static str {
        match self {
            Transition::Fade => "fade",
            Transition::Dissolve => "dissolve",
            Transition::WipeLeft => "wipeleft",
            Transition::WipeRight => "wiperight",
            Transition::SlideLeft => "slideleft",
            Transition::SlideRight => "slideright",
            Transition::ZoomIn => "zoomin",
            Transition::ZoomOut => "zoomout",
            Transition::CircleCrop => "circlecrop",
            Transition::CircleOpen => "circleopen",
            Transition::FadeBlack => "fadeblack",
            Transition::FadeWhite => "fadewhite",
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Transition directive as stored on a segment: the raw tag plus an
/// optional duration. The raw tag is kept so unknown values round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    /// Tag as supplied by the editor or template.
    pub tag: String,

    /// Effect duration in seconds (`None` = configured default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl TransitionSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            duration_secs: None,
        }
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// The catalog entry this tag selects, if any.
    pub fn kind(&self) -> Option<Transition> {
        Transition::from_tag(&self.tag)
    }

    /// Effective duration, falling back to `default_secs` when unset or
    /// not a positive finite number.
    pub fn duration_or(&self, default_secs: f64) -> f64 {
        match self.duration_secs {
            Some(d) if d.is_finite() && d > 0.0 => d,
            _ => default_secs,
        }
    }
}

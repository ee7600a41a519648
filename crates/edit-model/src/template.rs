//! Template records as stored in the content store.
//!
//! Records are consumed read-only. The pipeline only needs three of the
//! arrays, zipped by index: `videos` (default sources), `transitions`
//! (transition tags) and `texts` (overlay text).

use serde::{Deserialize, Deserializer, Serialize};

use anitemp_common::error::{AnitempError, AnitempResult};

use crate::segment::{OverlayPosition, OverlayText, Segment};
use crate::transition::TransitionSpec;

/// Category id that matches every template.
pub const ALL_CATEGORIES: &str = "all";

/// A template document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateRecord {
    #[serde(rename = "_id")]
    pub id: String,

    pub title: String,

    pub category: Option<String>,

    /// Advertised duration in seconds. Stored as a number but some clients
    /// write it as a string, so both are accepted.
    #[serde(deserialize_with = "number_or_string")]
    pub duration: Option<f64>,

    pub downloads: Option<u64>,

    #[serde(rename = "new")]
    pub is_new: Option<bool>,

    pub tags: Vec<String>,

    pub preview: Option<FileField>,

    pub videos: Vec<VideoEntry>,

    pub texts: Vec<TextEntry>,

    pub transitions: Vec<TransitionEntry>,
}

/// A file field with its dereferenced asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileField {
    pub asset: Option<AssetRef>,
}

/// A dereferenced asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetRef {
    #[serde(rename = "_ref")]
    pub reference: Option<String>,

    pub url: Option<String>,
}

/// One entry of `videos[]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoEntry {
    #[serde(rename = "videoFile")]
    pub video_file: Option<FileField>,
}

/// One entry of `texts[]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextEntry {
    pub content: Option<String>,
    pub position: Option<OverlayPosition>,
    #[serde(deserialize_with = "number_or_string")]
    pub duration: Option<f64>,
    #[serde(rename = "startsat", deserialize_with = "number_or_string")]
    pub starts_at: Option<f64>,
}

/// One entry of `transitions[]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionEntry {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "number_or_string")]
    pub duration: Option<f64>,
}

impl FileField {
    pub fn url(&self) -> Option<&str> {
        self.asset
            .as_ref()
            .and_then(|a| a.url.as_deref())
            .filter(|u| !u.trim().is_empty())
    }
}

impl TemplateRecord {
    /// Parse a single record from JSON.
    pub fn from_json(json: &str) -> AnitempResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Preview clip URL, if the template has one.
    pub fn preview_url(&self) -> Option<&str> {
        self.preview.as_ref().and_then(FileField::url)
    }

    /// Build the default edit list for this template.
    ///
    /// One segment per video; transitions and texts are matched by index
    /// and may be shorter than `videos`. Segment ids start at 1.
    pub fn to_segments(&self) -> AnitempResult<Vec<Segment>> {
        self.videos
            .iter()
            .enumerate()
            .map(|(i, video)| {
                let url = video
                    .video_file
                    .as_ref()
                    .and_then(FileField::url)
                    .ok_or_else(|| {
                        AnitempError::template(format!(
                            "template {} video {i} has no asset url",
                            self.id
                        ))
                    })?;

                let mut segment = Segment::remote(i as u32 + 1, url);

                if let Some(tag) = self.transitions.get(i).and_then(|t| t.kind.as_deref()) {
                    let mut spec = TransitionSpec::new(tag);
                    spec.duration_secs = self.transitions[i].duration;
                    segment = segment.with_transition(spec);
                }

                if let Some(text) = self.texts.get(i) {
                    if let Some(content) = text.content.as_deref() {
                        segment = segment.with_overlay(OverlayText {
                            content: content.to_string(),
                            position: text.position,
                            starts_at_secs: text.starts_at,
                            duration_secs: text.duration,
                        });
                    }
                }

                Ok(segment)
            })
            .collect()
    }

    /// Whether this template matches a category id and a free-text query.
    pub fn matches(&self, category: &str, query: &str) -> bool {
        let matches_category =
            category == ALL_CATEGORIES || self.category.as_deref() == Some(category);
        let query = query.to_lowercase();
        let matches_search = self.title.to_lowercase().contains(&query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&query));
        matches_category && matches_search
    }
}

/// A set of templates fetched from the content store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateCatalog {
    pub templates: Vec<TemplateRecord>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<TemplateRecord>) -> Self {
        Self { templates }
    }

    /// Parse a JSON array of records.
    pub fn from_json(json: &str) -> AnitempResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Templates matching the category (`"all"` for any) and search query.
    pub fn filter<'a>(
        &'a self,
        category: &'a str,
        query: &'a str,
    ) -> impl Iterator<Item = &'a TemplateRecord> + 'a {
        self.templates
            .iter()
            .filter(move |t| t.matches(category, query))
    }

    pub fn find(&self, id: &str) -> Option<&TemplateRecord> {
        self.templates.iter().find(|t| t.id == id)
    }
}

/// Sum of per-source durations, in seconds.
///
/// Advisory only: transitions may shorten the real output and this value is
/// never checked against it.
pub fn advisory_total_duration(durations: &[f64]) -> f64 {
    durations
        .iter()
        .copied()
        .filter(|d| d.is_finite() && *d > 0.0)
        .sum()
}

fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse::<f64>().ok(),
        None => None,
    })
}

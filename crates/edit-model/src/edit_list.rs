//! Ordered, id-unique edit lists.

use std::collections::HashSet;

use anitemp_common::error::{AnitempError, AnitempResult};

use crate::segment::Segment;

/// An ordered list of segments. Relative order defines output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditList {
    segments: Vec<Segment>,
}

impl EditList {
    /// Build an edit list, rejecting duplicate segment ids.
    pub fn new(segments: Vec<Segment>) -> AnitempResult<Self> {
        ensure_unique_ids(&segments)?;
        Ok(Self { segments })
    }

    /// Owned copy of the current segments. Later edits to this list do not
    /// affect the returned snapshot; inline media is shared, not copied.
    pub fn snapshot(&self) -> Vec<Segment> {
        self.segments.clone()
    }

    pub fn get(&self, id: u32) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|s| s.id == id)
    }

    /// Zero-based position of a segment id.
    pub fn position(&self, id: u32) -> Option<usize> {
        self.segments.iter().position(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.segments.iter().map(|s| s.id).collect()
    }
}

/// Reject a segment sequence that reuses an id.
pub fn ensure_unique_ids(segments: &[Segment]) -> AnitempResult<()> {
    let mut seen = HashSet::with_capacity(segments.len());
    for seg in segments {
        if !seen.insert(seg.id) {
            return Err(AnitempError::invalid_edit_list(format!(
                "duplicate segment id {}",
                seg.id
            )));
        }
    }
    Ok(())
}

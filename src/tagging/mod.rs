//! Tag suggestion postprocessing.
//!
//! A tagging model yields one probability per entry of its label table.
//! [`postprocess_tags`] turns those candidates into the list shown to the
//! annotator:
//!
//! 1. keep candidates at or above the threshold
//! 2. drop candidates whose label or origin label is excluded (case-folded)
//! 3. drop character-identity tags (category 4)
//! 4. for face regions, keep only expression-related tags
//! 5. stable sort: rating tags, then structural priority tags, then by
//!    descending confidence
//! 6. collapse candidates sharing a display label, keeping the more
//!    confident one at the position where it sorted
//! 7. render the list and its comma-joined text
//!
//! The pipeline is pure; inference and cropping happen before it runs.

mod manifest;
mod registry;
pub mod vocab;

pub use manifest::{LabelEntry, LabelTable};
pub use registry::{LoadedTagger, Tagger, TaggerLoader, TaggerRegistry};

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ir::AnnotationType;
use vocab::{is_expression_tag, is_priority_tag, CHARACTER_CATEGORY, RATING_CATEGORY};

/// One label of the model output together with its probability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagCandidate {
    /// Display label, possibly translated.
    pub label: String,
    /// Canonical label used for filtering; equals `label` without a translation.
    pub origin_label: String,
    pub category: u32,
    pub confidence: f32,
}

impl TagCandidate {
    pub fn new(label: impl Into<String>, category: u32, confidence: f32) -> Self {
        let label = label.into();
        Self {
            origin_label: label.clone(),
            label,
            category,
            confidence,
        }
    }

    /// Sets a canonical label differing from the display label.
    pub fn with_origin(mut self, origin_label: impl Into<String>) -> Self {
        self.origin_label = origin_label.into();
        self
    }
}

/// Parameters of one postprocessing run.
#[derive(Clone, Debug, Default)]
pub struct TagFilter {
    pub threshold: f32,
    pub annotation_type: Option<AnnotationType>,
    excluded: HashSet<String>,
}

impl TagFilter {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            annotation_type: None,
            excluded: HashSet::new(),
        }
    }

    pub fn for_type(mut self, annotation_type: Option<AnnotationType>) -> Self {
        self.annotation_type = annotation_type;
        self
    }

    /// Adds tags to exclude; matching ignores case.
    pub fn excluding<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded
            .extend(tags.into_iter().map(|t| t.as_ref().to_lowercase()));
        self
    }

    fn is_excluded(&self, candidate: &TagCandidate) -> bool {
        self.excluded.contains(&candidate.origin_label.to_lowercase())
            || self.excluded.contains(&candidate.label.to_lowercase())
    }

    fn passes_type_whitelist(&self, candidate: &TagCandidate) -> bool {
        match self.annotation_type {
            Some(AnnotationType::Face) => is_expression_tag(&candidate.origin_label),
            _ => true,
        }
    }
}

/// A tag as shown to the annotator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredTag {
    pub label: String,
    pub confidence: f32,
}

/// Result of [`postprocess_tags`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TagSuggestions {
    /// Comma-joined labels, in the same order as `tags`.
    pub text: String,
    pub tags: Vec<ScoredTag>,
}

/// Filters, ranks and deduplicates raw tag candidates.
pub fn postprocess_tags(candidates: Vec<TagCandidate>, filter: &TagFilter) -> TagSuggestions {
    let mut kept: Vec<TagCandidate> = candidates
        .into_iter()
        .filter(|c| c.confidence >= filter.threshold)
        .filter(|c| !filter.is_excluded(c))
        .filter(|c| c.category != CHARACTER_CATEGORY)
        .filter(|c| filter.passes_type_whitelist(c))
        .collect();

    kept.sort_by(|a, b| {
        priority_key(a)
            .cmp(&priority_key(b))
            .then_with(|| b.confidence.total_cmp(&a.confidence))
    });

    let tags: Vec<ScoredTag> = dedup_by_label(kept)
        .into_iter()
        .map(|c| ScoredTag {
            label: c.label,
            confidence: c.confidence,
        })
        .collect();

    let text = tags
        .iter()
        .map(|t| t.label.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    TagSuggestions { text, tags }
}

/// Rating tags sort first, then structural priority tags, then the rest.
fn priority_key(candidate: &TagCandidate) -> (u8, u8) {
    let rating = u8::from(candidate.category != RATING_CATEGORY);
    let priority = u8::from(!is_priority_tag(&candidate.origin_label));
    (rating, priority)
}

/// Keeps one candidate per display label.
///
/// A later, strictly more confident duplicate replaces the earlier one and
/// takes its own sorted position; on a tie the earlier one stays.
fn dedup_by_label(sorted: Vec<TagCandidate>) -> Vec<TagCandidate> {
    let mut slots: Vec<Option<TagCandidate>> = Vec::with_capacity(sorted.len());
    let mut seen: HashMap<String, usize> = HashMap::new();

    for candidate in sorted {
        match seen.get(&candidate.label).copied() {
            None => {
                seen.insert(candidate.label.clone(), slots.len());
                slots.push(Some(candidate));
            }
            Some(index) => {
                let current = slots[index].as_ref().map_or(f32::NEG_INFINITY, |c| c.confidence);
                if candidate.confidence > current {
                    slots[index] = None;
                    seen.insert(candidate.label.clone(), slots.len());
                    slots.push(Some(candidate));
                }
            }
        }
    }

    slots.into_iter().flatten().collect()
}

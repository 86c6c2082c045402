//! Core page annotation model.
//!
//! One [`ImageAnnotation`] record exists per page image and holds an
//! insertion-ordered sequence of [`Annotation`]s. The record is rewritten in
//! full on every mutation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::bbox::BBoxXYWH;
use super::ids::{AnnotationId, ImageId};
use super::space::{Normalized, Pixel};
use crate::error::MangalabelError;

/// The kind of region an annotation marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    Dialogue,
    Monologue,
    Whisper,
    Narration,
    Ruby,
    SoundEffect,
    Title,
    Footnote,
    Person,
    Face,
    BodyPart,
    Object,
    Panel,
}

impl AnnotationType {
    /// Every annotation type, in declaration order.
    pub const ALL: [AnnotationType; 13] = [
        AnnotationType::Dialogue,
        AnnotationType::Monologue,
        AnnotationType::Whisper,
        AnnotationType::Narration,
        AnnotationType::Ruby,
        AnnotationType::SoundEffect,
        AnnotationType::Title,
        AnnotationType::Footnote,
        AnnotationType::Person,
        AnnotationType::Face,
        AnnotationType::BodyPart,
        AnnotationType::Object,
        AnnotationType::Panel,
    ];

    /// Wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationType::Dialogue => "dialogue",
            AnnotationType::Monologue => "monologue",
            AnnotationType::Whisper => "whisper",
            AnnotationType::Narration => "narration",
            AnnotationType::Ruby => "ruby",
            AnnotationType::SoundEffect => "sound_effect",
            AnnotationType::Title => "title",
            AnnotationType::Footnote => "footnote",
            AnnotationType::Person => "person",
            AnnotationType::Face => "face",
            AnnotationType::BodyPart => "body_part",
            AnnotationType::Object => "object",
            AnnotationType::Panel => "panel",
        }
    }

    /// Types that may share a reading order when they depict the same character.
    pub fn is_groupable(&self) -> bool {
        matches!(
            self,
            AnnotationType::Face
                | AnnotationType::Person
                | AnnotationType::BodyPart
                | AnnotationType::Object
        )
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnnotationType {
    type Err = MangalabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnnotationType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MangalabelError::InvalidRequest {
                field: "type".to_string(),
                message: format!("unknown annotation type '{}'", s),
            })
    }
}

/// Page dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A single typed, ordered region on a page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Unique within the owning page.
    pub id: AnnotationId,

    #[serde(rename = "type")]
    pub kind: AnnotationType,

    /// Reading order, starting at 1. Not required to be unique.
    pub order: u32,

    /// Region in page pixels.
    pub bbox_abs: BBoxXYWH<Pixel>,

    /// Region relative to the page size, derived from `bbox_abs`.
    pub bbox_rel: BBoxXYWH<Normalized>,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub character_id: Option<String>,

    #[serde(default)]
    pub subtype: Option<String>,
}

impl Annotation {
    /// Builds an annotation from a request, deriving its relative box.
    ///
    /// The order is taken from the draft when present and left at 0
    /// otherwise; the ordering engine assigns the final value.
    pub fn from_draft(id: AnnotationId, draft: &AnnotationDraft, size: ImageSize) -> Self {
        Self {
            id,
            kind: draft.kind,
            order: draft.order.unwrap_or(0),
            bbox_abs: draft.bbox_abs,
            bbox_rel: relative_box(&draft.bbox_abs, size),
            text: draft.text.clone(),
            character_id: draft.character_id.clone(),
            subtype: draft.subtype.clone(),
        }
    }

    /// Overwrites every authored field from `draft`.
    ///
    /// When the draft carries no order the current order is kept.
    pub fn apply_draft(&mut self, draft: &AnnotationDraft, size: ImageSize) {
        self.kind = draft.kind;
        if let Some(order) = draft.order {
            self.order = order;
        }
        self.bbox_abs = draft.bbox_abs;
        self.bbox_rel = relative_box(&draft.bbox_abs, size);
        self.text = draft.text.clone();
        self.character_id = draft.character_id.clone();
        self.subtype = draft.subtype.clone();
    }
}

/// Computes the relative box for a pixel box on a page of the given size.
pub fn relative_box(bbox_abs: &BBoxXYWH<Pixel>, size: ImageSize) -> BBoxXYWH<Normalized> {
    bbox_abs.to_normalized(size.width as f64, size.height as f64)
}

/// The full annotation record of one page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageAnnotation {
    pub image_id: ImageId,
    pub image_filename: String,
    pub image_size: ImageSize,

    #[serde(default)]
    pub page_summary: Option<String>,

    #[serde(default)]
    pub is_completed: bool,

    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl ImageAnnotation {
    /// Creates an empty, not-yet-completed record for a page.
    pub fn new(image_id: ImageId, image_filename: impl Into<String>, image_size: ImageSize) -> Self {
        Self {
            image_id,
            image_filename: image_filename.into(),
            image_size,
            page_summary: None,
            is_completed: false,
            annotations: Vec::new(),
        }
    }

    /// Finds an annotation by id.
    pub fn annotation(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| &a.id == id)
    }

    /// Recomputes every relative box from its pixel box and the page size.
    pub fn refresh_relative_boxes(&mut self) {
        let size = self.image_size;
        for annotation in &mut self.annotations {
            annotation.bbox_rel = relative_box(&annotation.bbox_abs, size);
        }
    }

    /// Returns an id that no annotation on this page uses yet.
    pub fn fresh_annotation_id(&self) -> AnnotationId {
        loop {
            let id = AnnotationId::generate();
            if self.annotation(&id).is_none() {
                return id;
            }
        }
    }
}

/// The caller-authored part of an annotation, used for create and update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDraft {
    #[serde(rename = "type")]
    pub kind: AnnotationType,

    #[serde(default)]
    pub order: Option<u32>,

    pub bbox_abs: BBoxXYWH<Pixel>,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub character_id: Option<String>,

    #[serde(default)]
    pub subtype: Option<String>,
}

impl AnnotationDraft {
    /// Creates a draft with no order, text, character or subtype.
    pub fn new(kind: AnnotationType, bbox_abs: BBoxXYWH<Pixel>) -> Self {
        Self {
            kind,
            order: None,
            bbox_abs,
            text: String::new(),
            character_id: None,
            subtype: None,
        }
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_character(mut self, character_id: impl Into<String>) -> Self {
        self.character_id = Some(character_id.into());
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    /// Rejects malformed request shapes before they reach a record.
    pub fn validate(&self) -> Result<(), MangalabelError> {
        validate_request_bbox(&self.bbox_abs)?;
        match self.order {
            Some(0) => {
                return Err(MangalabelError::InvalidRequest {
                    field: "order".to_string(),
                    message: "must be a positive integer".to_string(),
                })
            }
            // inserting here would have to shift holders past u32::MAX
            Some(u32::MAX) => {
                return Err(MangalabelError::InvalidRequest {
                    field: "order".to_string(),
                    message: format!("must be below {}", u32::MAX),
                })
            }
            _ => {}
        }
        Ok(())
    }
}

/// Checks that a requested region is finite and has a positive size.
pub fn validate_request_bbox(bbox: &BBoxXYWH<Pixel>) -> Result<(), MangalabelError> {
    if !bbox.is_finite() {
        return Err(MangalabelError::InvalidRequest {
            field: "bbox_abs".to_string(),
            message: format!("non-finite coordinates {:?}", bbox),
        });
    }
    if !bbox.has_positive_size() {
        return Err(MangalabelError::InvalidRequest {
            field: "bbox_abs".to_string(),
            message: format!(
                "width and height must be positive, got {}x{}",
                bbox.width, bbox.height
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> ImageAnnotation {
        ImageAnnotation::new(
            ImageId::parse("00001").unwrap(),
            "00001.png",
            ImageSize::new(800, 1200),
        )
    }

    #[test]
    fn test_type_wire_names_roundtrip() {
        for kind in AnnotationType::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<AnnotationType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = "speech_bubble".parse::<AnnotationType>().unwrap_err();
        assert!(err.to_string().contains("speech_bubble"));
    }

    #[test]
    fn test_groupable_types() {
        let groupable: Vec<_> = AnnotationType::ALL
            .iter()
            .filter(|t| t.is_groupable())
            .collect();
        assert_eq!(groupable.len(), 4);
        assert!(!AnnotationType::SoundEffect.is_groupable());
    }

    #[test]
    fn test_from_draft_derives_relative_box() {
        let draft = AnnotationDraft::new(
            AnnotationType::Dialogue,
            BBoxXYWH::new(80.0, 120.0, 400.0, 600.0),
        )
        .with_text("hello");
        let ann = Annotation::from_draft(AnnotationId::new("a"), &draft, ImageSize::new(800, 1200));
        assert_eq!(ann.bbox_rel.x, 0.1);
        assert_eq!(ann.bbox_rel.y, 0.1);
        assert_eq!(ann.bbox_rel.width, 0.5);
        assert_eq!(ann.bbox_rel.height, 0.5);
        assert_eq!(ann.text, "hello");
    }

    #[test]
    fn test_draft_validation() {
        let ok = AnnotationDraft::new(AnnotationType::Face, BBoxXYWH::new(0.0, 0.0, 1.0, 1.0));
        assert!(ok.validate().is_ok());

        let zero_width =
            AnnotationDraft::new(AnnotationType::Face, BBoxXYWH::new(0.0, 0.0, 0.0, 1.0));
        assert!(matches!(
            zero_width.validate(),
            Err(MangalabelError::InvalidRequest { ref field, .. }) if field == "bbox_abs"
        ));

        let zero_order = ok.clone().with_order(0);
        assert!(matches!(
            zero_order.validate(),
            Err(MangalabelError::InvalidRequest { ref field, .. }) if field == "order"
        ));

        let max_order = ok.clone().with_order(u32::MAX);
        assert!(matches!(
            max_order.validate(),
            Err(MangalabelError::InvalidRequest { ref field, .. }) if field == "order"
        ));
        assert!(ok.clone().with_order(u32::MAX - 1).validate().is_ok());
    }

    #[test]
    fn test_refresh_relative_boxes_ignores_stored_values() {
        let mut record = page();
        let draft = AnnotationDraft::new(
            AnnotationType::Panel,
            BBoxXYWH::new(0.0, 0.0, 400.0, 600.0),
        );
        let mut ann = Annotation::from_draft(AnnotationId::new("p"), &draft, record.image_size);
        ann.bbox_rel = BBoxXYWH::new(9.0, 9.0, 9.0, 9.0);
        record.annotations.push(ann);

        record.refresh_relative_boxes();
        assert_eq!(record.annotations[0].bbox_rel, BBoxXYWH::new(0.0, 0.0, 0.5, 0.5));
    }

    #[test]
    fn test_record_serializes_nulls() {
        let record = page();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["page_summary"], serde_json::Value::Null);
        assert_eq!(json["is_completed"], false);
        assert_eq!(json["annotations"], serde_json::json!([]));
        assert_eq!(json["image_size"]["width"], 800);
    }
}

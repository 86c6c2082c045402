//! OCR and tag suggestions for page regions.
//!
//! Both assists crop the requested region from the page image and hand the
//! pixels to a model. Model calls can take long (first load, busy GPU), so
//! they always run before any record lock is taken; only the final record
//! write goes through the store's locked read-modify-write.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::MangalabelError;
use crate::ir::{
    validate_request_bbox, Annotation, AnnotationDraft, AnnotationType, BBoxXYWH, ImageId, Pixel,
};
use crate::settings::{validate_threshold, TaggerSettings};
use crate::store::{AnnotationStore, ImageSource};
use crate::tagging::{postprocess_tags, TagSuggestions, TaggerRegistry};

/// Text recognition over a cropped region.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, image: &RgbImage) -> Result<String, MangalabelError>;
}

/// A tag suggestion request for one region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagRequest {
    pub image_id: ImageId,
    pub bbox_abs: BBoxXYWH<Pixel>,
    /// Overrides the threshold from the settings for this call.
    #[serde(default)]
    pub threshold: Option<f32>,
    /// Face regions only get expression tags.
    #[serde(default)]
    pub annotation_type: Option<AnnotationType>,
}

/// Crops `bbox` from the page image and runs OCR on it.
pub fn recognize_region<S: ImageSource>(
    images: &S,
    recognizer: &dyn Recognizer,
    image_id: &ImageId,
    bbox: &BBoxXYWH<Pixel>,
) -> Result<String, MangalabelError> {
    validate_request_bbox(bbox)?;
    let crop = images.crop(image_id, bbox)?;
    let text = recognizer.recognize(&crop)?;
    debug!(image_id = %image_id, chars = text.chars().count(), "region recognized");
    Ok(text)
}

/// Crops the requested region, runs the current tagger and postprocesses
/// its output with the settings' exclusions.
pub fn suggest_tags<S: ImageSource>(
    images: &S,
    registry: &TaggerRegistry,
    settings: &TaggerSettings,
    request: &TagRequest,
) -> Result<TagSuggestions, MangalabelError> {
    validate_request_bbox(&request.bbox_abs)?;
    if let Some(threshold) = request.threshold {
        validate_threshold(threshold)?;
    }

    let crop = images.crop(&request.image_id, &request.bbox_abs)?;
    let tagger = registry.current()?;
    let probabilities = tagger.tagger.infer(&crop)?;
    let candidates = tagger.labels.candidates(&probabilities)?;

    let filter = settings
        .tag_filter(request.threshold)
        .for_type(request.annotation_type);
    let suggestions = postprocess_tags(candidates, &filter);
    debug!(
        image_id = %request.image_id,
        model = %tagger.model_id,
        tags = suggestions.tags.len(),
        "tags suggested"
    );
    Ok(suggestions)
}

/// Creates an annotation whose text is recognized from its own region.
///
/// OCR runs first, without holding the page lock; the record is then
/// updated through [`AnnotationStore::create`].
pub fn annotate_with_ocr<S: ImageSource>(
    store: &AnnotationStore<S>,
    recognizer: &dyn Recognizer,
    image_id: &ImageId,
    draft: &AnnotationDraft,
) -> Result<Annotation, MangalabelError> {
    draft.validate()?;
    let text = recognize_region(store.images(), recognizer, image_id, &draft.bbox_abs)?;
    let draft = draft.clone().with_text(text);
    let annotation = store.create(image_id, &draft)?;
    info!(image_id = %image_id, annotation_id = %annotation.id, "annotation created from OCR");
    Ok(annotation)
}

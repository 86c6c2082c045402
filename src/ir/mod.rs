//! Page annotation data model for mangalabel.
//!
//! This module defines the persisted representation of annotated manga
//! pages: one [`ImageAnnotation`] record per page, each holding a sequence of
//! typed, ordered [`Annotation`] regions.
//!
//! # Design Principles
//!
//! 1. **Type Safety**: Marker types keep pixel boxes and page-relative boxes
//!    apart at compile time, and newtype ids keep image ids and annotation
//!    ids apart.
//!
//! 2. **Derived Geometry**: `bbox_rel` is a pure function of `bbox_abs` and
//!    the page size. It is recomputed on every write and on every load.
//!
//! 3. **Permissive Records**: A record may hold duplicate reading orders or
//!    gaps in the order sequence; both are legal states.
//!
//! # Example
//!
//! ```
//! use mangalabel::ir::{
//!     Annotation, AnnotationDraft, AnnotationId, AnnotationType, BBoxXYWH, ImageAnnotation,
//!     ImageId, ImageSize,
//! };
//!
//! let size = ImageSize::new(800, 1200);
//! let mut page = ImageAnnotation::new(ImageId::parse("00001").unwrap(), "00001.png", size);
//! let draft = AnnotationDraft::new(AnnotationType::Dialogue, BBoxXYWH::new(10.0, 10.0, 80.0, 40.0))
//!     .with_order(1);
//! page.annotations.push(Annotation::from_draft(AnnotationId::new("anno_1"), &draft, size));
//! ```

mod bbox;
mod ids;
pub mod io_json;
mod model;
mod space;

pub use bbox::BBoxXYWH;
pub use ids::{AnnotationId, ImageId};
pub use model::{
    relative_box, validate_request_bbox, Annotation, AnnotationDraft, AnnotationType,
    ImageAnnotation, ImageSize,
};
pub use space::{Normalized, Pixel};

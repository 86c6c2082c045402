//! Annotation record validation for mangalabel.
//!
//! This module checks a page record for:
//! - Structural integrity (unique, non-empty annotation ids)
//! - Data quality (positive page size, a named image file)
//! - Geometric validity (finite, positive-size boxes within the page,
//!   relative boxes matching their pixel boxes)
//! - Reading order (positive orders, ties only where sharing is allowed)
//!
//! Error-level issues mark a record as corrupt; the store refuses to load
//! such records. Warnings are reported by the `validate` command only.

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::{BTreeMap, HashMap};

use crate::ir::{relative_box, Annotation, ImageAnnotation};
use crate::ordering::SharingPolicy;

/// Largest accepted difference between a stored and a derived relative box.
const RELATIVE_TOLERANCE: f64 = 1e-6;

/// Slack in pixels before a box counts as outside the page.
const BOUNDS_TOLERANCE: f64 = 0.5;

/// Options for validation behavior.
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// If true, treat warnings as errors.
    pub strict: bool,
    /// Rules deciding which order ties are legitimate.
    pub sharing: SharingPolicy,
}

/// Validates a page record and returns a report of all issues found.
pub fn validate_record(record: &ImageAnnotation, opts: &ValidateOptions) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_page(record, &mut report);
    validate_annotations(record, &mut report);
    validate_order_ties(record, &opts.sharing, &mut report);

    report
}

fn validate_page(record: &ImageAnnotation, report: &mut ValidationReport) {
    let size = record.image_size;
    if size.width == 0 || size.height == 0 {
        report.add(ValidationIssue::error(
            IssueCode::InvalidImageDimensions,
            format!(
                "Invalid dimensions {}x{} (must be positive)",
                size.width, size.height
            ),
            IssueContext::Record,
        ));
    }

    if record.image_filename.is_empty() {
        report.add(ValidationIssue::warning(
            IssueCode::EmptyFileName,
            "Empty image filename",
            IssueContext::Record,
        ));
    }
}

fn validate_annotations(record: &ImageAnnotation, report: &mut ValidationReport) {
    let mut seen_ids: HashMap<&str, usize> = HashMap::new();
    let (w, h) = (
        f64::from(record.image_size.width),
        f64::from(record.image_size.height),
    );
    let has_size = record.image_size.width > 0 && record.image_size.height > 0;

    for (idx, annotation) in record.annotations.iter().enumerate() {
        let id = annotation.id.as_str();
        let context = || IssueContext::Annotation { id: id.to_string() };

        if id.is_empty() {
            report.add(ValidationIssue::error(
                IssueCode::EmptyAnnotationId,
                format!("Annotation at index {} has an empty id", idx),
                context(),
            ));
        } else if let Some(first_idx) = seen_ids.get(id) {
            report.add(ValidationIssue::error(
                IssueCode::DuplicateAnnotationId,
                format!(
                    "Duplicate annotation ID {} (first seen at index {})",
                    id, first_idx
                ),
                context(),
            ));
        } else {
            seen_ids.insert(id, idx);
        }

        if annotation.order == 0 {
            report.add(ValidationIssue::error(
                IssueCode::ZeroOrder,
                "Order must be a positive integer",
                context(),
            ));
        }

        let bbox = &annotation.bbox_abs;
        if !bbox.is_finite() {
            report.add(ValidationIssue::error(
                IssueCode::BBoxNotFinite,
                format!("Non-finite coordinates {:?}", bbox),
                context(),
            ));
            continue;
        }

        if !bbox.has_positive_size() {
            report.add(ValidationIssue::error(
                IssueCode::InvalidBBoxSize,
                format!(
                    "Width and height must be positive, got {}x{}",
                    bbox.width, bbox.height
                ),
                context(),
            ));
        }

        if !has_size {
            continue;
        }

        if bbox.x < -BOUNDS_TOLERANCE
            || bbox.y < -BOUNDS_TOLERANCE
            || bbox.right() > w + BOUNDS_TOLERANCE
            || bbox.bottom() > h + BOUNDS_TOLERANCE
        {
            report.add(ValidationIssue::warning(
                IssueCode::BBoxOutOfBounds,
                format!(
                    "Box ({:.1}, {:.1}, {:.1}, {:.1}) extends outside the page (0, 0, {}, {})",
                    bbox.x,
                    bbox.y,
                    bbox.right(),
                    bbox.bottom(),
                    record.image_size.width,
                    record.image_size.height
                ),
                context(),
            ));
        }

        if is_stale(annotation, record) {
            report.add(ValidationIssue::warning(
                IssueCode::StaleRelativeBBox,
                "Stored bbox_rel does not match bbox_abs; it is recomputed on load",
                context(),
            ));
        }
    }
}

fn is_stale(annotation: &Annotation, record: &ImageAnnotation) -> bool {
    let derived = relative_box(&annotation.bbox_abs, record.image_size);
    let stored = &annotation.bbox_rel;
    [
        (derived.x, stored.x),
        (derived.y, stored.y),
        (derived.width, stored.width),
        (derived.height, stored.height),
    ]
    .iter()
    .any(|(a, b)| {
        let diff = (a - b).abs();
        diff.is_nan() || diff > RELATIVE_TOLERANCE
    })
}

/// Warns about annotations holding the same order that the sharing rules
/// would not have allowed. Such ties are legal (updates may write any order)
/// but usually unintended.
fn validate_order_ties(
    record: &ImageAnnotation,
    sharing: &SharingPolicy,
    report: &mut ValidationReport,
) {
    let mut by_order: BTreeMap<u32, Vec<&Annotation>> = BTreeMap::new();
    for annotation in record.annotations.iter().filter(|a| a.order > 0) {
        by_order.entry(annotation.order).or_default().push(annotation);
    }

    for (order, group) in by_order.iter().filter(|(_, g)| g.len() > 1) {
        for (i, later) in group.iter().enumerate().skip(1) {
            if let Some(earlier) = group[..i]
                .iter()
                .find(|earlier| !sharing.can_share(later, earlier))
            {
                report.add(ValidationIssue::warning(
                    IssueCode::UnshareableOrderTie,
                    format!(
                        "Shares order {} with {} ({} and {} may not share)",
                        order, earlier.id, later.kind, earlier.kind
                    ),
                    IssueContext::Annotation {
                        id: later.id.to_string(),
                    },
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        AnnotationDraft, AnnotationId, AnnotationType, BBoxXYWH, ImageId, ImageSize,
    };

    const SIZE: ImageSize = ImageSize {
        width: 800,
        height: 1200,
    };

    fn ann(id: &str, kind: AnnotationType, order: u32) -> Annotation {
        let draft =
            AnnotationDraft::new(kind, BBoxXYWH::new(10.0, 20.0, 100.0, 50.0)).with_order(order);
        Annotation::from_draft(AnnotationId::new(id), &draft, SIZE)
    }

    fn valid_record() -> ImageAnnotation {
        let mut record = ImageAnnotation::new(ImageId::parse("00001").unwrap(), "00001.png", SIZE);
        record.annotations = vec![
            ann("a", AnnotationType::Dialogue, 1),
            ann("b", AnnotationType::SoundEffect, 2),
            ann("c", AnnotationType::SoundEffect, 2),
        ];
        record
    }

    fn has(report: &ValidationReport, code: IssueCode) -> bool {
        report.issues.iter().any(|i| i.code == code)
    }

    #[test]
    fn test_valid_record() {
        let report = validate_record(&valid_record(), &ValidateOptions::default());
        assert!(
            report.is_clean(),
            "Expected no issues, got: {:?}",
            report.issues
        );
    }

    #[test]
    fn test_duplicate_annotation_id() {
        let mut record = valid_record();
        record.annotations.push(ann("a", AnnotationType::Panel, 3));

        let report = validate_record(&record, &ValidateOptions::default());
        assert_eq!(report.error_count(), 1);
        assert!(has(&report, IssueCode::DuplicateAnnotationId));
    }

    #[test]
    fn test_invalid_image_dimensions() {
        let mut record = valid_record();
        record.annotations.clear();
        record.image_size = ImageSize::new(0, 1200);

        let report = validate_record(&record, &ValidateOptions::default());
        assert_eq!(report.error_count(), 1);
        assert!(has(&report, IssueCode::InvalidImageDimensions));
    }

    #[test]
    fn test_zero_order_is_error() {
        let mut record = valid_record();
        record.annotations[0].order = 0;

        let report = validate_record(&record, &ValidateOptions::default());
        assert!(has(&report, IssueCode::ZeroOrder));
        assert!(!report.is_ok());
    }

    #[test]
    fn test_bbox_not_finite() {
        let mut record = valid_record();
        record.annotations[0].bbox_abs = BBoxXYWH::new(f64::NAN, 0.0, 10.0, 10.0);

        let report = validate_record(&record, &ValidateOptions::default());
        assert!(has(&report, IssueCode::BBoxNotFinite));
    }

    #[test]
    fn test_bbox_size_must_be_positive() {
        let mut record = valid_record();
        record.annotations[0].bbox_abs = BBoxXYWH::new(0.0, 0.0, 0.0, 10.0);
        record.refresh_relative_boxes();

        let report = validate_record(&record, &ValidateOptions::default());
        assert!(has(&report, IssueCode::InvalidBBoxSize));
    }

    #[test]
    fn test_out_of_bounds_is_warning() {
        let mut record = valid_record();
        record.annotations[0].bbox_abs = BBoxXYWH::new(750.0, 10.0, 100.0, 10.0);
        record.refresh_relative_boxes();

        let report = validate_record(&record, &ValidateOptions::default());
        assert!(report.is_ok());
        assert!(has(&report, IssueCode::BBoxOutOfBounds));
    }

    #[test]
    fn test_stale_relative_box() {
        let mut record = valid_record();
        record.annotations[1].bbox_rel = BBoxXYWH::new(0.5, 0.5, 0.1, 0.1);

        let report = validate_record(&record, &ValidateOptions::default());
        assert_eq!(report.warning_count(), 1);
        assert!(has(&report, IssueCode::StaleRelativeBBox));
    }

    #[test]
    fn test_unshareable_tie_is_warning() {
        let mut record = valid_record();
        record.annotations.push(ann("d", AnnotationType::Dialogue, 1));

        let report = validate_record(&record, &ValidateOptions::default());
        assert!(report.is_ok());
        let ties: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.code == IssueCode::UnshareableOrderTie)
            .collect();
        assert_eq!(ties.len(), 1);
        assert_eq!(ties[0].context.to_string(), "annotation d");
    }

    #[test]
    fn test_json_rendering() {
        let mut record = valid_record();
        record.image_filename.clear();
        let json = validate_record(&record, &ValidateOptions::default()).to_json();
        assert_eq!(json["warning_count"], 1);
        assert_eq!(json["issues"][0]["code"], "EmptyFileName");
        assert_eq!(json["issues"][0]["context"]["kind"], "record");
    }
}

#![allow(dead_code)]

use std::collections::BTreeSet;

use mangalabel::ir::{
    Annotation, AnnotationDraft, AnnotationId, AnnotationType, BBoxXYWH, ImageSize, Pixel,
};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub const EPS_ROUND_TRIP: f64 = 1e-9;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn arb_annotation_type() -> BoxedStrategy<AnnotationType> {
    proptest::sample::select(AnnotationType::ALL.to_vec()).boxed()
}

pub fn arb_character() -> BoxedStrategy<Option<String>> {
    prop_oneof![
        2 => Just(None),
        1 => Just(Some(String::new())),
        3 => proptest::sample::select(vec!["c1", "c2", "c3"]).prop_map(|c| Some(c.to_string())),
    ]
    .boxed()
}

pub fn arb_size() -> BoxedStrategy<ImageSize> {
    (1u32..=4096, 1u32..=4096)
        .prop_map(|(w, h)| ImageSize::new(w, h))
        .boxed()
}

pub fn arb_bbox_within(width: u32, height: u32) -> BoxedStrategy<BBoxXYWH<Pixel>> {
    let (w, h) = (f64::from(width), f64::from(height));
    (0.0..w, 0.0..h, 0.0f64..1.0, 0.0f64..1.0)
        .prop_map(move |(x, y, fw, fh)| {
            let width = ((w - x) * fw).max(1e-3);
            let height = ((h - y) * fh).max(1e-3);
            BBoxXYWH::new(x, y, width, height)
        })
        .boxed()
}

/// An annotation with the given id and an arbitrary type, order and character.
pub fn arb_annotation(id: String, max_order: u32) -> BoxedStrategy<Annotation> {
    (arb_annotation_type(), 1..=max_order, arb_character())
        .prop_map(move |(kind, order, character_id)| {
            let mut draft = AnnotationDraft::new(kind, BBoxXYWH::new(1.0, 1.0, 10.0, 10.0))
                .with_order(order);
            draft.character_id = character_id;
            Annotation::from_draft(AnnotationId::new(id.clone()), &draft, ImageSize::new(100, 100))
        })
        .boxed()
}

/// A page's annotations with unique ids `a0..aN` and arbitrary orders.
pub fn arb_annotations(max_len: usize) -> BoxedStrategy<Vec<Annotation>> {
    (0..=max_len)
        .prop_flat_map(|len| {
            let max_order = (len as u32).max(1) + 2;
            (0..len)
                .map(|i| arb_annotation(format!("a{}", i), max_order))
                .collect::<Vec<_>>()
        })
        .boxed()
}

pub fn ids(annotations: &[Annotation]) -> BTreeSet<String> {
    annotations.iter().map(|a| a.id.as_str().to_string()).collect()
}

pub fn is_sorted_by_order(annotations: &[Annotation]) -> bool {
    annotations.windows(2).all(|w| w[0].order <= w[1].order)
}

//! Reading-order maintenance for the annotations of one page.
//!
//! The functions here are pure transforms over a page's annotation sequence:
//! - [`insert`] places a new annotation, sharing or shifting orders as the
//!   [`SharingPolicy`] dictates
//! - [`reorder`] renumbers the page from an ordered id list
//! - [`update`] rewrites one annotation, under an [`UpdateOrderPolicy`]
//! - [`delete`] removes one annotation and leaves the remaining orders alone
//!
//! Persisting the result is the caller's job.

mod policy;

pub use policy::{always, same_character, ShareMatcher, SharingPolicy};

use std::fmt;
use std::str::FromStr;

use crate::error::MangalabelError;
use crate::ir::{Annotation, AnnotationDraft, AnnotationId, ImageSize};

/// What [`insert`] did with the new annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// No order was requested; appended after the last position.
    Appended,
    /// The requested order was free.
    Placed,
    /// The requested order was taken, but every holder may share it.
    Shared { with: usize },
    /// Holders of the requested order and everything after it moved up by one.
    Shifted { moved: usize },
}

/// How [`update`] treats a caller-supplied order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateOrderPolicy {
    /// Write the order as given, with no conflict handling.
    #[default]
    Direct,
    /// Remove the annotation and place it again through [`insert`].
    Reinsert,
}

impl fmt::Display for UpdateOrderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOrderPolicy::Direct => f.write_str("direct"),
            UpdateOrderPolicy::Reinsert => f.write_str("reinsert"),
        }
    }
}

impl FromStr for UpdateOrderPolicy {
    type Err = MangalabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(UpdateOrderPolicy::Direct),
            "reinsert" => Ok(UpdateOrderPolicy::Reinsert),
            other => Err(MangalabelError::InvalidRequest {
                field: "update_policy".to_string(),
                message: format!("'{}' (expected 'direct' or 'reinsert')", other),
            }),
        }
    }
}

/// Inserts `new` into `annotations`.
///
/// - No `requested` order: the annotation gets `len + 1` and is appended.
/// - Requested order unused: placed with that order, nothing else changes.
/// - Requested order used, and `policy` lets the newcomer share with every
///   holder: appended with the same order.
/// - Otherwise every annotation at or after the requested order moves up by
///   one, the newcomer takes the requested order, and the sequence is
///   stably sorted by order.
///
/// Requested orders are expected below `u32::MAX`, which
/// [`AnnotationDraft::validate`] enforces; a holder already at `u32::MAX`
/// stays there when shifted.
pub fn insert(
    annotations: &mut Vec<Annotation>,
    mut new: Annotation,
    requested: Option<u32>,
    policy: &SharingPolicy,
) -> InsertOutcome {
    let Some(order) = requested else {
        new.order = next_order(annotations);
        annotations.push(new);
        return InsertOutcome::Appended;
    };
    new.order = order;

    let holders: Vec<&Annotation> = annotations.iter().filter(|a| a.order == order).collect();
    if holders.is_empty() {
        annotations.push(new);
        return InsertOutcome::Placed;
    }

    if holders.iter().all(|existing| policy.can_share(&new, existing)) {
        let with = holders.len();
        annotations.push(new);
        return InsertOutcome::Shared { with };
    }

    let mut moved = 0;
    for annotation in annotations.iter_mut().filter(|a| a.order >= order) {
        annotation.order = annotation.order.saturating_add(1);
        moved += 1;
    }
    annotations.push(new);
    // sort_by_key is stable: ties keep their relative order.
    annotations.sort_by_key(|a| a.order);
    InsertOutcome::Shifted { moved }
}

/// Order assigned to an annotation appended without a requested order.
fn next_order(annotations: &[Annotation]) -> u32 {
    u32::try_from(annotations.len()).map_or(u32::MAX, |len| len.saturating_add(1))
}

/// Renumbers a page from an ordered list of annotation ids.
///
/// The annotation named at index `i` of `ids` gets order `i + 1` and is
/// placed before any unlisted annotation. Unlisted annotations follow in
/// their original relative order, numbered on from the count of listed
/// ones. Unknown ids are ignored and a repeated id only counts at its first
/// occurrence, so the result holds every original annotation exactly once.
pub fn reorder(annotations: Vec<Annotation>, ids: &[AnnotationId]) -> Vec<Annotation> {
    let mut pending: Vec<Option<Annotation>> = annotations.into_iter().map(Some).collect();
    let mut result = Vec::with_capacity(pending.len());

    for (index, id) in ids.iter().enumerate() {
        let slot = pending
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|a| &a.id == id));
        if let Some(mut annotation) = slot.and_then(Option::take) {
            annotation.order = u32::try_from(index + 1).unwrap_or(u32::MAX);
            result.push(annotation);
        }
    }

    for mut annotation in pending.into_iter().flatten() {
        annotation.order = next_order(&result);
        result.push(annotation);
    }

    result
}

/// Rewrites the annotation `id` from `draft`.
///
/// Under [`UpdateOrderPolicy::Direct`] the draft's order is written as is
/// (or the current one kept when the draft has none). Under
/// [`UpdateOrderPolicy::Reinsert`] the annotation is taken out and placed
/// again with [`insert`] at the draft's order, or at its current order when
/// the draft has none.
///
/// Returns the updated annotation, or `None` if no annotation has that id.
pub fn update(
    annotations: &mut Vec<Annotation>,
    id: &AnnotationId,
    draft: &AnnotationDraft,
    size: ImageSize,
    policy: &SharingPolicy,
    order_policy: UpdateOrderPolicy,
) -> Option<Annotation> {
    let position = annotations.iter().position(|a| &a.id == id)?;

    match order_policy {
        UpdateOrderPolicy::Direct => {
            let annotation = &mut annotations[position];
            annotation.apply_draft(draft, size);
            Some(annotation.clone())
        }
        UpdateOrderPolicy::Reinsert => {
            let mut annotation = annotations.remove(position);
            let requested = draft.order.unwrap_or(annotation.order);
            annotation.apply_draft(draft, size);
            insert(annotations, annotation, Some(requested), policy);
            annotations.iter().find(|a| &a.id == id).cloned()
        }
    }
}

/// Removes the annotation `id`, leaving the other orders untouched.
pub fn delete(annotations: &mut Vec<Annotation>, id: &AnnotationId) -> Option<Annotation> {
    let position = annotations.iter().position(|a| &a.id == id)?;
    Some(annotations.remove(position))
}

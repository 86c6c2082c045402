//! Reading-order sharing rules.
//!
//! A [`SharingPolicy`] is a table from an (existing type, new type) pair to a
//! matcher deciding whether the two annotations may hold the same order.
//! Pairs without an entry never share.

use std::collections::HashMap;

use crate::ir::{Annotation, AnnotationType};

/// Decides whether two annotations of a registered type pair may share an order.
pub type ShareMatcher = fn(&Annotation, &Annotation) -> bool;

/// Always allows sharing.
pub fn always(_: &Annotation, _: &Annotation) -> bool {
    true
}

/// Allows sharing when both annotations name the same character.
pub fn same_character(a: &Annotation, b: &Annotation) -> bool {
    match (&a.character_id, &b.character_id) {
        (Some(left), Some(right)) => !left.is_empty() && left == right,
        _ => false,
    }
}

/// Declarative table of which annotation types may share a reading order.
#[derive(Clone)]
pub struct SharingPolicy {
    rules: HashMap<(AnnotationType, AnnotationType), ShareMatcher>,
}

impl std::fmt::Debug for SharingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pairs: Vec<_> = self.rules.keys().collect();
        pairs.sort();
        f.debug_struct("SharingPolicy").field("pairs", &pairs).finish()
    }
}

impl SharingPolicy {
    /// A policy under which nothing shares an order.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Registers a symmetric rule for the pair `(a, b)`.
    pub fn register(&mut self, a: AnnotationType, b: AnnotationType, matcher: ShareMatcher) {
        self.rules.insert((a, b), matcher);
        self.rules.insert((b, a), matcher);
    }

    /// Builder form of [`SharingPolicy::register`].
    pub fn with_rule(mut self, a: AnnotationType, b: AnnotationType, matcher: ShareMatcher) -> Self {
        self.register(a, b, matcher);
        self
    }

    /// Returns true if `new` may hold the same order as `existing`.
    pub fn can_share(&self, new: &Annotation, existing: &Annotation) -> bool {
        self.rules
            .get(&(new.kind, existing.kind))
            .is_some_and(|matcher| matcher(new, existing))
    }
}

impl Default for SharingPolicy {
    /// Sound effects share with each other; faces, persons, body parts and
    /// objects share with each other when they belong to the same character.
    fn default() -> Self {
        let mut policy =
            Self::empty().with_rule(AnnotationType::SoundEffect, AnnotationType::SoundEffect, always);

        let groupable: Vec<AnnotationType> = AnnotationType::ALL
            .iter()
            .copied()
            .filter(AnnotationType::is_groupable)
            .collect();
        for &a in &groupable {
            for &b in &groupable {
                policy.register(a, b, same_character);
            }
        }
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AnnotationDraft, AnnotationId, BBoxXYWH, ImageSize};

    fn ann(kind: AnnotationType, character: Option<&str>) -> Annotation {
        let mut draft = AnnotationDraft::new(kind, BBoxXYWH::new(0.0, 0.0, 10.0, 10.0));
        draft.character_id = character.map(str::to_string);
        Annotation::from_draft(AnnotationId::new("x"), &draft, ImageSize::new(100, 100))
    }

    #[test]
    fn test_sound_effects_share() {
        let policy = SharingPolicy::default();
        assert!(policy.can_share(
            &ann(AnnotationType::SoundEffect, None),
            &ann(AnnotationType::SoundEffect, None)
        ));
    }

    #[test]
    fn test_sound_effect_does_not_share_with_dialogue() {
        let policy = SharingPolicy::default();
        assert!(!policy.can_share(
            &ann(AnnotationType::SoundEffect, None),
            &ann(AnnotationType::Dialogue, None)
        ));
        assert!(!policy.can_share(
            &ann(AnnotationType::Dialogue, None),
            &ann(AnnotationType::Dialogue, None)
        ));
    }

    #[test]
    fn test_groupable_types_share_same_character() {
        let policy = SharingPolicy::default();
        assert!(policy.can_share(
            &ann(AnnotationType::Face, Some("c1")),
            &ann(AnnotationType::BodyPart, Some("c1"))
        ));
        assert!(policy.can_share(
            &ann(AnnotationType::Object, Some("c1")),
            &ann(AnnotationType::Person, Some("c1"))
        ));
    }

    #[test]
    fn test_groupable_types_need_matching_character() {
        let policy = SharingPolicy::default();
        assert!(!policy.can_share(
            &ann(AnnotationType::Face, Some("c1")),
            &ann(AnnotationType::Face, Some("c2"))
        ));
        assert!(!policy.can_share(
            &ann(AnnotationType::Face, None),
            &ann(AnnotationType::Face, None)
        ));
        assert!(!policy.can_share(
            &ann(AnnotationType::Face, Some("c1")),
            &ann(AnnotationType::Face, None)
        ));
        assert!(!policy.can_share(
            &ann(AnnotationType::Face, Some("")),
            &ann(AnnotationType::Face, Some(""))
        ));
    }

    #[test]
    fn test_character_match_across_non_groupable_type() {
        let policy = SharingPolicy::default();
        assert!(!policy.can_share(
            &ann(AnnotationType::Face, Some("c1")),
            &ann(AnnotationType::Dialogue, Some("c1"))
        ));
    }

    #[test]
    fn test_custom_rule_registration() {
        let policy = SharingPolicy::empty().with_rule(
            AnnotationType::Ruby,
            AnnotationType::Dialogue,
            always,
        );
        assert!(policy.can_share(
            &ann(AnnotationType::Dialogue, None),
            &ann(AnnotationType::Ruby, None)
        ));
        assert!(!policy.can_share(
            &ann(AnnotationType::SoundEffect, None),
            &ann(AnnotationType::SoundEffect, None)
        ));
    }
}

//! Newtype IDs for type-safe identification of pages and annotations.
//!
//! Using newtypes prevents accidentally mixing up different kinds of IDs
//! (e.g., passing an annotation ID where an image ID is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MangalabelError;

/// Identifier of a page image, equal to the image file stem (e.g. `00042`).
///
/// Image IDs double as record file names, so they are restricted to ASCII
/// alphanumerics, `-` and `_`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    /// Creates an ImageId after checking it is safe to use as a file stem.
    pub fn parse(id: impl Into<String>) -> Result<Self, MangalabelError> {
        let id = id.into();
        if id.is_empty() {
            return Err(MangalabelError::InvalidRequest {
                field: "image_id".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(MangalabelError::InvalidRequest {
                field: "image_id".to_string(),
                message: format!("'{}' contains characters outside [A-Za-z0-9_-]", id),
            });
        }
        Ok(Self(id))
    }

    /// Returns the underlying string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageId({})", self.0)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ImageId {
    type Err = MangalabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identifier of an annotation, unique within its page only.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(String);

impl AnnotationId {
    /// Wraps an existing annotation id.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh id of the form `anno_xxxxxxxx`.
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("anno_{}", &hex[..8]))
    }

    /// Returns the underlying string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnnotationId({})", self.0)
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnnotationId {
    fn from(id: &str) -> Self {
        AnnotationId::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_id_accepts_numeric_stems() {
        let id = ImageId::parse("00042").unwrap();
        assert_eq!(id.as_str(), "00042");
        assert_eq!(id.to_string(), "00042");
    }

    #[test]
    fn test_image_id_rejects_path_components() {
        assert!(ImageId::parse("../etc/passwd").is_err());
        assert!(ImageId::parse("a/b").is_err());
        assert!(ImageId::parse("").is_err());
    }

    #[test]
    fn test_generated_annotation_ids() {
        let a = AnnotationId::generate();
        let b = AnnotationId::generate();
        assert!(a.as_str().starts_with("anno_"));
        assert_eq!(a.as_str().len(), "anno_".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_ordering() {
        assert!(ImageId::parse("00001").unwrap() < ImageId::parse("00002").unwrap());
    }
}

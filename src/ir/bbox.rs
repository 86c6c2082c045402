//! Bounding box types in XYWH format.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use super::{Normalized, Pixel};

/// An axis-aligned bounding box as top-left corner plus size.
///
/// The `TSpace` parameter should be either [`Pixel`] or [`Normalized`],
/// so that a relative box can never be stored where a pixel box belongs.
///
/// Construction does not reject non-positive sizes; request validation and
/// the record validator report those instead.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYWH<TSpace> {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxXYWH<TSpace> {
    /// Creates a new bounding box from its top-left corner and size.
    #[inline]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            _space: PhantomData,
        }
    }

    /// Returns the right edge.
    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Returns the bottom edge.
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Returns the area of the bounding box.
    ///
    /// May be negative if the box is malformed.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Returns true if all components are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Returns true if both width and height are strictly positive.
    #[inline]
    pub fn has_positive_size(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

impl BBoxXYWH<Pixel> {
    /// Converts pixel coordinates to page-relative coordinates.
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> BBoxXYWH<Normalized> {
        BBoxXYWH::new(
            self.x / image_width,
            self.y / image_height,
            self.width / image_width,
            self.height / image_height,
        )
    }
}

impl BBoxXYWH<Normalized> {
    /// Converts page-relative coordinates back to pixel coordinates.
    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> BBoxXYWH<Pixel> {
        BBoxXYWH::new(
            self.x * image_width,
            self.y * image_height,
            self.width * image_width,
            self.height * image_height,
        )
    }
}

impl<TSpace> std::fmt::Debug for BBoxXYWH<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxXYWH")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl<TSpace> Default for BBoxXYWH<TSpace> {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

// Custom serde implementation to avoid TSpace: Serialize/Deserialize bounds
impl<TSpace> Serialize for BBoxXYWH<TSpace> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("BBoxXYWH", 4)?;
        state.serialize_field("x", &self.x)?;
        state.serialize_field("y", &self.y)?;
        state.serialize_field("width", &self.width)?;
        state.serialize_field("height", &self.height)?;
        state.end()
    }
}

impl<'de, TSpace> Deserialize<'de> for BBoxXYWH<TSpace> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct BBoxData {
            x: f64,
            y: f64,
            width: f64,
            height: f64,
        }
        let data = BBoxData::deserialize(deserializer)?;
        Ok(BBoxXYWH::new(data.x, data.y, data.width, data.height))
    }
}

/// Parses `x,y,width,height` as typed on the command line.
impl std::str::FromStr for BBoxXYWH<Pixel> {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid bbox '{}': {}", s, e))?;
        match parts.as_slice() {
            [x, y, w, h] => Ok(BBoxXYWH::new(*x, *y, *w, *h)),
            _ => Err(format!(
                "invalid bbox '{}': expected 4 comma-separated numbers",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_edges() {
        let bbox: BBoxXYWH<Pixel> = BBoxXYWH::new(10.0, 20.0, 90.0, 60.0);
        assert_eq!(bbox.right(), 100.0);
        assert_eq!(bbox.bottom(), 80.0);
        assert_eq!(bbox.area(), 5400.0);
    }

    #[test]
    fn test_bbox_positive_size() {
        assert!(BBoxXYWH::<Pixel>::new(0.0, 0.0, 1.0, 1.0).has_positive_size());
        assert!(!BBoxXYWH::<Pixel>::new(0.0, 0.0, 0.0, 1.0).has_positive_size());
        assert!(!BBoxXYWH::<Pixel>::new(0.0, 0.0, 4.0, -1.0).has_positive_size());
    }

    #[test]
    fn test_bbox_is_finite() {
        assert!(BBoxXYWH::<Pixel>::new(1.0, 2.0, 3.0, 4.0).is_finite());
        assert!(!BBoxXYWH::<Pixel>::new(f64::NAN, 2.0, 3.0, 4.0).is_finite());
        assert!(!BBoxXYWH::<Pixel>::new(1.0, 2.0, f64::INFINITY, 4.0).is_finite());
    }

    #[test]
    fn test_to_normalized() {
        let bbox: BBoxXYWH<Pixel> = BBoxXYWH::new(100.0, 50.0, 200.0, 25.0);
        let rel = bbox.to_normalized(400.0, 100.0);
        assert_eq!(rel.x, 0.25);
        assert_eq!(rel.y, 0.5);
        assert_eq!(rel.width, 0.5);
        assert_eq!(rel.height, 0.25);
    }

    #[test]
    fn test_parse_from_cli() {
        let bbox: BBoxXYWH<Pixel> = "10, 20,30,40".parse().unwrap();
        assert_eq!(bbox, BBoxXYWH::new(10.0, 20.0, 30.0, 40.0));
        assert!("1,2,3".parse::<BBoxXYWH<Pixel>>().is_err());
        assert!("a,b,c,d".parse::<BBoxXYWH<Pixel>>().is_err());
    }

    #[test]
    fn test_serde_shape() {
        let bbox: BBoxXYWH<Pixel> = BBoxXYWH::new(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&bbox).unwrap();
        assert_eq!(json, r#"{"x":1.0,"y":2.0,"width":3.0,"height":4.0}"#);
        let back: BBoxXYWH<Pixel> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bbox);
    }
}

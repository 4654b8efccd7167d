//! Annotation data model
//!
//! Bounding boxes are axis-aligned rectangles in pixel space. Once persisted,
//! boxes are always expressed in the image's natural (full-resolution) pixel
//! coordinates, and the entry carries those natural dimensions alongside.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Label assigned to newly drawn boxes
pub const DEFAULT_LABEL: &str = "defect";

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

/// A point in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pixel dimensions of an image (natural or as displayed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both dimensions are non-zero
    pub fn is_positive(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Rectangular region marking a defect
///
/// `x`/`y` is the top-left corner, `w`/`h` are non-negative extents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    #[serde(default = "default_label")]
    pub label: String,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x,
            y,
            w,
            h,
            label: default_label(),
        }
    }

    /// Box spanned by two opposite corners, in whatever order they were given
    pub fn from_corners(start: Point, end: Point) -> Self {
        Self::new(
            start.x.min(end.x),
            start.y.min(end.y),
            (end.x - start.x).abs(),
            (end.y - start.y).abs(),
        )
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    /// Zero width or zero height: covers no visible region
    pub fn is_degenerate(&self) -> bool {
        self.w == 0.0 || self.h == 0.0
    }

    /// Multiply every coordinate by a per-axis factor
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            w: self.w * sx,
            h: self.h * sy,
            label: self.label.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        let finite = [self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite());
        if !finite {
            return Err(Error::InvalidInput(
                "Bounding box coordinates must be finite numbers".to_string(),
            ));
        }
        if self.w < 0.0 || self.h < 0.0 {
            return Err(Error::InvalidInput(format!(
                "Bounding box extents must be non-negative (w={}, h={})",
                self.w, self.h
            )));
        }
        Ok(())
    }
}

/// Persisted annotation state for one image
///
/// `width`/`height` are the natural pixel dimensions captured when the entry
/// was saved. They may be absent only when `boxes` is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationEntry {
    #[serde(default)]
    pub boxes: Vec<BoundingBox>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl AnnotationEntry {
    pub fn new(boxes: Vec<BoundingBox>, natural: Option<Size>) -> Self {
        Self {
            boxes,
            width: natural.map(|s| s.width),
            height: natural.map(|s| s.height),
        }
    }

    /// Natural dimensions, if both are recorded
    pub fn natural_size(&self) -> Option<Size> {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some(Size { width, height }),
            _ => None,
        }
    }

    /// Check the entry can be normalized later
    ///
    /// Non-empty `boxes` requires positive `width` and `height`.
    pub fn validate(&self) -> Result<()> {
        for b in &self.boxes {
            b.validate()?;
        }

        if self.boxes.is_empty() {
            return Ok(());
        }

        match self.natural_size() {
            Some(size) if size.is_positive() => Ok(()),
            _ => Err(Error::InvalidInput(
                "Annotation entry with boxes must record positive image width and height"
                    .to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners_any_order() {
        let a = BoundingBox::from_corners(Point::new(30.0, 40.0), Point::new(10.0, 5.0));
        assert_eq!(a.x, 10.0);
        assert_eq!(a.y, 5.0);
        assert_eq!(a.w, 20.0);
        assert_eq!(a.h, 35.0);
        assert_eq!(a.label, DEFAULT_LABEL);

        let b = BoundingBox::from_corners(Point::new(10.0, 5.0), Point::new(30.0, 40.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_degenerate_box() {
        let b = BoundingBox::from_corners(Point::new(10.0, 10.0), Point::new(10.0, 50.0));
        assert!(b.is_degenerate());
        assert_eq!(b.area(), 0.0);
    }

    #[test]
    fn test_label_defaults_when_missing() {
        let b: BoundingBox = serde_json::from_str(r#"{"x":1,"y":2,"w":3,"h":4}"#).unwrap();
        assert_eq!(b.label, "defect");
    }

    #[test]
    fn test_entry_with_boxes_requires_dimensions() {
        let entry = AnnotationEntry::new(vec![BoundingBox::new(0.0, 0.0, 5.0, 5.0)], None);
        assert!(entry.validate().is_err());

        let entry = AnnotationEntry {
            boxes: vec![BoundingBox::new(0.0, 0.0, 5.0, 5.0)],
            width: Some(0),
            height: Some(100),
        };
        assert!(entry.validate().is_err());

        let entry = AnnotationEntry::new(
            vec![BoundingBox::new(0.0, 0.0, 5.0, 5.0)],
            Some(Size::new(640, 480)),
        );
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_empty_entry_without_dimensions_is_valid() {
        let entry = AnnotationEntry::default();
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_negative_extent_rejected() {
        let entry = AnnotationEntry::new(
            vec![BoundingBox::new(0.0, 0.0, -5.0, 5.0)],
            Some(Size::new(10, 10)),
        );
        assert!(entry.validate().is_err());
    }
}

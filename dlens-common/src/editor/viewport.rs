//! Mapping between displayed and natural image coordinates
//!
//! Pointer positions arrive in the coordinate space of the image as rendered
//! on screen. Boxes are persisted in natural-resolution pixels, so every
//! drawn box is scaled by `natural / displayed` on each axis before it is
//! stored.

use crate::annotation::{BoundingBox, Size};

use super::EditorError;

/// Natural and displayed size of the image currently open in an editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    natural: Size,
    displayed: Size,
}

impl Viewport {
    pub fn new(natural: Size, displayed: Size) -> Result<Self, EditorError> {
        if !natural.is_positive() {
            return Err(EditorError::InvalidGeometry(format!(
                "natural size must be positive, got {}x{}",
                natural.width, natural.height
            )));
        }
        if !displayed.is_positive() {
            return Err(EditorError::InvalidGeometry(format!(
                "displayed size must be positive, got {}x{}",
                displayed.width, displayed.height
            )));
        }
        Ok(Self { natural, displayed })
    }

    /// Image rendered at 1:1 scale
    pub fn unscaled(natural: Size) -> Result<Self, EditorError> {
        Self::new(natural, natural)
    }

    pub fn natural(&self) -> Size {
        self.natural
    }

    pub fn displayed(&self) -> Size {
        self.displayed
    }

    pub fn scale_x(&self) -> f64 {
        self.natural.width as f64 / self.displayed.width as f64
    }

    pub fn scale_y(&self) -> f64 {
        self.natural.height as f64 / self.displayed.height as f64
    }

    /// Display-space box → natural-resolution box
    pub fn to_natural(&self, b: &BoundingBox) -> BoundingBox {
        b.scaled(self.scale_x(), self.scale_y())
    }

    /// Natural-resolution box → display-space box (for rendering)
    pub fn to_display(&self, b: &BoundingBox) -> BoundingBox {
        b.scaled(1.0 / self.scale_x(), 1.0 / self.scale_y())
    }
}

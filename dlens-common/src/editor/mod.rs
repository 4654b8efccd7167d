//! Bounding-box annotation editor
//!
//! An [`AnnotationEditor`] is one editing session over one image. It loads the
//! previously saved entry on open, collects draw/remove edits in memory, and
//! writes the whole entry back on [`AnnotationEditor::save`]. Dropping or
//! cancelling the session discards unsaved edits without touching the store.
//!
//! A session is owned by a single caller; edits take `&mut self` and need no
//! locking.

mod store;
mod viewport;

pub use store::{AnnotationStore, MemoryAnnotationStore};
pub use viewport::Viewport;

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::annotation::{AnnotationEntry, BoundingBox, Point, Size};

/// Editor errors
#[derive(Debug, Error)]
pub enum EditorError {
    /// Drawing or saving boxes needs the image geometry first
    #[error("Image not loaded: natural and displayed size are unknown")]
    ImageNotLoaded,

    #[error("Invalid image geometry: {0}")]
    InvalidGeometry(String),

    #[error(transparent)]
    Store(#[from] crate::Error),
}

/// Result of a completed save, returned so callers can refresh
/// labeled-state immediately
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub image_key: String,
    pub box_count: usize,
    pub natural_size: Option<Size>,
}

/// Editing session for one image
pub struct AnnotationEditor {
    store: Arc<dyn AnnotationStore>,
    image_key: String,
    image_url: String,
    boxes: Vec<BoundingBox>,
    viewport: Option<Viewport>,
    dirty: bool,
}

impl std::fmt::Debug for AnnotationEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationEditor")
            .field("image_key", &self.image_key)
            .field("image_url", &self.image_url)
            .field("boxes", &self.boxes)
            .field("viewport", &self.viewport)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl AnnotationEditor {
    /// Open a session, loading any saved boxes for `image_key`
    pub async fn open(
        store: Arc<dyn AnnotationStore>,
        image_key: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Result<Self, EditorError> {
        let image_key = image_key.into();
        let boxes = store
            .load_entry(&image_key)
            .await?
            .map(|entry| entry.boxes)
            .unwrap_or_default();

        debug!(image_key = %image_key, boxes = boxes.len(), "Annotation editor opened");

        Ok(Self {
            store,
            image_key,
            image_url: image_url.into(),
            boxes,
            viewport: None,
            dirty: false,
        })
    }

    /// Record the image geometry once it has been decoded and laid out
    ///
    /// May be called again when the display size changes (e.g. resize);
    /// stored boxes are in natural coordinates and are unaffected.
    pub fn image_loaded(&mut self, natural: Size, displayed: Size) -> Result<(), EditorError> {
        self.viewport = Some(Viewport::new(natural, displayed)?);
        Ok(())
    }

    pub fn image_key(&self) -> &str {
        &self.image_key
    }

    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Current boxes in natural-resolution coordinates
    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    /// Current boxes projected into display coordinates for rendering
    pub fn display_boxes(&self) -> Result<Vec<BoundingBox>, EditorError> {
        let viewport = self.viewport.ok_or(EditorError::ImageNotLoaded)?;
        Ok(self.boxes.iter().map(|b| viewport.to_display(b)).collect())
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Add a box spanned by two corners given in display coordinates
    ///
    /// Returns the stored (natural-coordinate) box, or `None` when the drag
    /// covered zero width or height; such draws are discarded.
    pub fn draw_box(&mut self, start: Point, end: Point) -> Result<Option<&BoundingBox>, EditorError> {
        let viewport = self.viewport.ok_or(EditorError::ImageNotLoaded)?;

        let drawn = BoundingBox::from_corners(start, end);
        if drawn.is_degenerate() {
            debug!(image_key = %self.image_key, "Discarding zero-area box");
            return Ok(None);
        }

        self.boxes.push(viewport.to_natural(&drawn));
        self.dirty = true;
        Ok(self.boxes.last())
    }

    /// Remove the box at `index`; out-of-range indexes are ignored
    pub fn remove_box(&mut self, index: usize) -> Option<BoundingBox> {
        if index >= self.boxes.len() {
            return None;
        }
        self.dirty = true;
        Some(self.boxes.remove(index))
    }

    /// Rename the box at `index`; out-of-range indexes are ignored
    pub fn set_label(&mut self, index: usize, label: impl Into<String>) -> bool {
        match self.boxes.get_mut(index) {
            Some(b) => {
                b.label = label.into();
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Persist boxes with the natural image size and mark the image labeled
    ///
    /// Saving zero boxes is allowed and still marks the image as reviewed.
    pub async fn save(&mut self) -> Result<SaveOutcome, EditorError> {
        let natural = self.viewport.map(|vp| vp.natural());
        if natural.is_none() && !self.boxes.is_empty() {
            return Err(EditorError::ImageNotLoaded);
        }

        let entry = AnnotationEntry::new(self.boxes.clone(), natural);
        entry.validate()?;

        self.store.save_entry(&self.image_key, &entry).await?;
        self.store.mark_labeled(&self.image_key).await?;
        self.dirty = false;

        info!(
            image_key = %self.image_key,
            boxes = entry.boxes.len(),
            width = ?entry.width,
            height = ?entry.height,
            "Annotations saved"
        );

        Ok(SaveOutcome {
            image_key: self.image_key.clone(),
            box_count: entry.boxes.len(),
            natural_size: natural,
        })
    }

    /// Discard unsaved edits; the store is left untouched
    pub fn cancel(self) {
        if self.dirty {
            debug!(image_key = %self.image_key, "Discarding unsaved annotation edits");
        }
    }

    /// Close the session (same as [`cancel`](Self::cancel) for unsaved edits)
    pub fn close(self) {
        self.cancel()
    }
}

/// First candidate image not yet labeled
///
/// Falls back to the first candidate when every image is labeled, and
/// returns `None` only for an empty candidate list.
pub async fn next_unlabeled(
    store: &dyn AnnotationStore,
    candidates: &[String],
) -> crate::Result<Option<String>> {
    for key in candidates {
        if !store.is_labeled(key).await? {
            return Ok(Some(key.clone()));
        }
    }
    Ok(candidates.first().cloned())
}

//! # dlens Common Library
//!
//! Shared code for the dlens services and tools:
//! - Annotation data model (bounding boxes, per-image entries)
//! - YOLO label formatting
//! - Annotation editor sessions and the annotation store trait
//! - Configuration loading and root folder resolution
//! - Database initialization and row models

pub mod annotation;
pub mod config;
pub mod db;
pub mod editor;
pub mod error;
pub mod yolo;

pub use annotation::{AnnotationEntry, BoundingBox, Point, Size};
pub use error::{Error, Result};

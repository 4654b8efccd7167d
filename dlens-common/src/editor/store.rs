//! Annotation persistence seam
//!
//! Entries are keyed by image identity and overwritten wholesale on each
//! save. There is no revision check: concurrent writers to the same key
//! resolve as last-writer-wins, which assumes a single operator per image.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

use crate::annotation::AnnotationEntry;
use crate::Result;

/// Keyed storage for annotation entries and the labeled-image set
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Saved entry for an image, `None` if never saved
    async fn load_entry(&self, image_key: &str) -> Result<Option<AnnotationEntry>>;

    /// Replace the entry for an image
    async fn save_entry(&self, image_key: &str, entry: &AnnotationEntry) -> Result<()>;

    /// Add an image to the labeled set (idempotent)
    async fn mark_labeled(&self, image_key: &str) -> Result<()>;

    async fn is_labeled(&self, image_key: &str) -> Result<bool>;

    /// All labeled image keys, sorted
    async fn labeled_images(&self) -> Result<Vec<String>>;
}

/// In-process store, used by tests and offline tools
#[derive(Debug, Default)]
pub struct MemoryAnnotationStore {
    entries: RwLock<HashMap<String, AnnotationEntry>>,
    labeled: RwLock<BTreeSet<String>>,
}

impl MemoryAnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnnotationStore for MemoryAnnotationStore {
    async fn load_entry(&self, image_key: &str) -> Result<Option<AnnotationEntry>> {
        Ok(self.entries.read().await.get(image_key).cloned())
    }

    async fn save_entry(&self, image_key: &str, entry: &AnnotationEntry) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(image_key.to_string(), entry.clone());
        Ok(())
    }

    async fn mark_labeled(&self, image_key: &str) -> Result<()> {
        self.labeled.write().await.insert(image_key.to_string());
        Ok(())
    }

    async fn is_labeled(&self, image_key: &str) -> Result<bool> {
        Ok(self.labeled.read().await.contains(image_key))
    }

    async fn labeled_images(&self) -> Result<Vec<String>> {
        Ok(self.labeled.read().await.iter().cloned().collect())
    }
}

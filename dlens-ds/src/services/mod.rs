//! Services: object storage, image fetching and dataset export

pub mod exporter;
pub mod image_source;
pub mod object_store;

pub use exporter::{DatasetExporter, ExportError, ExportOutcome, ExportRequest};
pub use image_source::{FetchError, ImageSource, ServiceImageSource};
pub use object_store::{
    FsObjectStore, HttpObjectStore, MemoryObjectStore, ObjectStore, ObjectStoreError,
    StoredObject,
};

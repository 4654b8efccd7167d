//! Database access for dlens-ds
//!
//! One module per table. Functions take the pool explicitly and return
//! `sqlx::Result`; schema creation lives in `dlens_common::db`.

pub mod annotations;
pub mod datasets;
pub mod images;
pub mod projects;

pub use annotations::SqliteAnnotationStore;

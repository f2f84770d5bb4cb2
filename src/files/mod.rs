//! Uploaded file metadata and the byte store behind it.

pub mod blob;
pub mod metadata;

pub use blob::{Blob, BlobError, BlobStore, FsBlobStore};
pub use metadata::{FileRecord, MetadataStore};

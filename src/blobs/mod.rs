//! Blob storage for entry content.
//!
//! Each entry's raw bytes live in one file named by its decimal id. New
//! content is streamed into a temporary file first and renamed into place
//! once an id has been assigned.

mod storage;

pub(crate) use storage::TEMP_PREFIX;
pub use storage::{BlobStorage, PendingBlob, DEFAULT_HEAD_LINES};

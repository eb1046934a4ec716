//! # Snipvault
//!
//! An embedded content store for a snippet-sharing service.
//!
//! ## Core Concepts
//!
//! - **Entries**: Immutable metadata records with a sequential id and an
//!   unguessable share token
//! - **Blobs**: Raw entry content, one file per id, written via temp file and
//!   rename
//! - **Index**: A JSON document mapping ids and share tokens to entries
//! - **Pages**: Bidirectional pagination over the id sequence
//!
//! ## Example
//!
//! ```no_run
//! use snipvault::{EntryInput, Store, StoreConfig};
//!
//! # fn main() -> snipvault::Result<()> {
//! let store = Store::open_or_create(StoreConfig {
//!     path: "./snippets".into(),
//!     ..Default::default()
//! })?;
//!
//! let entry = store.create_entry_from_bytes(
//!     EntryInput::new("Rust", "203.0.113.7"),
//!     b"fn main() {\n    println!(\"hi\");\n}\n",
//! )?;
//!
//! let (_, content) = store.read_entry(&entry.share_id)?;
//! assert_eq!(content.len(), 34);
//! println!("{}", store.head(entry.id)?);
//! # Ok(())
//! # }
//! ```

pub mod blobs;
pub mod entries;
pub mod error;
pub mod pagination;
pub mod store;
pub mod types;

// Re-exports
pub use blobs::{BlobStorage, PendingBlob, DEFAULT_HEAD_LINES};
pub use entries::{EntryIndex, INDEX_FILENAME};
pub use error::{Result, StoreError};
pub use pagination::{Page, PageQuery, DEFAULT_PAGE_SIZE};
pub use store::{Store, StoreConfig, SweepReport};
pub use types::*;

//! Entry metadata index.

mod index;

pub use index::{EntryIndex, INDEX_FILENAME};

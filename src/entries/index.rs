//! Entry index mapping ids and share tokens to metadata.

use crate::blobs::TEMP_PREFIX;
use crate::error::{Result, StoreError};
use crate::types::{Entry, EntryId, ShareToken};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{BufWriter, Write};
use std::ops::Bound;
use std::path::Path;

/// File name of the index document inside a store directory.
pub const INDEX_FILENAME: &str = "index.json";

/// In-memory entry index, mirrored to a single JSON document.
///
/// Pure data: callers hold the store lock and call [`EntryIndex::persist`]
/// after mutating.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryIndex {
    /// Entry metadata by id.
    entries_by_id: BTreeMap<EntryId, Entry>,

    /// Share token to id.
    id_by_share_token: HashMap<ShareToken, EntryId>,

    /// Next id to assign.
    next_id: EntryId,
}

impl EntryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate an index document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;

        let index: EntryIndex = serde_json::from_slice(&data).map_err(|e| {
            StoreError::CorruptIndex(format!("{}: {}", path.display(), e))
        })?;
        index.validate()?;

        Ok(index)
    }

    /// Check that the two mappings and the counter agree with each other.
    pub fn validate(&self) -> Result<()> {
        if self.entries_by_id.len() != self.id_by_share_token.len() {
            return Err(StoreError::CorruptIndex(format!(
                "{} entries but {} share tokens",
                self.entries_by_id.len(),
                self.id_by_share_token.len()
            )));
        }

        for (id, entry) in &self.entries_by_id {
            if *id != entry.id {
                return Err(StoreError::CorruptIndex(format!(
                    "entry stored under {} claims id {}",
                    id, entry.id
                )));
            }
            if self.id_by_share_token.get(&entry.share_id) != Some(id) {
                return Err(StoreError::CorruptIndex(format!(
                    "share token of entry {} does not map back to it",
                    id
                )));
            }
        }

        if let Some(max) = self.entries_by_id.keys().next_back() {
            if *max >= self.next_id {
                return Err(StoreError::CorruptIndex(format!(
                    "entry {} is not below next id {}",
                    max, self.next_id
                )));
            }
        }

        Ok(())
    }

    /// Write the whole document next to `path`, then rename it over `path`.
    ///
    /// Readers of the file see either the old or the new document.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let file = tempfile::Builder::new()
            .prefix(&format!("{}index-", TEMP_PREFIX))
            .tempfile_in(dir)?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;

        let file = writer.into_inner().map_err(|e| StoreError::Io(e.into_error()))?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| StoreError::Io(e.error))?;

        Ok(())
    }

    /// Get an entry by id.
    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries_by_id.get(&id)
    }

    /// Get an entry by share token.
    pub fn get_by_share_token(&self, token: &ShareToken) -> Option<&Entry> {
        self.id_by_share_token
            .get(token)
            .and_then(|id| self.entries_by_id.get(id))
    }

    /// Get the id a share token maps to.
    pub fn id_for_share_token(&self, token: &ShareToken) -> Option<EntryId> {
        self.id_by_share_token.get(token).copied()
    }

    /// Check whether a share token is taken.
    pub fn contains_share_token(&self, token: &ShareToken) -> bool {
        self.id_by_share_token.contains_key(token)
    }

    /// Take the next id and advance the counter.
    pub fn allocate_id(&mut self) -> EntryId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    /// The id the next allocation will return.
    pub fn next_id(&self) -> EntryId {
        self.next_id
    }

    /// Add an entry to both mappings.
    pub fn insert(&mut self, entry: Entry) {
        self.id_by_share_token.insert(entry.share_id.clone(), entry.id);
        self.entries_by_id.insert(entry.id, entry);
    }

    /// Remove an entry from both mappings, returning it.
    pub fn remove(&mut self, id: EntryId) -> Option<Entry> {
        let entry = self.entries_by_id.remove(&id)?;
        self.id_by_share_token.remove(&entry.share_id);
        Some(entry)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries_by_id.is_empty()
    }

    /// All indexed ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.entries_by_id.keys().copied()
    }

    /// The `count` entries with the highest ids, ascending.
    pub fn latest(&self, count: usize) -> Vec<Entry> {
        match self.next_id.prev() {
            Some(last) => self.before(last, count),
            None => Vec::new(),
        }
    }

    /// Up to `count` entries with id at or below `start`, nearest first,
    /// returned ascending.
    pub fn before(&self, start: EntryId, count: usize) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self
            .entries_by_id
            .range(..=start)
            .rev()
            .take(count)
            .map(|(_, entry)| entry.clone())
            .collect();
        entries.reverse();
        entries
    }

    /// Up to `count` entries with id at or above `start`, nearest first,
    /// returned ascending.
    pub fn after(&self, start: EntryId, count: usize) -> Vec<Entry> {
        if start >= self.next_id {
            return Vec::new();
        }
        self.entries_by_id
            .range(start..self.next_id)
            .take(count)
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    /// Whether any entry has an id strictly below `id`.
    pub fn has_entries_below(&self, id: EntryId) -> bool {
        self.entries_by_id.range(..id).next_back().is_some()
    }

    /// Whether any entry has an id strictly above `id`.
    pub fn has_entries_above(&self, id: EntryId) -> bool {
        self.entries_by_id
            .range((Bound::Excluded(id), Bound::Unbounded))
            .next()
            .is_some()
    }
}

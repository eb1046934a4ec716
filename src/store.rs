//! Main Store struct tying the blob storage and the entry index together.

use crate::blobs::{BlobStorage, DEFAULT_HEAD_LINES};
use crate::entries::{EntryIndex, INDEX_FILENAME};
use crate::error::{Result, StoreError};
use crate::pagination::{build_page, Page, PageQuery};
use crate::types::{Entry, EntryId, EntryInput, ShareToken, StoreStats};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the advisory lock file inside a store directory.
const LOCK_FILENAME: &str = "LOCK";

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory holding the index and the blobs.
    pub path: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Lines shown by [`Store::head`].
    pub head_lines: usize,

    /// Head preview cache size (number of entries, 0 disables).
    pub head_cache_size: usize,

    /// Remove leftover temp files and unindexed blobs when opening.
    pub sweep_on_open: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./store"),
            create_if_missing: true,
            head_lines: DEFAULT_HEAD_LINES,
            head_cache_size: 256,
            sweep_on_open: true,
        }
    }
}

/// What an orphan sweep removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Blob files with no index entry.
    pub orphan_blobs: usize,
    /// Temp files from interrupted writes.
    pub temp_files: usize,
}

/// The content store.
///
/// Every mutation of the index happens under one write lock; reads share the
/// lock only for their index lookups. Blob content is written before the
/// lock is taken and deleted after it is released.
pub struct Store {
    /// Store configuration.
    config: StoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Blob storage.
    blobs: BlobStorage,

    /// Entry index, the only shared mutable state.
    index: RwLock<EntryIndex>,
}

impl Store {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        if config.path.exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new store. Fails if the directory already exists.
    pub fn create(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::create_dir(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;

        let index = EntryIndex::new();
        index.persist(config.path.join(INDEX_FILENAME))?;

        let blobs = BlobStorage::new(&config.path, config.head_cache_size)?;

        info!(path = %config.path.display(), "created store");

        Ok(Self {
            config,
            _lock_file: lock_file,
            blobs,
            index: RwLock::new(index),
        })
    }

    /// Open an existing store.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let metadata = match fs::metadata(&config.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotInitialized)
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_dir() {
            return Err(StoreError::NotADirectory(config.path));
        }

        let lock_file = Self::acquire_lock(&config.path)?;

        let index_path = config.path.join(INDEX_FILENAME);
        if !index_path.exists() {
            return Err(StoreError::NotInitialized);
        }
        let index = EntryIndex::load(&index_path)?;

        let blobs = BlobStorage::new(&config.path, config.head_cache_size)?;

        let store = Self {
            config,
            _lock_file: lock_file,
            blobs,
            index: RwLock::new(index),
        };

        if store.config.sweep_on_open {
            let temp_files = store.blobs.remove_temp_files()?;
            let report = SweepReport {
                temp_files,
                ..store.sweep_orphans()?
            };
            store.check_blobs();
            if report != SweepReport::default() {
                info!(
                    orphan_blobs = report.orphan_blobs,
                    temp_files = report.temp_files,
                    "swept store directory"
                );
            }
        }

        info!(
            path = %store.config.path.display(),
            entries = store.index.read().len(),
            "opened store"
        );

        Ok(store)
    }

    // --- Entry Operations ---

    /// Store new content and return its metadata.
    ///
    /// The content is streamed to a temporary file before any lock is taken.
    /// The id is consumed even when the blob cannot be moved into place, so
    /// ids are never handed out twice. If the index cannot be persisted, the
    /// entry is rolled back and its blob removed.
    pub fn create_entry<R: Read>(&self, input: EntryInput, content: R) -> Result<Entry> {
        let pending = self.blobs.write(content)?;
        let line_count = pending.line_count();

        let mut index = self.index.write();

        let share_id = loop {
            let token = ShareToken::generate();
            if !index.contains_share_token(&token) {
                break token;
            }
            warn!("share token collision, regenerating");
        };
        let id = index.allocate_id();

        self.blobs.commit(pending, id)?;

        let entry = input.into_entry(id, share_id, line_count);
        index.insert(entry.clone());

        if let Err(e) = index.persist(self.index_path()) {
            warn!(%id, error = %e, "index persist failed, rolling back create");
            index.remove(id);
            self.blobs.remove(id);
            return Err(e);
        }

        drop(index);
        debug!(%id, lines = line_count, "created entry");
        Ok(entry)
    }

    /// Store in-memory content.
    pub fn create_entry_from_bytes(&self, input: EntryInput, content: &[u8]) -> Result<Entry> {
        self.create_entry(input, content)
    }

    /// Delete an entry and its blob.
    ///
    /// The index is committed first; the blob is removed afterwards, outside
    /// the lock, and a failure there only leaves an unreferenced file.
    pub fn delete_entry(&self, entry: &Entry) -> Result<()> {
        let id = entry.id;
        let mut index = self.index.write();

        let removed = index.remove(id).ok_or(StoreError::EntryNotFound(id))?;

        if let Err(e) = index.persist(self.index_path()) {
            warn!(%id, error = %e, "index persist failed, rolling back delete");
            index.insert(removed);
            return Err(e);
        }

        drop(index);
        self.blobs.remove(id);
        debug!(%id, "deleted entry");
        Ok(())
    }

    /// Resolve a share token and open the entry's content for reading.
    pub fn open_entry(&self, token: &ShareToken) -> Result<(Entry, File)> {
        let index = self.index.read();

        let id = index
            .id_for_share_token(token)
            .ok_or_else(|| StoreError::ShareTokenNotFound(token.clone()))?;
        let entry = index.get(id).cloned().ok_or(StoreError::EntryNotFound(id))?;
        let file = self.blobs.open(id)?;

        Ok((entry, file))
    }

    /// Resolve a share token and read the entry's whole content.
    pub fn read_entry(&self, token: &ShareToken) -> Result<(Entry, Vec<u8>)> {
        let (entry, mut file) = self.open_entry(token)?;
        let mut content = Vec::with_capacity(file.metadata().map(|m| m.len() as usize).unwrap_or(0));
        file.read_to_end(&mut content)?;
        Ok((entry, content))
    }

    /// Preview of an entry's first lines, per [`StoreConfig::head_lines`].
    pub fn head(&self, id: EntryId) -> Result<String> {
        self.head_lines(id, self.config.head_lines)
    }

    /// Preview of at most `max_lines` lines of an entry.
    pub fn head_lines(&self, id: EntryId, max_lines: usize) -> Result<String> {
        if self.index.read().get(id).is_none() {
            return Err(StoreError::EntryNotFound(id));
        }
        self.blobs.head(id, max_lines)
    }

    /// Get an entry by id.
    pub fn entry(&self, id: EntryId) -> Option<Entry> {
        self.index.read().get(id).cloned()
    }

    /// Get an entry by share token.
    pub fn entry_by_share_token(&self, token: &ShareToken) -> Option<Entry> {
        self.index.read().get_by_share_token(token).cloned()
    }

    // --- Pagination ---

    /// The `count` most recent entries, ascending by id.
    pub fn latest_entries(&self, count: usize) -> Vec<Entry> {
        self.index.read().latest(count)
    }

    /// Up to `count` entries at or below `start`, ascending by id.
    pub fn entries_before(&self, start: EntryId, count: usize) -> Vec<Entry> {
        self.index.read().before(start, count)
    }

    /// Up to `count` entries at or above `start`, ascending by id.
    pub fn entries_after(&self, start: EntryId, count: usize) -> Vec<Entry> {
        self.index.read().after(start, count)
    }

    /// A listing page with older/newer flags, from one consistent view.
    pub fn page(&self, query: PageQuery, count: usize) -> Page {
        build_page(&self.index.read(), query, count)
    }

    // --- Store Operations ---

    /// Delete blob files that no index entry refers to.
    ///
    /// Runs under the write lock, so no create can be between moving its
    /// blob into place and indexing it.
    pub fn sweep_orphans(&self) -> Result<SweepReport> {
        let index = self.index.write();

        let mut report = SweepReport::default();
        for id in self.blobs.list()? {
            if index.get(id).is_none() && self.blobs.remove(id) {
                report.orphan_blobs += 1;
            }
        }

        if report.orphan_blobs > 0 {
            debug!(count = report.orphan_blobs, "removed orphan blobs");
        }
        Ok(report)
    }

    /// Get store statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        let (entry_count, next_id) = {
            let index = self.index.read();
            (index.len() as u64, index.next_id().0)
        };

        Ok(StoreStats {
            entry_count,
            next_id,
            blob_bytes: self.blobs.total_size()?,
        })
    }

    /// Get the store path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // --- Private Helpers ---

    fn index_path(&self) -> PathBuf {
        self.config.path.join(INDEX_FILENAME)
    }

    /// Log indexed entries whose blob is gone. There is no repair.
    fn check_blobs(&self) {
        let index = self.index.read();
        let missing: Vec<EntryId> = index.ids().filter(|id| !self.blobs.exists(*id)).collect();
        if !missing.is_empty() {
            warn!(count = missing.len(), ids = ?missing, "indexed entries without blob");
        }
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.join(LOCK_FILENAME);
        let lock_file = File::create(lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }
}

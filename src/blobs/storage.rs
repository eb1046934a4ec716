//! Blob storage implementation.

use crate::error::{Result, StoreError};
use crate::types::EntryId;
use lru::LruCache;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Prefix shared by every transient file the store creates.
pub(crate) const TEMP_PREFIX: &str = ".tmp-";

/// Default number of lines in a head preview.
pub const DEFAULT_HEAD_LINES: usize = 5;

/// Chunk size used while copying uploads.
const COPY_BUFFER_SIZE: usize = 0x1000;

/// Cached head preview.
#[derive(Clone)]
struct CachedHead {
    max_lines: usize,
    preview: String,
}

/// Uploaded content that has been written to disk but not yet given an id.
///
/// Dropping it removes the temporary file.
pub struct PendingBlob {
    file: NamedTempFile,
    line_count: u64,
    size: u64,
}

impl PendingBlob {
    /// Number of newline bytes in the content.
    pub fn line_count(&self) -> u64 {
        self.line_count
    }

    /// Content length in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Location of the temporary file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Blob storage addressed by entry id.
///
/// Each blob is a plain file named by the decimal id, holding the raw content.
pub struct BlobStorage {
    /// Directory holding the blob files.
    path: PathBuf,

    /// LRU cache of rendered head previews, absent when disabled.
    heads: Option<Mutex<LruCache<EntryId, CachedHead>>>,
}

impl BlobStorage {
    /// Create a blob storage rooted at the given directory.
    ///
    /// A `head_cache_size` of zero disables preview caching.
    pub fn new(path: impl AsRef<Path>, head_cache_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let heads = NonZeroUsize::new(head_cache_size).map(|n| Mutex::new(LruCache::new(n)));

        Ok(Self { path, heads })
    }

    /// Stream content into a fresh temporary file, counting lines as it goes.
    ///
    /// The temporary file lives next to the final blobs so that `commit` is a
    /// same-filesystem rename. On failure the temporary file is removed.
    pub fn write<R: Read>(&self, mut reader: R) -> Result<PendingBlob> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}blob-", TEMP_PREFIX))
            .tempfile_in(&self.path)?;

        let mut buf = [0u8; COPY_BUFFER_SIZE];
        let mut line_count = 0u64;
        let mut size = 0u64;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            let chunk = &buf[..n];
            file.write_all(chunk)?;
            line_count += chunk.iter().filter(|&&b| b == b'\n').count() as u64;
            size += n as u64;
        }

        file.as_file().sync_all()?;

        Ok(PendingBlob {
            file,
            line_count,
            size,
        })
    }

    /// Atomically move a pending blob to its final name.
    ///
    /// Once this returns `Ok` the content is durably associated with `id`.
    /// On failure the temporary file is removed.
    pub fn commit(&self, pending: PendingBlob, id: EntryId) -> Result<()> {
        let target = self.blob_path(id);
        pending
            .file
            .persist(&target)
            .map_err(|e| StoreError::Io(e.error))?;
        debug!(%id, bytes = pending.size, "committed blob");
        Ok(())
    }

    /// Open a blob for streaming reads.
    pub fn open(&self, id: EntryId) -> Result<File> {
        File::open(self.blob_path(id)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::BlobNotFound(id),
            _ => StoreError::Io(e),
        })
    }

    /// Read a whole blob into memory.
    pub fn read(&self, id: EntryId) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        self.open(id)?.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Read at most `max_lines` lines from the start of a blob.
    ///
    /// Lines are joined with `\n` and the result carries no trailing newline.
    /// A final line without a newline is kept.
    pub fn head(&self, id: EntryId, max_lines: usize) -> Result<String> {
        if let Some(cache) = &self.heads {
            if let Some(cached) = cache.lock().get(&id) {
                if cached.max_lines == max_lines {
                    return Ok(cached.preview.clone());
                }
            }
        }

        let mut reader = BufReader::new(self.open(id)?);
        let mut lines = Vec::with_capacity(max_lines);
        let mut line = Vec::new();

        for _ in 0..max_lines {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            let terminated = line.last() == Some(&b'\n');
            if terminated {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
            if !terminated {
                break;
            }
        }

        let preview = lines.join("\n");

        if let Some(cache) = &self.heads {
            cache.lock().put(
                id,
                CachedHead {
                    max_lines,
                    preview: preview.clone(),
                },
            );
        }

        Ok(preview)
    }

    /// Check if a blob exists.
    pub fn exists(&self, id: EntryId) -> bool {
        self.blob_path(id).is_file()
    }

    /// Delete a blob, best effort.
    ///
    /// Failures are logged and reported as `false`; they never propagate.
    pub fn remove(&self, id: EntryId) -> bool {
        if let Some(cache) = &self.heads {
            cache.lock().pop(&id);
        }

        match fs::remove_file(self.blob_path(id)) {
            Ok(()) => {
                debug!(%id, "removed blob");
                true
            }
            Err(e) => {
                warn!(%id, error = %e, "failed to remove blob");
                false
            }
        }
    }

    /// List the ids of all blob files on disk.
    pub fn list(&self) -> Result<Vec<EntryId>> {
        let mut ids = Vec::new();

        for dir_entry in fs::read_dir(&self.path)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }
            let filename = dir_entry.file_name();
            if let Some(id) = parse_blob_name(&filename.to_string_lossy()) {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Remove transient files left behind by an interrupted write.
    ///
    /// Only safe while no write is in flight, i.e. when the store is opened.
    pub fn remove_temp_files(&self) -> Result<usize> {
        let mut removed = 0;

        for dir_entry in fs::read_dir(&self.path)? {
            let dir_entry = dir_entry?;
            let filename = dir_entry.file_name();
            if !filename.to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }
            match fs::remove_file(dir_entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = ?dir_entry.path(), error = %e, "failed to remove temp file"),
            }
        }

        Ok(removed)
    }

    /// Get total size of all blobs.
    pub fn total_size(&self) -> Result<u64> {
        let mut total = 0u64;
        for id in self.list()? {
            total += fs::metadata(self.blob_path(id))?.len();
        }
        Ok(total)
    }

    /// Get the full path for a blob.
    pub fn blob_path(&self, id: EntryId) -> PathBuf {
        self.path.join(id.to_string())
    }
}

/// Parse a blob filename, accepting only canonical decimal ids.
fn parse_blob_name(name: &str) -> Option<EntryId> {
    let id: EntryId = name.parse().ok()?;
    (id.to_string() == name).then_some(id)
}

//! Core types for the content store.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sequential identifier for a stored entry.
///
/// Assigned by the store starting at 0 and never reused. Also names the blob
/// file holding the entry's content.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl EntryId {
    pub fn next(self) -> Self {
        EntryId(self.0 + 1)
    }

    pub fn prev(self) -> Option<Self> {
        if self.0 > 0 {
            Some(EntryId(self.0 - 1))
        } else {
            None
        }
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(EntryId)
    }
}

/// Number of random bytes in a share token.
pub const SHARE_TOKEN_BYTES: usize = 16;

/// Public, unguessable identifier for an entry.
///
/// 128 bits from the OS random source, rendered as lowercase hex.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareToken(String);

impl ShareToken {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SHARE_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        ShareToken(hex::encode(bytes))
    }

    /// Wrap an existing token string, e.g. one taken from a URL.
    ///
    /// No validation happens here; unknown tokens simply fail lookup.
    pub fn new(token: impl Into<String>) -> Self {
        ShareToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShareToken({})", self.0)
    }
}

impl fmt::Display for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShareToken {
    fn from(s: &str) -> Self {
        ShareToken(s.to_string())
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }

    /// Whole seconds since the Unix epoch, as rendered by listing pages.
    pub fn as_unix_secs(&self) -> i64 {
        self.0.div_euclid(1_000_000)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Metadata for one stored snippet.
///
/// Immutable once created. Field names are camelCase on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Sequential identifier (assigned by store).
    pub id: EntryId,

    /// Public identifier (assigned by store).
    pub share_id: ShareToken,

    /// Free-form language label.
    pub language: String,

    /// When the entry was posted.
    pub post_time: Timestamp,

    /// Network address of the poster.
    pub poster_address: String,

    /// Number of newline bytes in the content (computed by store).
    pub line_count: u64,
}

/// Caller-supplied metadata for a new entry.
///
/// The store fills in the id, share token and line count.
#[derive(Clone, Debug)]
pub struct EntryInput {
    pub language: String,
    pub post_time: Timestamp,
    pub poster_address: String,
}

impl EntryInput {
    /// Metadata stamped with the current time.
    pub fn new(language: impl Into<String>, poster_address: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            post_time: Timestamp::now(),
            poster_address: poster_address.into(),
        }
    }

    /// Override the post time.
    pub fn with_post_time(mut self, post_time: Timestamp) -> Self {
        self.post_time = post_time;
        self
    }

    pub(crate) fn into_entry(self, id: EntryId, share_id: ShareToken, line_count: u64) -> Entry {
        Entry {
            id,
            share_id,
            language: self.language,
            post_time: self.post_time,
            poster_address: self.poster_address,
            line_count,
        }
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default)]
pub struct StoreStats {
    pub entry_count: u64,
    pub next_id: u64,
    pub blob_bytes: u64,
}

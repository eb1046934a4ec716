//! Listing pages over the id sequence.
//!
//! The serving layer lists entries in pages of a fixed size, newest page
//! first, with links to older and newer pages.

use crate::entries::EntryIndex;
use crate::error::{Result, StoreError};
use crate::types::{Entry, EntryId};

/// Number of entries on one listing page.
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// Which slice of the id sequence a listing page shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageQuery {
    /// The newest entries.
    Latest,
    /// Entries at or below an id.
    Before(EntryId),
    /// Entries at or above an id.
    After(EntryId),
}

impl PageQuery {
    /// Build a query from raw `before` / `after` request parameters.
    ///
    /// Empty values count as absent. `before` takes precedence when both are
    /// given. Anything that is not a non-negative integer is rejected.
    pub fn from_params(before: Option<&str>, after: Option<&str>) -> Result<Self> {
        let before = before.filter(|v| !v.is_empty());
        let after = after.filter(|v| !v.is_empty());

        match (before, after) {
            (Some(value), _) => Ok(PageQuery::Before(parse_id("before", value)?)),
            (None, Some(value)) => Ok(PageQuery::After(parse_id("after", value)?)),
            (None, None) => Ok(PageQuery::Latest),
        }
    }

    /// Query to fall back to when this one yields an empty page.
    ///
    /// Paging past the oldest entry restarts from the beginning, paging past
    /// the newest returns to the latest page.
    pub fn fallback(&self) -> Option<PageQuery> {
        match self {
            PageQuery::Before(_) => Some(PageQuery::After(EntryId(0))),
            PageQuery::After(_) => Some(PageQuery::Latest),
            PageQuery::Latest => None,
        }
    }
}

fn parse_id(name: &str, value: &str) -> Result<EntryId> {
    value.parse().map_err(|_| {
        StoreError::InvalidArgument(format!(
            "{} must be a non-negative integer, got {:?}",
            name, value
        ))
    })
}

/// One listing page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    /// Entries in ascending id order.
    pub entries: Vec<Entry>,
    /// Whether older entries exist below this page.
    pub has_older: bool,
    /// Whether newer entries exist above this page.
    pub has_newer: bool,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lowest id on the page.
    pub fn oldest_id(&self) -> Option<EntryId> {
        self.entries.first().map(|e| e.id)
    }

    /// Highest id on the page.
    pub fn newest_id(&self) -> Option<EntryId> {
        self.entries.last().map(|e| e.id)
    }

    /// Query for the next page of older entries, if any.
    pub fn older_query(&self) -> Option<PageQuery> {
        let oldest = self.oldest_id()?;
        if self.has_older {
            oldest.prev().map(PageQuery::Before)
        } else {
            None
        }
    }

    /// Query for the next page of newer entries, if any.
    pub fn newer_query(&self) -> Option<PageQuery> {
        let newest = self.newest_id()?;
        self.has_newer.then(|| PageQuery::After(newest.next()))
    }
}

/// Resolve a query against the index. Callers hold the read lock.
pub(crate) fn build_page(index: &EntryIndex, query: PageQuery, count: usize) -> Page {
    let entries = match query {
        PageQuery::Latest => index.latest(count),
        PageQuery::Before(id) => index.before(id, count),
        PageQuery::After(id) => index.after(id, count),
    };

    let (has_older, has_newer) = match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => (
            index.has_entries_below(first.id),
            index.has_entries_above(last.id),
        ),
        _ => (false, false),
    };

    Page {
        entries,
        has_older,
        has_newer,
    }
}

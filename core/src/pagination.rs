//! Keyset (cursor) pagination.
//!
//! Pages are addressed by the `(created_at, id)` pair of the last row the caller saw, never by
//! offset, so paging stays stable while new rows are inserted concurrently.
//!
//! - [`PageMode::Next`] returns rows with `(created_at, id) > cursor`, ascending.
//! - [`PageMode::Prev`] returns rows with `(created_at, id) < cursor`, descending.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Errors from building a page request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// The mode string is neither `next` nor `prev`.
    #[error("invalid page mode: {0:?} (expected \"next\" or \"prev\")")]
    InvalidPageMode(String),

    /// The page size is zero or above [`MAX_PAGE_SIZE`].
    #[error("invalid page size {0} (expected 1..={MAX_PAGE_SIZE})")]
    InvalidPageSize(u32),
}

/// Direction of travel from the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageMode {
    /// Rows after the cursor, oldest first
    Next,
    /// Rows before the cursor, newest first
    Prev,
}

impl PageMode {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Prev => "prev",
        }
    }
}

impl FromStr for PageMode {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next" => Ok(Self::Next),
            "prev" => Ok(Self::Prev),
            other => Err(PageError::InvalidPageMode(other.to_string())),
        }
    }
}

impl fmt::Display for PageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated keyset page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    mode: PageMode,
    last_created_at: DateTime<Utc>,
    last_id: i64,
    page_size: u32,
}

impl PageRequest {
    /// Build a page request.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::InvalidPageSize`] if `page_size` is outside `1..=MAX_PAGE_SIZE`.
    pub fn new(
        mode: PageMode,
        last_created_at: DateTime<Utc>,
        last_id: i64,
        page_size: u32,
    ) -> Result<Self, PageError> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(PageError::InvalidPageSize(page_size));
        }
        Ok(Self {
            mode,
            last_created_at,
            last_id,
            page_size,
        })
    }

    /// Build a page request from the raw strings an API layer receives.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::InvalidPageMode`] for an unknown mode and
    /// [`PageError::InvalidPageSize`] for an out-of-range size.
    pub fn parse(
        mode: &str,
        last_created_at: DateTime<Utc>,
        last_id: i64,
        page_size: u32,
    ) -> Result<Self, PageError> {
        Self::new(mode.parse()?, last_created_at, last_id, page_size)
    }

    /// The first page: every row created after the Unix epoch, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::InvalidPageSize`] for an out-of-range size.
    pub fn first(page_size: u32) -> Result<Self, PageError> {
        Self::new(PageMode::Next, DateTime::<Utc>::UNIX_EPOCH, 0, page_size)
    }

    /// Direction of travel.
    #[must_use]
    pub const fn mode(&self) -> PageMode {
        self.mode
    }

    /// Creation timestamp of the cursor row.
    #[must_use]
    pub const fn last_created_at(&self) -> DateTime<Utc> {
        self.last_created_at
    }

    /// Identifier of the cursor row.
    #[must_use]
    pub const fn last_id(&self) -> i64 {
        self.last_id
    }

    /// Maximum rows to return.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Whether a row keyed by `(created_at, id)` falls on this page's side of the cursor.
    #[must_use]
    pub fn admits(&self, created_at: DateTime<Utc>, id: i64) -> bool {
        let ordering = (created_at, id).cmp(&(self.last_created_at, self.last_id));
        match self.mode {
            PageMode::Next => ordering == Ordering::Greater,
            PageMode::Prev => ordering == Ordering::Less,
        }
    }

    /// Select, order and truncate in-memory rows the way a store must.
    ///
    /// `key` extracts `(created_at, id)` from a row.
    #[must_use]
    pub fn apply<T, F>(&self, rows: impl IntoIterator<Item = T>, key: F) -> Vec<T>
    where
        F: Fn(&T) -> (DateTime<Utc>, i64),
    {
        let mut selected: Vec<T> = rows
            .into_iter()
            .filter(|row| {
                let (created_at, id) = key(row);
                self.admits(created_at, id)
            })
            .collect();

        selected.sort_by_key(|row| key(row));
        if self.mode == PageMode::Prev {
            selected.reverse();
        }
        selected.truncate(self.page_size as usize);
        selected
    }
}

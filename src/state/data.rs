//! Shared data structures for the catalog
//!
//! These types represent the data model that flows between
//! the store, the query engine and the presentation layer.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseEnumError;

/// Point in time with millisecond precision (what the store keeps)
pub type Timestamp = DateTime<Utc>;

/// Current time truncated to the precision the store round-trips.
pub fn now_millis() -> Timestamp {
    Utc::now().trunc_subsecs(3)
}

/// Opaque record identifier, assigned once at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookId(Uuid);

impl BookId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for BookId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl ToSql for BookId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for BookId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Reading progress of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookStatus {
    #[default]
    Unread,
    Reading,
    Read,
}

impl BookStatus {
    pub const ALL: [BookStatus; 3] = [BookStatus::Unread, BookStatus::Reading, BookStatus::Read];

    /// Name used in the database and in serialized view state
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Unread => "UNREAD",
            BookStatus::Reading => "READING",
            BookStatus::Read => "READ",
        }
    }

    /// Completed books sink below everything else in the list.
    pub fn is_read(&self) -> bool {
        *self == BookStatus::Read
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "book status",
                value: s.to_string(),
            })
    }
}

impl ToSql for BookStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for BookStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// A single catalog entry
///
/// Identity is by `id` only; two records may share title and author.
/// `read_date` is present only while `status == Read`, see
/// [`BookRecord::apply_status`].
#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    pub id: BookId,
    pub title: String,
    pub author: String,
    /// Compressed JPEG thumbnail, absent unless a cover was provided.
    /// Shared, so snapshots and derived lists never copy the bytes.
    pub cover_image: Option<Arc<[u8]>>,
    pub status: BookStatus,
    /// Set once at creation, never changes
    pub added_date: Timestamp,
    pub read_date: Option<Timestamp>,
    pub memo: Option<String>,
}

impl BookRecord {
    /// Create a fresh unread record with a new id.
    pub fn new(title: impl Into<String>, author: impl Into<String>, added_date: Timestamp) -> Self {
        Self {
            id: BookId::new(),
            title: title.into(),
            author: author.into(),
            cover_image: None,
            status: BookStatus::Unread,
            added_date,
            read_date: None,
            memo: None,
        }
    }

    pub fn has_cover(&self) -> bool {
        self.cover_image.as_ref().is_some_and(|bytes| !bytes.is_empty())
    }
}

/// Ordering applied to each partition of the derived list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    /// Newest first
    #[default]
    AddedDesc,
    AddedAsc,
    TitleAsc,
    TitleDesc,
    AuthorAsc,
    AuthorDesc,
}

impl SortOrder {
    /// All orders, in the order a sort menu lists them
    pub const ALL: [SortOrder; 6] = [
        SortOrder::AddedDesc,
        SortOrder::AddedAsc,
        SortOrder::TitleAsc,
        SortOrder::TitleDesc,
        SortOrder::AuthorAsc,
        SortOrder::AuthorDesc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::AddedDesc => "ADDED_DESC",
            SortOrder::AddedAsc => "ADDED_ASC",
            SortOrder::TitleAsc => "TITLE_ASC",
            SortOrder::TitleDesc => "TITLE_DESC",
            SortOrder::AuthorAsc => "AUTHOR_ASC",
            SortOrder::AuthorDesc => "AUTHOR_DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortOrder::ALL
            .into_iter()
            .find(|order| order.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "sort order",
                value: s.to_string(),
            })
    }
}

/// The two pieces of user-selected view state the query engine consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    pub sort_order: SortOrder,
    /// `None` shows every status
    pub filter_status: Option<BookStatus>,
}

impl ViewState {
    pub fn new(sort_order: SortOrder, filter_status: Option<BookStatus>) -> Self {
        Self {
            sort_order,
            filter_status,
        }
    }
}

/// Why the derived list is empty, so the caller can pick the right message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    /// The catalog has no books at all
    NoBooks,
    /// A status filter is active and nothing matches it
    NoneWithStatus(BookStatus),
}

//! Mutation intents: add, edit, change status, delete
//!
//! Each intent validates its input, runs cover ingestion and the status
//! policy, and only then touches the store. Cover failures and vanished
//! records degrade quietly; only validation and store failures are returned.

use std::fmt;
use std::sync::Arc;

use chrono::SubsecRound;
use tracing::{info, warn};

use crate::config::CoverSettings;
use crate::cover::{ingest_cover, CoverSource};
use crate::error::{Result, ValidationError};
use crate::state::data::{now_millis, BookId, BookRecord, BookStatus, Timestamp};
use crate::state::library::BookStore;

type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Entry point for everything that changes the catalog
#[derive(Clone)]
pub struct Catalog {
    store: Arc<BookStore>,
    cover: CoverSettings,
    clock: Clock,
}

impl Catalog {
    pub fn new(store: Arc<BookStore>, cover: CoverSettings) -> Self {
        Self {
            store,
            cover,
            clock: Arc::new(now_millis),
        }
    }

    /// Replace the wall clock, e.g. to pin timestamps in tests.
    ///
    /// Readings are cut to milliseconds, the precision the store keeps.
    pub fn with_clock(mut self, clock: impl Fn() -> Timestamp + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &Arc<BookStore> {
        &self.store
    }

    /// Add a new unread book.
    ///
    /// A cover that fails to ingest is logged and the book is stored without one.
    pub async fn add_book(
        &self,
        title: &str,
        author: &str,
        memo: &str,
        cover: Option<CoverSource>,
    ) -> Result<BookRecord> {
        let (title, author) = validate(title, author)?;
        let cover_image = self.ingest(cover).await;

        let mut book = BookRecord::new(title, author, self.now());
        book.memo = normalize_memo(memo);
        book.cover_image = cover_image;

        self.store.insert(&book)?;
        info!(id = %book.id, has_cover = book.has_cover(), "book added");
        Ok(book)
    }

    /// Rewrite a book's editable fields.
    ///
    /// `new_cover` replaces the stored cover only if it ingests successfully.
    /// The cover is ingested first; the other fields and the status policy are
    /// then applied to the record as stored at that moment, so a status change
    /// made while the cover was processing is not lost.
    /// Returns `Ok(None)` if the book is gone by then.
    pub async fn edit_book(
        &self,
        id: &BookId,
        title: &str,
        author: &str,
        memo: &str,
        status: BookStatus,
        new_cover: Option<CoverSource>,
    ) -> Result<Option<BookRecord>> {
        let (title, author) = validate(title, author)?;
        let memo = normalize_memo(memo);
        let cover_image = self.ingest(new_cover).await;

        let now = self.now();
        let edited = self.store.modify(id, |book| {
            if let Some(cover_image) = cover_image {
                book.cover_image = Some(cover_image);
            }
            book.title = title;
            book.author = author;
            book.memo = memo;
            book.apply_status(status, now);
        })?;
        Ok(self.committed(id, edited))
    }

    /// Change only the reading status
    pub fn set_status(&self, id: &BookId, status: BookStatus) -> Result<Option<BookRecord>> {
        let now = self.now();
        let changed = self.store.modify(id, |book| book.apply_status(status, now))?;
        Ok(self.committed(id, changed))
    }

    /// Remove a book. Returns `false` if it was already gone.
    pub fn delete_book(&self, id: &BookId) -> Result<bool> {
        let deleted = self.store.delete(id)?;
        if deleted {
            info!(%id, "book deleted");
        } else {
            warn!(%id, "book not found for delete");
        }
        Ok(deleted)
    }

    fn committed(&self, id: &BookId, book: Option<BookRecord>) -> Option<BookRecord> {
        match &book {
            Some(book) => info!(%id, status = %book.status, "book updated"),
            None => warn!(%id, "book not found for update"),
        }
        book
    }

    fn now(&self) -> Timestamp {
        (self.clock)().trunc_subsecs(3)
    }

    async fn ingest(&self, source: Option<CoverSource>) -> Option<Arc<[u8]>> {
        let source = source?;
        match ingest_cover(source, self.cover).await {
            Ok(bytes) => Some(Arc::from(bytes)),
            Err(err) => {
                warn!(error = %err, "cover ingest failed, continuing without new cover");
                None
            }
        }
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("store", &self.store)
            .field("cover", &self.cover)
            .finish()
    }
}

/// Title and author are required; surrounding whitespace is dropped.
pub fn validate(title: &str, author: &str) -> Result<(String, String), ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::MissingTitle);
    }
    let author = author.trim();
    if author.is_empty() {
        return Err(ValidationError::MissingAuthor);
    }
    Ok((title.to_string(), author.to_string()))
}

fn normalize_memo(memo: &str) -> Option<String> {
    if memo.trim().is_empty() {
        None
    } else {
        Some(memo.to_string())
    }
}

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info};

use super::data::{BookId, BookRecord, Timestamp};
use crate::error::StoreError;

/// Full record set as published to observers
pub type Snapshot = Arc<[BookRecord]>;

type StoreResult<T> = Result<T, StoreError>;

const BOOK_COLUMNS: &str = "id, title, author, cover_image, status, added_date, read_date, memo";

/// The BookStore manages the SQLite catalog database.
///
/// It is constructed once and shared by `Arc`; every mutation is serialized
/// through one connection and followed by a fresh snapshot on the
/// [`observe`](Self::observe) channel.
pub struct BookStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    snapshot_tx: watch::Sender<Snapshot>,
}

impl BookStore {
    /// Open (or create) the catalog database at `db_path`.
    ///
    /// Missing parent directories are created.
    pub fn open(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        info!(path = %db_path.display(), "catalog database opened");

        Self::from_connection(conn, Some(db_path))
    }

    /// Catalog that lives only as long as this value
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> StoreResult<Self> {
        init_schema(&conn)?;
        let books = load_all(&conn)?;
        let (snapshot_tx, _) = watch::channel(Snapshot::from(books));

        Ok(BookStore {
            conn: Mutex::new(conn),
            db_path,
            snapshot_tx,
        })
    }

    /// Path to the database file (`None` for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Receiver that always holds the latest full record set
    pub fn observe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Latest published record set
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Get a count of books in the catalog
    pub fn book_count(&self) -> StoreResult<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Insert a record, replacing any existing record with the same id
    pub fn insert(&self, book: &BookRecord) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO books (id, title, author, cover_image, status, added_date, read_date, memo)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                book.id,
                book.title,
                book.author,
                book.cover_image.as_deref(),
                book.status,
                book.added_date.timestamp_millis(),
                book.read_date.map(|date| date.timestamp_millis()),
                book.memo,
            ],
        )?;
        debug!(id = %book.id, "book inserted");
        self.publish(&conn)
    }

    /// Overwrite an existing record.
    ///
    /// Returns `false` (and publishes nothing) if the id no longer exists.
    /// `added_date` is never rewritten.
    pub fn update(&self, book: &BookRecord) -> StoreResult<bool> {
        let conn = self.lock()?;
        if update_row(&conn, book)? == 0 {
            return Ok(false);
        }
        debug!(id = %book.id, status = %book.status, "book updated");
        self.publish(&conn)?;
        Ok(true)
    }

    /// Read, change and write back one record while holding the connection.
    ///
    /// No other mutation can land between the read and the write, so `change`
    /// always sees the latest stored state. Returns `None` if the id does not
    /// exist. The id and `added_date` are kept whatever `change` does.
    pub fn modify(&self, id: &BookId, change: impl FnOnce(&mut BookRecord)) -> StoreResult<Option<BookRecord>> {
        let conn = self.lock()?;
        let Some(mut book) = select_by_id(&conn, id)? else {
            return Ok(None);
        };
        let (id, added_date) = (book.id, book.added_date);
        change(&mut book);
        book.id = id;
        book.added_date = added_date;

        update_row(&conn, &book)?;
        debug!(id = %book.id, status = %book.status, "book modified");
        self.publish(&conn)?;
        Ok(Some(book))
    }

    /// Remove a record. Returns `false` if it was already gone.
    pub fn delete(&self, id: &BookId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM books WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Ok(false);
        }
        debug!(%id, "book deleted");
        self.publish(&conn)?;
        Ok(true)
    }

    pub fn get_by_id(&self, id: &BookId) -> StoreResult<Option<BookRecord>> {
        let conn = self.lock()?;
        select_by_id(&conn, id)
    }

    /// Get all books from the catalog, newest first
    pub fn all_books(&self) -> StoreResult<Vec<BookRecord>> {
        let conn = self.lock()?;
        load_all(&conn)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Reload and publish while the connection is still held, so observers
    /// see snapshots in mutation order.
    fn publish(&self, conn: &Connection) -> StoreResult<()> {
        let books = load_all(conn)?;
        self.snapshot_tx.send_replace(Snapshot::from(books));
        Ok(())
    }
}

/// Create the books table and its index if they don't exist.
fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS books (
            id              TEXT PRIMARY KEY NOT NULL,
            title           TEXT NOT NULL,
            author          TEXT NOT NULL,
            cover_image     BLOB,
            status          TEXT NOT NULL DEFAULT 'UNREAD',
            added_date      INTEGER NOT NULL,
            read_date       INTEGER,
            memo            TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_books_added_date
         ON books(added_date DESC)",
        [],
    )?;

    debug!("catalog schema initialized");
    Ok(())
}

fn select_by_id(conn: &Connection, id: &BookId) -> StoreResult<Option<BookRecord>> {
    let book = conn
        .query_row(
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
            params![id],
            book_from_row,
        )
        .optional()?;
    Ok(book)
}

/// Every column except `id` and `added_date`; returns the affected row count
fn update_row(conn: &Connection, book: &BookRecord) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE books
         SET title = ?2, author = ?3, cover_image = ?4, status = ?5, read_date = ?6, memo = ?7
         WHERE id = ?1",
        params![
            book.id,
            book.title,
            book.author,
            book.cover_image.as_deref(),
            book.status,
            book.read_date.map(|date| date.timestamp_millis()),
            book.memo,
        ],
    )
}

fn load_all(conn: &Connection) -> StoreResult<Vec<BookRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOK_COLUMNS} FROM books ORDER BY added_date DESC"
    ))?;
    let books = stmt
        .query_map([], book_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(books)
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<BookRecord> {
    let cover_image: Option<Vec<u8>> = row.get(3)?;
    let read_date: Option<i64> = row.get(6)?;
    Ok(BookRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        cover_image: cover_image.map(Arc::from),
        status: row.get(4)?,
        added_date: millis_to_timestamp(5, row.get(5)?)?,
        read_date: read_date.map(|ms| millis_to_timestamp(6, ms)).transpose()?,
        memo: row.get(7)?,
    })
}

fn millis_to_timestamp(column: usize, millis: i64) -> rusqlite::Result<Timestamp> {
    Timestamp::from_timestamp_millis(millis).ok_or(rusqlite::Error::IntegralValueOutOfRange(column, millis))
}

// Implement Debug for better error messages
impl std::fmt::Debug for BookStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

//! Tsundoku: a personal catalog of owned-but-unread books
//!
//! - [`state`]: records, the SQLite store, the status policy and the
//!   reactive sorted/filtered list
//! - [`cover`]: bounded-memory cover thumbnail ingestion
//! - [`catalog`]: add/edit/delete intents tying the two together
//! - [`session`]: startup wiring from a [`CatalogConfig`]

pub mod catalog;
pub mod config;
pub mod cover;
pub mod error;
pub mod session;
pub mod state;

pub use catalog::Catalog;
pub use config::{CatalogConfig, CoverSettings};
pub use cover::CoverSource;
pub use error::{CatalogError, ConfigError, IngestError, StoreError, ValidationError};
pub use session::Session;
pub use state::data::{BookId, BookRecord, BookStatus, EmptyState, SortOrder, Timestamp, ViewState};
pub use state::library::{BookStore, Snapshot};
pub use state::query::{derive_list, Collation, DerivedList};
pub use state::status::compute_read_date;
pub use state::view::CatalogView;

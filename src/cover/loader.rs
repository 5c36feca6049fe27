//! Async entry point for cover ingestion
//!
//! Probing, decoding and encoding are blocking and CPU-heavy, so they run on
//! tokio's blocking pool rather than on whatever task asked for the cover.

use tokio::task;

use super::thumbnail::{self, CoverSource};
use crate::config::CoverSettings;
use crate::error::IngestError;

/// Produce cover thumbnail bytes for `source`.
///
/// Dropping the returned future discards the result; the blocking work
/// finishes on its own and has no side effects.
pub async fn ingest_cover(source: CoverSource, settings: CoverSettings) -> Result<Vec<u8>, IngestError> {
    task::spawn_blocking(move || thumbnail::ingest(&source, &settings)).await?
}

//! Cover image ingestion
//!
//! This module handles:
//! - Reading image dimensions without decoding pixels
//! - Choosing a power-of-two sample size for the target bounds
//! - Decoding at that reduced size and re-encoding as JPEG

pub mod loader;
pub mod thumbnail;

pub use loader::ingest_cover;
pub use thumbnail::CoverSource;

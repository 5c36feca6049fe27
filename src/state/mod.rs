//! Catalog state
//!
//! This module handles:
//! - Shared data structures (data.rs)
//! - The SQLite store and its snapshot stream (library.rs)
//! - Reading status transitions (status.rs)
//! - Filtering, partitioning and sorting (query.rs)
//! - The reactive derived list (view.rs)

pub mod data;
pub mod library;
pub mod query;
pub mod status;
pub mod view;

//! Fingerprint caching module.
//!
//! This module provides persistent storage for file fingerprints so that
//! rescans skip files that have not changed.
//!
//! # Architecture
//!
//! The caching system is split into two main components:
//!
//! * [`database`]: Handles SQLite-based persistence, schema management, and CRUD operations.
//! * [`entry`]: Defines the data models stored in the cache and their validation logic.
//!
//! # Cache Invalidation
//!
//! Entries are keyed by absolute path and validated using:
//! * File size
//! * Modification time (nanoseconds since the epoch)
//!
//! If either differs from the file on disk, every cached fingerprint for
//! that path is discarded and all requested namespaces are recomputed.
//! Stale entries for deleted files are never removed automatically; they
//! are simply never matched again.

pub mod database;
pub mod entry;

pub use database::{CacheError, CacheResult, HashCache, SCHEMA_VERSION};
pub use entry::CacheEntry;

//! Query Layer - read-only projections over the rank tables
//!
//! Provides:
//! - Exact-id lookup per rank
//! - Substring search on names and epithets
//! - Parent-scoped listing (genera of a family, species of a genus)
//! - Lineage traversal from a species up to its family
//!
//! Name searches are case-sensitive substring matches with no wildcard
//! characters. By convention an empty pattern matches every record, which
//! is how callers list a whole rank; it is not a full-text search feature.
//! Results come back in insertion order and each call re-runs the scan.
//!
//! Each rank module also re-exports that rank's writes from [`crate::store`].

pub mod family;
pub mod genus;
pub mod species;

use crate::storage::{DbStats, Pool, SqliteStore};
use crate::Result;

/// Record counts per rank plus the schema version
pub async fn stats(pool: &Pool) -> Result<DbStats> {
    pool.read(|conn| SqliteStore::new(conn).stats()).await
}

//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - families(seq, id, name, authority)
//! - genera(seq, id, family_id, name, authority)
//! - species(seq, id, genus_id, specific_epithet, authority, publication_year, conservation_status)
//! - retired_ids(id, rank, retired_at)
//! - store_meta(version)

pub mod migrate;
pub mod pool;
pub mod schema;
pub mod sqlite;

pub use migrate::{MigrationOutcome, run_migrations, schema_version};
pub use pool::Pool;
pub use schema::SCHEMA_VERSION;
pub use sqlite::{DbStats, IdUse, SqliteStore};

//! # Botanica - Botanical Taxonomic Database
//!
//! A structured store for the classical rank hierarchy Family → Genus → Species.
//!
//! Botanica provides:
//! - Typed taxon records with identity and parent-reference fields
//! - A versioned migration engine that refuses half-built schemas
//! - SQLite-backed storage, in-memory or durable, with foreign keys checked
//!   inside the write transaction
//! - A read-only query layer: id lookup, substring search, parent-scoped
//!   listing and lineage traversal
//!
//! ```no_run
//! use botanica::{BotanicalDatabase, Family, Genus};
//! use botanica::queries::{family, genus};
//!
//! # async fn demo() -> botanica::Result<()> {
//! let db = BotanicalDatabase::memory().await?;
//! db.migrate().await?;
//!
//! let rosaceae = Family::new("Rosaceae", "Juss.");
//! family::insert_family(db.pool(), &rosaceae).await?;
//! genus::insert_genus(db.pool(), &Genus::new(rosaceae.id, "Rosa", "L.")).await?;
//!
//! assert_eq!(genus::get_genera_by_family_id(db.pool(), rosaceae.id).await?.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod queries;
pub mod rank;
pub mod storage;
pub mod store;
pub mod taxon;

// Re-exports for convenient access
pub use config::{DatabaseConfig, StoreMode};
pub use database::BotanicalDatabase;
pub use rank::Rank;
pub use storage::{DbStats, Pool};
pub use taxon::{Family, Genus, Lineage, Species};

use std::path::Path;
use uuid::Uuid;

/// Result type alias for Botanica operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Botanica operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database not ready: migrate() has not completed on this handle")]
    NotReady,

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Foreign key error: {rank} references missing {parent} {parent_id}")]
    ForeignKey {
        rank: Rank,
        parent: Rank,
        parent_id: Uuid,
    },

    #[error("Duplicate id: {id} cannot be used for a new {rank}")]
    DuplicateId { rank: Rank, id: Uuid },

    #[error("Referential integrity: {rank} {id} is still referenced by {children} {child_rank} record(s)")]
    ReferentialIntegrity {
        rank: Rank,
        id: Uuid,
        child_rank: Rank,
        children: usize,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Connection lock poisoned by a panicked operation")]
    LockPoisoned,

    #[error("Database handle is closed")]
    Closed,
}

/// Open (or create) a durable database and bring it to the current schema
pub async fn initialize_database(path: impl AsRef<Path>) -> Result<BotanicalDatabase> {
    let database = BotanicalDatabase::file(path).await?;
    database.migrate().await?;
    Ok(database)
}

/// Create a migrated in-memory database
pub async fn create_test_database() -> Result<BotanicalDatabase> {
    let database = BotanicalDatabase::memory().await?;
    database.migrate().await?;
    Ok(database)
}

use uuid::Uuid;
use crate::storage::{Pool, SqliteStore};
use crate::taxon::Genus;
use crate::Result;

pub use crate::store::genus::{delete_genus, insert_genus};

/// Get a genus by ID
pub async fn get_genus_by_id(pool: &Pool, id: Uuid) -> Result<Option<Genus>> {
    pool.read(move |conn| SqliteStore::new(conn).get_genus(id)).await
}

/// Genera whose name contains `pattern`; empty pattern lists all
pub async fn get_genera_by_name(pool: &Pool, pattern: &str) -> Result<Vec<Genus>> {
    let pattern = pattern.to_string();
    pool.read(move |conn| SqliteStore::new(conn).find_genera_by_name(&pattern)).await
}

/// All genera of a family, in insertion order.
///
/// An unknown family yields an empty list, not an error.
pub async fn get_genera_by_family_id(pool: &Pool, family_id: Uuid) -> Result<Vec<Genus>> {
    pool.read(move |conn| SqliteStore::new(conn).find_genera_in_family(family_id)).await
}

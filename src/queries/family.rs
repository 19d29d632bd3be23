use uuid::Uuid;
use crate::storage::{Pool, SqliteStore};
use crate::taxon::Family;
use crate::Result;

pub use crate::store::family::{delete_family, insert_family};

/// Get a family by ID
pub async fn get_family_by_id(pool: &Pool, id: Uuid) -> Result<Option<Family>> {
    pool.read(move |conn| SqliteStore::new(conn).get_family(id)).await
}

/// Families whose name contains `pattern`, in insertion order.
/// An empty pattern returns every family.
pub async fn get_families_by_name(pool: &Pool, pattern: &str) -> Result<Vec<Family>> {
    let pattern = pattern.to_string();
    pool.read(move |conn| SqliteStore::new(conn).find_families_by_name(&pattern)).await
}

use uuid::Uuid;
use crate::storage::{Pool, SqliteStore};
use crate::taxon::{Lineage, Species};
use crate::Result;

pub use crate::store::species::{delete_species, insert_species};

/// Get a species by ID
pub async fn get_species_by_id(pool: &Pool, id: Uuid) -> Result<Option<Species>> {
    pool.read(move |conn| SqliteStore::new(conn).get_species(id)).await
}

/// Species whose specific epithet contains `pattern`, in insertion order.
/// An empty pattern returns every species.
pub async fn get_species_by_name(pool: &Pool, pattern: &str) -> Result<Vec<Species>> {
    let pattern = pattern.to_string();
    pool.read(move |conn| SqliteStore::new(conn).find_species_by_epithet(&pattern)).await
}

/// All species of a genus; empty for an unknown genus
pub async fn get_species_by_genus_id(pool: &Pool, genus_id: Uuid) -> Result<Vec<Species>> {
    pool.read(move |conn| SqliteStore::new(conn).find_species_in_genus(genus_id)).await
}

/// A species with its genus and family, read from one snapshot
pub async fn get_lineage(pool: &Pool, species_id: Uuid) -> Result<Option<Lineage>> {
    pool.read(move |conn| SqliteStore::new(conn).lineage(species_id)).await
}

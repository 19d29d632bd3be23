use uuid::Uuid;
use crate::rank::Rank;
use crate::storage::{Pool, SqliteStore};
use crate::taxon::Species;
use crate::Result;
use super::{delete_checked, ensure_parent, ensure_unused};

/// Insert a new species under an existing genus.
///
/// Checks the epithet, the publication year (when given, `1..=` this year)
/// and the conservation status before resolving the genus.
pub async fn insert_species(pool: &Pool, species: &Species) -> Result<()> {
    let species = species.clone();
    pool.write(move |tx| {
        species.validate()?;
        let store = SqliteStore::new(tx);
        ensure_parent(&store, Rank::Species, species.genus_id)?;
        ensure_unused(&store, Rank::Species, species.id)?;
        store.insert_species(&species)?;
        tracing::debug!(
            "Inserted species {} ({}) into genus {}",
            species.specific_epithet,
            species.id,
            species.genus_id
        );
        Ok(())
    })
    .await
}

/// Delete a species. Species are leaves, so this only fails on I/O.
pub async fn delete_species(pool: &Pool, id: Uuid) -> Result<bool> {
    delete_checked(pool, Rank::Species, id).await
}

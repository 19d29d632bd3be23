use uuid::Uuid;
use crate::rank::Rank;
use crate::storage::{Pool, SqliteStore};
use crate::taxon::Genus;
use crate::Result;
use super::{delete_checked, ensure_parent, ensure_unused};

/// Insert a new genus under an existing family.
///
/// The family is resolved inside the write transaction; a missing family
/// is a `ForeignKey` error and nothing is written.
pub async fn insert_genus(pool: &Pool, genus: &Genus) -> Result<()> {
    let genus = genus.clone();
    pool.write(move |tx| {
        genus.validate()?;
        let store = SqliteStore::new(tx);
        ensure_parent(&store, Rank::Genus, genus.family_id)?;
        ensure_unused(&store, Rank::Genus, genus.id)?;
        store.insert_genus(&genus)?;
        tracing::debug!("Inserted genus {} ({}) into family {}", genus.name, genus.id, genus.family_id);
        Ok(())
    })
    .await
}

/// Delete a genus that no species references
pub async fn delete_genus(pool: &Pool, id: Uuid) -> Result<bool> {
    delete_checked(pool, Rank::Genus, id).await
}

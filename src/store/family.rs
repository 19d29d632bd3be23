use uuid::Uuid;
use crate::rank::Rank;
use crate::storage::{Pool, SqliteStore};
use crate::taxon::Family;
use crate::Result;
use super::{delete_checked, ensure_unused};

/// Insert a new family.
///
/// Fails with `Validation` for an empty name and `DuplicateId` when the id
/// is already in use or was retired.
pub async fn insert_family(pool: &Pool, family: &Family) -> Result<()> {
    let family = family.clone();
    pool.write(move |tx| {
        family.validate()?;
        let store = SqliteStore::new(tx);
        ensure_unused(&store, Rank::Family, family.id)?;
        store.insert_family(&family)?;
        tracing::debug!("Inserted family {} ({})", family.name, family.id);
        Ok(())
    })
    .await
}

/// Delete a family that no genus references
pub async fn delete_family(pool: &Pool, id: Uuid) -> Result<bool> {
    delete_checked(pool, Rank::Family, id).await
}

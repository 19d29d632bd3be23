//! Entity Store - validated inserts and deletes, one module per rank
//!
//! Every check a write depends on (field validation, duplicate id, parent
//! existence, live children) runs inside the same immediate transaction as
//! the write itself. A failed check rolls the transaction back, so callers
//! observe either the full record with its index entries or nothing.

pub mod family;
pub mod genus;
pub mod species;

pub use family::{delete_family, insert_family};
pub use genus::{delete_genus, insert_genus};
pub use species::{delete_species, insert_species};

use uuid::Uuid;
use crate::rank::Rank;
use crate::storage::{IdUse, Pool, SqliteStore};
use crate::{Error, Result};

/// Reject ids held by any live record or retired by an earlier delete
fn ensure_unused(store: &SqliteStore<'_>, rank: Rank, id: Uuid) -> Result<()> {
    match store.id_use(id)? {
        None => Ok(()),
        Some(usage) => {
            match usage {
                IdUse::Live(held_by) => tracing::warn!("Rejected {} {}: id held by a live {}", rank, id, held_by),
                IdUse::Retired(held_by) => tracing::warn!("Rejected {} {}: id retired from {}", rank, id, held_by),
            }
            Err(Error::DuplicateId { rank, id })
        }
    }
}

/// Require a live parent record for a child of `rank`
fn ensure_parent(store: &SqliteStore<'_>, rank: Rank, parent_id: Uuid) -> Result<()> {
    let Some(parent) = rank.parent() else {
        return Ok(());
    };
    if store.exists(parent, parent_id)? {
        return Ok(());
    }
    tracing::warn!("Rejected {}: {} {} does not exist", rank, parent, parent_id);
    Err(Error::ForeignKey { rank, parent, parent_id })
}

/// Delete a record of `rank` unless a child still references it.
/// `Ok(false)` when no live record has this id.
async fn delete_checked(pool: &Pool, rank: Rank, id: Uuid) -> Result<bool> {
    pool.write(move |tx| {
        let store = SqliteStore::new(tx);
        if let Some(child_rank) = rank.child() {
            let children = store.count_children(rank, id)?;
            if children > 0 {
                tracing::warn!("Refused to delete {} {}: {} {} record(s) reference it", rank, id, children, child_rank);
                return Err(Error::ReferentialIntegrity { rank, id, child_rank, children });
            }
        }
        let removed = store.delete(rank, id)?;
        if removed {
            tracing::debug!("Deleted {} {}", rank, id);
        }
        Ok(removed)
    })
    .await
}

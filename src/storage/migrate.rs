//! Migration engine
//!
//! Brings a store to [`SCHEMA_VERSION`]. The whole run happens inside one
//! `BEGIN IMMEDIATE` transaction, so racing callers (threads or processes
//! sharing a durable file) are serialized and only the first one builds
//! anything. A layout that does not match its version marker is reported,
//! never repaired.

use std::collections::HashSet;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use crate::{Error, Result};
use super::schema::{self, MIGRATIONS, SCHEMA_VERSION};

/// What a migration run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Fresh store, built from scratch
    Created { version: i64 },
    /// Existing store moved forward
    Upgraded { from: i64, to: i64 },
    /// Already at the latest version, nothing touched
    Current { version: i64 },
}

/// Run all pending migrations on `conn`
pub fn run_migrations(conn: &mut Connection) -> Result<MigrationOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(schema::CREATE_STORE_META_TABLE, [])?;

    let recorded = read_marker(&tx)?;
    let present = managed_objects_present(&tx)?;
    verify_layout(recorded, &present)?;

    let from = recorded.unwrap_or(0);
    if from == SCHEMA_VERSION {
        // Dropping the transaction rolls back the no-op CREATE IF NOT EXISTS.
        return Ok(MigrationOutcome::Current { version: from });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        tracing::info!("Applying schema migration {}: {}", migration.version, migration.description);
        for stmt in migration.statements {
            tx.execute(stmt, [])?;
        }
    }

    match recorded {
        None => tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?,
        Some(_) => tx.execute("UPDATE store_meta SET version = ?1", params![SCHEMA_VERSION])?,
    };
    tx.commit()?;

    Ok(match recorded {
        None => MigrationOutcome::Created { version: SCHEMA_VERSION },
        Some(from) => MigrationOutcome::Upgraded { from, to: SCHEMA_VERSION },
    })
}

/// Read the schema version marker without changing anything.
/// `None` for a store that was never migrated.
pub fn schema_version(conn: &Connection) -> Result<Option<i64>> {
    let has_meta: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'store_meta')",
        [],
        |row| row.get(0),
    )?;
    if !has_meta {
        return Ok(None);
    }
    read_marker(conn)
}

fn read_marker(conn: &Connection) -> Result<Option<i64>> {
    let rows: i64 = conn.query_row("SELECT COUNT(*) FROM store_meta", [], |row| row.get(0))?;
    if rows > 1 {
        return Err(Error::Migration(format!(
            "store_meta holds {} version rows, expected one",
            rows
        )));
    }
    let version = conn
        .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
        .optional()?;
    Ok(version)
}

/// Names of the tables and indexes the migration list manages that exist now
fn managed_objects_present(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT type, name FROM sqlite_master WHERE type IN ('table', 'index')")?;
    let managed: HashSet<(&str, &str)> = MIGRATIONS
        .iter()
        .flat_map(|m| m.objects.iter())
        .map(|o| (o.kind.as_str(), o.name))
        .collect();

    let mut present = HashSet::new();
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (kind, name) = row?;
        if managed.contains(&(kind.as_str(), name.as_str())) {
            present.insert(name);
        }
    }
    Ok(present)
}

/// Check that the objects on disk are exactly those the marker implies
fn verify_layout(recorded: Option<i64>, present: &HashSet<String>) -> Result<()> {
    let version = match recorded {
        Some(v) if v > SCHEMA_VERSION => {
            return Err(Error::Migration(format!(
                "store is at schema version {}, newer than supported version {}",
                v, SCHEMA_VERSION
            )));
        }
        Some(v) if v < 1 => {
            return Err(Error::Migration(format!("invalid schema version marker {}", v)));
        }
        Some(v) => v,
        None => 0,
    };

    let missing: Vec<&str> = schema::objects_through(version)
        .filter(|o| !present.contains(o.name))
        .map(|o| o.name)
        .collect();
    let unexpected: Vec<&str> = schema::objects_after(version)
        .filter(|o| present.contains(o.name))
        .map(|o| o.name)
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        return Ok(());
    }

    let marker = recorded.map_or_else(|| "no version marker".to_string(), |v| format!("version {}", v));
    let mut problems = Vec::new();
    if !missing.is_empty() {
        problems.push(format!("missing {}", missing.join(", ")));
    }
    if !unexpected.is_empty() {
        problems.push(format!("unexpected {}", unexpected.join(", ")));
    }
    Err(Error::Migration(format!(
        "partially applied schema at {}: {}",
        marker,
        problems.join("; ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply_through(conn: &Connection, version: i64) {
        conn.execute(schema::CREATE_STORE_META_TABLE, []).unwrap();
        for migration in MIGRATIONS.iter().filter(|m| m.version <= version) {
            for stmt in migration.statements {
                conn.execute(stmt, []).unwrap();
            }
        }
        conn.execute("INSERT INTO store_meta (version) VALUES (?1)", [version]).unwrap();
    }

    #[test]
    fn test_fresh_store_is_created() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), None);

        let outcome = run_migrations(&mut conn).unwrap();
        assert_eq!(outcome, MigrationOutcome::Created { version: SCHEMA_VERSION });
        assert_eq!(schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_second_run_is_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        let before = managed_objects_present(&conn).unwrap();

        let outcome = run_migrations(&mut conn).unwrap();
        assert_eq!(outcome, MigrationOutcome::Current { version: SCHEMA_VERSION });
        assert_eq!(managed_objects_present(&conn).unwrap(), before);
        let rows: i64 = conn.query_row("SELECT COUNT(*) FROM store_meta", [], |r| r.get(0)).unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_upgrade_from_v1() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_through(&conn, 1);

        let outcome = run_migrations(&mut conn).unwrap();
        assert_eq!(outcome, MigrationOutcome::Upgraded { from: 1, to: SCHEMA_VERSION });
        assert!(managed_objects_present(&conn).unwrap().contains("retired_ids"));
    }

    #[test]
    fn test_unmarked_partial_schema_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute(schema::CREATE_FAMILIES_TABLE, []).unwrap();

        let err = run_migrations(&mut conn).unwrap_err();
        assert!(matches!(err, Error::Migration(ref msg) if msg.contains("no version marker")));
        // Nothing was built around the stray table
        assert_eq!(managed_objects_present(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_index_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        conn.execute("DROP INDEX idx_genera_family_id", []).unwrap();

        let err = run_migrations(&mut conn).unwrap_err();
        assert!(matches!(err, Error::Migration(ref msg) if msg.contains("idx_genera_family_id")));
        assert!(!managed_objects_present(&conn).unwrap().contains("idx_genera_family_id"));
    }

    #[test]
    fn test_object_ahead_of_marker_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_through(&conn, 1);
        conn.execute(schema::CREATE_RETIRED_IDS_TABLE, []).unwrap();

        let err = run_migrations(&mut conn).unwrap_err();
        assert!(matches!(err, Error::Migration(ref msg) if msg.contains("unexpected retired_ids")));
    }

    #[test]
    fn test_newer_marker_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        conn.execute("UPDATE store_meta SET version = ?1", [SCHEMA_VERSION + 1]).unwrap();

        assert!(matches!(run_migrations(&mut conn), Err(Error::Migration(_))));
    }

    #[test]
    fn test_duplicate_marker_rows_are_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        conn.execute("INSERT INTO store_meta (version) VALUES (?1)", [SCHEMA_VERSION]).unwrap();

        assert!(matches!(run_migrations(&mut conn), Err(Error::Migration(_))));
    }
}

//! Database handle
//!
//! `BotanicalDatabase` owns the connection pool for one store and drives its
//! lifecycle: open, migrate, use, close. Entity Store and Query Layer
//! functions take the handle's [`Pool`] rather than the handle itself.

use std::path::Path;
use crate::config::{DatabaseConfig, StoreMode};
use crate::storage::{self, DbStats, MigrationOutcome, Pool};
use crate::Result;

/// Handle to one botanical store.
///
/// Cloning is cheap and clones share the pool, so migrating or closing
/// through any clone affects all of them.
#[derive(Debug, Clone)]
pub struct BotanicalDatabase {
    pool: Pool,
    config: DatabaseConfig,
}

impl BotanicalDatabase {
    /// Open a store with default settings for `mode`
    pub async fn open(mode: StoreMode) -> Result<Self> {
        Self::new(DatabaseConfig::new(mode)).await
    }

    /// Open a store described by `config`.
    ///
    /// The handle is not ready for reads or writes until [`migrate`](Self::migrate)
    /// has completed.
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        let pool = {
            let config = config.clone();
            tokio::task::spawn_blocking(move || Pool::connect(&config)).await??
        };
        match &config.mode {
            StoreMode::InMemory => tracing::info!("Opened in-memory botanical database"),
            StoreMode::Durable(path) => tracing::info!(
                "Opened botanical database at {} ({} reader connection(s))",
                path.display(),
                pool.reader_count()
            ),
        }
        Ok(Self { pool, config })
    }

    /// Ephemeral store that lives as long as the handle
    pub async fn memory() -> Result<Self> {
        Self::new(DatabaseConfig::memory()).await
    }

    /// Durable store at `path`, created if missing
    pub async fn file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(DatabaseConfig::file(path)).await
    }

    /// Bring the store to the current schema and mark this handle ready.
    /// Safe to call repeatedly.
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_with_outcome().await.map(|_| ())
    }

    /// Like [`migrate`](Self::migrate), reporting what the run did
    pub async fn migrate_with_outcome(&self) -> Result<MigrationOutcome> {
        let outcome = self
            .pool
            .with_writer(|conn| storage::run_migrations(conn))
            .await
            .inspect_err(|e| tracing::error!("Schema migration failed: {}", e))?;

        match outcome {
            MigrationOutcome::Created { version } => {
                tracing::info!("Created schema at version {}", version)
            }
            MigrationOutcome::Upgraded { from, to } => {
                tracing::info!("Upgraded schema from version {} to {}", from, to)
            }
            MigrationOutcome::Current { version } => {
                tracing::debug!("Schema already at version {}", version)
            }
        }
        self.pool.mark_ready();
        Ok(outcome)
    }

    /// Recorded schema version, `None` before the first migration
    pub async fn schema_version(&self) -> Result<Option<i64>> {
        self.pool.with_writer(|conn| storage::schema_version(conn)).await
    }

    /// Round-trip a trivial statement through the backend
    pub async fn health_check(&self) -> Result<()> {
        self.pool
            .with_writer(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
                Ok(())
            })
            .await
    }

    /// Record counts per rank
    pub async fn stats(&self) -> Result<DbStats> {
        crate::queries::stats(&self.pool).await
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Wait for in-flight operations, then release all connections.
    /// Later operations on this handle or its clones fail with `Closed`.
    ///
    /// Concurrent and repeated calls all return only once the store is
    /// fully closed.
    pub async fn close(&self) -> Result<()> {
        if self.pool.close().await? {
            tracing::info!("Closed botanical database");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{family, genus, species};
    use crate::taxon::{Family, Genus, Species};
    use crate::{Error, test_support};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_end_to_end_rose() {
        test_support::init_tracing();
        let db = BotanicalDatabase::memory().await.unwrap();
        db.migrate().await.unwrap();

        let rosaceae = Family::new("Rosaceae", "Juss.");
        family::insert_family(db.pool(), &rosaceae).await.unwrap();
        let rosa = Genus::new(rosaceae.id, "Rosa", "L.");
        genus::insert_genus(db.pool(), &rosa).await.unwrap();
        let rubiginosa = Species::new(rosa.id, "rubiginosa", "L.", Some(1753), Some("LC".to_string()));
        species::insert_species(db.pool(), &rubiginosa).await.unwrap();

        assert_eq!(family::get_families_by_name(db.pool(), "Rosaceae").await.unwrap().len(), 1);
        assert_eq!(genus::get_genera_by_family_id(db.pool(), rosaceae.id).await.unwrap().len(), 1);
        let found = species::get_species_by_name(db.pool(), "rubiginosa").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].publication_year, Some(1753));
        assert_eq!(found[0].conservation_status.as_deref(), Some("LC"));
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = BotanicalDatabase::memory().await.unwrap();
        assert_eq!(db.schema_version().await.unwrap(), None);
        assert!(!db.pool().is_ready());

        let first = db.migrate_with_outcome().await.unwrap();
        assert!(matches!(first, MigrationOutcome::Created { .. }));
        let second = db.migrate_with_outcome().await.unwrap();
        assert_eq!(second, MigrationOutcome::Current { version: storage::SCHEMA_VERSION });
        assert_eq!(db.schema_version().await.unwrap(), Some(storage::SCHEMA_VERSION));
        assert!(db.pool().is_ready());
    }

    #[tokio::test]
    async fn test_health_check_before_migration() {
        let db = BotanicalDatabase::memory().await.unwrap();
        db.health_check().await.unwrap();
        assert!(matches!(db.stats().await, Err(Error::NotReady)));
    }

    #[tokio::test]
    async fn test_durable_store_survives_reopen() {
        test_support::init_tracing();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flora").join("botanica.db");

        let family = Family::new("Fagaceae", "Dumort.");
        {
            let db = crate::initialize_database(&path).await.unwrap();
            family::insert_family(db.pool(), &family).await.unwrap();
            db.close().await.unwrap();
        }

        let db = BotanicalDatabase::file(&path).await.unwrap();
        assert!(matches!(family::get_family_by_id(db.pool(), family.id).await, Err(Error::NotReady)));
        let outcome = db.migrate_with_outcome().await.unwrap();
        assert!(matches!(outcome, MigrationOutcome::Current { .. }));
        assert_eq!(family::get_family_by_id(db.pool(), family.id).await.unwrap(), Some(family));
        db.close().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_migrations_on_one_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("botanica.db");
        // Create the file and switch it to WAL before the race starts
        BotanicalDatabase::file(&path).await.unwrap().close().await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                let db = BotanicalDatabase::file(&path).await?;
                let outcome = db.migrate_with_outcome().await?;
                db.close().await?;
                Ok::<_, Error>(outcome)
            }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                MigrationOutcome::Created { .. } => created += 1,
                MigrationOutcome::Current { .. } => {}
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_partial_durable_layout_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("botanica.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE families (id TEXT PRIMARY KEY, name TEXT);").unwrap();
        }

        let db = BotanicalDatabase::file(&path).await.unwrap();
        assert!(matches!(db.migrate().await, Err(Error::Migration(_))));
        assert!(!db.pool().is_ready());
        assert_eq!(db.schema_version().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_operations_after_close() {
        let db = crate::create_test_database().await.unwrap();
        let clone = db.clone();
        db.close().await.unwrap();
        db.close().await.unwrap();

        assert!(db.pool().is_closed());
        assert!(matches!(clone.stats().await, Err(Error::Closed)));
        assert!(matches!(
            family::insert_family(clone.pool(), &Family::new("Rosaceae", "Juss.")).await,
            Err(Error::Closed)
        ));
        assert!(matches!(clone.migrate().await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn test_open_with_config() {
        let config = DatabaseConfig::memory().with_read_connections(2).with_busy_timeout_ms(250);
        let db = BotanicalDatabase::new(config).await.unwrap();
        assert_eq!(db.config().busy_timeout_ms, 250);
        assert_eq!(db.pool().reader_count(), 0);

        let db = BotanicalDatabase::open(StoreMode::InMemory).await.unwrap();
        assert!(!db.config().mode.is_durable());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_close_waits_for_drain() {
        let dir = TempDir::new().unwrap();
        let db = crate::initialize_database(dir.path().join("botanica.db")).await.unwrap();
        let clone = db.clone();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();

        let slow = {
            let pool = db.pool().clone();
            tokio::spawn(async move {
                pool.with_writer(move |_| {
                    let _ = started_tx.send(());
                    std::thread::sleep(std::time::Duration::from_millis(300));
                    Ok(std::time::Instant::now())
                })
                .await
            })
        };
        started_rx.await.unwrap();

        let first = tokio::spawn(async move { db.close().await });
        tokio::task::yield_now().await;
        clone.close().await.unwrap();
        let closed_at = std::time::Instant::now();

        let finished_at = slow.await.unwrap().unwrap();
        assert!(finished_at <= closed_at);
        first.await.unwrap().unwrap();
    }
}

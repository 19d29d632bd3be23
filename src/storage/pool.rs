//! Shared connection pool
//!
//! One writer connection behind a mutex, plus reader connections in durable
//! mode. All SQLite work runs on the blocking thread pool. Every operation
//! holds a shared gate guard until its blocking section finishes, which is
//! what `close()` waits on.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use crate::config::{self, DatabaseConfig, StoreMode};
use crate::{Error, Result};

type Slot = Mutex<Option<Connection>>;

/// Cloneable handle to the store's connections.
///
/// Clones share the same connections, readiness flag and close state.
#[derive(Debug, Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    writer: Slot,
    readers: Vec<Slot>,
    next_reader: AtomicUsize,
    ready: AtomicBool,
    durable: bool,
    /// `true` once the pool has been closed
    gate: Arc<RwLock<bool>>,
}

impl Pool {
    /// Open the connections described by `config`. Blocking; call from a
    /// blocking context.
    pub(crate) fn connect(config: &DatabaseConfig) -> Result<Self> {
        let (writer, readers) = match &config.mode {
            StoreMode::InMemory => (open_memory(config)?, Vec::new()),
            StoreMode::Durable(path) => {
                config::ensure_db_dir(path)?;
                let writer = open_file(path, config)?;
                writer.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
                let count = config.read_connections.max(1);
                let mut readers = Vec::with_capacity(count);
                for _ in 0..count {
                    let reader = open_file(path, config)?;
                    reader.execute_batch("PRAGMA query_only = ON;")?;
                    readers.push(Mutex::new(Some(reader)));
                }
                (writer, readers)
            }
        };

        Ok(Self {
            inner: Arc::new(PoolInner {
                writer: Mutex::new(Some(writer)),
                readers,
                next_reader: AtomicUsize::new(0),
                ready: AtomicBool::new(false),
                durable: config.mode.is_durable(),
                gate: Arc::new(RwLock::new(false)),
            }),
        })
    }

    /// Whether `migrate()` has completed on this pool
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    pub(crate) fn mark_ready(&self) {
        self.inner.ready.store(true, Ordering::Release);
    }

    /// Number of reader connections (0 when readers share the writer)
    pub fn reader_count(&self) -> usize {
        self.inner.readers.len()
    }

    /// Run a read-only operation on a reader connection.
    ///
    /// `op` runs inside a deferred transaction, so every statement it issues
    /// sees the same snapshot even while writers commit.
    pub(crate) async fn read<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.admit(true).await?;
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let slot = inner.reader_slot();
            let guard = lock(slot)?;
            let conn = guard.as_ref().ok_or(Error::Closed)?;
            let snapshot = conn.unchecked_transaction()?;
            let out = op(&snapshot)?;
            snapshot.commit()?;
            Ok(out)
        })
        .await?
    }

    /// Run `op` inside an immediate transaction on the writer connection.
    ///
    /// Commits when `op` succeeds, rolls back otherwise. Once handed to the
    /// blocking pool the transaction finishes even if the caller stops
    /// waiting.
    pub(crate) async fn write<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.admit(true).await?;
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut guard = lock(&inner.writer)?;
            let conn = guard.as_mut().ok_or(Error::Closed)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = op(&tx)?;
            tx.commit()?;
            Ok(out)
        })
        .await?
    }

    /// Run `op` with exclusive use of the writer connection, ready or not.
    /// Used by the migration engine.
    pub(crate) async fn with_writer<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.admit(false).await?;
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut guard = lock(&inner.writer)?;
            let conn = guard.as_mut().ok_or(Error::Closed)?;
            op(conn)
        })
        .await?
    }

    /// Wait for in-flight operations, then release every connection.
    ///
    /// Durable stores get a WAL checkpoint first so the database file is
    /// complete on its own. Returns `false` when the pool was already closed;
    /// that call still waits for any close in progress to finish.
    pub async fn close(&self) -> Result<bool> {
        let mut closed = Arc::clone(&self.inner.gate).write_owned().await;
        if *closed {
            return Ok(false);
        }
        *closed = true;

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _closed = closed;
            if inner.durable {
                if let Some(conn) = lock(&inner.writer)?.as_ref() {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                }
            }
            for slot in inner.readers.iter().chain(std::iter::once(&inner.writer)) {
                if let Some(conn) = lock(slot)?.take() {
                    conn.close().map_err(|(_, e)| Error::Backend(e))?;
                }
            }
            Ok(true)
        })
        .await?
    }

    pub fn is_closed(&self) -> bool {
        self.inner.gate.try_read().map(|closed| *closed).unwrap_or(true)
    }

    async fn admit(&self, require_ready: bool) -> Result<OwnedRwLockReadGuard<bool>> {
        let permit = Arc::clone(&self.inner.gate).read_owned().await;
        if *permit {
            return Err(Error::Closed);
        }
        if require_ready && !self.is_ready() {
            return Err(Error::NotReady);
        }
        Ok(permit)
    }
}

impl PoolInner {
    /// Next reader in round-robin order, or the writer when there are none
    fn reader_slot(&self) -> &Slot {
        if self.readers.is_empty() {
            return &self.writer;
        }
        let i = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        &self.readers[i]
    }
}

fn lock(slot: &Slot) -> Result<MutexGuard<'_, Option<Connection>>> {
    slot.lock().map_err(|_| Error::LockPoisoned)
}

fn open_memory(config: &DatabaseConfig) -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    apply_pragmas(&conn, config)?;
    Ok(conn)
}

fn open_file(path: &std::path::Path, config: &DatabaseConfig) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)?;
    apply_pragmas(&conn, config)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection, config: &DatabaseConfig) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    if config.foreign_keys {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    }
    Ok(())
}

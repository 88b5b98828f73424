//! SQLite handle and migration runner.
//!
//! The connection lives behind a mutex and every statement runs on tokio's
//! blocking pool, so async callers never block their executor thread.

use std::path::Path;
use std::sync::{Arc, Mutex};

use bookscout_kernel::Migration;
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use thiserror::Error;

pub use rusqlite;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration {module}/{id} failed: {source}")]
    Migration {
        module: String,
        id: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database worker failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("database connection poisoned by a panicked writer")]
    Poisoned,
}

impl DbError {
    /// True when a statement was rejected by a UNIQUE/PRIMARY KEY constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

const MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        PRIMARY KEY (module, id)
    );
"#;

/// Shared SQLite handle; cloning is cheap and clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(target: "bookscout-db", journal_mode = %mode, "journal mode set");
        tracing::info!(target: "bookscout-db", path = %path.display(), "database opened");
        Self::from_connection(conn)
    }

    /// Private in-memory database, mostly for tests
    pub fn in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(MIGRATIONS_TABLE)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn call<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&mut Connection) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| DbError::Poisoned)?;
            f(&mut guard)
        })
        .await?
    }

    /// Apply migrations not yet recorded in `schema_migrations`.
    ///
    /// Each migration runs in its own transaction together with its
    /// bookkeeping row. Returns how many were applied.
    pub async fn apply_migrations(&self, migrations: Vec<(String, Migration)>) -> Result<usize, DbError> {
        self.call(move |conn| {
            let mut applied = 0;

            for (module, migration) in migrations {
                let already: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM schema_migrations WHERE module = ?1 AND id = ?2",
                        rusqlite::params![module, migration.id],
                        |row| row.get(0),
                    )
                    .optional()?;

                if already.is_some() {
                    continue;
                }

                let to_migration_error = |source| DbError::Migration {
                    module: module.clone(),
                    id: migration.id.to_string(),
                    source,
                };

                let tx = conn.transaction()?;
                tx.execute_batch(migration.up).map_err(to_migration_error)?;
                tx.execute(
                    "INSERT INTO schema_migrations (module, id) VALUES (?1, ?2)",
                    rusqlite::params![module, migration.id],
                )?;
                tx.commit()?;

                tracing::info!(
                    target: "bookscout-db",
                    module = %module,
                    migration = migration.id,
                    "migration applied"
                );
                applied += 1;
            }

            Ok(applied)
        })
        .await
    }

    /// Migration ids recorded for a module, oldest first
    pub async fn applied_migrations(&self, module: &str) -> Result<Vec<String>, DbError> {
        let module = module.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM schema_migrations WHERE module = ?1 ORDER BY applied_at, id",
            )?;
            let ids = stmt
                .query_map([module], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(ids)
        })
        .await
    }
}

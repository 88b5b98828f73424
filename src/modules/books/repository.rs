//! Persistence for the saved list and the view history.

use async_trait::async_trait;
use bookscout_db::{
    rusqlite::{self, params, OptionalExtension, Row},
    Database, DbError,
};
use bookscout_kernel::Migration;
use chrono::{DateTime, Utc};

use super::error::BookError;
use super::models::{RecentEntry, SavedEntry};

pub(crate) fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: r#"
            CREATE TABLE saved_book (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                title         TEXT NOT NULL UNIQUE,
                authors       TEXT NOT NULL DEFAULT '',
                thumbnail_url TEXT,
                price         INTEGER
            );
            CREATE TABLE recent_book (
                title         TEXT PRIMARY KEY,
                authors       TEXT NOT NULL DEFAULT '',
                thumbnail_url TEXT,
                date_added    INTEGER NOT NULL
            );
            CREATE INDEX recent_book_date_added ON recent_book (date_added DESC);
            "#,
    }]
}

/// Title-keyed storage for saved books.
#[async_trait]
pub trait SavedRepository: Send + Sync {
    async fn find_saved(&self, title: &str) -> Result<Option<SavedEntry>, BookError>;

    /// Fails with `DuplicateEntry` if the title is already stored.
    async fn insert_saved(&self, entry: &SavedEntry) -> Result<(), BookError>;

    /// All entries in insertion order.
    async fn list_saved(&self) -> Result<Vec<SavedEntry>, BookError>;

    /// Returns false when no row had that title.
    async fn delete_saved(&self, title: &str) -> Result<bool, BookError>;

    async fn delete_all_saved(&self) -> Result<usize, BookError>;
}

/// Title-keyed storage for viewed books.
#[async_trait]
pub trait RecentRepository: Send + Sync {
    /// Insert, or refresh `date_added` (and display fields) of the existing row.
    async fn upsert_recent(&self, entry: &RecentEntry) -> Result<(), BookError>;

    /// Newest first, at most `limit` rows.
    async fn list_recent(&self, limit: usize) -> Result<Vec<RecentEntry>, BookError>;

    async fn newest_recent_stamp(&self) -> Result<Option<DateTime<Utc>>, BookError>;

    /// Delete everything but the `keep` newest rows; returns rows removed.
    async fn evict_recent_beyond(&self, keep: usize) -> Result<usize, BookError>;
}

/// SQLite implementation of both repositories.
#[derive(Clone)]
pub struct SqliteBookRepository {
    db: Database,
}

impl SqliteBookRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn saved_from_row(row: &Row<'_>) -> rusqlite::Result<SavedEntry> {
    Ok(SavedEntry {
        title: row.get(0)?,
        authors: row.get(1)?,
        thumbnail_url: row.get(2)?,
        price: row.get(3)?,
    })
}

fn recent_from_row(row: &Row<'_>) -> rusqlite::Result<RecentEntry> {
    let micros: i64 = row.get(3)?;
    Ok(RecentEntry {
        title: row.get(0)?,
        authors: row.get(1)?,
        thumbnail_url: row.get(2)?,
        date_added: micros_to_utc(micros)?,
    })
}

fn micros_to_utc(micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or(rusqlite::Error::IntegralValueOutOfRange(3, micros))
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl SavedRepository for SqliteBookRepository {
    async fn find_saved(&self, title: &str) -> Result<Option<SavedEntry>, BookError> {
        let title = title.to_string();
        let found = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT title, authors, thumbnail_url, price FROM saved_book WHERE title = ?1",
                        [title],
                        saved_from_row,
                    )
                    .optional()?)
            })
            .await?;
        Ok(found)
    }

    async fn insert_saved(&self, entry: &SavedEntry) -> Result<(), BookError> {
        let entry = entry.clone();
        let title = entry.title.clone();
        let result = self
            .db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO saved_book (title, authors, thumbnail_url, price) VALUES (?1, ?2, ?3, ?4)",
                    params![entry.title, entry.authors, entry.thumbnail_url, entry.price],
                )?;
                Ok(())
            })
            .await;

        match result {
            Err(err) if err.is_unique_violation() => Err(BookError::DuplicateEntry { title }),
            other => Ok(other?),
        }
    }

    async fn list_saved(&self) -> Result<Vec<SavedEntry>, BookError> {
        let entries = self
            .db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT title, authors, thumbnail_url, price FROM saved_book ORDER BY id",
                )?;
                let rows = stmt
                    .query_map([], saved_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(entries)
    }

    async fn delete_saved(&self, title: &str) -> Result<bool, BookError> {
        let title = title.to_string();
        let deleted = self
            .db
            .call(move |conn| Ok(conn.execute("DELETE FROM saved_book WHERE title = ?1", [title])?))
            .await?;
        Ok(deleted > 0)
    }

    async fn delete_all_saved(&self) -> Result<usize, BookError> {
        let deleted = self
            .db
            .call(|conn| Ok(conn.execute("DELETE FROM saved_book", [])?))
            .await?;
        Ok(deleted)
    }
}

#[async_trait]
impl RecentRepository for SqliteBookRepository {
    async fn upsert_recent(&self, entry: &RecentEntry) -> Result<(), BookError> {
        let entry = entry.clone();
        self.db
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO recent_book (title, authors, thumbnail_url, date_added)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT (title) DO UPDATE SET
                        authors       = excluded.authors,
                        thumbnail_url = excluded.thumbnail_url,
                        date_added    = excluded.date_added
                    "#,
                    params![
                        entry.title,
                        entry.authors,
                        entry.thumbnail_url,
                        entry.date_added.timestamp_micros()
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<RecentEntry>, BookError> {
        let limit = limit_param(limit);
        let entries = self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT title, authors, thumbnail_url, date_added FROM recent_book
                     ORDER BY date_added DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map([limit], recent_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(entries)
    }

    async fn newest_recent_stamp(&self) -> Result<Option<DateTime<Utc>>, BookError> {
        let stamp = self
            .db
            .call(|conn| {
                let micros: Option<i64> =
                    conn.query_row("SELECT MAX(date_added) FROM recent_book", [], |row| row.get(0))?;
                Ok(micros.map(micros_to_utc).transpose()?)
            })
            .await?;
        Ok(stamp)
    }

    async fn evict_recent_beyond(&self, keep: usize) -> Result<usize, BookError> {
        let keep = limit_param(keep);
        let evicted = self
            .db
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM recent_book WHERE title NOT IN (
                        SELECT title FROM recent_book ORDER BY date_added DESC LIMIT ?1
                     )",
                    [keep],
                )?)
            })
            .await?;
        Ok(evicted)
    }
}

/// Shorthand for tests and the composition root: a migrated repository.
pub async fn open_repository(db: Database) -> Result<SqliteBookRepository, DbError> {
    let migrations = migrations()
        .into_iter()
        .map(|m| (super::MODULE_NAME.to_string(), m))
        .collect();
    db.apply_migrations(migrations).await?;
    Ok(SqliteBookRepository::new(db))
}

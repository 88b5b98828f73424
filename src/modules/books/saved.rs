//! The saved ("add list") store.

use std::sync::Arc;

use bookscout_events::EventBus;
use tokio::sync::Mutex;

use super::error::BookError;
use super::models::{BookRecord, SavedEntry};
use super::repository::SavedRepository;

/// Change notifications for the saved list. Observers reload the full list;
/// events carry no snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavedListEvent {
    BookAdded,
    BookRemoved { title: String },
    Cleared,
}

/// Saved books, at most one per title.
///
/// `rows` mirrors storage in insertion order and is reloaded by `list` and
/// after every add; `remove_at` indexes into it. Storage is always changed first and `rows`
/// only after storage succeeded.
pub struct SavedListStore {
    repo: Arc<dyn SavedRepository>,
    rows: Mutex<Vec<SavedEntry>>,
    events: EventBus<SavedListEvent>,
}

impl SavedListStore {
    pub fn new(repo: Arc<dyn SavedRepository>) -> Self {
        Self {
            repo,
            rows: Mutex::new(Vec::new()),
            events: EventBus::new(),
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SavedListEvent> {
        self.events.subscribe()
    }

    /// Save `record`; fails with `DuplicateEntry` if its title is already saved.
    pub async fn add(&self, record: &BookRecord) -> Result<SavedEntry, BookError> {
        if record.is_untitled() {
            return Err(BookError::InvalidRequest("cannot save a book without a title".into()));
        }

        let mut rows = self.rows.lock().await;
        if self.repo.find_saved(&record.title).await?.is_some() {
            tracing::info!(title = %record.title, "book already saved");
            return Err(BookError::DuplicateEntry {
                title: record.title.clone(),
            });
        }

        let entry = SavedEntry::from(record);
        self.repo.insert_saved(&entry).await?;
        *rows = self.repo.list_saved().await?;
        drop(rows);

        tracing::info!(title = %entry.title, "book saved");
        self.events.publish(SavedListEvent::BookAdded);
        Ok(entry)
    }

    /// Remove the row at `index` of the current list.
    pub async fn remove_at(&self, index: usize) -> Result<SavedEntry, BookError> {
        let mut rows = self.rows.lock().await;

        let title = rows
            .get(index)
            .map(|entry| entry.title.clone())
            .ok_or_else(|| BookError::NotFound(format!("no saved book at row {index}")))?;

        if !self.repo.delete_saved(&title).await? {
            *rows = self.repo.list_saved().await?;
            return Err(BookError::NotFound(format!("'{title}' is no longer saved")));
        }

        let removed = rows.remove(index);
        drop(rows);

        tracing::info!(title = %removed.title, index, "saved book removed");
        self.events.publish(SavedListEvent::BookRemoved {
            title: removed.title.clone(),
        });
        Ok(removed)
    }

    /// Remove every saved book; returns how many were stored.
    pub async fn remove_all(&self) -> Result<usize, BookError> {
        let mut rows = self.rows.lock().await;

        let deleted = self.repo.delete_all_saved().await?;
        rows.clear();
        drop(rows);

        tracing::info!(deleted, "saved list cleared");
        self.events.publish(SavedListEvent::Cleared);
        Ok(deleted)
    }

    /// Reload from storage (insertion order) and return the list.
    pub async fn list(&self) -> Result<Vec<SavedEntry>, BookError> {
        let mut rows = self.rows.lock().await;
        *rows = self.repo.list_saved().await?;
        Ok(rows.clone())
    }

    /// The list as of the last reload, without touching storage.
    pub async fn view(&self) -> Vec<SavedEntry> {
        self.rows.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::repository::open_repository;
    use async_trait::async_trait;
    use bookscout_db::{Database, DbError};

    async fn store() -> SavedListStore {
        let repo = open_repository(Database::in_memory().unwrap()).await.unwrap();
        SavedListStore::new(Arc::new(repo))
    }

    #[tokio::test]
    async fn duplicate_title_is_rejected() {
        let store = store().await;
        let mut events = store.subscribe();

        store.add(&BookRecord::titled("Title A")).await.unwrap();
        let mut other = BookRecord::titled("Title A");
        other.authors = vec!["someone else".into()];
        let err = store.add(&other).await.unwrap_err();

        assert!(matches!(err, BookError::DuplicateEntry { ref title } if title == "Title A"));
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(events.recv().await.unwrap(), SavedListEvent::BookAdded);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn titles_are_case_sensitive() {
        let store = store().await;
        store.add(&BookRecord::titled("Title A")).await.unwrap();
        store.add(&BookRecord::titled("title a")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn untitled_records_cannot_be_saved() {
        let store = store().await;
        let err = store.add(&BookRecord::default()).await.unwrap_err();
        assert!(matches!(err, BookError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn remove_at_deletes_from_storage_and_view() {
        let store = store().await;
        for title in ["A", "B", "C"] {
            store.add(&BookRecord::titled(title)).await.unwrap();
        }
        store.list().await.unwrap();
        let mut events = store.subscribe();

        let removed = store.remove_at(1).await.unwrap();
        assert_eq!(removed.title, "B");

        let view: Vec<String> = store.view().await.into_iter().map(|e| e.title).collect();
        assert_eq!(view, vec!["A", "C"]);
        let stored: Vec<String> = store.list().await.unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(stored, vec!["A", "C"]);
        assert_eq!(
            events.recv().await.unwrap(),
            SavedListEvent::BookRemoved { title: "B".into() }
        );
    }

    #[tokio::test]
    async fn remove_at_out_of_range_is_not_found() {
        let store = store().await;
        store.add(&BookRecord::titled("A")).await.unwrap();
        store.list().await.unwrap();

        assert!(matches!(store.remove_at(5).await, Err(BookError::NotFound(_))));
        assert_eq!(store.view().await.len(), 1);
    }

    #[tokio::test]
    async fn books_added_after_listing_are_removable_by_row() {
        let store = store().await;
        store.add(&BookRecord::titled("A")).await.unwrap();
        store.list().await.unwrap();
        store.add(&BookRecord::titled("B")).await.unwrap();

        let removed = store.remove_at(1).await.unwrap();
        assert_eq!(removed.title, "B");
        let stored: Vec<String> = store.list().await.unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(stored, vec!["A"]);
    }

    #[tokio::test]
    async fn row_deleted_elsewhere_drops_out_of_the_view() {
        let repo = Arc::new(open_repository(Database::in_memory().unwrap()).await.unwrap());
        let store = SavedListStore::new(repo.clone());
        for title in ["A", "B", "C"] {
            store.add(&BookRecord::titled(title)).await.unwrap();
        }
        repo.delete_saved("B").await.unwrap();

        assert!(matches!(store.remove_at(1).await, Err(BookError::NotFound(_))));
        let view: Vec<String> = store.view().await.into_iter().map(|e| e.title).collect();
        assert_eq!(view, vec!["A", "C"]);

        assert_eq!(store.remove_at(1).await.unwrap().title, "C");
    }

    #[tokio::test]
    async fn remove_all_empties_everything() {
        let store = store().await;
        store.add(&BookRecord::titled("A")).await.unwrap();
        store.add(&BookRecord::titled("B")).await.unwrap();
        store.list().await.unwrap();

        assert_eq!(store.remove_all().await.unwrap(), 2);
        assert!(store.view().await.is_empty());
        assert!(store.list().await.unwrap().is_empty());
    }

    /// Storage whose deletes always fail.
    struct BrokenDeletes {
        rows: Vec<SavedEntry>,
    }

    #[async_trait]
    impl SavedRepository for BrokenDeletes {
        async fn find_saved(&self, _title: &str) -> Result<Option<SavedEntry>, BookError> {
            Ok(None)
        }

        async fn insert_saved(&self, _entry: &SavedEntry) -> Result<(), BookError> {
            Ok(())
        }

        async fn list_saved(&self) -> Result<Vec<SavedEntry>, BookError> {
            Ok(self.rows.clone())
        }

        async fn delete_saved(&self, _title: &str) -> Result<bool, BookError> {
            Err(BookError::Storage(DbError::Poisoned))
        }

        async fn delete_all_saved(&self) -> Result<usize, BookError> {
            Err(BookError::Storage(DbError::Poisoned))
        }
    }

    #[tokio::test]
    async fn failed_storage_delete_leaves_view_intact() {
        let rows = vec![
            SavedEntry::from(&BookRecord::titled("A")),
            SavedEntry::from(&BookRecord::titled("B")),
        ];
        let store = SavedListStore::new(Arc::new(BrokenDeletes { rows }));
        store.list().await.unwrap();

        assert!(matches!(store.remove_at(0).await, Err(BookError::Storage(_))));
        assert!(matches!(store.remove_all().await, Err(BookError::Storage(_))));
        assert_eq!(store.view().await.len(), 2);
    }
}

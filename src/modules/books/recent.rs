//! Recently viewed books.

use std::sync::Arc;

use bookscout_events::EventBus;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::error::BookError;
use super::models::{BookRecord, RecentEntry};
use super::repository::RecentRepository;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecentEvent {
    /// The history changed; carries the refreshed newest-first list
    Updated { entries: Vec<RecentEntry> },
}

/// View history: one row per title, newest first, at most `capacity` rows.
///
/// Rows past `capacity` are evicted on every write, so storage stays bounded.
pub struct RecentHistoryStore {
    repo: Arc<dyn RecentRepository>,
    capacity: usize,
    /// Last stamp handed out; `None` until seeded from storage.
    last_stamp: Mutex<Option<DateTime<Utc>>>,
    events: EventBus<RecentEvent>,
}

impl RecentHistoryStore {
    pub const DEFAULT_CAPACITY: usize = 20;

    pub fn new(repo: Arc<dyn RecentRepository>, capacity: usize) -> Self {
        Self {
            repo,
            capacity,
            last_stamp: Mutex::new(None),
            events: EventBus::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RecentEvent> {
        self.events.subscribe()
    }

    /// Record that `record` was opened and return the refreshed history.
    pub async fn record_view(&self, record: &BookRecord) -> Result<Vec<RecentEntry>, BookError> {
        if record.is_untitled() {
            return Err(BookError::InvalidRequest("cannot record a book without a title".into()));
        }

        {
            // Held across the write so stamps reach storage in order.
            let mut last = self.last_stamp.lock().await;
            if last.is_none() {
                *last = self.repo.newest_recent_stamp().await?;
            }

            let stamp = next_stamp(*last, Utc::now());
            self.repo
                .upsert_recent(&RecentEntry::viewed(record, stamp))
                .await?;
            *last = Some(stamp);
        }

        let evicted = self.repo.evict_recent_beyond(self.capacity).await?;
        if evicted > 0 {
            tracing::debug!(evicted, capacity = self.capacity, "history trimmed");
        }

        let entries = self.list().await?;
        tracing::info!(title = %record.title, "book view recorded");
        self.events.publish(RecentEvent::Updated {
            entries: entries.clone(),
        });
        Ok(entries)
    }

    /// Up to `capacity` entries, newest first.
    pub async fn list(&self) -> Result<Vec<RecentEntry>, BookError> {
        self.repo.list_recent(self.capacity).await
    }
}

/// `now` at microsecond precision, bumped past `last` so that stamps
/// strictly increase even within one clock tick.
fn next_stamp(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    let now_micros = now.timestamp_micros();
    let micros = match last {
        Some(last) => now_micros.max(last.timestamp_micros() + 1),
        None => now_micros,
    };
    DateTime::from_timestamp_micros(micros).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::repository::open_repository;
    use bookscout_db::Database;

    async fn store(capacity: usize) -> RecentHistoryStore {
        let repo = open_repository(Database::in_memory().unwrap()).await.unwrap();
        RecentHistoryStore::new(Arc::new(repo), capacity)
    }

    fn titles(entries: &[RecentEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.title.as_str()).collect()
    }

    fn assert_strictly_descending(entries: &[RecentEntry]) {
        for pair in entries.windows(2) {
            assert!(pair[0].date_added > pair[1].date_added, "{pair:?}");
        }
    }

    #[tokio::test]
    async fn viewing_twice_refreshes_without_duplicating() {
        let store = store(RecentHistoryStore::DEFAULT_CAPACITY).await;

        let first = store.record_view(&BookRecord::titled("A")).await.unwrap();
        store.record_view(&BookRecord::titled("B")).await.unwrap();
        let after = store.record_view(&BookRecord::titled("A")).await.unwrap();

        assert_eq!(titles(&after), vec!["A", "B"]);
        assert!(after[0].date_added > first[0].date_added);
        assert_strictly_descending(&after);
    }

    #[tokio::test]
    async fn twenty_one_titles_keep_the_newest_twenty() {
        let store = store(RecentHistoryStore::DEFAULT_CAPACITY).await;

        for i in 1..=21 {
            store
                .record_view(&BookRecord::titled(format!("Title {i}")))
                .await
                .unwrap();
        }

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 20);
        assert_eq!(listed[0].title, "Title 21");
        assert_eq!(listed[19].title, "Title 2");
        assert!(!listed.iter().any(|e| e.title == "Title 1"));
        assert_strictly_descending(&listed);
    }

    #[tokio::test]
    async fn storage_is_bounded_by_capacity() {
        let repo = Arc::new(open_repository(Database::in_memory().unwrap()).await.unwrap());
        let store = RecentHistoryStore::new(repo.clone(), 3);

        for i in 0..6 {
            store
                .record_view(&BookRecord::titled(format!("T{i}")))
                .await
                .unwrap();
        }

        let everything = repo.list_recent(100).await.unwrap();
        assert_eq!(titles(&everything), vec!["T5", "T4", "T3"]);
    }

    #[tokio::test]
    async fn observers_get_the_refreshed_list() {
        let store = store(5).await;
        let mut events = store.subscribe();

        let returned = store.record_view(&BookRecord::titled("A")).await.unwrap();
        let RecentEvent::Updated { entries } = events.recv().await.unwrap();
        assert_eq!(entries, returned);
    }

    #[tokio::test]
    async fn stamps_continue_after_existing_history() {
        let repo = Arc::new(open_repository(Database::in_memory().unwrap()).await.unwrap());
        let future = Utc::now() + chrono::Duration::hours(1);
        repo.upsert_recent(&RecentEntry::viewed(&BookRecord::titled("Old"), future))
            .await
            .unwrap();

        let store = RecentHistoryStore::new(repo, 20);
        let listed = store.record_view(&BookRecord::titled("New")).await.unwrap();
        assert_eq!(titles(&listed), vec!["New", "Old"]);
    }

    #[tokio::test]
    async fn untitled_views_are_rejected() {
        let store = store(20).await;
        let err = store.record_view(&BookRecord::titled("")).await.unwrap_err();
        assert!(matches!(err, BookError::InvalidRequest(_)));
    }

    #[test]
    fn next_stamp_is_strictly_increasing() {
        let now = Utc::now();
        let first = next_stamp(None, now);
        let second = next_stamp(Some(first), now);
        assert!(second > first);
        assert_eq!(second.timestamp_micros(), first.timestamp_micros() + 1);
    }
}

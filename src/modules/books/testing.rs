//! Test doubles shared by the books module tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::client::BookSearch;
use super::error::BookError;
use super::models::{BookRecord, SearchPage, SearchRequest};

/// Builds page `page` of `query` with `count` distinctly titled items.
pub(crate) fn page_of(query: &str, page: u32, count: usize, is_last_page: bool) -> SearchPage {
    let items = (0..count)
        .map(|i| {
            let mut record = BookRecord::titled(format!("{query} #{page}-{i}"));
            record.authors = vec![format!("author {i}")];
            record.price = Some(10_000 + i as i64);
            record
        })
        .collect();

    SearchPage {
        is_last_page,
        pageable_count: 0,
        total_count: 0,
        items,
    }
}

/// Holds one request for a query until released.
#[derive(Default)]
pub(crate) struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Scripted [`BookSearch`]: pages per query, one-shot failures and gates.
#[derive(Default)]
pub(crate) struct FakeSearch {
    pages: Mutex<HashMap<String, Vec<SearchPage>>>,
    gates: Mutex<HashMap<String, Arc<Gate>>>,
    fail_next: Mutex<Option<u16>>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl FakeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pages(&self, query: &str, pages: Vec<SearchPage>) {
        self.pages.lock().unwrap().insert(query.to_string(), pages);
    }

    /// The next request for `query` waits on the returned gate.
    pub fn gate(&self, query: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates
            .lock()
            .unwrap()
            .insert(query.to_string(), gate.clone());
        gate
    }

    /// The next request fails with this upstream status.
    pub fn fail_next(&self, status: u16) {
        *self.fail_next.lock().unwrap() = Some(status);
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl BookSearch for FakeSearch {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, BookError> {
        self.requests.lock().unwrap().push(request.clone());

        let gate = self.gates.lock().unwrap().remove(&request.query);
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let failure = self.fail_next.lock().unwrap().take();
        if let Some(status) = failure {
            return Err(BookError::UpstreamError { status });
        }

        let page = self
            .pages
            .lock()
            .unwrap()
            .get(&request.query)
            .and_then(|pages| pages.get(request.page as usize - 1))
            .cloned();

        page.ok_or_else(|| {
            BookError::NotFound(format!("no page {} for '{}'", request.page, request.query))
        })
    }
}

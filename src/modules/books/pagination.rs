//! Incremental search: fetch page after page into one growing result list.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bookscout_events::EventBus;
use serde::Serialize;

use super::client::{BookSearch, MAX_PAGE};
use super::error::BookError;
use super::models::{BookRecord, SearchRequest, SearchTarget, SortOrder};

/// Notifications for whoever renders the result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    /// The accumulated list changed; re-render it
    ResultsChanged {
        query: String,
        page: u32,
        total_items: usize,
        is_last_page: bool,
    },
    /// A page failed to load; the list is unchanged
    Failed {
        query: String,
        page: u32,
        code: &'static str,
        message: String,
    },
}

/// Why a load request did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyLoading,
    Exhausted,
}

/// Result of a `load_next`/`load_more`/`reset` call.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded { page: u32, appended: usize },
    Skipped(SkipReason),
    /// A `reset` happened while this page was in flight; its response was dropped
    Stale,
    Failed(BookError),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Loading,
    Exhausted,
}

/// Point-in-time copy of the controller state.
#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    pub query: Option<String>,
    pub phase: Phase,
    pub current_page: u32,
    pub is_last_page: bool,
    pub total_count: u32,
    pub results: Vec<BookRecord>,
}

#[derive(Debug)]
struct PageState {
    query: Option<String>,
    current_page: u32,
    is_last_page: bool,
    is_loading: bool,
    total_count: u32,
    results: Vec<BookRecord>,
    /// Bumped by every reset; responses tagged with an older value are stale.
    generation: u64,
}

impl PageState {
    fn new() -> Self {
        Self {
            query: None,
            current_page: 1,
            is_last_page: false,
            is_loading: false,
            total_count: 0,
            results: Vec::new(),
            generation: 0,
        }
    }

    fn phase(&self) -> Phase {
        if self.is_loading {
            Phase::Loading
        } else if self.is_last_page {
            Phase::Exhausted
        } else {
            Phase::Idle
        }
    }
}

/// Owns the page cursor for one result list.
///
/// At most one page is in flight at a time: the loading flag is checked and
/// set under the state lock, and concurrent callers get
/// `Skipped(AlreadyLoading)` instead of issuing a second request. The page
/// cursor only advances when a page arrives.
pub struct PaginationController {
    client: Arc<dyn BookSearch>,
    page_size: u32,
    sort: SortOrder,
    target: SearchTarget,
    state: Mutex<PageState>,
    events: EventBus<SearchEvent>,
}

impl PaginationController {
    pub fn new(client: Arc<dyn BookSearch>, page_size: u32) -> Self {
        Self {
            client,
            page_size,
            sort: SortOrder::default(),
            target: SearchTarget::default(),
            state: Mutex::new(PageState::new()),
            events: EventBus::new(),
        }
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_target(mut self, target: SearchTarget) -> Self {
        self.target = target;
        self
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SearchEvent> {
        self.events.subscribe()
    }

    // The lock is never held across an await or a panic-prone call, so a
    // poisoned state is still consistent.
    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start over for `query` and fetch its first page.
    ///
    /// Any page still in flight for an earlier query is discarded on arrival.
    pub async fn reset(&self, query: &str) -> LoadOutcome {
        {
            let mut state = self.state();
            state.generation += 1;
            state.query = Some(query.to_string());
            state.current_page = 1;
            state.is_last_page = false;
            state.is_loading = false;
            state.total_count = 0;
            state.results.clear();
        }
        tracing::debug!(query, "search reset");
        self.load_next(query).await
    }

    /// Fetch the next page unless one is already loading or the last page was seen.
    pub async fn load_next(&self, query: &str) -> LoadOutcome {
        let (page, generation) = {
            let mut state = self.state();
            if state.is_loading {
                return LoadOutcome::Skipped(SkipReason::AlreadyLoading);
            }
            if state.is_last_page {
                return LoadOutcome::Skipped(SkipReason::Exhausted);
            }
            state.is_loading = true;
            (state.current_page, state.generation)
        };

        let mut in_flight = InFlight {
            state: &self.state,
            generation,
            armed: true,
        };

        let request = SearchRequest::new(query)
            .page(page)
            .size(self.page_size)
            .sort(self.sort)
            .target(self.target);
        let result = self.client.search(&request).await;

        in_flight.armed = false;
        let mut state = self.state();
        if state.generation != generation {
            tracing::debug!(query, page, "discarding stale page");
            return LoadOutcome::Stale;
        }
        state.is_loading = false;

        match result {
            Ok(found) => {
                let appended = found.items.len();
                if page == 1 {
                    state.results = found.items;
                } else {
                    state.results.extend(found.items);
                }
                // The API serves no page past MAX_PAGE even when `is_end` is false.
                state.is_last_page = found.is_last_page || page >= MAX_PAGE;
                state.total_count = found.total_count;
                state.current_page = page + 1;
                state.query = Some(query.to_string());

                let event = SearchEvent::ResultsChanged {
                    query: query.to_string(),
                    page,
                    total_items: state.results.len(),
                    is_last_page: state.is_last_page,
                };
                drop(state);

                tracing::info!(query, page, appended, "page loaded");
                self.events.publish(event);
                LoadOutcome::Loaded { page, appended }
            }
            Err(err) => {
                drop(state);

                tracing::warn!(query, page, error = %err, "page load failed");
                self.events.publish(SearchEvent::Failed {
                    query: query.to_string(),
                    page,
                    code: err.code(),
                    message: err.to_string(),
                });
                LoadOutcome::Failed(err)
            }
        }
    }

    /// `load_next` for the near-end-of-list trigger; see [`Self::is_load_trigger`].
    pub async fn load_more(&self, query: &str) -> LoadOutcome {
        tracing::trace!(query, "load more requested");
        self.load_next(query).await
    }

    /// Whether displaying the item at `index` should trigger `load_more`:
    /// it is the last held item and more pages can be fetched now.
    pub fn is_load_trigger(&self, index: usize) -> bool {
        let state = self.state();
        index + 1 == state.results.len() && !state.is_last_page && !state.is_loading
    }

    pub fn results(&self) -> Vec<BookRecord> {
        self.state().results.clone()
    }

    pub fn phase(&self) -> Phase {
        self.state().phase()
    }

    pub fn current_page(&self) -> u32 {
        self.state().current_page
    }

    pub fn snapshot(&self) -> PageSnapshot {
        let state = self.state();
        PageSnapshot {
            query: state.query.clone(),
            phase: state.phase(),
            current_page: state.current_page,
            is_last_page: state.is_last_page,
            total_count: state.total_count,
            results: state.results.clone(),
        }
    }
}

/// Clears the loading flag if a `load_next` future is dropped mid-request.
struct InFlight<'a> {
    state: &'a Mutex<PageState>,
    generation: u64,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation == self.generation {
            state.is_loading = false;
        }
    }
}

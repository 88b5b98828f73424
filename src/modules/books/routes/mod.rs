//! HTTP routes of the books module, mounted under `/api/books`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use bookscout_http::error::AppError;
use serde::Deserialize;

use super::client::BookSearch as _;
use super::models::{
    BookRecord, RecentEntry, SavedEntry, SearchPage, SearchRequest, SearchTarget, SortOrder,
};
use super::BooksService;

type Shared = State<Arc<BooksService>>;

pub fn router(service: Arc<BooksService>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/search", get(search))
        .route("/lookup", get(lookup))
        .route("/saved", get(list_saved).post(add_saved).delete(clear_saved))
        .route("/saved/{index}", delete(remove_saved))
        .route("/recent", get(list_recent).post(record_view))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub target: SearchTarget,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    pub title: String,
}

async fn health_check() -> &'static str {
    "books module is healthy"
}

async fn search(
    State(service): Shared,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPage>, AppError> {
    let request = SearchRequest::new(params.query)
        .sort(params.sort)
        .target(params.target)
        .page(params.page.unwrap_or(1))
        .size(params.size.unwrap_or(service.page_size));

    Ok(Json(service.client.search(&request).await?))
}

async fn lookup(
    State(service): Shared,
    Query(params): Query<LookupParams>,
) -> Result<Json<BookRecord>, AppError> {
    Ok(Json(service.client.lookup_title(&params.title).await?))
}

async fn list_saved(State(service): Shared) -> Result<Json<Vec<SavedEntry>>, AppError> {
    Ok(Json(service.saved.list().await?))
}

async fn add_saved(
    State(service): Shared,
    Json(record): Json<BookRecord>,
) -> Result<(StatusCode, Json<SavedEntry>), AppError> {
    let entry = service.saved.add(&record).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// `index` addresses the list as last returned by `GET /saved`.
async fn remove_saved(
    State(service): Shared,
    Path(index): Path<usize>,
) -> Result<StatusCode, AppError> {
    service.saved.remove_at(index).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_saved(State(service): Shared) -> Result<StatusCode, AppError> {
    service.saved.remove_all().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_recent(State(service): Shared) -> Result<Json<Vec<RecentEntry>>, AppError> {
    Ok(Json(service.recent.list().await?))
}

async fn record_view(
    State(service): Shared,
    Json(record): Json<BookRecord>,
) -> Result<Json<Vec<RecentEntry>>, AppError> {
    Ok(Json(service.recent.record_view(&record).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::testing::{page_of, FakeSearch};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request},
        response::Response,
    };
    use bookscout_db::Database;
    use tower::ServiceExt;

    async fn app() -> (Router, Arc<FakeSearch>) {
        let fake = Arc::new(FakeSearch::new());
        fake.add_pages("rust", vec![page_of("rust", 1, 3, true)]);
        let service = BooksService::open(fake.clone(), Database::in_memory().unwrap(), 10, 20)
            .await
            .unwrap();
        (router(Arc::new(service)), fake)
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        router.clone().oneshot(request).await.unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn search_uses_configured_page_size() {
        let (router, fake) = app().await;

        let response = send(&router, Method::GET, "/search?query=rust&sort=latest", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["is_last_page"], true);
        assert_eq!(body["items"].as_array().unwrap().len(), 3);

        let request = fake.requests().pop().unwrap();
        assert_eq!(request.size, 10);
        assert_eq!(request.sort, SortOrder::Latest);
    }

    #[tokio::test]
    async fn upstream_failure_is_bad_gateway() {
        let (router, fake) = app().await;
        fake.fail_next(500);

        let response = send(&router, Method::GET, "/search?query=rust", None).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json(response).await["error"]["code"], "upstream_error");
    }

    #[tokio::test]
    async fn lookup_returns_first_match() {
        let (router, _) = app().await;

        let response = send(&router, Method::GET, "/lookup?title=rust", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["title"], "rust #1-0");
    }

    #[tokio::test]
    async fn saving_twice_conflicts() {
        let (router, _) = app().await;
        let book = serde_json::json!({ "title": "Title A", "authors": ["Kim"], "price": 12000 });

        let response = send(&router, Method::POST, "/saved", Some(book.clone())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json(response).await["authors"], "Kim");

        let response = send(&router, Method::POST, "/saved", Some(book)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json(response).await["error"]["code"], "duplicate_entry");

        let listed = json(send(&router, Method::GET, "/saved", None).await).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn saved_rows_can_be_removed_by_index_and_cleared() {
        let (router, _) = app().await;
        for title in ["A", "B", "C"] {
            send(&router, Method::POST, "/saved", Some(serde_json::json!({ "title": title }))).await;
        }
        send(&router, Method::GET, "/saved", None).await;

        let response = send(&router, Method::DELETE, "/saved/0", None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let listed = json(send(&router, Method::GET, "/saved", None).await).await;
        assert_eq!(listed[0]["title"], "B");

        let response = send(&router, Method::DELETE, "/saved/9", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&router, Method::DELETE, "/saved", None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let listed = json(send(&router, Method::GET, "/saved", None).await).await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn newly_saved_row_is_removable_without_relisting() {
        let (router, _) = app().await;
        send(&router, Method::POST, "/saved", Some(serde_json::json!({ "title": "A" }))).await;
        send(&router, Method::GET, "/saved", None).await;
        send(&router, Method::POST, "/saved", Some(serde_json::json!({ "title": "B" }))).await;

        let response = send(&router, Method::DELETE, "/saved/1", None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let listed = json(send(&router, Method::GET, "/saved", None).await).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["title"], "A");
    }

    #[tokio::test]
    async fn recording_views_returns_newest_first() {
        let (router, _) = app().await;

        for title in ["A", "B", "A"] {
            let response = send(&router, Method::POST, "/recent", Some(serde_json::json!({ "title": title }))).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let listed = json(send(&router, Method::GET, "/recent", None).await).await;
        let titles: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["A", "B"]);
    }
}

//! Search API client.

use std::time::Duration;

use async_trait::async_trait;
use bookscout_kernel::settings::SearchSettings;
use reqwest::{header, Client, StatusCode, Url};

use super::error::BookError;
use super::models::{BookRecord, SearchPage, SearchRequest, SearchResponse};

/// Largest `page` and `size` the search API accepts.
pub const MAX_PAGE: u32 = 50;
pub const MAX_SIZE: u32 = 50;

/// A single-shot book search. No retries: a failure is returned as is.
#[async_trait]
pub trait BookSearch: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, BookError>;

    /// Fetch full details for a title: first hit of a one-item title search.
    async fn lookup_title(&self, title: &str) -> Result<BookRecord, BookError> {
        let request = SearchRequest::new(title).page(1).size(1);
        self.search(&request)
            .await?
            .items
            .into_iter()
            .next()
            .ok_or_else(|| BookError::NotFound(format!("no book titled '{title}'")))
    }
}

/// Client for the Kakao book search endpoint.
pub struct KakaoBookClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl KakaoBookClient {
    pub fn new(settings: &SearchSettings) -> Result<Self, BookError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| BookError::Transport(e.to_string()))?;

        Ok(Self::with_http_client(client, settings))
    }

    /// Use a preconfigured `reqwest::Client` (proxy, TLS, timeout already set).
    pub fn with_http_client(client: Client, settings: &SearchSettings) -> Self {
        if settings.api_key.is_empty() {
            tracing::warn!("search.api_key is empty; upstream will reject requests");
        }

        Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
        }
    }

    fn request_url(&self, request: &SearchRequest) -> Result<Url, BookError> {
        validate(request)?;

        let page = request.page.to_string();
        let size = request.size.to_string();
        let params = [
            ("query", request.query.as_str()),
            ("sort", request.sort.as_str()),
            ("page", page.as_str()),
            ("size", size.as_str()),
            ("target", request.target.as_str()),
        ];

        Url::parse_with_params(&self.endpoint, &params)
            .map_err(|e| BookError::InvalidRequest(format!("bad endpoint '{}': {e}", self.endpoint)))
    }
}

fn validate(request: &SearchRequest) -> Result<(), BookError> {
    if request.query.trim().is_empty() {
        return Err(BookError::InvalidRequest("query must not be empty".into()));
    }
    if !(1..=MAX_PAGE).contains(&request.page) {
        return Err(BookError::InvalidRequest(format!(
            "page {} outside 1..={MAX_PAGE}",
            request.page
        )));
    }
    if !(1..=MAX_SIZE).contains(&request.size) {
        return Err(BookError::InvalidRequest(format!(
            "size {} outside 1..={MAX_SIZE}",
            request.size
        )));
    }
    Ok(())
}

#[async_trait]
impl BookSearch for KakaoBookClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, BookError> {
        let url = self.request_url(request)?;

        tracing::debug!(
            query = %request.query,
            page = request.page,
            size = request.size,
            "searching books"
        );

        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, format!("KakaoAK {}", self.api_key))
            .send()
            .await
            .map_err(|e| BookError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(status = status.as_u16(), query = %request.query, "search rejected upstream");
            return Err(BookError::UpstreamError {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| BookError::Transport(e.to_string()))?;

        let decoded: SearchResponse =
            serde_json::from_slice(&body).map_err(|e| BookError::DecodingError(e.to_string()))?;

        Ok(decoded.into())
    }
}

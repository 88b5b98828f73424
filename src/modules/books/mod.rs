pub mod client;
pub mod error;
pub mod models;
pub mod pagination;
pub mod recent;
pub mod repository;
pub mod routes;
pub mod saved;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookscout_db::{Database, DbError};
use bookscout_kernel::{InitCtx, Migration, Module};

use client::BookSearch;
use pagination::PaginationController;
use recent::RecentHistoryStore;
use repository::SqliteBookRepository;
use saved::SavedListStore;

pub const MODULE_NAME: &str = "books";

/// Everything the books module needs, wired once by the composition root.
pub struct BooksService {
    pub client: Arc<dyn BookSearch>,
    pub saved: Arc<SavedListStore>,
    pub recent: Arc<RecentHistoryStore>,
    pub page_size: u32,
}

impl BooksService {
    pub fn new(
        client: Arc<dyn BookSearch>,
        repository: SqliteBookRepository,
        page_size: u32,
        history_capacity: usize,
    ) -> Self {
        let repository = Arc::new(repository);
        Self {
            client,
            saved: Arc::new(SavedListStore::new(repository.clone())),
            recent: Arc::new(RecentHistoryStore::new(repository, history_capacity)),
            page_size,
        }
    }

    /// Migrate `db` and build the service on top of it.
    pub async fn open(
        client: Arc<dyn BookSearch>,
        db: Database,
        page_size: u32,
        history_capacity: usize,
    ) -> Result<Self, DbError> {
        let repository = repository::open_repository(db).await?;
        Ok(Self::new(client, repository, page_size, history_capacity))
    }

    /// A fresh result list; one per screen or session.
    pub fn paginator(&self) -> PaginationController {
        PaginationController::new(self.client.clone(), self.page_size)
    }
}

/// Search, saved list and view history
pub struct BooksModule {
    service: Arc<BooksService>,
}

impl BooksModule {
    pub fn new(service: Arc<BooksService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<BooksService> {
        &self.service
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            endpoint = %ctx.settings.search.endpoint,
            page_size = self.service.page_size,
            history_capacity = self.service.recent.capacity(),
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            serde_json::json!({
                "description": description,
                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
            })
        };
        let json_of = |description: &str, schema: serde_json::Value| {
            serde_json::json!({
                "description": description,
                "content": { "application/json": { "schema": schema } }
            })
        };
        let list_of = |name: &str| {
            serde_json::json!({ "type": "array", "items": { "$ref": format!("#/components/schemas/{name}") } })
        };
        let schema = |name: &str| serde_json::json!({ "$ref": format!("#/components/schemas/{name}") });
        let book_body = serde_json::json!({
            "required": true,
            "content": { "application/json": { "schema": schema("BookRecord") } }
        });
        let query_param = |name: &str, kind: &str, required: bool| {
            serde_json::json!({ "name": name, "in": "query", "required": required, "schema": { "type": kind } })
        };

        Some(serde_json::json!({
            "paths": {
                "/search": {
                    "get": {
                        "summary": "Search books (single page)",
                        "tags": ["Books"],
                        "parameters": [
                            query_param("query", "string", true),
                            query_param("sort", "string", false),
                            query_param("target", "string", false),
                            query_param("page", "integer", false),
                            query_param("size", "integer", false)
                        ],
                        "responses": {
                            "200": json_of("One page of results", schema("SearchPage")),
                            "400": error("Invalid query"),
                            "502": error("Search API failed")
                        }
                    }
                },
                "/lookup": {
                    "get": {
                        "summary": "Full details for a title",
                        "tags": ["Books"],
                        "parameters": [query_param("title", "string", true)],
                        "responses": {
                            "200": json_of("First match", schema("BookRecord")),
                            "404": error("No match"),
                            "502": error("Search API failed")
                        }
                    }
                },
                "/saved": {
                    "get": {
                        "summary": "List saved books",
                        "tags": ["Saved"],
                        "responses": { "200": json_of("Saved books", list_of("SavedEntry")) }
                    },
                    "post": {
                        "summary": "Save a book",
                        "tags": ["Saved"],
                        "requestBody": book_body.clone(),
                        "responses": {
                            "201": json_of("Saved", schema("SavedEntry")),
                            "409": error("Title already saved")
                        }
                    },
                    "delete": {
                        "summary": "Remove all saved books",
                        "tags": ["Saved"],
                        "responses": { "204": { "description": "Cleared" } }
                    }
                },
                "/saved/{index}": {
                    "delete": {
                        "summary": "Remove the saved book at a row of the last listing",
                        "tags": ["Saved"],
                        "parameters": [{ "name": "index", "in": "path", "required": true, "schema": { "type": "integer" } }],
                        "responses": {
                            "204": { "description": "Removed" },
                            "404": error("No such row")
                        }
                    }
                },
                "/recent": {
                    "get": {
                        "summary": "Recently viewed books, newest first",
                        "tags": ["Recent"],
                        "responses": { "200": json_of("History", list_of("RecentEntry")) }
                    },
                    "post": {
                        "summary": "Record a book view",
                        "tags": ["Recent"],
                        "requestBody": book_body,
                        "responses": { "200": json_of("Refreshed history", list_of("RecentEntry")) }
                    }
                },
                "/health": {
                    "get": {
                        "summary": "Books health check",
                        "tags": ["Books"],
                        "responses": { "200": { "description": "OK" } }
                    }
                }
            },
            "components": {
                "schemas": {
                    "BookRecord": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "authors": { "type": "array", "items": { "type": "string" } },
                            "contents": { "type": "string", "nullable": true },
                            "thumbnail": { "type": "string", "nullable": true },
                            "price": { "type": "integer", "nullable": true },
                            "sale_price": { "type": "integer", "nullable": true },
                            "datetime": { "type": "string", "format": "date-time", "nullable": true },
                            "isbn": { "type": "string", "nullable": true },
                            "publisher": { "type": "string", "nullable": true },
                            "translators": { "type": "array", "items": { "type": "string" } },
                            "url": { "type": "string", "nullable": true },
                            "status": { "type": "string", "nullable": true }
                        },
                        "required": ["title"]
                    },
                    "SearchPage": {
                        "type": "object",
                        "properties": {
                            "is_last_page": { "type": "boolean" },
                            "pageable_count": { "type": "integer" },
                            "total_count": { "type": "integer" },
                            "items": list_of("BookRecord")
                        },
                        "required": ["is_last_page", "pageable_count", "total_count", "items"]
                    },
                    "SavedEntry": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "authors": { "type": "string" },
                            "thumbnail_url": { "type": "string", "nullable": true },
                            "price": { "type": "integer", "nullable": true }
                        },
                        "required": ["title", "authors"]
                    },
                    "RecentEntry": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "authors": { "type": "string" },
                            "thumbnail_url": { "type": "string", "nullable": true },
                            "date_added": { "type": "string", "format": "date-time" }
                        },
                        "required": ["title", "authors", "date_added"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        repository::migrations()
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

pub fn create_module(service: Arc<BooksService>) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(service))
}

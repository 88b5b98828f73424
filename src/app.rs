//! Composition root: settings in, wired modules out.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use bookscout_db::Database;
use bookscout_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules::{
    self,
    books::{client::{BookSearch, KakaoBookClient}, repository::SqliteBookRepository, BooksService},
};

pub struct App {
    pub settings: Settings,
    pub registry: ModuleRegistry,
    pub db: Database,
    pub books: Arc<BooksService>,
}

impl App {
    /// Open storage, build the search client, register modules, apply
    /// pending migrations and run module init.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let client = KakaoBookClient::new(&settings.search).context("failed to build search client")?;
        Self::build_with_client(settings, Arc::new(client)).await
    }

    pub async fn build_with_client(
        settings: Settings,
        client: Arc<dyn BookSearch>,
    ) -> anyhow::Result<Self> {
        let db = open_database(&settings)?;

        let books = Arc::new(BooksService::new(
            client,
            SqliteBookRepository::new(db.clone()),
            settings.search.page_size,
            settings.history.capacity,
        ));

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, books.clone())?;

        let applied = db
            .apply_migrations(registry.collect_migrations())
            .await
            .context("failed to apply migrations")?;
        tracing::info!(applied, modules = registry.len(), "migrations up to date");

        registry.init_all(&InitCtx { settings: &settings }).await?;

        Ok(Self {
            settings,
            registry,
            db,
            books,
        })
    }

    /// Start modules, serve HTTP until `shutdown` resolves, then stop modules.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ctx = InitCtx {
            settings: &self.settings,
        };
        self.registry.start_all(&ctx).await?;

        let served = bookscout_http::start_server(&self.registry, &self.settings, shutdown).await;

        self.registry.stop_all().await?;
        served
    }
}

fn open_database(settings: &Settings) -> anyhow::Result<Database> {
    if settings.database.is_in_memory() {
        tracing::info!("using in-memory database");
        return Database::in_memory().context("failed to open in-memory database");
    }

    Database::open(&settings.database.path)
        .with_context(|| format!("failed to open database at {}", settings.database.path))
}

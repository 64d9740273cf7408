use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::{StoreBackend, StoreSettings};
use crate::db::memory::InMemoryDocumentStore;
use crate::db::repository::{DocumentStore, MongoDocumentStore};
use crate::demo_seeder::seed_demo_documents;
use crate::error::AppError;
use crate::rendering::links::Permalinks;
use crate::rendering::reference::ReferenceResolver;
use crate::search::formatter::ResultFormatter;
use crate::search::service::SearchService;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
    pub resolver: Arc<ReferenceResolver>,
    /// `per_page` used when a search request does not give one.
    pub default_per_page: u64,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, permalinks: Permalinks, default_per_page: u64) -> Self {
        Self {
            search: Arc::new(SearchService::new(
                store.clone(),
                ResultFormatter::new(permalinks.clone()),
            )),
            resolver: Arc::new(ReferenceResolver::new(store, permalinks)),
            default_per_page,
        }
    }
}

/// Build the HTTP router. Routes are registered once, here.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(Any);

    Router::new()
        .route("/api/v1/search", get(api::search::search_handler))
        .route("/api/v1/render", get(api::render::render_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Open the configured document store.
pub async fn open_store(settings: &StoreSettings) -> Result<Arc<dyn DocumentStore>, AppError> {
    match settings.backend {
        StoreBackend::Mongo => {
            let client = mongodb::Client::with_uri_str(&settings.mongodb_uri)
                .await
                .map_err(|e| AppError::StoreUnavailable(format!("Failed to connect to MongoDB: {e}")))?;
            let store = MongoDocumentStore::new(&client.database(&settings.database), &settings.collection);
            store.ensure_indexes().await?;
            tracing::info!("Connected to MongoDB at {}", settings.mongodb_uri);
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            let store = InMemoryDocumentStore::new();
            if settings.seed_demo {
                seed_demo_documents(&store, chrono::Utc::now());
            }
            tracing::info!(documents = store.len(), "Using in-memory document store");
            Ok(Arc::new(store))
        }
    }
}

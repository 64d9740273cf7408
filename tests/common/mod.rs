use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};

use postfinder::app::{router, AppState};
use postfinder::db::memory::InMemoryDocumentStore;
use postfinder::db::models::{Document, DocumentId, DocumentStatus};
use postfinder::db::repository::DocumentStore;
use postfinder::rendering::links::Permalinks;

pub const BASE_URL: &str = "https://news.example.com/";

/// Holds the in-memory store and the Axum router built over it.
pub struct TestEnv {
    pub store: Arc<InMemoryDocumentStore>,
    pub router: Router,
}

impl TestEnv {
    pub fn start(documents: Vec<Document>) -> Self {
        let store = Arc::new(InMemoryDocumentStore::with_documents(documents));
        let router = router_over(store.clone());
        Self { store, router }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        server_permissive(self.router.clone())
    }
}

pub fn router_over(store: Arc<dyn DocumentStore>) -> Router {
    let permalinks = Permalinks::parse(BASE_URL).expect("valid base URL");
    router(AppState::new(store, permalinks, 10))
}

pub fn server_permissive(router: Router) -> axum_test::TestServer {
    axum_test::TestServer::builder()
        .try_build(router)
        .expect("Failed to build TestServer")
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 5, 18, 0, 0).unwrap()
}

pub fn document(id: DocumentId, title: &str, status: DocumentStatus, hours_ago: i64) -> Document {
    Document {
        id,
        title: title.to_string(),
        content: format!("<!-- wp:paragraph --><p>{title}</p><!-- /wp:paragraph -->"),
        status,
        published_at: now() - Duration::hours(hours_ago),
    }
}

/// `count` published documents; a higher id is more recent.
pub fn published_series(count: u64) -> Vec<Document> {
    (1..=count)
        .map(|id| {
            document(
                id,
                &format!("Story number {id}"),
                DocumentStatus::Published,
                (count - id) as i64 + 1,
            )
        })
        .collect()
}

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::models::DocumentId;
use crate::db::repository::{DocumentFilter, DocumentQuery, DocumentStore, SortOrder};
use crate::error::AppError;
use crate::search::formatter::{ResultFormatter, SearchResultItem};

/// A validated search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    term: String,
    page: u64,
    per_page: u64,
}

impl SearchQuery {
    /// Validate paging and sanitize the term. A missing term is the empty term.
    pub fn new(term: Option<&str>, page: i64, per_page: i64) -> Result<Self, AppError> {
        let page = u64::try_from(page)
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| AppError::InvalidArgument(format!("page must be at least 1, got {page}")))?;
        let per_page = u64::try_from(per_page)
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| {
                AppError::InvalidArgument(format!("per_page must be at least 1, got {per_page}"))
            })?;

        Ok(Self {
            term: sanitize_term(term.unwrap_or_default()),
            page,
            per_page,
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// The document id this term names, if the term is a plain non-negative integer.
    pub fn exact_id(&self) -> Option<DocumentId> {
        parse_document_id(&self.term)
    }
}

/// One page of search results.
///
/// Serialized as `{posts, total, pages}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagedResult {
    #[serde(rename = "posts")]
    pub items: Vec<SearchResultItem>,
    pub total: u64,
    #[serde(rename = "pages")]
    pub page_count: u64,
}

impl PagedResult {
    /// The short-circuit result of an exact-id hit.
    pub fn single(item: SearchResultItem) -> Self {
        Self {
            items: vec![item],
            total: 1,
            page_count: 1,
        }
    }
}

/// `ceil(total / per_page)`; zero exactly when `total` is zero.
pub fn page_count(total: u64, per_page: u64) -> u64 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page)
}

/// Strip control characters and collapse runs of whitespace.
pub fn sanitize_term(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a term made only of ASCII digits into a document id.
pub fn parse_document_id(term: &str) -> Option<DocumentId> {
    let term = term.trim();
    if term.is_empty() || !term.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    term.parse().ok()
}

/// Resolves exact-id and free-text searches into paged results.
pub struct SearchService {
    store: Arc<dyn DocumentStore>,
    formatter: ResultFormatter,
}

impl SearchService {
    pub fn new(store: Arc<dyn DocumentStore>, formatter: ResultFormatter) -> Self {
        Self { store, formatter }
    }

    /// Validate the parameters and run the search.
    pub async fn search(
        &self,
        term: Option<&str>,
        page: i64,
        per_page: i64,
    ) -> Result<PagedResult, AppError> {
        let query = SearchQuery::new(term, page, per_page)?;
        self.execute(&query).await
    }

    pub async fn execute(&self, query: &SearchQuery) -> Result<PagedResult, AppError> {
        if let Some(id) = query.exact_id() {
            match self.store.find_by_id(id).await? {
                Some(doc) if doc.is_published() => {
                    tracing::debug!(id, "Search term matched a published document id");
                    return Ok(PagedResult::single(self.formatter.format(&doc)));
                }
                _ => {
                    tracing::debug!(id, "No published document with this id, searching as text");
                }
            }
        }

        let filter = DocumentFilter {
            term: Some(query.term().to_string()).filter(|t| !t.is_empty()),
            ..DocumentFilter::published()
        };

        let total = self.store.count(&filter).await?;
        let pages = page_count(total, query.per_page());

        // A page past the end is an empty page, not a fault.
        let documents = if query.offset() >= total {
            Vec::new()
        } else {
            self.store
                .find(&DocumentQuery {
                    filter,
                    sort: SortOrder::PublishedDesc,
                    offset: query.offset(),
                    limit: Some(query.per_page()),
                })
                .await?
        };

        tracing::debug!(
            term = query.term(),
            page = query.page(),
            total,
            returned = documents.len(),
            "Search completed"
        );

        Ok(PagedResult {
            items: documents.iter().map(|doc| self.formatter.format(doc)).collect(),
            total,
            page_count: pages,
        })
    }
}

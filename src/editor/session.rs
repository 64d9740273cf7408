//! The block editor's search panel, as a state machine without IO.
//!
//! The session decides which request to issue next and which response to
//! apply; the caller performs the actual fetch. Every request carries a
//! ticket and only the response to the newest ticket is applied, so a slow
//! response to an older search can never overwrite a newer one.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::db::models::DocumentId;
use crate::search::formatter::SearchResultItem;
use crate::search::service::{sanitize_term, PagedResult};

pub const SEARCH_PATH: &str = "/api/v1/search";

/// Where the panel is in its search cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Searching,
    Results,
    NoResults,
    Error(String),
}

/// A fetch the caller must perform and hand back to `receive`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub ticket: u64,
    pub term: String,
    pub page: u64,
}

impl SearchRequest {
    /// Path and query string for the search endpoint.
    pub fn path(&self) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("search", &self.term)
            .append_pair("page", &self.page.to_string())
            .finish();
        format!("{SEARCH_PATH}?{query}")
    }
}

/// Attributes the editor stores on the block when a result is picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockAttributes {
    pub post_id: DocumentId,
    pub post_title: String,
    pub post_url: String,
}

impl From<&SearchResultItem> for BlockAttributes {
    fn from(item: &SearchResultItem) -> Self {
        Self {
            post_id: item.id,
            post_title: item.title.clone(),
            post_url: item.url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Recent,
    Search,
    Page,
}

#[derive(Debug)]
pub struct SearchSession {
    state: SessionState,
    term: String,
    page: u64,
    page_count: u64,
    items: Vec<SearchResultItem>,
    showing_recent: bool,
    last_ticket: u64,
    in_flight: Option<(u64, RequestKind)>,
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            term: String::new(),
            page: 1,
            page_count: 0,
            items: Vec::new(),
            showing_recent: true,
            last_ticket: 0,
            in_flight: None,
        }
    }

    /// Initial empty-term search that lists the most recent documents.
    pub fn mount(&mut self) -> SearchRequest {
        self.term.clear();
        self.page = 1;
        self.issue(RequestKind::Recent)
    }

    /// Search for `term` from the first page. Blank terms issue nothing.
    pub fn submit(&mut self, term: &str) -> Option<SearchRequest> {
        let term = sanitize_term(term);
        if term.is_empty() {
            return None;
        }
        self.term = term;
        self.page = 1;
        Some(self.issue(RequestKind::Search))
    }

    /// Fetch another page of the current term.
    pub fn change_page(&mut self, page: u64) -> Option<SearchRequest> {
        if page == 0 || (self.page_count > 0 && page > self.page_count) {
            return None;
        }
        self.page = page;
        Some(self.issue(RequestKind::Page))
    }

    /// Apply a response. Returns `false` when the ticket is stale and the
    /// response was discarded.
    pub fn receive(&mut self, ticket: u64, response: Result<PagedResult, String>) -> bool {
        let kind = match self.in_flight {
            Some((current, kind)) if current == ticket => kind,
            _ => {
                tracing::debug!(ticket, latest = self.last_ticket, "Discarding stale search response");
                return false;
            }
        };
        self.in_flight = None;

        match response {
            Ok(result) => {
                if kind == RequestKind::Search {
                    self.showing_recent = false;
                }
                self.page_count = result.page_count;
                self.items = result.items;
                self.state = if self.items.is_empty() {
                    SessionState::NoResults
                } else {
                    SessionState::Results
                };
            }
            Err(message) => {
                tracing::warn!("Search request failed: {message}");
                self.state = SessionState::Error(message);
            }
        }
        true
    }

    /// Block attributes for the listed result with `id`.
    pub fn select(&self, id: DocumentId) -> Option<BlockAttributes> {
        self.items.iter().find(|item| item.id == id).map(BlockAttributes::from)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_searching(&self) -> bool {
        self.state == SessionState::Searching
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn items(&self) -> &[SearchResultItem] {
        &self.items
    }

    pub fn heading(&self) -> &'static str {
        if self.showing_recent {
            "Recent Posts"
        } else {
            "Search Results"
        }
    }

    /// Page buttons to show; none when everything fits on one page.
    pub fn page_numbers(&self) -> Vec<u64> {
        if self.page_count > 1 {
            (1..=self.page_count).collect()
        } else {
            Vec::new()
        }
    }

    fn issue(&mut self, kind: RequestKind) -> SearchRequest {
        self.last_ticket += 1;
        self.in_flight = Some((self.last_ticket, kind));
        self.state = SessionState::Searching;
        SearchRequest {
            ticket: self.last_ticket,
            term: self.term.clone(),
            page: self.page,
        }
    }
}

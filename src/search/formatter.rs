use serde::{Deserialize, Serialize};

use crate::db::models::{Document, DocumentId};
use crate::rendering::links::Permalinks;

/// The public projection of a document returned by searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub id: DocumentId,
    /// Raw title. Not HTML-escaped.
    pub title: String,
    pub url: String,
}

/// Projects documents into `SearchResultItem`s.
///
/// The title is passed through untouched: API consumers escape on render,
/// and escaping here would double-escape titles such as `Fish & Chips`.
/// Anything that writes the title into markup directly must escape it first
/// (see `rendering::links::escape_html`).
#[derive(Debug, Clone)]
pub struct ResultFormatter {
    permalinks: Permalinks,
}

impl ResultFormatter {
    pub fn new(permalinks: Permalinks) -> Self {
        Self { permalinks }
    }

    pub fn format(&self, doc: &Document) -> SearchResultItem {
        SearchResultItem {
            id: doc.id,
            title: doc.title.clone(),
            url: self.permalinks.permalink(doc.id),
        }
    }
}

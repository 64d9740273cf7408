use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::db::models::{Document, DocumentId};
use crate::db::repository::{DocumentFilter, DocumentQuery, DocumentStore, SortOrder};
use crate::error::AppError;

/// In-memory DocumentStore, ordered by id.
///
/// Backs the `memory` store backend (demo and local development) and most
/// of the test suite. Filters are evaluated with `DocumentFilter::matches`.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<BTreeMap<DocumentId, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let store = Self::new();
        for doc in documents {
            store.insert(doc);
        }
        store
    }

    /// Insert or replace a document (matched by id).
    pub fn insert(&self, doc: Document) {
        self.write().insert(doc.id, doc);
    }

    pub fn remove(&self, id: DocumentId) -> Option<Document> {
        self.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<DocumentId, Document>> {
        self.documents.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<DocumentId, Document>> {
        self.documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn select(&self, query: &DocumentQuery) -> Vec<Document> {
        let documents = self.read();
        let mut matched: Vec<&Document> = documents
            .values()
            .filter(|doc| query.filter.matches(doc))
            .collect();

        match query.sort {
            SortOrder::PublishedDesc => matched.sort_by(|a, b| {
                b.published_at
                    .cmp(&a.published_at)
                    .then_with(|| b.id.cmp(&a.id))
            }),
            // BTreeMap iteration is already ascending by id.
            SortOrder::IdAsc => {}
        }

        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, AppError> {
        Ok(self.read().get(&id).cloned())
    }

    async fn find(&self, query: &DocumentQuery) -> Result<Vec<Document>, AppError> {
        Ok(self.select(query))
    }

    async fn count(&self, filter: &DocumentFilter) -> Result<u64, AppError> {
        let count = self.read().values().filter(|doc| filter.matches(doc)).count();
        Ok(count as u64)
    }

    async fn find_ids(&self, query: &DocumentQuery) -> Result<Vec<DocumentId>, AppError> {
        Ok(self.select(query).into_iter().map(|doc| doc.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DocumentStatus;
    use chrono::{TimeZone, Utc};

    fn doc(id: DocumentId, hour: u32) -> Document {
        Document {
            id,
            title: format!("Post {id}"),
            content: String::new(),
            status: DocumentStatus::Published,
            published_at: Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_published_desc_breaks_ties_by_id() {
        let store = InMemoryDocumentStore::with_documents(vec![doc(1, 8), doc(2, 10), doc(3, 10)]);

        let ids = store
            .find_ids(&DocumentQuery::default())
            .await
            .unwrap();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_offset_and_limit() {
        let store = InMemoryDocumentStore::with_documents((1..=5).map(|id| doc(id, id as u32)));

        let query = DocumentQuery {
            sort: SortOrder::IdAsc,
            offset: 1,
            limit: Some(2),
            ..DocumentQuery::default()
        };
        assert_eq!(store.find_ids(&query).await.unwrap(), vec![2, 3]);

        let query = DocumentQuery {
            offset: 10,
            ..DocumentQuery::default()
        };
        assert!(store.find(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_replaces_and_remove() {
        let store = InMemoryDocumentStore::new();
        store.insert(doc(7, 1));
        let mut updated = doc(7, 2);
        updated.title = "Renamed".into();
        store.insert(updated);

        assert_eq!(store.len(), 1);
        let found = store.find_by_id(7).await.unwrap().unwrap();
        assert_eq!(found.title, "Renamed");

        assert!(store.remove(7).is_some());
        assert!(store.find_by_id(7).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_count_ignores_paging() {
        let mut draft = doc(4, 4);
        draft.status = DocumentStatus::Draft;
        let store = InMemoryDocumentStore::with_documents(vec![doc(1, 1), doc(2, 2), draft]);

        assert_eq!(store.count(&DocumentFilter::published()).await.unwrap(), 2);
        assert_eq!(store.count(&DocumentFilter::default()).await.unwrap(), 3);
    }
}

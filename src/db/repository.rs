use async_trait::async_trait;

use crate::db::models::{Document, DocumentId, DocumentStatus, ScanWindow};
use crate::error::AppError;

/// Predicates a store evaluates inside its own query engine.
///
/// All set predicates must hold for a document to match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    /// Whitespace-separated words; each must occur (case-insensitively) in
    /// the title or in the content.
    pub term: Option<String>,
    pub published_within: Option<ScanWindow>,
    /// Literal, case-sensitive substring the content must contain.
    pub content_contains: Option<String>,
    /// Only ids strictly greater than this (keyset pagination).
    pub id_after: Option<DocumentId>,
}

impl DocumentFilter {
    pub fn published() -> Self {
        Self {
            status: Some(DocumentStatus::Published),
            ..Self::default()
        }
    }

    /// The words of `term`, empty when no term is set.
    pub fn term_words(&self) -> Vec<&str> {
        self.term
            .as_deref()
            .map(|t| t.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Evaluate the filter against a single document.
    ///
    /// Stores without a query engine of their own use this directly.
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(status) = self.status {
            if doc.status != status {
                return false;
            }
        }
        if let Some(window) = &self.published_within {
            if !window.contains(doc.published_at) {
                return false;
            }
        }
        if let Some(needle) = &self.content_contains {
            if !doc.content.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(after) = self.id_after {
            if doc.id <= after {
                return false;
            }
        }

        let title = doc.title.to_lowercase();
        let content = doc.content.to_lowercase();
        self.term_words().iter().all(|word| {
            let word = word.to_lowercase();
            title.contains(&word) || content.contains(&word)
        })
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Most recently published first, ties broken by id descending.
    #[default]
    PublishedDesc,
    /// Ascending id.
    IdAsc,
}

/// A filtered, sorted, optionally paginated query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub filter: DocumentFilter,
    pub sort: SortOrder,
    pub offset: u64,
    /// `None` returns every match.
    pub limit: Option<u64>,
}

/// Repository trait for the document store the core reads from.
///
/// This trait allows swapping MongoDB for the in-memory store in tests.
/// Every failure is reported as `AppError::StoreUnavailable`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Exact lookup by id, regardless of status.
    async fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, AppError>;

    /// Fetch the documents selected by `query`.
    async fn find(&self, query: &DocumentQuery) -> Result<Vec<Document>, AppError>;

    /// Count every document matching `filter`, ignoring pagination.
    async fn count(&self, filter: &DocumentFilter) -> Result<u64, AppError>;

    /// Like `find`, but only the ids are transferred.
    async fn find_ids(&self, query: &DocumentQuery) -> Result<Vec<DocumentId>, AppError>;
}

/// MongoDB implementation of the DocumentStore.
pub struct MongoDocumentStore {
    collection: mongodb::Collection<Document>,
}

#[derive(serde::Deserialize)]
struct IdOnly {
    #[serde(rename = "_id")]
    id: DocumentId,
}

impl MongoDocumentStore {
    pub fn new(db: &mongodb::Database, collection: &str) -> Self {
        Self {
            collection: db.collection(collection),
        }
    }

    /// Insert or replace a document (matched by id).
    ///
    /// Not part of `DocumentStore`: the core never writes. Used for seeding.
    pub async fn upsert(&self, doc: &Document) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::ReplaceOptions;

        let id = mongo_id(doc.id)?;
        let options = ReplaceOptions::builder().upsert(true).build();

        self.collection
            .replace_one(doc! { "_id": id }, doc)
            .with_options(options)
            .await
            .map_err(store_error)?;

        Ok(())
    }

    /// Ensure the indexes used by the search and scan queries exist.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::IndexModel;

        let index = IndexModel::builder()
            .keys(doc! { "status": 1, "published_at": -1, "_id": -1 })
            .build();

        self.collection
            .create_index(index)
            .await
            .map_err(store_error)?;

        Ok(())
    }

    fn build_filter(filter: &DocumentFilter) -> mongodb::bson::Document {
        use mongodb::bson::{doc, Bson, DateTime as BsonDateTime};

        let mut clauses: Vec<mongodb::bson::Document> = Vec::new();

        if let Some(status) = filter.status {
            clauses.push(doc! { "status": status.as_str() });
        }

        if let Some(window) = &filter.published_within {
            let mut range = doc! { "$gte": BsonDateTime::from_chrono(window.start()) };
            if let Some(end) = window.end_exclusive() {
                range.insert("$lt", BsonDateTime::from_chrono(end));
            }
            clauses.push(doc! { "published_at": range });
        }

        // The literal pushed into the engine: no structural validation here.
        if let Some(needle) = &filter.content_contains {
            clauses.push(doc! { "content": { "$regex": regex::escape(needle) } });
        }

        if let Some(after) = filter.id_after {
            match i64::try_from(after) {
                Ok(after) => clauses.push(doc! { "_id": { "$gt": after } }),
                // Nothing can sort after an id outside the stored range.
                Err(_) => clauses.push(doc! { "_id": { "$exists": false } }),
            }
        }

        for word in filter.term_words() {
            let pattern = Bson::String(regex::escape(word));
            clauses.push(doc! {
                "$or": [
                    { "title": { "$regex": pattern.clone(), "$options": "i" } },
                    { "content": { "$regex": pattern, "$options": "i" } },
                ]
            });
        }

        match clauses.len() {
            0 => doc! {},
            1 => clauses.remove(0),
            _ => doc! { "$and": clauses },
        }
    }

    fn find_options(query: &DocumentQuery) -> mongodb::options::FindOptions {
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let sort = match query.sort {
            SortOrder::PublishedDesc => doc! { "published_at": -1, "_id": -1 },
            SortOrder::IdAsc => doc! { "_id": 1 },
        };

        let mut options = FindOptions::default();
        options.sort = Some(sort);
        options.skip = Some(query.offset).filter(|offset| *offset > 0);
        options.limit = query.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));
        options
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, AppError> {
        use mongodb::bson::doc;

        // Ids beyond the BSON integer range cannot be stored.
        let Ok(id) = i64::try_from(id) else {
            return Ok(None);
        };

        self.collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(store_error)
    }

    async fn find(&self, query: &DocumentQuery) -> Result<Vec<Document>, AppError> {
        use futures::TryStreamExt;

        if query.limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut cursor = self
            .collection
            .find(Self::build_filter(&query.filter))
            .with_options(Self::find_options(query))
            .await
            .map_err(store_error)?;

        let mut documents = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(store_error)? {
            documents.push(doc);
        }

        Ok(documents)
    }

    async fn count(&self, filter: &DocumentFilter) -> Result<u64, AppError> {
        self.collection
            .count_documents(Self::build_filter(filter))
            .await
            .map_err(store_error)
    }

    async fn find_ids(&self, query: &DocumentQuery) -> Result<Vec<DocumentId>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        if query.limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut options = Self::find_options(query);
        options.projection = Some(doc! { "_id": 1 });

        let mut cursor = self
            .collection
            .clone_with_type::<IdOnly>()
            .find(Self::build_filter(&query.filter))
            .with_options(options)
            .await
            .map_err(store_error)?;

        let mut ids = Vec::new();
        while let Some(row) = cursor.try_next().await.map_err(store_error)? {
            ids.push(row.id);
        }

        Ok(ids)
    }
}

fn mongo_id(id: DocumentId) -> Result<i64, AppError> {
    i64::try_from(id)
        .map_err(|_| AppError::InvalidArgument(format!("document id {id} is out of range")))
}

fn store_error(e: mongodb::error::Error) -> AppError {
    AppError::StoreUnavailable(e.to_string())
}

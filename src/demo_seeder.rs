use chrono::{DateTime, Duration, Utc};

use crate::db::memory::InMemoryDocumentStore;
use crate::db::models::{Document, DocumentStatus};

/// Fixture documents for the in-memory backend, published relative to `now`.
///
/// A few of them reference others through the reference block, one only
/// mentions the block in prose, and one is a draft.
pub fn demo_documents(now: DateTime<Utc>) -> Vec<Document> {
    let demo = vec![
        (
            1,
            "Welcome to the newsroom",
            "<!-- wp:paragraph --><p>Start here for house style and tooling.</p><!-- /wp:paragraph -->",
            DocumentStatus::Published,
            45,
        ),
        (
            2,
            "Election night live coverage",
            concat!(
                "<!-- wp:paragraph --><p>Results as they come in.</p><!-- /wp:paragraph -->\n",
                r#"<!-- wp:postfinder/reference {"postId":1} /-->"#,
            ),
            DocumentStatus::Published,
            20,
        ),
        (
            3,
            "How we verify sources",
            "<!-- wp:paragraph --><p>Two independent confirmations, always.</p><!-- /wp:paragraph -->",
            DocumentStatus::Published,
            12,
        ),
        (
            4,
            "Editing the reference block",
            concat!(
                "<!-- wp:paragraph --><p>Older posts used the block like this:</p><!-- /wp:paragraph -->\n",
                "<!-- wp:html --><pre>&lt;!-- wp:postfinder/reference --&gt;</pre><!-- /wp:html -->\n",
                "<!-- wp:postfinder/reference was the first version of this block -->",
            ),
            DocumentStatus::Published,
            6,
        ),
        (
            5,
            "Weekend reading list",
            concat!(
                r#"<!-- wp:postfinder/reference {"postId":3} /-->"#,
                "\n",
                r#"<!-- wp:postfinder/reference {"postId":"2"} /-->"#,
            ),
            DocumentStatus::Published,
            2,
        ),
        (
            6,
            "Unfinished investigation",
            r#"<!-- wp:postfinder/reference {"postId":3} /-->"#,
            DocumentStatus::Draft,
            1,
        ),
    ];

    demo.into_iter()
        .map(|(id, title, content, status, days_ago)| Document {
            id,
            title: title.to_string(),
            content: content.to_string(),
            status,
            published_at: now - Duration::days(days_ago),
        })
        .collect()
}

/// Load the demo documents into `store`, replacing documents with the same id.
pub fn seed_demo_documents(store: &InMemoryDocumentStore, now: DateTime<Utc>) {
    tracing::info!("Starting demo data seeding...");

    let documents = demo_documents(now);
    let count = documents.len();
    for doc in documents {
        store.insert(doc);
    }

    tracing::info!(count, "Demo data seeding completed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::markers::{contains_marker, Marker};

    #[test]
    fn test_demo_documents() {
        let now = Utc::now();
        let docs = demo_documents(now);
        let marker = Marker::new("postfinder/reference").unwrap();

        let with_marker: Vec<_> = docs
            .iter()
            .filter(|d| contains_marker(&d.content, &marker))
            .map(|d| d.id)
            .collect();
        assert_eq!(with_marker, vec![2, 5, 6]);

        let lookalike = docs.iter().find(|d| d.id == 4).unwrap();
        assert!(lookalike.content.contains(&marker.prefix()));
    }

    #[test]
    fn test_seed_is_idempotent() {
        let store = InMemoryDocumentStore::new();
        seed_demo_documents(&store, Utc::now());
        seed_demo_documents(&store, Utc::now());
        assert_eq!(store.len(), 6);
    }
}

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::db::models::DocumentId;
use crate::db::repository::DocumentStore;
use crate::rendering::links::{escape_html, escape_url, Permalinks};
use crate::scan::markers::{parse_delimiters, BlockDelimiter, DelimiterKind, Marker};

/// A stored pointer from a piece of content to another document.
///
/// Read from block attributes as `postId`. The attribute is accepted
/// leniently: integers, floats and numeric strings all work, anything else
/// (or a negative number) means "no reference".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "postId", default, deserialize_with = "lenient_document_id")]
    pub document_id: DocumentId,
}

impl Reference {
    pub fn new(document_id: DocumentId) -> Self {
        Self { document_id }
    }

    pub fn is_empty(&self) -> bool {
        self.document_id == 0
    }

    /// Read a raw query or CLI value the same lenient way as the attribute.
    pub fn from_param(raw: &str) -> Self {
        Self::new(leading_integer(raw))
    }

    pub fn from_attrs(attrs: &Map<String, Value>) -> Self {
        Self::new(attrs.get("postId").map(document_id_from_value).unwrap_or(0))
    }

    pub fn from_delimiter(delimiter: &BlockDelimiter) -> Self {
        Self::from_attrs(&delimiter.attrs)
    }
}

fn lenient_document_id<'de, D>(deserializer: D) -> Result<DocumentId, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(document_id_from_value).unwrap_or(0))
}

/// Integer value of a loosely typed attribute, `0` when there is none.
pub fn document_id_from_value(value: &Value) -> DocumentId {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f.trunc() as u64)
            })
            .unwrap_or(0),
        Value::String(s) => leading_integer(s),
        Value::Bool(true) => 1,
        _ => 0,
    }
}

// "42", " 42px", "+7" and "3.9" all have a leading integer; "-1" and "abc" do not.
fn leading_integer(s: &str) -> DocumentId {
    let s = s.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let digits: &str = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(end) => &s[..end],
        None => s,
    };
    digits.parse().unwrap_or(0)
}

/// What a resolved reference renders: the target's title and permalink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedFragment {
    /// Raw title; escaped by `to_html`.
    pub title: String,
    pub url: String,
}

impl RenderedFragment {
    pub fn to_html(&self) -> String {
        format!(
            r#"<p class="post-finder-read-more">Read More: <a href="{}">{}</a></p>"#,
            escape_url(&self.url),
            escape_html(&self.title),
        )
    }
}

/// Turns references into renderable fragments.
///
/// Rendering never fails: a missing, unpublished or unreachable target
/// renders as nothing.
pub struct ReferenceResolver {
    store: Arc<dyn DocumentStore>,
    permalinks: Permalinks,
}

impl ReferenceResolver {
    pub fn new(store: Arc<dyn DocumentStore>, permalinks: Permalinks) -> Self {
        Self { store, permalinks }
    }

    pub async fn resolve(&self, reference: &Reference) -> Option<RenderedFragment> {
        if reference.is_empty() {
            return None;
        }

        let id = reference.document_id;
        match self.store.find_by_id(id).await {
            Ok(Some(doc)) if doc.is_published() => Some(RenderedFragment {
                url: self.permalinks.permalink(doc.id),
                title: doc.title,
            }),
            Ok(Some(doc)) => {
                tracing::debug!(id, status = doc.status.as_str(), "Referenced document is not published");
                None
            }
            Ok(None) => {
                tracing::debug!(id, "Referenced document does not exist");
                None
            }
            Err(e) => {
                tracing::warn!(id, "Failed to resolve reference, rendering nothing: {e}");
                None
            }
        }
    }

    /// Replace every `marker` delimiter in `content` with its rendered fragment.
    ///
    /// Void and opening delimiters become the fragment (or nothing when the
    /// reference does not resolve); closing delimiters are dropped. Text that
    /// only looks like a marker is left alone.
    pub async fn render_content(&self, content: &str, marker: &Marker) -> String {
        let delimiters: Vec<BlockDelimiter> = parse_delimiters(content)
            .into_iter()
            .filter(|d| d.name == marker.name())
            .collect();

        let mut rendered = String::with_capacity(content.len());
        let mut pos = 0;
        for delimiter in &delimiters {
            rendered.push_str(&content[pos..delimiter.span.start]);
            if delimiter.kind != DelimiterKind::Closer {
                rendered.push_str(&render_reference(self, &Reference::from_delimiter(delimiter)).await);
            }
            pos = delimiter.span.end;
        }
        rendered.push_str(&content[pos..]);
        rendered
    }
}

/// The HTML a reference block renders to; empty when it does not resolve.
pub async fn render_reference(resolver: &ReferenceResolver, reference: &Reference) -> String {
    resolver
        .resolve(reference)
        .await
        .map(|fragment| fragment.to_html())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryDocumentStore;
    use crate::db::models::{Document, DocumentStatus};
    use crate::db::repository::{DocumentFilter, DocumentQuery};
    use crate::error::AppError;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;

    struct UnreachableStore;

    #[async_trait]
    impl DocumentStore for UnreachableStore {
        async fn find_by_id(&self, _id: DocumentId) -> Result<Option<Document>, AppError> {
            Err(AppError::StoreUnavailable("connection refused".into()))
        }

        async fn find(&self, _query: &DocumentQuery) -> Result<Vec<Document>, AppError> {
            Err(AppError::StoreUnavailable("connection refused".into()))
        }

        async fn count(&self, _filter: &DocumentFilter) -> Result<u64, AppError> {
            Err(AppError::StoreUnavailable("connection refused".into()))
        }

        async fn find_ids(&self, _query: &DocumentQuery) -> Result<Vec<DocumentId>, AppError> {
            Err(AppError::StoreUnavailable("connection refused".into()))
        }
    }

    fn document(id: DocumentId, title: &str, status: DocumentStatus) -> Document {
        Document {
            id,
            title: title.to_string(),
            content: String::new(),
            status,
            published_at: Utc::now(),
        }
    }

    fn resolver() -> ReferenceResolver {
        let store = InMemoryDocumentStore::with_documents(vec![
            document(7, "Fish & Chips", DocumentStatus::Published),
            document(8, "Work in progress", DocumentStatus::Draft),
        ]);
        ReferenceResolver::new(
            Arc::new(store),
            Permalinks::parse("https://example.com/").unwrap(),
        )
    }

    #[test]
    fn test_reference_attribute_is_lenient() {
        let parse = |v: Value| serde_json::from_value::<Reference>(v).unwrap().document_id;
        assert_eq!(parse(json!({ "postId": 42 })), 42);
        assert_eq!(parse(json!({ "postId": "42" })), 42);
        assert_eq!(parse(json!({ "postId": " 42px" })), 42);
        assert_eq!(parse(json!({ "postId": 3.9 })), 3);
        assert_eq!(parse(json!({ "postId": -5 })), 0);
        assert_eq!(parse(json!({ "postId": "-5" })), 0);
        assert_eq!(parse(json!({ "postId": "abc" })), 0);
        assert_eq!(parse(json!({ "postId": null })), 0);
        assert_eq!(parse(json!({ "postId": [1] })), 0);
        assert_eq!(parse(json!({})), 0);
    }

    #[test]
    fn test_fragment_html() {
        let fragment = RenderedFragment {
            title: "Hello".to_string(),
            url: "https://example.com/?p=1".to_string(),
        };
        let html = fragment.to_html();
        assert!(html.starts_with(r#"<p class="post-finder-read-more">Read More: <a href=""#));
        assert!(html.ends_with(">Hello</a></p>"));
        assert!(html.contains(&escape_url("https://example.com/?p=1")));
    }

    #[test]
    fn test_fragment_html_escapes_title_and_unsafe_url() {
        let fragment = RenderedFragment {
            title: "<b>Bold</b>".to_string(),
            url: "javascript:alert(1)".to_string(),
        };
        let html = fragment.to_html();
        assert!(html.contains(r#"<a href="">"#));
        assert!(html.contains("&lt;b&gt;Bold&lt;/b&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[tokio::test]
    async fn test_resolve_published() {
        let fragment = resolver().resolve(&Reference::new(7)).await.unwrap();
        assert_eq!(fragment.title, "Fish & Chips");
        assert_eq!(fragment.url, "https://example.com/?p=7");
    }

    #[tokio::test]
    async fn test_unresolved_references_render_empty() {
        let resolver = resolver();
        for id in [0, 8, 999] {
            assert!(resolver.resolve(&Reference::new(id)).await.is_none(), "id {id}");
            assert_eq!(render_reference(&resolver, &Reference::new(id)).await, "");
        }
    }

    #[tokio::test]
    async fn test_store_failure_renders_empty() {
        let resolver = ReferenceResolver::new(
            Arc::new(UnreachableStore),
            Permalinks::parse("https://example.com/").unwrap(),
        );
        assert_eq!(render_reference(&resolver, &Reference::new(7)).await, "");
    }

    #[tokio::test]
    async fn test_render_content_replaces_markers() {
        let resolver = resolver();
        let marker = Marker::new("postfinder/reference").unwrap();
        let content = concat!(
            "<p>A</p>",
            r#"<!-- wp:postfinder/reference {"postId":7} /-->"#,
            "<p>B</p>",
            r#"<!-- wp:postfinder/reference {"postId":"8"} /-->"#,
            "<!-- wp:postfinder/reference is an old block -->",
        );

        let rendered = resolver.render_content(content, &marker).await;
        let expected = format!(
            "<p>A</p>{}<p>B</p><!-- wp:postfinder/reference is an old block -->",
            render_reference(&resolver, &Reference::new(7)).await
        );
        assert_eq!(rendered, expected);
    }

    #[tokio::test]
    async fn test_render_content_drops_closers() {
        let resolver = resolver();
        let marker = Marker::new("postfinder/reference").unwrap();
        let content = r#"<!-- wp:postfinder/reference {"postId":999} --><!-- /wp:postfinder/reference -->tail"#;
        assert_eq!(resolver.render_content(content, &marker).await, "tail");
    }
}

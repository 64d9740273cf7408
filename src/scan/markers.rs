//! Block-comment marker detection.
//!
//! Content embeds blocks as HTML comments:
//!
//! ```text
//! <!-- wp:postfinder/reference {"postId":42} /-->
//! <!-- wp:paragraph --><p>text</p><!-- /wp:paragraph -->
//! ```
//!
//! A delimiter is only valid when the whole comment follows that grammar:
//! a single space after `<!--`, a lowercase block name, optional JSON object
//! attributes followed by whitespace, an optional `/` and `-->`. Text that
//! merely starts like a delimiter (`<!-- wp:postfinder/reference is
//! deprecated -->`) is not a marker.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::AppError;

/// The literal every serialized block delimiter opens with.
pub const DELIMITER_PREFIX: &str = "<!-- wp:";

const DEFAULT_NAMESPACE: &str = "core";

static DELIMITER_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!-- (?P<closer>/)?wp:(?P<name>[a-z][a-z0-9_-]*(?:/[a-z][a-z0-9_-]*)?)\s+")
        .expect("delimiter pattern is valid")
});

static BLOCK_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9_-]*(?:/[a-z][a-z0-9_-]*)?$").expect("block name pattern is valid")
});

/// A block name identifying the marker embedded for an attached reference.
///
/// Names without a namespace belong to `core`, so `paragraph` and
/// `core/paragraph` are the same marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    name: String,
}

impl Marker {
    pub fn new(name: &str) -> Result<Self, AppError> {
        let name = name.trim();
        if !BLOCK_NAME.is_match(name) {
            return Err(AppError::InvalidArgument(format!(
                "'{name}' is not a valid block name"
            )));
        }
        Ok(Self {
            name: canonical_name(name),
        })
    }

    /// Fully qualified name, e.g. `postfinder/reference` or `core/paragraph`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name as it is written into content (`core/` is omitted).
    pub fn serialized_name(&self) -> &str {
        self.name
            .strip_prefix("core/")
            .unwrap_or(&self.name)
    }

    /// Literal prefix of an opening or void delimiter for this marker.
    ///
    /// Matching on this prefix alone is cheap but over-reports: it also hits
    /// malformed delimiters, quoted examples and longer names that share the
    /// prefix (`postfinder/reference-legacy`).
    pub fn prefix(&self) -> String {
        format!("{DELIMITER_PREFIX}{}", self.serialized_name())
    }
}

impl FromStr for Marker {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Marker::new(s)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Which side of a block a delimiter is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterKind {
    /// `<!-- wp:name -->`
    Opener,
    /// `<!-- wp:name /-->`
    Void,
    /// `<!-- /wp:name -->`
    Closer,
}

/// A structurally valid block delimiter found in content.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDelimiter {
    /// Fully qualified block name.
    pub name: String,
    pub kind: DelimiterKind,
    /// Parsed attributes; empty when the delimiter carries none.
    pub attrs: Map<String, Value>,
    /// Byte range of the whole comment in the content.
    pub span: Range<usize>,
}

impl BlockDelimiter {
    /// Whether this delimiter starts an instance of `marker`.
    pub fn is_instance_of(&self, marker: &Marker) -> bool {
        self.kind != DelimiterKind::Closer && self.name == marker.name()
    }
}

/// Parse every valid block delimiter in `content`, in order of appearance.
pub fn parse_delimiters(content: &str) -> Vec<BlockDelimiter> {
    let mut delimiters = Vec::new();
    let mut pos = 0;

    while let Some(head) = DELIMITER_HEAD.captures_at(content, pos) {
        let whole = head.get(0).expect("group 0 always participates");
        match parse_tail(&content[whole.end()..]) {
            Some((attrs, void, tail_len)) => {
                let kind = match (head.name("closer").is_some(), void) {
                    (true, _) => DelimiterKind::Closer,
                    (false, true) => DelimiterKind::Void,
                    (false, false) => DelimiterKind::Opener,
                };
                let end = whole.end() + tail_len;
                delimiters.push(BlockDelimiter {
                    name: canonical_name(&head["name"]),
                    kind,
                    attrs,
                    span: whole.start()..end,
                });
                pos = end;
            }
            None => pos = whole.end(),
        }
    }

    delimiters
}

/// Every opening or void delimiter of `marker` in `content`.
pub fn find_markers(content: &str, marker: &Marker) -> Vec<BlockDelimiter> {
    // Every opener or void delimiter of the marker starts with its prefix.
    if !content.contains(&marker.prefix()) {
        return Vec::new();
    }
    parse_delimiters(content)
        .into_iter()
        .filter(|d| d.is_instance_of(marker))
        .collect()
}

/// Whether `content` embeds at least one structurally valid `marker`.
pub fn contains_marker(content: &str, marker: &Marker) -> bool {
    !find_markers(content, marker).is_empty()
}

/// Parse `[{json} ws] [/] -->` right after the delimiter name and its
/// trailing whitespace. Returns the attributes, whether the delimiter is
/// void and how many bytes were consumed.
fn parse_tail(rest: &str) -> Option<(Map<String, Value>, bool, usize)> {
    let mut consumed = 0;
    let mut attrs = Map::new();

    if rest.starts_with('{') {
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => attrs = map,
            _ => return None,
        }
        consumed = stream.byte_offset();

        let after = &rest[consumed..];
        let trimmed = after.trim_start();
        if trimmed.len() == after.len() {
            // attributes must be followed by whitespace
            return None;
        }
        consumed += after.len() - trimmed.len();
    }

    let tail = &rest[consumed..];
    let (void, tail) = match tail.strip_prefix('/') {
        Some(stripped) => (true, stripped),
        None => (false, tail),
    };
    if !tail.starts_with("-->") {
        return None;
    }
    consumed += usize::from(void) + "-->".len();

    Some((attrs, void, consumed))
}

fn canonical_name(name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("{DEFAULT_NAMESPACE}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> Marker {
        Marker::new("postfinder/reference").unwrap()
    }

    #[test]
    fn test_marker_names() {
        let marker = reference();
        assert_eq!(marker.name(), "postfinder/reference");
        assert_eq!(marker.prefix(), "<!-- wp:postfinder/reference");

        let core: Marker = "paragraph".parse().unwrap();
        assert_eq!(core.name(), "core/paragraph");
        assert_eq!(core.serialized_name(), "paragraph");
        assert_eq!(core.prefix(), "<!-- wp:paragraph");
    }

    #[test]
    fn test_marker_rejects_invalid_names() {
        assert!(Marker::new("").is_err());
        assert!(Marker::new("Upper/Case").is_err());
        assert!(Marker::new("a/b/c").is_err());
        assert!(Marker::new("1st/block").is_err());
    }

    #[test]
    fn test_void_delimiter_with_attrs() {
        let content = r#"<p>Intro</p><!-- wp:postfinder/reference {"postId":42} /--><p>Outro</p>"#;
        let found = find_markers(content, &reference());

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DelimiterKind::Void);
        assert_eq!(found[0].attrs.get("postId"), Some(&Value::from(42)));
        assert_eq!(
            &content[found[0].span.clone()],
            r#"<!-- wp:postfinder/reference {"postId":42} /-->"#
        );
    }

    #[test]
    fn test_opener_and_closer() {
        let content = "<!-- wp:postfinder/reference -->\n<p>x</p>\n<!-- /wp:postfinder/reference -->";
        let delimiters = parse_delimiters(content);

        assert_eq!(delimiters.len(), 2);
        assert_eq!(delimiters[0].kind, DelimiterKind::Opener);
        assert_eq!(delimiters[1].kind, DelimiterKind::Closer);
        assert!(delimiters[0].attrs.is_empty());
        assert!(contains_marker(content, &reference()));
    }

    #[test]
    fn test_closer_alone_is_not_a_marker() {
        let content = "<!-- /wp:postfinder/reference -->";
        assert!(!contains_marker(content, &reference()));
    }

    #[test]
    fn test_prefix_text_outside_a_real_marker() {
        let marker = reference();
        let cases = [
            // prose inside an ordinary comment
            "<!-- wp:postfinder/reference is deprecated, use links -->",
            // a different block sharing the prefix
            r#"<!-- wp:postfinder/reference-legacy {"postId":3} /-->"#,
            // attributes that are not a JSON object
            "<!-- wp:postfinder/reference [1,2] /-->",
            // broken JSON
            r#"<!-- wp:postfinder/reference {"postId": /-->"#,
            // missing whitespace after the attributes
            r#"<!-- wp:postfinder/reference {"postId":1}/-->"#,
            // never closed
            "<!-- wp:postfinder/reference",
        ];

        for content in cases {
            assert!(content.contains(&marker.prefix()), "fixture must carry the prefix: {content}");
            assert!(!contains_marker(content, &marker), "false positive for: {content}");
        }
    }

    #[test]
    fn test_markers_nested_in_other_blocks() {
        let content = r#"<!-- wp:group --><div><!-- wp:postfinder/reference {"postId":7} /--></div><!-- /wp:group -->"#;
        let delimiters = parse_delimiters(content);

        let names: Vec<_> = delimiters.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["core/group", "postfinder/reference", "core/group"]);
        assert_eq!(find_markers(content, &reference()).len(), 1);
    }

    #[test]
    fn test_delimiter_inside_attribute_string_is_skipped() {
        let content = r#"<!-- wp:html {"html":"<!-- wp:postfinder/reference /-->"} /-->"#;
        let delimiters = parse_delimiters(content);

        assert_eq!(delimiters.len(), 1);
        assert_eq!(delimiters[0].name, "core/html");
        assert!(!contains_marker(content, &reference()));
    }

    #[test]
    fn test_invalid_delimiter_does_not_hide_a_later_valid_one() {
        let content = "<!-- wp:postfinder/reference oops -->\n<!-- wp:postfinder/reference /-->";
        assert_eq!(find_markers(content, &reference()).len(), 1);
    }

    #[test]
    fn test_multiple_markers() {
        let content = r#"<!-- wp:postfinder/reference {"postId":1} /--> and <!-- wp:postfinder/reference {"postId":2} /-->"#;
        let ids: Vec<_> = find_markers(content, &reference())
            .iter()
            .map(|d| d.attrs["postId"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_whitespace_variants() {
        // any whitespace after the name and attributes
        let content = "<!-- wp:postfinder/reference\n{\"postId\":9}\n/-->";
        assert!(content.contains(&reference().prefix()));
        assert!(contains_marker(content, &reference()));

        // the head itself is always `<!-- wp:`
        for content in [
            "<!--\twp:postfinder/reference {\"postId\":9} /-->",
            "<!--\nwp:postfinder/reference {\"postId\":9} /-->",
            "<!--  wp:postfinder/reference {\"postId\":9} /-->",
        ] {
            assert!(!contains_marker(content, &reference()), "accepted: {content:?}");
        }
    }

    #[test]
    fn test_empty_and_plain_content() {
        assert!(parse_delimiters("").is_empty());
        assert!(parse_delimiters("<p>No blocks here</p><!-- just a comment -->").is_empty());
    }
}

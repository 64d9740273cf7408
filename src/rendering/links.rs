use url::Url;

use crate::db::models::DocumentId;
use crate::error::AppError;

/// Builds public document URLs from the site base URL.
///
/// Permalinks use the plain `?p=<id>` form, which stays valid whatever
/// slug the document currently has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permalinks {
    base: Url,
}

impl Permalinks {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// Parse the base URL, rejecting anything that cannot carry a query.
    pub fn parse(base: &str) -> Result<Self, AppError> {
        let base = Url::parse(base)
            .map_err(|e| AppError::Config(format!("Invalid site base URL '{base}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "Site base URL '{base}' cannot be used as a base"
            )));
        }
        Ok(Self::new(base))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn permalink(&self, id: DocumentId) -> String {
        let mut url = self.base.clone();
        url.set_fragment(None);
        url.query_pairs_mut()
            .clear()
            .append_pair("p", &id.to_string());
        url.to_string()
    }
}

/// Escape text for use inside HTML content or a quoted attribute.
///
/// Only `& < > " '` are replaced; everything else is kept as written.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Escape a URL for an `href` attribute.
///
/// Only absolute `http`/`https` URLs survive; anything else (including
/// `javascript:` and relative or unparsable input) becomes an empty string.
pub fn escape_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(url) if is_safe_scheme(url.scheme()) => escape_html(url.as_str()),
        _ => String::new(),
    }
}

fn is_safe_scheme(scheme: &str) -> bool {
    matches!(scheme, "http" | "https")
}

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, immutable document identifier.
pub type DocumentId = u64;

/// Publication status of a document.
///
/// Anything the store reports that is neither a draft nor published
/// (private, trashed, scheduled...) collapses into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Published,
    #[serde(other)]
    Other,
}

impl DocumentStatus {
    /// The value stored in the `status` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Published => "published",
            DocumentStatus::Other => "other",
        }
    }
}

/// A document as held by the document store.
///
/// The core never mutates documents; it only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier, stored as the MongoDB `_id`.
    #[serde(rename = "_id")]
    pub id: DocumentId,
    /// Raw, unfiltered title.
    pub title: String,
    /// Raw content. May embed zero or more block markers.
    pub content: String,
    pub status: DocumentStatus,
    /// Publication timestamp, stored as a BSON date so range filters work.
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub published_at: DateTime<Utc>,
}

impl Document {
    pub fn is_published(&self) -> bool {
        self.status == DocumentStatus::Published
    }
}

/// A date range for marker scans, inclusive on both bounds.
///
/// The whole `before` day is part of the window. A window whose `after` lies
/// past its `before` is empty rather than invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub after: NaiveDate,
    pub before: NaiveDate,
}

impl ScanWindow {
    pub fn new(after: NaiveDate, before: NaiveDate) -> Self {
        Self { after, before }
    }

    /// The window covering the last `days` days up to and including `today`.
    pub fn last_days(days: u64, today: NaiveDate) -> Self {
        let after = today
            .checked_sub_days(chrono::Days::new(days))
            .unwrap_or(NaiveDate::MIN);
        Self::new(after, today)
    }

    pub fn is_empty(&self) -> bool {
        self.after > self.before
    }

    /// First instant inside the window.
    pub fn start(&self) -> DateTime<Utc> {
        self.after.and_time(NaiveTime::MIN).and_utc()
    }

    /// First instant after the window, or `None` when `before` is the last
    /// representable date.
    pub fn end_exclusive(&self) -> Option<DateTime<Utc>> {
        self.before
            .succ_opt()
            .map(|next| next.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if self.is_empty() || ts < self.start() {
            return false;
        }
        self.end_exclusive().map_or(true, |end| ts < end)
    }
}

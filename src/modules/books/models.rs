use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Separator used when a list of authors is flattened for storage.
pub const AUTHOR_SEPARATOR: &str = ", ";

/// A book as returned by the search API.
///
/// Everything except `title` is optional on the wire. `title` is the identity
/// key for the saved list and the view history: exact, case-sensitive match.
/// Distinct books sharing a title collide; that is a known limitation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<String>,
    /// Synopsis
    #[serde(default)]
    pub contents: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// List price
    #[serde(default)]
    pub price: Option<i64>,
    /// Negative when the book is not on sale
    #[serde(default)]
    pub sale_price: Option<i64>,
    /// Publication date
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub datetime: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub translators: Vec<String>,
    /// Detail page on the provider's site
    #[serde(default)]
    pub url: Option<String>,
    /// Availability, e.g. "정상판매"
    #[serde(default)]
    pub status: Option<String>,
}

impl BookRecord {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn authors_display(&self) -> String {
        self.authors.join(AUTHOR_SEPARATOR)
    }

    /// True when the record has no usable identity key
    pub fn is_untitled(&self) -> bool {
        self.title.trim().is_empty()
    }
}

fn split_authors(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split(AUTHOR_SEPARATOR).map(str::to_string).collect()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// The API sends "" for unknown publication dates; that must not fail the page.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok()))
}

/// Sort order accepted by the search API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Accuracy,
    Latest,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Accuracy => "accuracy",
            SortOrder::Latest => "latest",
        }
    }
}

/// Field the query is matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchTarget {
    #[default]
    Title,
    Isbn,
    Publisher,
    Person,
}

impl SearchTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchTarget::Title => "title",
            SearchTarget::Isbn => "isbn",
            SearchTarget::Publisher => "publisher",
            SearchTarget::Person => "person",
        }
    }
}

/// One search call: `query`, `sort`, `page`, `size`, `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub sort: SortOrder,
    pub page: u32,
    pub size: u32,
    pub target: SearchTarget,
}

impl SearchRequest {
    pub const DEFAULT_SIZE: u32 = 10;

    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            sort: SortOrder::default(),
            page: 1,
            size: Self::DEFAULT_SIZE,
            target: SearchTarget::default(),
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn target(mut self, target: SearchTarget) -> Self {
        self.target = target;
        self
    }
}

/// Wire shape of a search response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchResponse {
    pub meta: SearchMeta,
    #[serde(default)]
    pub documents: Vec<BookRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchMeta {
    pub is_end: bool,
    pub pageable_count: u32,
    pub total_count: u32,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchPage {
    pub is_last_page: bool,
    pub pageable_count: u32,
    pub total_count: u32,
    pub items: Vec<BookRecord>,
}

impl From<SearchResponse> for SearchPage {
    fn from(response: SearchResponse) -> Self {
        Self {
            is_last_page: response.meta.is_end,
            pageable_count: response.meta.pageable_count,
            total_count: response.meta.total_count,
            items: response.documents,
        }
    }
}

/// A book on the saved list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedEntry {
    pub title: String,
    /// Authors joined with `", "`
    pub authors: String,
    pub thumbnail_url: Option<String>,
    pub price: Option<i64>,
}

impl From<&BookRecord> for SavedEntry {
    fn from(record: &BookRecord) -> Self {
        Self {
            title: record.title.clone(),
            authors: record.authors_display(),
            thumbnail_url: record.thumbnail.clone(),
            price: record.price,
        }
    }
}

impl From<&SavedEntry> for BookRecord {
    fn from(entry: &SavedEntry) -> Self {
        Self {
            title: entry.title.clone(),
            authors: split_authors(&entry.authors),
            thumbnail: entry.thumbnail_url.clone(),
            price: entry.price,
            ..Self::default()
        }
    }
}

/// A recently viewed book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEntry {
    pub title: String,
    pub authors: String,
    pub thumbnail_url: Option<String>,
    pub date_added: DateTime<Utc>,
}

impl RecentEntry {
    pub fn viewed(record: &BookRecord, at: DateTime<Utc>) -> Self {
        Self {
            title: record.title.clone(),
            authors: record.authors_display(),
            thumbnail_url: record.thumbnail.clone(),
            date_added: at,
        }
    }
}

impl From<&RecentEntry> for BookRecord {
    fn from(entry: &RecentEntry) -> Self {
        Self {
            title: entry.title.clone(),
            authors: split_authors(&entry.authors),
            thumbnail: entry.thumbnail_url.clone(),
            datetime: Some(entry.date_added.fixed_offset()),
            ..Self::default()
        }
    }
}

//! Wire models for server responses.
//!
//! The server is loose about scalar types (flags arrive as `true`, `"true"`,
//! `1` or `"1"` depending on version), so flag and count fields go through
//! lenient deserializers.

use serde::{Deserialize, Deserializer, Serialize};

/// Page size used when the server does not report one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Server-side sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMethod {
    #[default]
    Title,
    DateAdded,
}

impl SortMethod {
    /// Value of the `sortby` query parameter.
    #[must_use]
    pub fn as_query(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::DateAdded => "date_added",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Value of the `order` query parameter.
    #[must_use]
    pub fn as_query(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Parameters of one `GET /api/search` page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub filter: String,
    pub category: String,
    pub new_only: bool,
    pub sort: SortMethod,
    pub direction: SortDirection,
    pub start: usize,
}

impl SearchQuery {
    pub(crate) fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("filter", self.filter.clone()),
            ("newonly", self.new_only.to_string()),
            ("sortby", self.sort.as_query().to_string()),
            ("order", self.direction.as_query().to_string()),
            ("start", self.start.to_string()),
        ];
        if !self.category.is_empty() {
            params.push(("category", self.category.clone()));
        }
        params
    }
}

/// One archive as returned by listings and search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    #[serde(rename = "arcid")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub isnew: bool,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub pagecount: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub progress: u64,
}

impl ArchiveSummary {
    /// Returns the `date_added:` tag value, if present.
    #[must_use]
    pub fn date_added(&self) -> Option<u64> {
        self.tags
            .split(',')
            .map(str::trim)
            .find_map(|tag| tag.strip_prefix("date_added:"))
            .and_then(|v| v.trim().parse().ok())
    }
}

/// `GET /api/info` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub archives_per_page: u64,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub nofun_mode: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub debug_mode: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub server_tracks_progress: bool,
}

impl ServerInfo {
    /// Listing page size, falling back to [`DEFAULT_PAGE_SIZE`].
    #[must_use]
    pub fn page_size(&self) -> usize {
        usize::try_from(self.archives_per_page)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

/// `GET /api/search` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub data: Vec<ArchiveSummary>,
    #[serde(default, rename = "recordsFiltered", deserialize_with = "lenient_u64")]
    pub records_filtered: u64,
    #[serde(default, rename = "recordsTotal", deserialize_with = "lenient_u64")]
    pub records_total: u64,
}

/// `GET /api/search/random` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RandomResult {
    #[serde(default)]
    pub(crate) data: Vec<ArchiveSummary>,
}

/// A server-side category (static list or saved search).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub archives: Vec<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub pinned: bool,
    #[serde(default)]
    pub search: String,
}

/// One entry of `GET /api/database/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStat {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub weight: u64,
}

/// Reply to `POST /api/archives/{id}/extract`: either pages or a queued job.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ExtractReply {
    #[serde(default)]
    pub(crate) pages: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) job: Option<u64>,
}

/// Reply carrying only a job id (deferred thumbnail generation).
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct JobReply {
    #[serde(default)]
    pub(crate) job: Option<u64>,
}

/// Reply to category creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CreatedCategory {
    #[serde(default)]
    pub(crate) category_id: Option<String>,
}

/// State of a server job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Finished,
    Failed,
    Pending,
}

/// `GET /api/minion/{id}` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct JobStatusReply {
    #[serde(default)]
    pub(crate) state: Option<String>,
}

impl JobStatusReply {
    /// `finished` and `failed` are terminal; anything else, including a
    /// missing field, is still pending.
    pub(crate) fn job_state(&self) -> JobState {
        match self.state.as_deref() {
            Some("finished") => JobState::Finished,
            Some("failed") => JobState::Failed,
            _ => JobState::Pending,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Int(i64),
    Str(String),
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Bool(b)) => b,
        Some(Loose::Int(i)) => i != 0,
        Some(Loose::Str(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        None => false,
    })
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Int(i)) => u64::try_from(i).unwrap_or(0),
        Some(Loose::Str(s)) => s.trim().parse().unwrap_or(0),
        Some(Loose::Bool(_)) | None => 0,
    })
}

//! Local copy of the full archive list, filtered and sorted client-side.

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::api::{ArchiveSummary, ServerClient, SortDirection, SortMethod};

/// Snapshot of `GET /api/archives`, loaded on first use.
#[derive(Debug)]
pub struct ArchiveCatalog {
    client: ServerClient,
    snapshot: Mutex<Option<Arc<Vec<ArchiveSummary>>>>,
}

impl ArchiveCatalog {
    #[must_use]
    pub fn new(client: ServerClient) -> Self {
        Self {
            client,
            snapshot: Mutex::new(None),
        }
    }

    /// Returns the snapshot, loading it from the server the first time.
    /// `None` if it is not loaded and loading failed.
    pub async fn archives(&self) -> Option<Arc<Vec<ArchiveSummary>>> {
        let mut snapshot = self.snapshot.lock().await;
        if let Some(archives) = snapshot.as_ref() {
            return Some(Arc::clone(archives));
        }
        let archives = Arc::new(self.client.archive_list().await?);
        debug!(count = archives.len(), "archive catalog loaded");
        *snapshot = Some(Arc::clone(&archives));
        Some(archives)
    }

    /// Replaces the snapshot, e.g. with an index kept elsewhere.
    pub async fn replace(&self, archives: Vec<ArchiveSummary>) {
        *self.snapshot.lock().await = Some(Arc::new(archives));
    }

    /// Forgets the snapshot; the next read reloads it.
    pub async fn clear(&self) {
        *self.snapshot.lock().await = None;
    }
}

/// One comma-separated filter term.
#[derive(Debug, PartialEq, Eq)]
struct Term {
    text: String,
    negated: bool,
}

fn parse_terms(filter: &str) -> Vec<Term> {
    filter
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|raw| {
            let (negated, rest) = match raw.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            let text = rest.trim().trim_end_matches('$').trim_matches('"').to_lowercase();
            (!text.is_empty()).then_some(Term { text, negated })
        })
        .collect()
}

/// `true` when every plain term appears in the title or tags and no negated
/// term does. Matching ignores case.
#[must_use]
pub fn matches_filter(archive: &ArchiveSummary, filter: &str) -> bool {
    let title = archive.title.to_lowercase();
    let tags = archive.tags.to_lowercase();
    parse_terms(filter).iter().all(|term| {
        let found = title.contains(&term.text) || tags.contains(&term.text);
        found != term.negated
    })
}

fn compare(a: &ArchiveSummary, b: &ArchiveSummary, sort: SortMethod) -> Ordering {
    let primary = match sort {
        SortMethod::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortMethod::DateAdded => a.date_added().unwrap_or(0).cmp(&b.date_added().unwrap_or(0)),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

/// Filters and sorts `archives` the way the server would.
#[must_use]
pub fn query_archives(
    archives: &[ArchiveSummary],
    filter: &str,
    new_only: bool,
    sort: SortMethod,
    direction: SortDirection,
) -> Vec<ArchiveSummary> {
    let mut selected: Vec<ArchiveSummary> = archives
        .iter()
        .filter(|a| !new_only || a.isnew)
        .filter(|a| matches_filter(a, filter))
        .cloned()
        .collect();
    selected.sort_by(|a, b| {
        let ordering = compare(a, b, sort);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    selected
}

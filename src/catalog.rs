//! Catalog store and filter/search query engine

use tracing::info;

use crate::api::{ProviderPayload, ProviderSeries, ProviderStream};
use crate::error::Error;
use crate::models::{CatalogEntry, StreamKind};

/// Sentinel group that matches every category.
pub const ALL_GROUP: &str = "All";

/// The three kind-partitioned entry lists plus the derived category
/// groups for the live list. Replaced wholesale on each ingestion.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    pub live: Vec<CatalogEntry>,
    pub movies: Vec<CatalogEntry>,
    pub series: Vec<CatalogEntry>,
    /// `"All"` followed by the distinct live category names, in
    /// first-seen (provider) order.
    pub groups: Vec<String>,
}

impl CatalogStore {
    /// Build a store from a provider payload. Never fails: missing lists
    /// were already defaulted to empty during payload parsing.
    pub fn ingest(payload: &ProviderPayload) -> CatalogStore {
        let live: Vec<CatalogEntry> = payload
            .live_streams
            .iter()
            .map(|s| stream_entry(s, StreamKind::Live))
            .collect();
        let movies = payload
            .movie_streams
            .iter()
            .map(|s| stream_entry(s, StreamKind::Movie))
            .collect();
        let series = payload.series.iter().map(series_entry).collect();

        let groups = category_groups(&live);
        let store = CatalogStore { live, movies, series, groups };
        info!(
            "catalog ingested: {} live, {} movies, {} series, {} groups",
            store.live.len(),
            store.movies.len(),
            store.series.len(),
            store.groups.len() - 1
        );
        store
    }

    pub fn entries(&self, kind: StreamKind) -> &[CatalogEntry] {
        match kind {
            StreamKind::Live => &self.live,
            StreamKind::Movie => &self.movies,
            StreamKind::Series => &self.series,
        }
    }

    pub fn find(&self, kind: StreamKind, id: i64) -> Option<&CatalogEntry> {
        self.entries(kind).iter().find(|e| e.id == id)
    }
}

fn stream_entry(stream: &ProviderStream, kind: StreamKind) -> CatalogEntry {
    CatalogEntry {
        id: stream.stream_id,
        name: stream.name.clone(),
        icon_url: stream.stream_icon.clone(),
        epg_channel_id: if kind == StreamKind::Live {
            stream.epg_channel_id.clone()
        } else {
            None
        },
        category_id: stream.category_id.clone(),
        category_name: stream.category_name.clone(),
        kind,
    }
}

fn series_entry(series: &ProviderSeries) -> CatalogEntry {
    CatalogEntry {
        id: series.series_id,
        name: series.name.clone(),
        icon_url: series.cover.clone(),
        epg_channel_id: None,
        category_id: series.category_id.clone(),
        category_name: series.category_name.clone(),
        kind: StreamKind::Series,
    }
}

/// Distinct category names over the live list, prefixed with `"All"`.
/// Entries without a category name contribute nothing.
fn category_groups(live: &[CatalogEntry]) -> Vec<String> {
    let mut groups = vec![ALL_GROUP.to_string()];
    for entry in live {
        if let Some(name) = &entry.category_name {
            if !groups.iter().any(|g| g == name) {
                groups.push(name.clone());
            }
        }
    }
    groups
}

/// Check the account block of a payload. A missing block or any status
/// other than `"Active"` is an auth failure; the caller leaves the
/// catalog unpopulated in that case.
pub fn verify_account(payload: &ProviderPayload) -> Result<(), Error> {
    match &payload.user_info {
        Some(user) if user.status == "Active" => Ok(()),
        Some(user) => Err(Error::Auth(format!("account status is {:?}", user.status))),
        None => Err(Error::Auth("missing account status".to_string())),
    }
}

/// Select entries matching the group + free-text predicate. Pure; keeps
/// the provider-supplied order.
pub fn filter<'a>(
    entries: &'a [CatalogEntry],
    group: &str,
    search: &str,
) -> Vec<&'a CatalogEntry> {
    entries
        .iter()
        .filter(|e| group == ALL_GROUP || e.category_name.as_deref() == Some(group))
        .filter(|e| contains_ignore_case(&e.name, search))
        .collect()
}

/// Case-insensitive substring check without allocation.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }

    haystack
        .as_bytes()
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

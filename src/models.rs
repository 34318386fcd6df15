//! Core domain types shared across catalog, session and display code

use std::fmt;

/// The three kinds of entry a provider catalog carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Live,
    Movie,
    Series,
}

impl StreamKind {
    /// Path segment used when building a stream address.
    pub fn segment(&self) -> &'static str {
        match self {
            StreamKind::Live => "live",
            StreamKind::Movie => "movie",
            StreamKind::Series => "series",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StreamKind::Live => "Live",
            StreamKind::Movie => "Movie",
            StreamKind::Series => "Series",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One live channel, movie or series offered by the provider.
/// Immutable once ingested; `id` is unique within its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    pub icon_url: Option<String>,
    /// EPG channel identifier, set for live entries only.
    pub epg_channel_id: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub kind: StreamKind,
}

/// Server location and credentials needed to build a stream address.
#[derive(Debug, Clone)]
pub struct StreamContext {
    pub server_url: String,
    pub username: String,
    pub password: String,
}

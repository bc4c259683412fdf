//! Client-side song model.

use chrono::{DateTime, Utc};
use tune_proto::{SongId, SongRecord};

/// Markers of a song as known to the player.  `Loaded(vec![])` means "fetched,
/// none set" and is never re-fetched; only `NotLoaded` triggers a request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MarkerState {
    #[default]
    NotLoaded,
    Loaded(Vec<f64>),
}

impl MarkerState {
    /// Loaded markers, or an empty slice when not fetched yet.
    pub fn as_slice(&self) -> &[f64] {
        match self {
            MarkerState::Loaded(m) => m,
            MarkerState::NotLoaded => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    pub has_image: bool,
    pub modified: DateTime<Utc>,
    pub markers: MarkerState,
}

impl From<SongRecord> for Song {
    fn from(r: SongRecord) -> Self {
        Self {
            id: r.id,
            title: r.title,
            artist: r.artist,
            has_image: r.image,
            modified: r.modified,
            markers: MarkerState::NotLoaded,
        }
    }
}

/// Catalog ordering used for paging and for local re-sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Id,
    Modified,
}

impl SortOrder {
    pub fn from_flag(sort_by_modified_date: bool) -> Self {
        if sort_by_modified_date {
            SortOrder::Modified
        } else {
            SortOrder::Id
        }
    }

    pub fn is_modified(self) -> bool {
        self == SortOrder::Modified
    }
}

/// Newest-modified first; stable for equal timestamps.
pub fn sort_newest_first(songs: &mut [Song]) {
    songs.sort_by(|a, b| b.modified.cmp(&a.modified));
}

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use tune_proto::protocol::ImportCandidate;
use tune_proto::SongRecord;

use super::AppState;
use crate::error::{ApiError, Result};
use crate::import::safe_file_stem;
use crate::library::{self, UNKNOWN_ARTIST};
use crate::store::NewSong;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct UrlParams {
    pub url: Option<String>,
}

impl UrlParams {
    fn require(&self) -> Result<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ApiError::BadRequest("No url".to_string()))
    }
}

/// GET /songs/import/search?query=&limit=
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ImportCandidate>>> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Invalid query".to_string()))?;
    let limit = params.limit.unwrap_or(state.search_limit);
    Ok(Json(state.importer.search(query, limit).await?))
}

/// GET /songs/import/playlist?url=
pub async fn playlist(
    State(state): State<AppState>,
    Query(params): Query<UrlParams>,
) -> Result<Json<Vec<ImportCandidate>>> {
    Ok(Json(state.importer.playlist(params.require()?).await?))
}

/// GET /songs/import/song?url=
pub async fn song(
    State(state): State<AppState>,
    Query(params): Query<UrlParams>,
) -> Result<Json<ImportCandidate>> {
    Ok(Json(state.importer.song(params.require()?).await?))
}

/// POST /songs/import/download?url=: fetch the audio into the library and
/// add it to the catalog.
pub async fn download(
    State(state): State<AppState>,
    Query(params): Query<UrlParams>,
) -> Result<Json<SongRecord>> {
    let url = params.require()?;
    let candidate = state.importer.song(url).await?;
    let stem = safe_file_stem(&candidate.title, &candidate.id);
    let path = state
        .importer
        .download(url, &state.library_dir, &stem)
        .await?;

    let tag_path = path.clone();
    let tags = tokio::task::spawn_blocking(move || library::read_tags(&tag_path))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    let artist = tags
        .artist
        .or_else(|| Some(candidate.artist.clone()).filter(|a| !a.is_empty()))
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let song = NewSong {
        title: tags.title.unwrap_or_else(|| candidate.title.clone()),
        artist,
        file: path
            .strip_prefix(&state.library_dir)
            .unwrap_or(&path)
            .to_path_buf(),
        has_image: tags.has_picture,
        modified: Utc::now(),
    };

    let entry = state.store.insert(song).await?;
    info!("imported {} as song #{}", url, entry.id);
    Ok(Json(entry.record()))
}

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, Query, Request, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, info};
use tune_proto::protocol::{IdsRequest, MarkerPatch};
use tune_proto::SongRecord;

use super::middleware::{FoundSong, SongPath};
use super::AppState;
use crate::error::{ApiError, Result};
use crate::library;
use crate::store::ReconcileSummary;

/// Hard cap on `limit` for free-text queries.
const MAX_QUERY_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Present (with any value, usually none) to page by modification time.
    #[serde(rename = "sortByModifiedDate")]
    pub sort_by_modified_date: Option<String>,
}

/// GET /songs?q=&limit=&offset=
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SongRecord>>> {
    let text = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Invalid query".to_string()))?;
    let limit = query.limit.min(MAX_QUERY_LIMIT);
    Ok(Json(state.store.query(text, limit, query.offset).await))
}

/// GET /songs/offset/:n[?sortByModifiedDate]
///
/// Sorted by id, `n` is the first id to return.  Sorted by modification
/// time, `n` is a page index.
pub async fn page(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<SongRecord>>> {
    let n: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid offset".to_string()))?;
    let songs = if query.sort_by_modified_date.is_some() {
        let page = usize::try_from(n).unwrap_or(usize::MAX);
        state.store.page_by_modified(page, state.page_size).await
    } else {
        state.store.page_by_id(n, state.page_size).await
    };
    Ok(Json(songs))
}

/// GET /songs/random
pub async fn random(State(state): State<AppState>) -> Result<Json<SongRecord>> {
    state
        .store
        .random()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Catalog is empty".to_string()))
}

/// POST /songs/multiple
pub async fn multiple(
    State(state): State<AppState>,
    body: std::result::Result<Json<IdsRequest>, JsonRejection>,
) -> Result<Json<Vec<SongRecord>>> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.store.many(&request.ids).await))
}

/// GET /songs/:id
pub async fn one(FoundSong(song): FoundSong) -> Json<SongRecord> {
    Json(song.record())
}

/// GET /songs/:id/marker
pub async fn markers(FoundSong(song): FoundSong) -> Json<Vec<f64>> {
    Json(song.markers)
}

/// PATCH /songs/:id/marker  body `{"marker": 0.42}` or `{"marker": "clear"}`
pub async fn edit_marker(
    SongPath(id): SongPath,
    State(state): State<AppState>,
    body: std::result::Result<Json<MarkerPatch>, JsonRejection>,
) -> Result<Json<Vec<f64>>> {
    let Json(patch) = body.map_err(|_| ApiError::BadRequest("Invalid marker".to_string()))?;
    let edit = patch.edit().map_err(ApiError::BadRequest)?;
    let markers = state.store.edit_marker(id, edit).await?;
    Ok(Json(markers))
}

/// GET /songs/:id/file: audio bytes, with Range support.
pub async fn file(
    State(state): State<AppState>,
    FoundSong(song): FoundSong,
    request: Request,
) -> Response {
    let path = state.library_dir.join(&song.file);
    debug!("serving song {} from {}", song.id, path.display());
    ServeFile::new(path)
        .oneshot(request)
        .await
        .map(|response| response.map(Body::new))
        .unwrap_or_else(|never| match never {})
        .into_response()
}

/// GET /songs/:id/image[?full]: embedded cover art.  Covers are stored at a
/// single size, so `full` is accepted and changes nothing.
pub async fn image(State(state): State<AppState>, FoundSong(song): FoundSong) -> Result<Response> {
    if !song.has_image {
        return Err(ApiError::NotFound("Song has no image".to_string()));
    }
    let path = state.library_dir.join(&song.file);
    match library::cover_art(&path).await? {
        Some((bytes, mime)) => Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response()),
        None => Err(ApiError::NotFound("Song has no image".to_string())),
    }
}

/// POST /songs/reload: rescan the library directory.
pub async fn reload(State(state): State<AppState>) -> Result<Json<ReconcileSummary>> {
    info!("rescanning library at {}", state.library_dir.display());
    let scanned = library::scan(&state.library_dir).await?;
    let summary = state.store.reconcile(scanned).await?;
    Ok(Json(summary))
}

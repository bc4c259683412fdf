//! Request guards: demo-mode gate and song id resolution.

use axum::{
    extract::{FromRequestParts, Path, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tune_proto::protocol::{Notice, DEMO_MODE_MESSAGE};
use tune_proto::SongId;

use super::AppState;
use crate::error::ApiError;
use crate::store::SongEntry;

/// Route layer for mutating and import routes.  In demo mode the request never
/// reaches its handler and the caller gets an explanatory notice instead.
pub async fn demo_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.demo_mode {
        tracing::debug!("demo mode: refusing {} {}", request.method(), request.uri());
        return Json(Notice {
            message: DEMO_MODE_MESSAGE.to_string(),
        })
        .into_response();
    }
    next.run(request).await
}

/// `:id` path segment parsed as a song id.
#[derive(Debug, Clone, Copy)]
pub struct SongPath(pub SongId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for SongPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::InvalidId)?;
        raw.trim()
            .parse::<SongId>()
            .map(SongPath)
            .map_err(|_| ApiError::InvalidId)
    }
}

/// The catalog entry named by the `:id` path segment.
#[derive(Debug, Clone)]
pub struct FoundSong(pub SongEntry);

#[axum::async_trait]
impl FromRequestParts<AppState> for FoundSong {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let SongPath(id) = SongPath::from_request_parts(parts, state).await?;
        state
            .store
            .get(id)
            .await
            .map(FoundSong)
            .ok_or(ApiError::SongNotFound)
    }
}

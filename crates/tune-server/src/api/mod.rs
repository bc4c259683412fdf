//! Catalog HTTP API.

pub mod import;
pub mod middleware;
pub mod songs;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tune_proto::config::{ImportConfig, ServerConfig};
use tune_proto::protocol::{api_prefix, API_VERSION};

use crate::import::ImportSource;
use crate::store::SongStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SongStore>,
    pub importer: Arc<dyn ImportSource>,
    pub library_dir: PathBuf,
    pub page_size: usize,
    pub search_limit: usize,
    pub demo_mode: bool,
}

impl AppState {
    pub fn new(
        store: Arc<SongStore>,
        importer: Arc<dyn ImportSource>,
        server: &ServerConfig,
        import: &ImportConfig,
    ) -> Self {
        Self {
            store,
            importer,
            library_dir: server.library_dir.clone(),
            page_size: server.page_size.max(1),
            search_limit: import.search_limit.max(1),
            demo_mode: server.demo_mode,
        }
    }
}

/// Build the full router, mounted under `/api/v1`.
pub fn router(state: AppState) -> Router {
    let open = Router::new()
        .route("/songs", get(songs::search))
        .route("/songs/offset/:n", get(songs::page))
        .route("/songs/random", get(songs::random))
        .route("/songs/multiple", post(songs::multiple))
        .route("/songs/:id", get(songs::one))
        .route("/songs/:id/marker", get(songs::markers))
        .route("/songs/:id/file", get(songs::file))
        .route("/songs/:id/image", get(songs::image));

    let gated = Router::new()
        .route("/songs/:id/marker", patch(songs::edit_marker))
        .route("/songs/reload", post(songs::reload))
        .route("/songs/import/search", get(import::search))
        .route("/songs/import/playlist", get(import::playlist))
        .route("/songs/import/song", get(import::song))
        .route("/songs/import/download", post(import::download))
        .route_layer(from_fn_with_state(state.clone(), middleware::demo_gate));

    Router::new()
        .nest(&api_prefix(API_VERSION), open.merge(gated))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tune_proto::config::Config;
use tune_proto::platform;
use tune_server::import::YtDlp;
use tune_server::store::SongStore;
use tune_server::{library, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("server.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tune_server=debug")),
        )
        .init();

    info!("tune-server starting (log: {})", log_path.display());

    // ── Config ───────────────────────────────────────────────────────────────
    let config = Config::load().context("loading config")?;
    if config.server.demo_mode {
        info!("demo mode: marker edits, rescans and imports are disabled");
    }

    // ── Catalog ──────────────────────────────────────────────────────────────
    let store = Arc::new(
        SongStore::open(config.server.catalog_file.clone())
            .await
            .context("opening catalog")?,
    );

    let library_dir = &config.server.library_dir;
    if library_dir.is_dir() {
        match library::scan(library_dir).await {
            Ok(scanned) => {
                store.reconcile(scanned).await?;
            }
            Err(e) => warn!("library scan failed: {:#}", e),
        }
    } else {
        warn!(
            "library dir {} does not exist; creating it",
            library_dir.display()
        );
        std::fs::create_dir_all(library_dir)?;
    }

    // ── Import source ────────────────────────────────────────────────────────
    let importer = Arc::new(YtDlp::new(
        platform::find_yt_dlp_binary(),
        config.import.audio_format.clone(),
    ));

    // ── HTTP ─────────────────────────────────────────────────────────────────
    let state = AppState::new(store, importer, &config.server, &config.import);
    let app = router(state);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("catalog API: bind {} failed: {}", addr, e);
            return Err(e).with_context(|| format!("binding {}", addr));
        }
    };
    info!("catalog API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("tune-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

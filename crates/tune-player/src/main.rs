mod app;
mod breathing;
mod cooldown;
mod core;
mod events;
mod gateway;
mod keymap;
mod media;
mod mpv;
mod notice;
mod play_mode;
mod playback;
mod search;
mod seek;
mod settings;
mod song;
mod song_list;
mod theme;
mod ui;
mod widgets;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, watch};

use crate::core::{PlayerCore, PlayerInput, PlayerView};
use crate::gateway::{EndpointRing, HttpGateway};
use crate::media::{MediaEvent, MpvBackend};
use crate::settings::SettingsStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = tune_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("player.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; keep HTTP client internals quiet by default.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("tune log: {}", log_path.display());
    tracing::info!("tune starting…");

    // ── Load config and settings ─────────────────────────────────────────────
    let config = tune_proto::config::Config::load().context("loading config")?;
    let settings = SettingsStore::load(data_dir.join("player.json"), &config.player.endpoints);

    // ── Catalog gateway ──────────────────────────────────────────────────────
    let ring = EndpointRing::new(
        settings.get().endpoints.clone(),
        settings.get().current_endpoint,
    )?;
    let gateway = HttpGateway::new(ring, config.player.api_version)?;

    // ── Media backend (mpv) ──────────────────────────────────────────────────
    let (media_tx, media_rx) = mpsc::channel::<MediaEvent>(256);
    let media = MpvBackend::start(settings.get().volume, media_tx).await?;

    // ── PlayerCore ───────────────────────────────────────────────────────────
    let (input_tx, input_rx) = mpsc::channel::<PlayerInput>(1024);
    let (view_tx, view_rx) = watch::channel(PlayerView::default());
    let core = PlayerCore::new(
        Arc::new(gateway),
        media,
        settings,
        input_tx.clone(),
        view_tx,
    );
    tokio::spawn(async move {
        if let Err(e) = core.run(input_rx, media_rx).await {
            tracing::error!("PlayerCore exited with error: {}", e);
        }
    });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let result = app::App::new(input_tx, view_rx).run().await;
    tracing::info!("tune exiting");
    result
}

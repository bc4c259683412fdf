//! Library directory scanning and tag reading using lofty

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::ItemKey;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::store::NewSong;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

pub fn is_audio_path(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase());
    matches!(
        ext.as_deref(),
        Some("mp3" | "flac" | "ogg" | "opus" | "m4a" | "aac" | "wav" | "webm")
    )
}

/// Tag fields we care about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub has_picture: bool,
}

/// Read title, artist and cover presence.  Unreadable files yield empty tags.
pub fn read_tags(path: &Path) -> Tags {
    let tagged_file = match Probe::open(path).and_then(|p| p.read()) {
        Ok(f) => f,
        Err(e) => {
            debug!("no readable tags in {}: {}", path.display(), e);
            return Tags::default();
        }
    };
    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        return Tags::default();
    };

    let text = |key: &ItemKey| -> Option<String> {
        tag.get_string(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    Tags {
        title: text(&ItemKey::TrackTitle),
        artist: text(&ItemKey::TrackArtist),
        has_picture: !tag.pictures().is_empty(),
    }
}

/// Build a catalog candidate for `path`, which must live under `root`.
pub fn describe(root: &Path, path: &Path) -> Result<NewSong> {
    let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    let modified: DateTime<Utc> = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    let tags = read_tags(path);

    let title = tags.title.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    });

    Ok(NewSong {
        title,
        artist: tags.artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        file: relative,
        has_image: tags.has_picture,
        modified,
    })
}

/// Recursively collect audio files under `root`, sorted by path.
pub async fn scan(root: &Path) -> Result<Vec<NewSong>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || scan_blocking(&root))
        .await
        .context("library scan task failed")?
}

fn scan_blocking(root: &Path) -> Result<Vec<NewSong>> {
    let mut files: Vec<PathBuf> = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).with_context(|| format!("read {}", dir.display()))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_audio_path(&path) {
                files.push(path);
            }
        }
    }
    files.sort();

    let mut songs = Vec::with_capacity(files.len());
    for path in files {
        match describe(root, &path) {
            Ok(song) => songs.push(song),
            Err(e) => warn!("skipping {}: {:#}", path.display(), e),
        }
    }
    Ok(songs)
}

/// Embedded cover art of an audio file as `(bytes, mime type)`.
pub async fn cover_art(path: &Path) -> Result<Option<(Vec<u8>, &'static str)>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<Option<(Vec<u8>, &'static str)>> {
        let tagged_file = Probe::open(&path)?
            .read()
            .context("Failed to read audio file")?;
        let picture = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .and_then(|tag| tag.pictures().first());
        Ok(picture.map(|p| {
            let data = p.data().to_vec();
            let mime = sniff_image_mime(&data);
            (data, mime)
        }))
    })
    .await
    .context("cover art task failed")?
}

fn sniff_image_mime(data: &[u8]) -> &'static str {
    match data {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [b'B', b'M', ..] => "image/bmp",
        _ => "image/jpeg",
    }
}

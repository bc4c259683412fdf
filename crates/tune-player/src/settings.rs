//! Persisted player settings (`<data_dir>/player.json`).
//!
//! Saves happen synchronously after every change and never fail the caller;
//! a failed write is logged and the in-memory value stays authoritative.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::play_mode::PlayMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub current_endpoint: usize,
    #[serde(default)]
    pub play_mode: PlayMode,
    #[serde(default = "default_true")]
    pub sort_by_modified_date: bool,
    #[serde(default = "default_true")]
    pub animations_enabled: bool,
    #[serde(default = "default_volume")]
    pub volume: u8,
}

fn default_true() -> bool {
    true
}

fn default_volume() -> u8 {
    50
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            current_endpoint: 0,
            play_mode: PlayMode::default(),
            sort_by_modified_date: true,
            animations_enabled: true,
            volume: default_volume(),
        }
    }
}

pub struct SettingsStore {
    path: Option<PathBuf>,
    settings: Settings,
}

impl SettingsStore {
    /// Load from `path`.  A missing or unreadable file yields defaults; an
    /// empty endpoint list is seeded from `seed_endpoints`.
    pub fn load(path: PathBuf, seed_endpoints: &[String]) -> Self {
        let mut settings = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("settings: {} is unreadable ({}), using defaults", path.display(), e);
                Settings::default()
            }),
            Err(_) => Settings::default(),
        };
        if settings.endpoints.is_empty() {
            settings.endpoints = seed_endpoints.to_vec();
            settings.current_endpoint = 0;
        }
        if settings.current_endpoint >= settings.endpoints.len() {
            settings.current_endpoint = 0;
        }
        settings.volume = settings.volume.min(100);
        Self {
            path: Some(path),
            settings,
        }
    }

    /// Settings that are never written anywhere.
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            settings,
        }
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn update(&mut self, change: impl FnOnce(&mut Settings)) {
        change(&mut self.settings);
        self.save();
    }

    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let result = serde_json::to_string_pretty(&self.settings)
            .map_err(anyhow::Error::from)
            .and_then(|json| {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, json)?;
                Ok(())
            });
        match result {
            Ok(()) => debug!("settings saved to {}", path.display()),
            Err(e) => warn!("settings: save to {} failed: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_seeds_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(
            dir.path().join("player.json"),
            &["http://a:3000".to_string()],
        );
        let s = store.get();
        assert_eq!(s.endpoints, vec!["http://a:3000"]);
        assert!(s.sort_by_modified_date);
        assert!(s.animations_enabled);
        assert_eq!(s.volume, 50);
        assert_eq!(s.play_mode, PlayMode::Autoplay);
    }

    #[test]
    fn test_update_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.json");
        let mut store = SettingsStore::load(path.clone(), &["http://a".to_string()]);
        store.update(|s| {
            s.play_mode = PlayMode::Once;
            s.volume = 80;
        });

        let reloaded = SettingsStore::load(path, &[]);
        assert_eq!(reloaded.get().play_mode, PlayMode::Once);
        assert_eq!(reloaded.get().volume, 80);
        assert_eq!(reloaded.get().endpoints, vec!["http://a"]);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.json");
        std::fs::write(
            &path,
            r#"{"endpoints":["http://x","http://y"],"current_endpoint":7}"#,
        )
        .unwrap();

        let store = SettingsStore::load(path, &[]);
        assert_eq!(store.get().current_endpoint, 0);
        assert!(store.get().animations_enabled);
    }
}

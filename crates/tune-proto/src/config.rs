use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

/// Environment variable that forces demo mode on (`1`, `true`, `yes`).
pub const DEMO_MODE_ENV: &str = "TUNE_DEMO_MODE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Read-only mode: marker edits, rescans and imports answer with a notice.
    #[serde(default)]
    pub demo_mode: bool,
    /// Directory scanned for audio files and used as the import target.
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,
    /// JSON file holding song records, ids and markers.
    #[serde(default = "default_catalog_file")]
    pub catalog_file: PathBuf,
    /// Songs per page for `/songs/offset/{n}`.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Catalog servers the player may rotate through.  Only used to seed the
    /// player's own settings file on first run.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,
    #[serde(default = "default_api_version")]
    pub api_version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Results returned by an import search when the caller passes no limit.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Audio format yt-dlp converts downloads to.
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            demo_mode: false,
            library_dir: default_library_dir(),
            catalog_file: default_catalog_file(),
            page_size: default_page_size(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            api_version: default_api_version(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            audio_format: default_audio_format(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_library_dir() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Music")))
        .unwrap_or_else(|| platform::data_dir().join("library"))
}

fn default_catalog_file() -> PathBuf {
    platform::data_dir().join("catalog.json")
}

fn default_page_size() -> usize {
    25
}

fn default_endpoints() -> Vec<String> {
    vec![format!("http://{}:{}", default_bind_address(), default_port())]
}

fn default_api_version() -> u32 {
    crate::protocol::API_VERSION
}

fn default_search_limit() -> usize {
    1
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

/// Interpret a boolean-ish environment value.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path, writing defaults there if it doesn't exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(DEMO_MODE_ENV) {
            if parse_flag(&raw) == Some(true) {
                self.server.demo_mode = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert!(!config.server.demo_mode);
        assert_eq!(config.server.page_size, 25);
        assert_eq!(config.player.endpoints, vec!["http://127.0.0.1:3000"]);
        assert_eq!(config.player.api_version, 1);
        assert!(config.server.catalog_file.ends_with("tunebox/catalog.json"));
    }

    #[test]
    fn test_load_from_creates_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let first = Config::load_from(&path).unwrap();
        assert!(path.exists());

        let mut edited = first.clone();
        edited.server.demo_mode = true;
        edited.server.port = 4100;
        edited.save_to(&path).unwrap();

        let second = Config::load_from(&path).unwrap();
        assert!(second.server.demo_mode);
        assert_eq!(second.server.port, 4100);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\ndemo_mode = true\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.server.demo_mode);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.import.search_limit, 1);
    }

    #[test]
    fn test_malformed_file_is_an_error_naming_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[player]\nendpoints = \"not a list\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("config.toml"));
        // The broken file is left for the user to fix.
        assert!(std::fs::read_to_string(&path).unwrap().contains("not a list"));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" Yes "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}

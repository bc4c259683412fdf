//! External import source: search, inspect and download tracks from a video
//! platform.  The shipped implementation wraps the yt-dlp CLI.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use tune_proto::protocol::ImportCandidate;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{0}")]
    Unavailable(String),
    /// Raw failure text from the upstream tool.
    #[error("{0}")]
    Upstream(String),
    #[error("import I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected upstream output: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait]
pub trait ImportSource: Send + Sync {
    /// Up to `limit` tracks matching free text.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ImportCandidate>, ImportError>;
    /// Every track of a playlist.
    async fn playlist(&self, url: &str) -> Result<Vec<ImportCandidate>, ImportError>;
    /// Metadata of a single track.
    async fn song(&self, url: &str) -> Result<ImportCandidate, ImportError>;
    /// Download the audio of `url` into `dest_dir` as `<base_name>.<ext>`.
    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        base_name: &str,
    ) -> Result<PathBuf, ImportError>;
}

pub struct YtDlp {
    binary: Option<PathBuf>,
    audio_format: String,
}

impl YtDlp {
    pub fn new(binary: Option<PathBuf>, audio_format: impl Into<String>) -> Self {
        if binary.is_none() {
            warn!("yt-dlp not found; import routes will report unavailable");
        }
        Self {
            binary,
            audio_format: audio_format.into(),
        }
    }

    fn binary(&self) -> Result<&Path, ImportError> {
        self.binary
            .as_deref()
            .ok_or_else(|| ImportError::Unavailable("yt-dlp binary not found".to_string()))
    }

    /// Run yt-dlp in JSON dump mode and parse one object per output line.
    async fn dump_json(&self, args: &[&str]) -> Result<Vec<Value>, ImportError> {
        let binary = self.binary()?;
        debug!("yt-dlp {:?}", args);
        let output = Command::new(binary)
            .arg("--dump-json")
            .arg("--no-warnings")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ImportError::Upstream(if stderr.is_empty() {
                format!("yt-dlp exited with status: {:?}", output.status.code())
            } else {
                stderr
            }));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut values = Vec::new();
        for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            values.push(serde_json::from_str(line)?);
        }
        Ok(values)
    }
}

#[async_trait]
impl ImportSource for YtDlp {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ImportCandidate>, ImportError> {
        let target = format!("ytsearch{}:{}", limit.max(1), query);
        let values = self.dump_json(&["--flat-playlist", &target]).await?;
        Ok(values.iter().filter_map(candidate_from_json).collect())
    }

    async fn playlist(&self, url: &str) -> Result<Vec<ImportCandidate>, ImportError> {
        let values = self.dump_json(&["--flat-playlist", "--yes-playlist", url]).await?;
        Ok(values.iter().filter_map(candidate_from_json).collect())
    }

    async fn song(&self, url: &str) -> Result<ImportCandidate, ImportError> {
        let values = self.dump_json(&["--no-playlist", url]).await?;
        values
            .first()
            .and_then(candidate_from_json)
            .ok_or_else(|| ImportError::Upstream(format!("no track found at {}", url)))
    }

    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        base_name: &str,
    ) -> Result<PathBuf, ImportError> {
        let binary = self.binary()?;
        tokio::fs::create_dir_all(dest_dir).await?;
        let output_template = format!("{}/{}.%(ext)s", dest_dir.display(), base_name);

        info!("Starting download from {} to {}", url, output_template);

        let mut child = Command::new(binary)
            .arg("--no-progress")
            .arg("--newline")
            .arg("--no-playlist")
            .arg("-x")
            .arg("--audio-format")
            .arg(&self.audio_format)
            .arg("--embed-metadata")
            .arg("--embed-thumbnail")
            .arg("-o")
            .arg(&output_template)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("yt-dlp: {}", line);
                }
            });
        }

        // Keep stderr so a failure can be reported verbatim.
        let stderr_task = child.stderr.take().map(|stderr| {
            let mut lines = BufReader::new(stderr).lines();
            tokio::spawn(async move {
                let mut collected = Vec::new();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("yt-dlp stderr: {}", line);
                    collected.push(line);
                }
                collected.join("\n")
            })
        });

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(ImportError::Upstream(if stderr.trim().is_empty() {
                format!("yt-dlp exited with status: {:?}", status.code())
            } else {
                stderr.trim().to_string()
            }));
        }

        let downloaded = find_downloaded_file(dest_dir, base_name).await?;
        info!("Download complete: {}", downloaded.display());
        Ok(downloaded)
    }
}

/// Map one yt-dlp JSON object (full or flat-playlist entry) to a candidate.
pub fn candidate_from_json(v: &Value) -> Option<ImportCandidate> {
    let text = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .filter_map(|k| v.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    };

    let id = text(&["id"])?;
    let url = text(&["webpage_url", "original_url", "url"])
        .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id));
    let thumbnail = text(&["thumbnail"]).or_else(|| {
        v.get("thumbnails")
            .and_then(Value::as_array)
            .and_then(|t| t.last())
            .and_then(|t| t.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    Some(ImportCandidate {
        title: text(&["track", "title"]).unwrap_or_else(|| id.clone()),
        artist: text(&["artist", "creator", "uploader", "channel"]).unwrap_or_default(),
        duration_secs: v.get("duration").and_then(Value::as_f64),
        thumbnail,
        url,
        id,
    })
}

/// File name stem derived from a track title, safe on every platform.
pub fn safe_file_stem(title: &str, id: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = cleaned.trim_matches('.').trim();
    if cleaned.is_empty() {
        id.to_string()
    } else {
        format!("{} [{}]", cleaned, id)
    }
}

async fn find_downloaded_file(output_dir: &Path, base_name: &str) -> Result<PathBuf, ImportError> {
    let mut entries = tokio::fs::read_dir(output_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.file_stem().and_then(|n| n.to_str()) == Some(base_name)
            && crate::library::is_audio_path(&path)
        {
            return Ok(path);
        }
    }

    Err(ImportError::Upstream(format!(
        "Downloaded file not found for: {}",
        base_name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidate_from_full_info() {
        let v = json!({
            "id": "abc123",
            "title": "Some Song (Official Audio)",
            "track": "Some Song",
            "artist": "Some Band",
            "uploader": "Some Band - Topic",
            "webpage_url": "https://www.youtube.com/watch?v=abc123",
            "duration": 201.0,
            "thumbnail": "https://i.ytimg.com/vi/abc123/hq.jpg"
        });
        let c = candidate_from_json(&v).unwrap();
        assert_eq!(c.title, "Some Song");
        assert_eq!(c.artist, "Some Band");
        assert_eq!(c.duration_secs, Some(201.0));
        assert_eq!(c.url, "https://www.youtube.com/watch?v=abc123");
    }

    #[test]
    fn test_candidate_from_flat_entry() {
        let v = json!({
            "id": "xyz",
            "title": "Flat Entry",
            "channel": "Channel Name",
            "url": "https://www.youtube.com/watch?v=xyz",
            "thumbnails": [{ "url": "small.jpg" }, { "url": "large.jpg" }]
        });
        let c = candidate_from_json(&v).unwrap();
        assert_eq!(c.artist, "Channel Name");
        assert_eq!(c.thumbnail.as_deref(), Some("large.jpg"));
        assert!(c.duration_secs.is_none());
    }

    #[test]
    fn test_candidate_requires_id() {
        assert!(candidate_from_json(&json!({ "title": "no id" })).is_none());
    }

    #[test]
    fn test_safe_file_stem() {
        assert_eq!(safe_file_stem("AC/DC: Live?", "id1"), "AC-DC- Live- [id1]");
        assert_eq!(safe_file_stem("  ...  ", "id2"), "id2");
    }

    #[tokio::test]
    async fn test_missing_binary_reports_unavailable() {
        let source = YtDlp::new(None, "mp3");
        let err = source.search("anything", 1).await.unwrap_err();
        assert!(matches!(err, ImportError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_find_downloaded_file_matches_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("track [a].mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("track [a].jpg"), b"x").unwrap();

        let found = find_downloaded_file(dir.path(), "track [a]").await.unwrap();
        assert_eq!(found, dir.path().join("track [a].mp3"));
        assert!(find_downloaded_file(dir.path(), "other").await.is_err());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current catalog API version.  The player builds its base path from this
/// (`/api/v{API_VERSION}`); bump it when routes or payloads change in a
/// breaking way.
pub const API_VERSION: u32 = 1;

/// Body returned by every gated route while the server runs in demo mode.
pub const DEMO_MODE_MESSAGE: &str = "This API is not available in demo mode";

/// Sentinel marker value meaning "remove every marker of this song".
pub const CLEAR_MARKERS: &str = "clear";

/// Server-assigned, stable song identifier.
pub type SongId = u64;

/// Versioned path prefix, e.g. `/api/v1`.
pub fn api_prefix(version: u32) -> String {
    format!("/api/v{}", version)
}

/// Song summary as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    /// True when the server can serve a cover image for this song.
    #[serde(default)]
    pub image: bool,
    pub modified: DateTime<Utc>,
}

/// Body of `POST /songs/multiple`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<SongId>,
}

/// Raw value of the `marker` field in a marker PATCH body: either a number or
/// a keyword.  Use [`MarkerPatch::edit`] to validate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarkerValue {
    Position(f64),
    Keyword(String),
}

/// Body of `PATCH /songs/{id}/marker`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerPatch {
    pub marker: MarkerValue,
}

/// A validated marker mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerEdit {
    /// Append a marker at this progress fraction.
    Add(f64),
    /// Remove all markers.
    Clear,
}

impl MarkerPatch {
    pub fn edit(&self) -> Result<MarkerEdit, String> {
        match &self.marker {
            MarkerValue::Position(p) if p.is_finite() && (0.0..=1.0).contains(p) => {
                Ok(MarkerEdit::Add(*p))
            }
            MarkerValue::Position(p) => Err(format!("Marker out of range: {}", p)),
            MarkerValue::Keyword(k) if k == CLEAR_MARKERS => Ok(MarkerEdit::Clear),
            MarkerValue::Keyword(k) => Err(format!("Unknown marker keyword: {}", k)),
        }
    }
}

impl From<MarkerEdit> for MarkerPatch {
    fn from(edit: MarkerEdit) -> Self {
        let marker = match edit {
            MarkerEdit::Add(p) => MarkerValue::Position(p),
            MarkerEdit::Clear => MarkerValue::Keyword(CLEAR_MARKERS.to_string()),
        };
        Self { marker }
    }
}

/// `{"message": ...}` reply, used by the demo-mode gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
}

/// A track offered by the external import source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportCandidate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    pub url: String,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_patch_parses_number_and_clear() {
        let add: MarkerPatch = serde_json::from_str(r#"{"marker":0.25}"#).unwrap();
        assert_eq!(add.edit().unwrap(), MarkerEdit::Add(0.25));

        let clear: MarkerPatch = serde_json::from_str(r#"{"marker":"clear"}"#).unwrap();
        assert_eq!(clear.edit().unwrap(), MarkerEdit::Clear);
    }

    #[test]
    fn test_marker_patch_rejects_out_of_range_and_unknown_keyword() {
        let high: MarkerPatch = serde_json::from_str(r#"{"marker":1.5}"#).unwrap();
        assert!(high.edit().is_err());

        let word: MarkerPatch = serde_json::from_str(r#"{"marker":"all"}"#).unwrap();
        assert!(word.edit().is_err());
    }

    #[test]
    fn test_marker_edit_serializes_to_wire_shape() {
        let json = serde_json::to_value(MarkerPatch::from(MarkerEdit::Clear)).unwrap();
        assert_eq!(json, serde_json::json!({ "marker": "clear" }));

        let json = serde_json::to_value(MarkerPatch::from(MarkerEdit::Add(0.5))).unwrap();
        assert_eq!(json, serde_json::json!({ "marker": 0.5 }));
    }

    #[test]
    fn test_song_record_image_defaults_to_false() {
        let rec: SongRecord = serde_json::from_str(
            r#"{"id":3,"title":"t","artist":"a","modified":"2024-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        assert_eq!(rec.id, 3);
        assert!(!rec.image);
    }

    #[test]
    fn test_api_prefix() {
        assert_eq!(api_prefix(API_VERSION), "/api/v1");
    }
}

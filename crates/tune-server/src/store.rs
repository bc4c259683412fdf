//! Song catalog: records, ids and markers, persisted as one JSON file.

use chrono::{DateTime, Utc};
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use tune_proto::{MarkerEdit, SongId, SongRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("song {0} not found")]
    NotFound(SongId),
    #[error("catalog I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongEntry {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    /// Audio file, relative to the library directory.
    pub file: PathBuf,
    #[serde(default)]
    pub has_image: bool,
    pub modified: DateTime<Utc>,
    /// Progress fractions in [0, 1], in insertion order.
    #[serde(default)]
    pub markers: Vec<f64>,
}

impl SongEntry {
    pub fn record(&self) -> SongRecord {
        SongRecord {
            id: self.id,
            title: self.title.clone(),
            artist: self.artist.clone(),
            image: self.has_image,
            modified: self.modified,
        }
    }
}

/// A song that has no id yet: a freshly scanned or imported file.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSong {
    pub title: String,
    pub artist: String,
    pub file: PathBuf,
    pub has_image: bool,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Catalog {
    #[serde(default = "first_id")]
    next_id: SongId,
    #[serde(default)]
    songs: BTreeMap<SongId, SongEntry>,
}

fn first_id() -> SongId {
    1
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            next_id: first_id(),
            songs: BTreeMap::new(),
        }
    }
}

impl Catalog {
    fn allocate(&mut self, song: NewSong) -> SongEntry {
        let id = self.next_id;
        self.next_id += 1;
        let entry = SongEntry {
            id,
            title: song.title,
            artist: song.artist,
            file: song.file,
            has_image: song.has_image,
            modified: song.modified,
            markers: Vec::new(),
        };
        self.songs.insert(id, entry.clone());
        entry
    }
}

/// Outcome of a library rescan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub total: usize,
}

pub struct SongStore {
    catalog: RwLock<Catalog>,
    path: PathBuf,
}

impl SongStore {
    /// Open the catalog at `path`, starting empty if the file doesn't exist.
    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        let catalog = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str::<Catalog>(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no catalog at {}, starting empty", path.display());
                Catalog::default()
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            "catalog loaded: {} songs from {}",
            catalog.songs.len(),
            path.display()
        );
        Ok(Self {
            catalog: RwLock::new(catalog),
            path,
        })
    }

    pub async fn len(&self) -> usize {
        self.catalog.read().await.songs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get(&self, id: SongId) -> Option<SongEntry> {
        self.catalog.read().await.songs.get(&id).cloned()
    }

    /// Songs whose title or artist contains every whitespace-separated word
    /// of `text` (case-insensitive), in id order.
    pub async fn query(&self, text: &str, limit: usize, offset: usize) -> Vec<SongRecord> {
        let words: Vec<String> = text.split_whitespace().map(|w| w.to_lowercase()).collect();
        let catalog = self.catalog.read().await;
        catalog
            .songs
            .values()
            .filter(|s| {
                let haystack = format!("{} {}", s.title, s.artist).to_lowercase();
                words.iter().all(|w| haystack.contains(w.as_str()))
            })
            .skip(offset)
            .take(limit)
            .map(SongEntry::record)
            .collect()
    }

    /// Up to `limit` songs with id >= `start`, ascending.
    pub async fn page_by_id(&self, start: SongId, limit: usize) -> Vec<SongRecord> {
        let catalog = self.catalog.read().await;
        catalog
            .songs
            .range(start..)
            .take(limit)
            .map(|(_, s)| s.record())
            .collect()
    }

    /// Page `page` of the catalog ordered newest-modified first.
    pub async fn page_by_modified(&self, page: usize, limit: usize) -> Vec<SongRecord> {
        let catalog = self.catalog.read().await;
        let mut all: Vec<&SongEntry> = catalog.songs.values().collect();
        all.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.id.cmp(&a.id)));
        all.into_iter()
            .skip(page.saturating_mul(limit))
            .take(limit)
            .map(SongEntry::record)
            .collect()
    }

    pub async fn random(&self) -> Option<SongRecord> {
        let catalog = self.catalog.read().await;
        let mut rng = rand::thread_rng();
        catalog.songs.values().choose(&mut rng).map(SongEntry::record)
    }

    /// Records for the given ids; unknown ids are skipped, duplicates collapsed.
    pub async fn many(&self, ids: &[SongId]) -> Vec<SongRecord> {
        let wanted: BTreeSet<SongId> = ids.iter().copied().collect();
        let catalog = self.catalog.read().await;
        wanted
            .into_iter()
            .filter_map(|id| catalog.songs.get(&id))
            .map(SongEntry::record)
            .collect()
    }

    pub async fn markers(&self, id: SongId) -> Result<Vec<f64>, StoreError> {
        self.catalog
            .read()
            .await
            .songs
            .get(&id)
            .map(|s| s.markers.clone())
            .ok_or(StoreError::NotFound(id))
    }

    /// Apply a marker mutation and persist; returns the song's markers afterwards.
    pub async fn edit_marker(&self, id: SongId, edit: MarkerEdit) -> Result<Vec<f64>, StoreError> {
        let markers = self
            .commit(|catalog| {
                let entry = catalog.songs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
                match edit {
                    MarkerEdit::Add(p) => entry.markers.push(p.clamp(0.0, 1.0)),
                    MarkerEdit::Clear => entry.markers.clear(),
                }
                Ok(entry.markers.clone())
            })
            .await?;
        debug!("song {}: markers now {:?}", id, markers);
        Ok(markers)
    }

    pub async fn insert(&self, song: NewSong) -> Result<SongEntry, StoreError> {
        let entry = self.commit(|catalog| Ok(catalog.allocate(song))).await?;
        info!("catalog: added #{} {} - {}", entry.id, entry.artist, entry.title);
        Ok(entry)
    }

    /// Bring the catalog in line with a fresh library scan.  Known files keep
    /// their id and markers; new files get fresh ids; vanished files are dropped.
    pub async fn reconcile(&self, scanned: Vec<NewSong>) -> Result<ReconcileSummary, StoreError> {
        self.commit(|catalog| Ok(Self::merge_scan(catalog, scanned)))
            .await
    }

    fn merge_scan(catalog: &mut Catalog, scanned: Vec<NewSong>) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        let by_file: HashMap<PathBuf, SongId> = catalog
            .songs
            .values()
            .map(|s| (s.file.clone(), s.id))
            .collect();
        let mut seen: BTreeSet<SongId> = BTreeSet::new();

        for song in scanned {
            match by_file.get(&song.file) {
                Some(&id) => {
                    seen.insert(id);
                    if let Some(entry) = catalog.songs.get_mut(&id) {
                        let changed = entry.title != song.title
                            || entry.artist != song.artist
                            || entry.has_image != song.has_image
                            || entry.modified != song.modified;
                        if changed {
                            entry.title = song.title;
                            entry.artist = song.artist;
                            entry.has_image = song.has_image;
                            entry.modified = song.modified;
                            summary.updated += 1;
                        }
                    }
                }
                None => {
                    let entry = catalog.allocate(song);
                    seen.insert(entry.id);
                    summary.added += 1;
                }
            }
        }

        let before = catalog.songs.len();
        catalog.songs.retain(|id, _| seen.contains(id));
        summary.removed = before - catalog.songs.len();
        summary.total = catalog.songs.len();

        info!(
            "catalog reconciled: +{} ~{} -{} ({} total)",
            summary.added, summary.updated, summary.removed, summary.total
        );
        summary
    }

    /// Run `change` on a copy of the catalog.  The copy replaces the live
    /// catalog only after it has been written to disk.
    async fn commit<T>(
        &self,
        change: impl FnOnce(&mut Catalog) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut catalog = self.catalog.write().await;
        let mut next = catalog.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *catalog = next;
        Ok(out)
    }

    async fn persist(&self, catalog: &Catalog) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(catalog)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

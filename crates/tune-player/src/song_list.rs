//! Paginated song list with a client-side id → song cache.
//!
//! Every cached song is in the visible order and vice versa, so the cache is
//! also the "already listed" set that keeps pages from duplicating rows.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tune_proto::SongId;

use crate::cooldown::{Cooldown, Debounce};
use crate::gateway::{CatalogApi, GatewayResult};
use crate::song::{sort_newest_first, MarkerState, Song, SortOrder};

const NAVIGATION_COOLDOWN: Duration = Duration::from_millis(100);
const LOAD_MORE_DELAY: Duration = Duration::from_millis(5);

/// Where the next page load resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCursor {
    /// Page index (modified-date order) or first id (id order).
    At(u64),
    /// The server ran out of songs; further loads are no-ops.
    Exhausted,
}

pub struct SongList {
    cache: HashMap<SongId, Song>,
    order: Vec<SongId>,
    active: Option<usize>,
    cursor: PageCursor,
    sort: SortOrder,
    next_gate: Cooldown,
    prev_gate: Cooldown,
    scroll_top: usize,
    viewport: usize,
    load_more: Debounce,
}

impl SongList {
    pub fn new(sort: SortOrder) -> Self {
        Self {
            cache: HashMap::new(),
            order: Vec::new(),
            active: None,
            cursor: PageCursor::At(0),
            sort,
            next_gate: Cooldown::new(NAVIGATION_COOLDOWN),
            prev_gate: Cooldown::new(NAVIGATION_COOLDOWN),
            scroll_top: 0,
            viewport: 0,
            load_more: Debounce::new(LOAD_MORE_DELAY),
        }
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn song(&self, id: SongId) -> Option<&Song> {
        self.cache.get(&id)
    }

    pub fn active_song(&self) -> Option<&Song> {
        self.active
            .and_then(|i| self.order.get(i))
            .and_then(|id| self.cache.get(id))
    }

    pub fn set_markers(&mut self, id: SongId, markers: MarkerState) {
        if let Some(song) = self.cache.get_mut(&id) {
            song.markers = markers;
        }
    }

    /// Load the next catalog page.  Ids already cached are not fetched again;
    /// the rest are resolved in one batch.  Returns the songs newly listed.
    pub async fn get_new_songs(&mut self, api: &dyn CatalogApi) -> GatewayResult<Vec<SongId>> {
        let PageCursor::At(position) = self.cursor else {
            return Ok(Vec::new());
        };
        let ids = api.page_ids(position, self.sort).await?;
        let Some(&last_id) = ids.last() else {
            info!("song list: catalog exhausted at {}", position);
            self.cursor = PageCursor::Exhausted;
            return Ok(Vec::new());
        };

        let missing = self.missing(&ids);
        let mut fetched: Vec<Song> = if missing.is_empty() {
            Vec::new()
        } else {
            api.songs(&missing)
                .await?
                .into_iter()
                .map(Song::from)
                .filter(|s| missing.contains(&s.id))
                .collect()
        };

        self.cursor = PageCursor::At(match self.sort {
            SortOrder::Modified => position + 1,
            SortOrder::Id => (position + 1).max(last_id + 1),
        });

        // Batch results come back in any order.
        if self.sort.is_modified() {
            sort_newest_first(&mut fetched);
        } else {
            let rank: HashMap<SongId, usize> =
                ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
            fetched.sort_by_key(|s| rank.get(&s.id).copied().unwrap_or(usize::MAX));
        }

        let mut added = Vec::with_capacity(fetched.len());
        for song in fetched {
            if self.insert(song.clone()) {
                added.push(song.id);
            }
        }
        debug!(
            "song list: page {} gave {} ids, {} new, cursor now {:?}",
            position,
            ids.len(),
            added.len(),
            self.cursor
        );
        Ok(added)
    }

    /// Resolve search hits without adding them to the list.
    pub async fn lookup(&self, ids: &[SongId], api: &dyn CatalogApi) -> GatewayResult<Vec<Song>> {
        let missing = self.missing(ids);
        let mut fetched: HashMap<SongId, Song> = HashMap::new();
        if !missing.is_empty() {
            for record in api.songs(&missing).await? {
                fetched.insert(record.id, Song::from(record));
            }
        }
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| self.cache.get(id).cloned().or_else(|| fetched.remove(id)))
            .collect())
    }

    /// Uncached ids, first occurrence only.
    fn missing(&self, ids: &[SongId]) -> Vec<SongId> {
        let mut seen = HashSet::new();
        ids.iter()
            .copied()
            .filter(|id| !self.cache.contains_key(id) && seen.insert(*id))
            .collect()
    }

    fn insert(&mut self, song: Song) -> bool {
        if self.cache.contains_key(&song.id) {
            return false;
        }
        self.order.push(song.id);
        self.cache.insert(song.id, song);
        true
    }

    /// Add a song to the list.  Songs already listed are ignored.
    pub fn add(&mut self, song: Song) -> bool {
        self.insert(song)
    }

    /// Empty the list and start paging again from the beginning.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.order.clear();
        self.active = None;
        self.cursor = PageCursor::At(0);
        self.scroll_top = 0;
        self.load_more.cancel();
    }

    pub fn toggle_sort_order(&mut self) -> SortOrder {
        self.sort = match self.sort {
            SortOrder::Id => SortOrder::Modified,
            SortOrder::Modified => SortOrder::Id,
        };
        self.reset();
        self.sort
    }

    // ── selection ─────────────────────────────────────────────────────────────

    pub fn set_active_by_id(&mut self, id: SongId, now: Instant) -> bool {
        match self.order.iter().position(|&x| x == id) {
            Some(i) => {
                self.active = Some(i);
                self.scroll_into_view(now);
                true
            }
            None => false,
        }
    }

    /// Move the highlight down, wrapping.  Rate-limited.
    pub fn select_next(&mut self, now: Instant) -> Option<SongId> {
        if self.order.is_empty() || !self.next_gate.try_acquire(now) {
            return None;
        }
        self.step(true, now)
    }

    /// Move the highlight up, wrapping.  Rate-limited.
    pub fn select_previous(&mut self, now: Instant) -> Option<SongId> {
        if self.order.is_empty() || !self.prev_gate.try_acquire(now) {
            return None;
        }
        self.step(false, now)
    }

    /// The song after the highlighted one, for autoplay.  Not rate-limited.
    pub fn advance(&mut self, now: Instant) -> Option<Song> {
        if self.order.is_empty() {
            return None;
        }
        self.step(true, now);
        self.active_song().cloned()
    }

    fn step(&mut self, forward: bool, now: Instant) -> Option<SongId> {
        let len = self.order.len();
        let next = match (self.active, forward) {
            (None, true) => 0,
            (None, false) => len - 1,
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
        };
        self.active = Some(next);
        self.scroll_into_view(now);
        self.order.get(next).copied()
    }

    fn scroll_into_view(&mut self, now: Instant) {
        let Some(active) = self.active else {
            return;
        };
        if active < self.scroll_top {
            self.scroll_top = active;
        } else if self.viewport > 0 && active >= self.scroll_top + self.viewport {
            self.scroll_top = active + 1 - self.viewport;
        }
        self.check_load_trigger(now);
    }

    // ── scrolling ─────────────────────────────────────────────────────────────

    pub fn set_viewport(&mut self, height: usize, now: Instant) {
        self.viewport = height;
        self.clamp_scroll();
        self.check_load_trigger(now);
    }

    pub fn scroll_by(&mut self, delta: isize, now: Instant) {
        self.scroll_top = self.scroll_top.saturating_add_signed(delta);
        self.clamp_scroll();
        self.check_load_trigger(now);
    }

    fn clamp_scroll(&mut self) {
        let max_top = self.order.len().saturating_sub(self.viewport);
        self.scroll_top = self.scroll_top.min(max_top);
    }

    /// Past the midpoint between the viewport top and the list end.
    fn near_end(&self) -> bool {
        let total = self.order.len();
        let top = self.scroll_top.min(total);
        top + self.viewport >= total - (total - top) / 2
    }

    fn check_load_trigger(&mut self, now: Instant) {
        if self.cursor != PageCursor::Exhausted && self.near_end() {
            self.load_more.arm(now);
        }
    }

    /// True when a debounced page load is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.load_more.fire_if_due(now) && self.cursor != PageCursor::Exhausted
    }

    /// Re-check the trigger after rows were added.
    pub fn after_load(&mut self, now: Instant) {
        self.check_load_trigger(now);
    }

    /// Visible rows as (song, highlighted).
    pub fn visible(&self) -> impl Iterator<Item = (&Song, bool)> + '_ {
        let end = (self.scroll_top + self.viewport).min(self.order.len());
        let start = self.scroll_top.min(end);
        self.order[start..end]
            .iter()
            .enumerate()
            .filter_map(move |(offset, id)| {
                let highlighted = self.active == Some(start + offset);
                self.cache.get(id).map(|s| (s, highlighted))
            })
    }

    /// Song drawn at `row` of the viewport.
    pub fn song_at_row(&self, row: usize) -> Option<&Song> {
        if row >= self.viewport {
            return None;
        }
        self.order
            .get(self.scroll_top + row)
            .and_then(|id| self.cache.get(id))
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory catalog implementing `CatalogApi`.

    use super::*;
    use crate::gateway::GatewayError;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use tune_proto::{MarkerEdit, SongRecord};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Request {
        Query(String),
        Page(u64, SortOrder),
        Random,
        Songs(Vec<SongId>),
        Markers(SongId),
        EditMarker(SongId, MarkerEdit),
    }

    #[derive(Default)]
    pub struct FakeCatalog {
        pub records: Mutex<Vec<SongRecord>>,
        /// Pages served in sequence; an exhausted script serves empty pages.
        pub pages: Mutex<Vec<Vec<SongId>>>,
        pub markers: Mutex<HashMap<SongId, Vec<f64>>>,
        pub requests: Mutex<Vec<Request>>,
        pub offline: Mutex<bool>,
        pub reject_edits: Mutex<bool>,
    }

    pub fn record(id: SongId, title: &str, minute: u32) -> SongRecord {
        SongRecord {
            id,
            title: title.to_string(),
            artist: "Artist".to_string(),
            image: false,
            modified: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
        }
    }

    impl FakeCatalog {
        pub fn with(records: Vec<SongRecord>, pages: Vec<Vec<SongId>>) -> Self {
            Self {
                records: Mutex::new(records),
                pages: Mutex::new(pages),
                ..Self::default()
            }
        }

        fn log(&self, r: Request) -> GatewayResult<()> {
            self.requests.lock().unwrap().push(r);
            if *self.offline.lock().unwrap() {
                return Err(GatewayError::Status(503));
            }
            Ok(())
        }

        pub fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }

        fn find(&self, id: SongId) -> Option<SongRecord> {
            self.records.lock().unwrap().iter().find(|r| r.id == id).cloned()
        }
    }

    #[async_trait]
    impl CatalogApi for FakeCatalog {
        async fn query_ids(
            &self,
            text: &str,
            _limit: usize,
            _offset: usize,
        ) -> GatewayResult<Vec<SongId>> {
            self.log(Request::Query(text.to_string()))?;
            let needle = text.to_lowercase();
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.title.to_lowercase().contains(&needle))
                .map(|r| r.id)
                .collect())
        }

        async fn page_ids(&self, cursor: u64, sort: SortOrder) -> GatewayResult<Vec<SongId>> {
            self.log(Request::Page(cursor, sort))?;
            let mut pages = self.pages.lock().unwrap();
            Ok(if pages.is_empty() {
                Vec::new()
            } else {
                pages.remove(0)
            })
        }

        async fn random_song(&self) -> GatewayResult<SongRecord> {
            self.log(Request::Random)?;
            let records = self.records.lock().unwrap();
            records.last().cloned().ok_or(GatewayError::Status(404))
        }

        async fn songs(&self, ids: &[SongId]) -> GatewayResult<Vec<SongRecord>> {
            self.log(Request::Songs(ids.to_vec()))?;
            // Deliberately reversed: callers must not rely on order.
            let mut out: Vec<SongRecord> = ids.iter().filter_map(|id| self.find(*id)).collect();
            out.reverse();
            Ok(out)
        }

        async fn markers(&self, id: SongId) -> GatewayResult<Vec<f64>> {
            self.log(Request::Markers(id))?;
            Ok(self.markers.lock().unwrap().get(&id).cloned().unwrap_or_default())
        }

        async fn edit_marker(&self, id: SongId, edit: MarkerEdit) -> GatewayResult<Vec<f64>> {
            self.log(Request::EditMarker(id, edit))?;
            if *self.reject_edits.lock().unwrap() {
                return Err(GatewayError::Rejected("demo".into()));
            }
            let mut all = self.markers.lock().unwrap();
            let markers = all.entry(id).or_default();
            match edit {
                MarkerEdit::Add(p) => markers.push(p),
                MarkerEdit::Clear => markers.clear(),
            }
            Ok(markers.clone())
        }

        fn file_url(&self, id: SongId) -> String {
            format!("mem://{}/file", id)
        }

        fn current_endpoint(&self) -> (usize, String) {
            (0, "mem://".into())
        }

        fn rotate_endpoint(&self) -> (usize, String) {
            (0, "mem://".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{record, FakeCatalog, Request};
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn ids(list: &SongList) -> Vec<SongId> {
        list.order.clone()
    }

    #[tokio::test]
    async fn test_modified_sort_reorders_batch_results() {
        // t2 < t5 < t9
        let api = FakeCatalog::with(
            vec![record(5, "five", 20), record(2, "two", 10), record(9, "nine", 30)],
            vec![vec![5, 2, 9]],
        );
        let mut list = SongList::new(SortOrder::Modified);
        let added = list.get_new_songs(&api).await.unwrap();
        assert_eq!(added, vec![9, 5, 2]);
        assert_eq!(ids(&list), vec![9, 5, 2]);
        assert_eq!(list.cursor(), PageCursor::At(1));
    }

    #[tokio::test]
    async fn test_id_sort_cursor_jumps_past_last_id() {
        let api = FakeCatalog::with(
            vec![record(3, "a", 1), record(7, "b", 2)],
            vec![vec![3, 7]],
        );
        let mut list = SongList::new(SortOrder::Id);
        list.get_new_songs(&api).await.unwrap();
        assert_eq!(ids(&list), vec![3, 7]);
        assert_eq!(list.cursor(), PageCursor::At(8));
    }

    #[tokio::test]
    async fn test_pages_never_revisit_cached_ids_and_exhaust() {
        let api = FakeCatalog::with(
            vec![record(1, "a", 1), record(2, "b", 2), record(3, "c", 3)],
            vec![vec![1, 2], vec![2, 3]],
        );
        let mut list = SongList::new(SortOrder::Id);
        list.get_new_songs(&api).await.unwrap();
        let added = list.get_new_songs(&api).await.unwrap();
        assert_eq!(added, vec![3]);
        assert_eq!(ids(&list), vec![1, 2, 3]);
        assert!(api.requests().contains(&Request::Songs(vec![3])));

        assert!(list.get_new_songs(&api).await.unwrap().is_empty());
        assert_eq!(list.cursor(), PageCursor::Exhausted);

        let before = api.requests().len();
        assert!(list.get_new_songs(&api).await.unwrap().is_empty());
        assert_eq!(api.requests().len(), before);
        assert_eq!(ids(&list), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failed_page_keeps_cursor() {
        let api = FakeCatalog::with(vec![record(1, "a", 1)], vec![vec![1]]);
        *api.offline.lock().unwrap() = true;
        let mut list = SongList::new(SortOrder::Modified);
        assert!(list.get_new_songs(&api).await.is_err());
        assert_eq!(list.cursor(), PageCursor::At(0));
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let mut list = SongList::new(SortOrder::Id);
        assert!(list.add(record(4, "x", 1).into()));
        assert!(!list.add(record(4, "x", 1).into()));
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_does_not_insert() {
        let api = FakeCatalog::with(vec![record(1, "a", 1), record(2, "b", 2)], vec![]);
        let mut list = SongList::new(SortOrder::Id);
        list.add(record(1, "a", 1).into());
        let found = list.lookup(&[2, 1, 2], &api).await.unwrap();
        let found: Vec<SongId> = found.iter().map(|s| s.id).collect();
        assert_eq!(found, vec![2, 1]);
        assert_eq!(list.len(), 1);
        assert!(api.requests().contains(&Request::Songs(vec![2])));
    }

    #[test]
    fn test_toggle_sort_resets_everything() {
        let t0 = Instant::now();
        let mut list = SongList::new(SortOrder::Modified);
        list.add(record(1, "a", 1).into());
        list.select_next(t0);
        assert_eq!(list.toggle_sort_order(), SortOrder::Id);
        assert!(list.is_empty());
        assert!(list.active_song().is_none());
        assert_eq!(list.cursor(), PageCursor::At(0));
    }

    #[test]
    fn test_selection_wraps_and_is_rate_limited() {
        let t0 = Instant::now();
        let mut list = SongList::new(SortOrder::Id);
        for i in 1..=3 {
            list.add(record(i, "s", i as u32).into());
        }
        assert_eq!(list.select_next(t0), Some(1));
        assert_eq!(list.select_next(t0 + 50 * MS), None);
        assert_eq!(list.select_next(t0 + 100 * MS), Some(2));
        assert_eq!(list.select_next(t0 + 200 * MS), Some(3));
        assert_eq!(list.select_next(t0 + 300 * MS), Some(1));
        // Independent gate for the other direction.
        assert_eq!(list.select_previous(t0 + 300 * MS), Some(3));
    }

    #[test]
    fn test_scroll_past_midpoint_arms_debounced_load() {
        let t0 = Instant::now();
        let mut list = SongList::new(SortOrder::Id);
        for i in 1..=20 {
            list.add(record(i, "s", 1).into());
        }
        list.set_viewport(5, t0);
        // top 0: 0 + 5 >= 20 - 10 is false
        assert!(!list.tick(t0 + 10 * MS));

        list.scroll_by(5, t0 + 10 * MS);
        // top 5: 10 >= 20 - 7 is false
        assert!(!list.tick(t0 + 20 * MS));

        list.scroll_by(3, t0 + 20 * MS);
        list.scroll_by(1, t0 + 22 * MS);
        // top 9: 14 >= 20 - 5 is false; top 8 was also short
        assert!(!list.tick(t0 + 40 * MS));

        list.scroll_by(2, t0 + 40 * MS);
        // top 11: 16 >= 20 - 4 fires after the debounce
        assert!(!list.tick(t0 + 42 * MS));
        assert!(list.tick(t0 + 45 * MS));
        assert!(!list.tick(t0 + 60 * MS));
    }

    fn twenty_songs(viewport: usize, now: Instant) -> SongList {
        let mut list = SongList::new(SortOrder::Id);
        for i in 1..=20 {
            list.add(record(i, "s", 1).into());
        }
        list.set_viewport(viewport, now);
        list
    }

    #[test]
    fn test_keyboard_selection_past_midpoint_loads_more() {
        let t0 = Instant::now();
        let mut list = twenty_songs(5, t0);
        let mut t = t0;
        for _ in 0..10 {
            t += 200 * MS;
            list.select_next(t);
        }
        // top 5: 10 >= 20 - 7 is false
        assert_eq!(list.scroll_top(), 5);
        assert!(!list.tick(t + 10 * MS));

        for _ in 0..10 {
            t += 200 * MS;
            list.select_next(t);
        }
        assert_eq!(list.active_song().map(|s| s.id), Some(20));
        assert_eq!(list.scroll_top(), 15);
        assert!(list.tick(t + 10 * MS));
    }

    #[test]
    fn test_autoplay_advance_past_midpoint_loads_more() {
        let t0 = Instant::now();
        let mut list = twenty_songs(5, t0);
        for _ in 0..14 {
            list.advance(t0);
        }
        // active index 13, top 9: 14 >= 15 is false
        assert!(!list.tick(t0 + 10 * MS));
        list.advance(t0 + 10 * MS);
        assert_eq!(list.scroll_top(), 10);
        assert!(list.tick(t0 + 20 * MS));
    }

    #[test]
    fn test_playing_a_late_song_loads_more() {
        let t0 = Instant::now();
        let mut list = twenty_songs(5, t0);
        assert!(list.set_active_by_id(18, t0));
        assert!(list.tick(t0 + 5 * MS));
    }

    #[test]
    fn test_rows_follow_scroll() {
        let t0 = Instant::now();
        let mut list = SongList::new(SortOrder::Id);
        for i in 1..=10 {
            list.add(record(i, "s", 1).into());
        }
        list.set_viewport(3, t0);
        list.set_active_by_id(7, t0);
        let rows: Vec<(SongId, bool)> = list.visible().map(|(s, h)| (s.id, h)).collect();
        assert_eq!(rows, vec![(5, false), (6, false), (7, true)]);
        assert_eq!(list.song_at_row(0).map(|s| s.id), Some(5));
        assert!(list.song_at_row(3).is_none());
    }
}
